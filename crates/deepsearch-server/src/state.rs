use anyhow::Result;
use deepsearch::agent::Agent;
use deepsearch::prompt_template;
use deepsearch::providers::base::Provider;
use deepsearch::providers::openai::OpenAiProvider;
use deepsearch::render::MessageRenderer;
use deepsearch::search::serper::SerperClient;
use deepsearch::search::SearchClient;
use deepsearch::systems::web_search::{WebSearchSystem, SEARCH_WEB_TOOL};
use std::sync::Arc;

use crate::auth::{Authenticator, TokenAuthenticator};
use crate::configuration::Settings;

/// Shared application state. Every collaborator is immutable and built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub search: Arc<dyn SearchClient>,
    pub authenticator: Arc<dyn Authenticator>,
    pub renderer: Arc<MessageRenderer>,
    pub system_prompt: String,
    pub max_steps: usize,
}

impl AppState {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let provider = OpenAiProvider::new(settings.provider.into_config())?;
        let search = SerperClient::new(settings.search.into_config())?;

        Ok(Self {
            provider: Arc::new(provider),
            search: Arc::new(search),
            authenticator: Arc::new(TokenAuthenticator::from_users(&settings.auth.users)),
            renderer: Arc::new(MessageRenderer::new()?),
            system_prompt: prompt_template::system_prompt(SEARCH_WEB_TOOL)?,
            max_steps: settings.agent.max_steps,
        })
    }

    /// A fresh agent for one chat turn, with web search as its only system
    pub fn agent(&self) -> Agent {
        let mut agent = Agent::new(self.provider.clone())
            .with_system_prompt(self.system_prompt.clone())
            .with_max_steps(self.max_steps);
        agent.add_system(Box::new(WebSearchSystem::new(self.search.clone())));
        agent
    }
}
