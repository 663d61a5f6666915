use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use deepsearch::agent::DEFAULT_MAX_STEPS;
use deepsearch::providers::configs::OpenAiProviderConfig;
use deepsearch::search::serper::{SerperConfig, SERPER_HOST};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

/// Keys without a default; checked up front so the error names the variable to set
const REQUIRED_KEYS: [&str; 2] = ["provider.api_key", "search.api_key"];

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_search_host")]
    pub host: String,
    pub api_key: String,
}

impl SearchSettings {
    pub fn into_config(self) -> SerperConfig {
        SerperConfig {
            host: self.host,
            api_key: self.api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthSettings {
    /// `name:token` pairs separated by commas
    #[serde(default)]
    pub users: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub search: SearchSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .set_default("search.host", default_search_host())?
            .set_default("agent.max_steps", default_max_steps() as u64)?
            .set_default("auth.users", "")?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("DEEPSEARCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        for key in REQUIRED_KEYS {
            if let Err(err) = config.get_string(key) {
                return Err(missing_field_error(err));
            }
        }

        config.try_deserialize().map_err(missing_field_error)
    }
}

fn missing_field_error(err: config::ConfigError) -> ConfigError {
    tracing::debug!("Configuration error: {:?}", &err);

    // Handle both NotFound and missing field message variants
    let error_str = err.to_string();
    if error_str.starts_with("missing field") {
        // Extract field name from error message "missing field `api_key`"
        let field = error_str
            .trim_start_matches("missing field `")
            .split('`')
            .next()
            .unwrap_or_default();
        ConfigError::MissingEnvVar {
            env_var: to_env_var(field),
        }
    } else if let config::ConfigError::NotFound(field) = &err {
        ConfigError::MissingEnvVar {
            env_var: to_env_var(field),
        }
    } else {
        ConfigError::Other(err)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_search_host() -> String {
    SERPER_HOST.to_string()
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}
