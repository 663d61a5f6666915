use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    search_tool: &'a str,
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// The instructions given to the model on every turn: search first, cite everything
pub fn system_prompt(search_tool: &str) -> Result<String, TeraError> {
    load_prompt(SYSTEM_PROMPT, &SystemPromptContext { search_tool })
}
