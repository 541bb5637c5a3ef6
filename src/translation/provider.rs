use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use super::{TranslationBackend, TranslationRequest};
use crate::providers::{BackendFuture, Provider, ToolSpec};

pub const TOOL_NAME: &str = "deliver_translation";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.tera");

/// Translation backend that asks a chat model for a forced tool call.
#[derive(Debug, Clone)]
pub struct ProviderTranslation<P: Provider> {
    provider: P,
}

impl<P: Provider> ProviderTranslation<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Provider> TranslationBackend for ProviderTranslation<P> {
    fn generate(&self, request: TranslationRequest) -> BackendFuture<String> {
        let provider = self.provider.clone();
        Box::pin(async move {
            let system_prompt = render_system_prompt(&request, TOOL_NAME)?;
            let response = provider
                .register_tool(tool_spec(TOOL_NAME))
                .limit_output_tokens(request.max_new_tokens)
                .append_system_input(system_prompt)
                .append_user_input(request.text.clone())
                .call_tool(TOOL_NAME)
                .await?;
            debug!(model = ?response.model, usage = ?response.usage, "translation.response");
            parse_tool_args(response.args, &request)
        })
    }
}

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    let parameters = json!({
        "type": "object",
        "properties": {
            "translation": {"type": "string"},
            "source_language": {"type": "string"},
            "target_language": {"type": "string"}
        },
        "required": ["translation", "source_language", "target_language"]
    });

    ToolSpec {
        name: tool_name.to_string(),
        description: "Return the translated text with its language codes.".to_string(),
        parameters,
    }
}

pub fn render_system_prompt(request: &TranslationRequest, tool_name: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("source_lang", request.source_lang.as_str());
    context.insert("target_lang", request.target_lang.as_str());
    context.insert("tool_name", tool_name);

    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render translation prompt")
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    translation: String,
    #[serde(default)]
    source_language: String,
    target_language: String,
}

fn parse_tool_args(value: Value, request: &TranslationRequest) -> Result<String> {
    let args: ToolArgs =
        serde_json::from_value(value).with_context(|| "invalid translation tool arguments")?;
    if args.translation.trim().is_empty() {
        return Err(anyhow!("translation is empty"));
    }
    if !eq_insensitive(&args.target_language, &request.target_lang) {
        return Err(anyhow!(
            "tool response target_language mismatch (expected '{}', got '{}')",
            request.target_lang,
            args.target_language
        ));
    }
    if !args.source_language.trim().is_empty()
        && !eq_insensitive(&args.source_language, &request.source_lang)
    {
        debug!(
            expected = %request.source_lang,
            reported = %args.source_language,
            "model reported a different source language"
        );
    }
    Ok(args.translation)
}

fn eq_insensitive(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}
