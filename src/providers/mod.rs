use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

mod claude;
mod gemini;
mod openai;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Gemini,
    Claude,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => openai::DEFAULT_MODEL,
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
            ProviderKind::Claude => claude::DEFAULT_MODEL,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Claude => "Claude",
        }
    }

    fn key_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAI => &["OPENAI_API_KEY"],
            ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderKind::Claude => &["ANTHROPIC_API_KEY"],
        }
    }
}

const KIND_PRIORITY: [ProviderKind; 3] =
    [ProviderKind::OpenAI, ProviderKind::Gemini, ProviderKind::Claude];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub provider: ProviderKind,
    pub requested_model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderResponse {
    pub args: serde_json::Value,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    System,
    User,
}

/// Conversation collected by the builder methods of [`Provider`].
#[derive(Clone)]
pub(crate) struct Chat {
    pub(crate) key: String,
    pub(crate) model: String,
    pub(crate) turns: Vec<(Role, String)>,
    pub(crate) tools: Vec<ToolSpec>,
    pub(crate) max_tokens: Option<u32>,
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("model", &self.model)
            .field("turns", &self.turns.len())
            .field("tools", &self.tools.len())
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl Chat {
    fn new(key: String, model: String) -> Self {
        Self {
            key,
            model,
            turns: Vec::new(),
            tools: Vec::new(),
            max_tokens: None,
        }
    }

    pub(crate) fn tool(&self, name: &str) -> Result<&ToolSpec> {
        self.tools
            .iter()
            .find(|tool| tool.name == name)
            .ok_or_else(|| anyhow!("tool '{}' not registered", name))
    }

    /// System turns joined by blank lines, or `None` when there are none.
    pub(crate) fn system_prompt(&self) -> Option<String> {
        let text = self
            .turns
            .iter()
            .filter(|(role, _)| *role == Role::System)
            .map(|(_, content)| content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        (!text.trim().is_empty()).then_some(text)
    }

    pub(crate) fn user_turns(&self) -> impl Iterator<Item = &str> {
        self.turns
            .iter()
            .filter(|(role, _)| *role == Role::User)
            .map(|(_, content)| content.as_str())
    }
}

/// Boxed future returned by every external model collaborator.
pub type BackendFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

pub type ProviderFuture = BackendFuture<ProviderResponse>;

/// A chat model that answers through exactly one forced tool call.
///
/// Builder methods consume and return the provider, so every request starts
/// from a fresh clone and no conversation state leaks between calls.
pub trait Provider: Clone + Send + Sync + 'static {
    fn append_system_input(self, input: String) -> Self;
    fn append_user_input(self, input: String) -> Self;
    fn register_tool(self, tool: ToolSpec) -> Self;
    fn limit_output_tokens(self, max_tokens: u32) -> Self;
    fn call_tool(self, tool_name: &str) -> ProviderFuture;
}

#[derive(Debug, Clone)]
pub struct ChatProvider {
    kind: ProviderKind,
    chat: Chat,
}

impl ChatProvider {
    /// A blank `model` selects the provider's default model.
    pub fn new(kind: ProviderKind, key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let model = if model.trim().is_empty() {
            kind.default_model().to_string()
        } else {
            model.trim().to_string()
        };
        Self {
            kind,
            chat: Chat::new(key.into(), model),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.chat.model
    }
}

impl Provider for ChatProvider {
    fn append_system_input(mut self, input: String) -> Self {
        self.chat.turns.push((Role::System, input));
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.chat.turns.push((Role::User, input));
        self
    }

    fn register_tool(mut self, tool: ToolSpec) -> Self {
        self.chat.tools.push(tool);
        self
    }

    fn limit_output_tokens(mut self, max_tokens: u32) -> Self {
        self.chat.max_tokens = (max_tokens > 0).then_some(max_tokens);
        self
    }

    fn call_tool(self, tool_name: &str) -> ProviderFuture {
        let tool_name = tool_name.to_string();
        Box::pin(async move {
            let ChatProvider { kind, chat } = self;
            debug!(provider = kind.as_str(), model = %chat.model, tool = %tool_name, "provider.request");
            match kind {
                ProviderKind::OpenAI => openai::call_tool(chat, &tool_name).await,
                ProviderKind::Gemini => gemini::call_tool(chat, &tool_name).await,
                ProviderKind::Claude => claude::call_tool(chat, &tool_name).await,
            }
        })
    }
}

/// Sends a prepared request and returns the body of a successful response.
/// Error bodies are condensed with `summarize_error` when it recognizes them.
pub(crate) async fn send_json(
    kind: ProviderKind,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    summarize_error: fn(&str) -> Option<String>,
) -> Result<String> {
    let response = request
        .json(body)
        .send()
        .await
        .with_context(|| format!("{} request failed", kind.label()))?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if status.is_success() {
        return Ok(text);
    }
    Err(anyhow!(
        "{} API error ({}): {}",
        kind.label(),
        status,
        summarize_error(&text).unwrap_or(text)
    ))
}

/// Keeps the reported model name, falling back to the requested one.
pub(crate) fn reported_model(reported: Option<String>, requested: &str) -> Option<String> {
    reported
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(requested.to_string()))
}

pub(crate) fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let parts = [
        message,
        kind.map(|kind| format!("type: {}", kind)),
        code.map(|code| format!("code: {}", code)),
    ];
    let parts = parts
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty() && !part.trim().ends_with(':'))
        .collect::<Vec<_>>();
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

pub fn build_provider(provider: ProviderKind, key: String, model: String) -> ChatProvider {
    ChatProvider::new(provider, key, model)
}

pub fn resolve_provider_selection(
    model_arg: Option<&str>,
    override_key: Option<&str>,
) -> Result<ProviderSelection> {
    match model_arg {
        Some(model) => parse_model_arg(model),
        None => default_provider_selection(override_key),
    }
}

pub fn resolve_key(provider: ProviderKind, override_key: Option<&str>) -> Result<String> {
    if let Some(key) = override_key {
        return Ok(key.to_string());
    }
    provider
        .key_vars()
        .iter()
        .find_map(|var| get_env(var))
        .ok_or_else(|| anyhow!("API key not found for provider {}", provider.as_str()))
}

// First provider with a key in the environment; an explicit key alone means OpenAI.
fn default_provider_selection(override_key: Option<&str>) -> Result<ProviderSelection> {
    let found = KIND_PRIORITY
        .into_iter()
        .find(|kind| kind.key_vars().iter().any(|var| get_env(var).is_some()))
        .or_else(|| override_key.map(|_| ProviderKind::OpenAI));

    match found {
        Some(provider) => Ok(ProviderSelection {
            provider,
            requested_model: None,
        }),
        None => Err(anyhow!(
            "no API keys found (checked OPENAI_API_KEY, GEMINI_API_KEY/GOOGLE_API_KEY, ANTHROPIC_API_KEY)"
        )),
    }
}

fn parse_model_arg(model_arg: &str) -> Result<ProviderSelection> {
    let raw = model_arg.trim();
    if raw.is_empty() {
        return Err(anyhow!("model argument is empty"));
    }

    let (name, model) = match raw.split_once(':') {
        Some((name, model)) => (name, model.trim()),
        None => (raw, ""),
    };
    let provider = provider_from_name(&name.trim().to_lowercase()).ok_or_else(|| {
        anyhow!(
            "unable to infer provider from model '{}'. Use provider:model (openai:, gemini:, claude:)",
            raw
        )
    })?;
    Ok(ProviderSelection {
        provider,
        requested_model: (!model.is_empty()).then(|| model.to_string()),
    })
}

fn provider_from_name(name: &str) -> Option<ProviderKind> {
    match name {
        "openai" => Some(ProviderKind::OpenAI),
        "gemini" | "google" => Some(ProviderKind::Gemini),
        "claude" | "anthropic" => Some(ProviderKind::Claude),
        _ => None,
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_and_model_pair() {
        let selection = resolve_provider_selection(Some("gemini:gemini-2.5-flash"), None).unwrap();
        assert_eq!(selection.provider, ProviderKind::Gemini);
        assert_eq!(selection.requested_model.as_deref(), Some("gemini-2.5-flash"));
    }

    #[test]
    fn bare_provider_name_uses_default_model() {
        let selection = resolve_provider_selection(Some("Anthropic"), None).unwrap();
        assert_eq!(selection.provider, ProviderKind::Claude);
        assert!(selection.requested_model.is_none());

        let selection = resolve_provider_selection(Some("openai:"), None).unwrap();
        assert_eq!(selection.provider, ProviderKind::OpenAI);
        assert!(selection.requested_model.is_none());
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = resolve_provider_selection(Some("mistral-large"), None).unwrap_err();
        assert!(err.to_string().contains("unable to infer provider"));
        assert!(resolve_provider_selection(Some("  "), None).is_err());
    }

    #[test]
    fn override_key_wins() {
        let key = resolve_key(ProviderKind::Claude, Some("sk-test")).unwrap();
        assert_eq!(key, "sk-test");
    }

    #[test]
    fn blank_model_falls_back_to_default() {
        let provider = build_provider(ProviderKind::Gemini, "key".to_string(), " ".to_string());
        assert_eq!(provider.model(), "gemini-1.5-flash");
        assert_eq!(provider.kind(), ProviderKind::Gemini);
    }

    #[test]
    fn builder_collects_turns_and_limits() {
        let provider = ChatProvider::new(ProviderKind::OpenAI, "sk-secret", "gpt-4o")
            .append_system_input("first".to_string())
            .append_user_input("question".to_string())
            .append_system_input("second".to_string())
            .limit_output_tokens(0);
        assert_eq!(provider.chat.system_prompt().as_deref(), Some("first\n\nsecond"));
        assert_eq!(provider.chat.user_turns().collect::<Vec<_>>(), vec!["question"]);
        assert_eq!(provider.chat.max_tokens, None);
        assert!(provider.chat.tool("missing").is_err());
        assert!(!format!("{:?}", provider).contains("sk-secret"));
    }

    #[test]
    fn error_parts_are_joined() {
        let text = format_error_parts(
            Some("bad key".to_string()),
            Some("auth".to_string()),
            Some(" ".to_string()),
        );
        assert_eq!(text, "bad key | type: auth");
        assert_eq!(format_error_parts(None, None, None), "unknown error");
    }
}
