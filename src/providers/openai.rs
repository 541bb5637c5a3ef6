use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    Chat, ProviderKind, ProviderResponse, ProviderUsage, ToolSpec, format_error_parts,
    reported_model, send_json,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub(super) async fn call_tool(chat: Chat, tool_name: &str) -> Result<ProviderResponse> {
    let body = request_body(&chat, chat.tool(tool_name)?);
    let base = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let request = reqwest::Client::new()
        .post(format!("{}/chat/completions", base.trim_end_matches('/')))
        .bearer_auth(&chat.key);
    let text = send_json(ProviderKind::OpenAI, request, &body, summarize_error).await?;
    parse_response(&text, tool_name, &chat.model)
}

fn request_body(chat: &Chat, tool: &ToolSpec) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = chat.system_prompt() {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.extend(
        chat.user_turns()
            .map(|content| json!({"role": "user", "content": content})),
    );

    let mut body = json!({
        "model": chat.model,
        "messages": messages,
        "tools": [{
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters
            }
        }],
        "tool_choice": {"type": "function", "function": {"name": tool.name}}
    });
    if let Some(max_tokens) = chat.max_tokens {
        body["max_completion_tokens"] = json!(max_tokens);
    }
    body
}

fn parse_response(text: &str, tool_name: &str, requested_model: &str) -> Result<ProviderResponse> {
    let payload: CompletionResponse =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI response JSON")?;
    let call = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.tool_calls.into_iter().next())
        .ok_or_else(|| anyhow!("no tool call returned from OpenAI"))?;
    if call.function.name != tool_name {
        return Err(anyhow!(
            "unexpected tool name '{}' from OpenAI",
            call.function.name
        ));
    }

    let args = serde_json::from_str(&call.function.arguments)
        .with_context(|| "failed to parse OpenAI tool arguments")?;
    Ok(ProviderResponse {
        args,
        model: reported_model(payload.model, requested_model),
        usage: payload.usage.map(|usage| ProviderUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }),
    })
}

fn summarize_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        error: Option<Detail>,
    }

    #[derive(Deserialize)]
    struct Detail {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<String>,
    }

    let detail = serde_json::from_str::<Envelope>(body).ok()?.error?;
    Some(format_error_parts(detail.message, detail.kind, detail.code))
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}
