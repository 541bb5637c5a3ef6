use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    Chat, ProviderKind, ProviderResponse, ProviderUsage, ToolSpec, format_error_parts,
    reported_model, send_json,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
pub(crate) const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
// The messages API rejects requests without max_tokens.
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub(super) async fn call_tool(chat: Chat, tool_name: &str) -> Result<ProviderResponse> {
    let body = request_body(&chat, chat.tool(tool_name)?);
    let url = std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let request = reqwest::Client::new()
        .post(url)
        .header("x-api-key", &chat.key)
        .header("anthropic-version", API_VERSION);
    let text = send_json(ProviderKind::Claude, request, &body, summarize_error).await?;
    parse_response(&text, tool_name, &chat.model)
}

fn request_body(chat: &Chat, tool: &ToolSpec) -> Value {
    let messages = chat
        .user_turns()
        .map(|content| {
            json!({
                "role": "user",
                "content": [{"type": "text", "text": content}]
            })
        })
        .collect::<Vec<_>>();

    let mut body = json!({
        "model": chat.model,
        "max_tokens": chat.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages,
        "tools": [{
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.parameters
        }],
        "tool_choice": {"type": "tool", "name": tool.name}
    });
    if let Some(system) = chat.system_prompt() {
        body["system"] = json!(system);
    }
    body
}

fn parse_response(text: &str, tool_name: &str, requested_model: &str) -> Result<ProviderResponse> {
    let payload: MessageResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Claude response JSON: {}", err))?;
    let block = payload
        .content
        .into_iter()
        .find(|block| block.kind == "tool_use" && block.name.as_deref() == Some(tool_name))
        .ok_or_else(|| anyhow!("no tool call returned from Claude"))?;
    let args = block
        .input
        .ok_or_else(|| anyhow!("Claude tool_use missing input"))?;

    Ok(ProviderResponse {
        args,
        model: reported_model(payload.model, requested_model),
        usage: payload.usage.map(|usage| ProviderUsage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage
                .input_tokens
                .zip(usage.output_tokens)
                .map(|(input, output)| input + output),
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
        #[serde(rename = "type")]
        kind: Option<String>,
        message: Option<String>,
    }

    let detail = serde_json::from_str::<Envelope>(body).ok()?.error?;
    Some(format_error_parts(detail.message, detail.kind, None))
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    input: Option<Value>,
}
