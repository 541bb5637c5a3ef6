use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    Chat, ProviderKind, ProviderResponse, ProviderUsage, ToolSpec, format_error_parts,
    reported_model, send_json,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub(crate) const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub(super) async fn call_tool(chat: Chat, tool_name: &str) -> Result<ProviderResponse> {
    let body = request_body(&chat, chat.tool(tool_name)?);
    let base = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let request = reqwest::Client::new()
        .post(format!(
            "{}/{}:generateContent",
            base.trim_end_matches('/'),
            chat.model
        ))
        .header("x-goog-api-key", &chat.key);
    let text = send_json(ProviderKind::Gemini, request, &body, summarize_error).await?;
    parse_response(&text, tool_name, &chat.model)
}

fn request_body(chat: &Chat, tool: &ToolSpec) -> Value {
    let contents = chat
        .user_turns()
        .map(|content| json!({"role": "user", "parts": [{"text": content}]}))
        .collect::<Vec<_>>();

    let mut body = json!({
        "contents": contents,
        "tools": [{
            "function_declarations": [{
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters
            }]
        }],
        "tool_config": {
            "function_calling_config": {
                "mode": "ANY",
                "allowed_function_names": [tool.name]
            }
        }
    });
    if let Some(system) = chat.system_prompt() {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    if let Some(max_tokens) = chat.max_tokens {
        body["generationConfig"] = json!({"maxOutputTokens": max_tokens});
    }
    body
}

fn parse_response(text: &str, tool_name: &str, requested_model: &str) -> Result<ProviderResponse> {
    let payload: GenerateResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Gemini response JSON: {}", err))?;
    let content = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .ok_or_else(|| anyhow!("no candidate returned from Gemini"))?;
    let call = content
        .parts
        .into_iter()
        .filter_map(|part| part.function_call)
        .find(|call| call.name == tool_name)
        .ok_or_else(|| anyhow!("no tool call returned from Gemini"))?;

    Ok(ProviderResponse {
        args: call.args,
        model: reported_model(payload.model_version, requested_model),
        usage: payload.usage_metadata.map(|usage| ProviderUsage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
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
        status: Option<String>,
        code: Option<i32>,
    }

    let detail = serde_json::from_str::<Envelope>(body).ok()?.error?;
    Some(format_error_parts(
        detail.message,
        detail.status,
        detail.code.map(|code| code.to_string()),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatProvider, Provider};
    use insta::assert_json_snapshot;

    #[test]
    fn gemini_extract_tool_args_snapshot() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/gemini_tool_response.json"
        ));
        let response = parse_response(payload, "deliver_translation", "gemini-1.5-flash").unwrap();
        assert_json_snapshot!(response);
    }

    #[test]
    fn gemini_without_candidates_is_an_error() {
        let err = parse_response(r#"{"candidates":[]}"#, "deliver_translation", "g").unwrap_err();
        assert!(err.to_string().contains("no candidate"));
    }

    #[test]
    fn system_prompt_goes_to_system_instruction() {
        let provider = ChatProvider::new(ProviderKind::Gemini, "key", "")
            .register_tool(ToolSpec {
                name: "report_label_scores".to_string(),
                description: "d".to_string(),
                parameters: json!({"type": "object"}),
            })
            .append_system_input("rules".to_string())
            .append_user_input("[\"a\"]".to_string());
        let chat = &provider.chat;
        let body = request_body(chat, chat.tool("report_label_scores").unwrap());

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "rules");
        assert_eq!(body["contents"].as_array().map(Vec::len), Some(1));
        assert_eq!(
            body["tool_config"]["function_calling_config"]["allowed_function_names"][0],
            "report_label_scores"
        );
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn gemini_error_includes_status_and_code() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            summarize_error(body).as_deref(),
            Some("API key not valid | type: INVALID_ARGUMENT | code: 400")
        );
    }
}
