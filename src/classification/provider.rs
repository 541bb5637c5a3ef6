use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use super::{LabelScores, ZeroShotBackend, ZeroShotRequest};
use crate::providers::{BackendFuture, Provider, ToolSpec};

pub const TOOL_NAME: &str = "report_label_scores";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.tera");

const TOKENS_PER_STATEMENT: u32 = 64;
const BASE_OUTPUT_TOKENS: u32 = 256;

/// Output tokens to allow for one `{index, labels, scores}` entry per
/// statement plus the surrounding tool-call JSON.
pub fn output_token_budget(statements: usize) -> u32 {
    let statements = u32::try_from(statements).unwrap_or(u32::MAX);
    statements
        .saturating_mul(TOKENS_PER_STATEMENT)
        .saturating_add(BASE_OUTPUT_TOKENS)
}

/// Zero-shot backend that asks a chat model to score every candidate label.
#[derive(Debug, Clone)]
pub struct ProviderClassification<P: Provider> {
    provider: P,
}

impl<P: Provider> ProviderClassification<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Provider> ZeroShotBackend for ProviderClassification<P> {
    fn classify(&self, request: ZeroShotRequest) -> BackendFuture<Vec<LabelScores>> {
        let provider = self.provider.clone();
        Box::pin(async move {
            let system_prompt = render_system_prompt(&request, TOOL_NAME)?;
            let statements = serde_json::to_string_pretty(&request.texts)
                .with_context(|| "failed to encode statements")?;
            let response = provider
                .register_tool(tool_spec(TOOL_NAME))
                .limit_output_tokens(output_token_budget(request.texts.len()))
                .append_system_input(system_prompt)
                .append_user_input(statements)
                .call_tool(TOOL_NAME)
                .await?;
            debug!(model = ?response.model, usage = ?response.usage, "classification.response");
            parse_tool_args(response.args, request.texts.len())
        })
    }
}

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    let parameters = json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "index": {"type": "integer"},
                        "labels": {"type": "array", "items": {"type": "string"}},
                        "scores": {"type": "array", "items": {"type": "number"}}
                    },
                    "required": ["index", "labels", "scores"]
                }
            }
        },
        "required": ["results"]
    });

    ToolSpec {
        name: tool_name.to_string(),
        description: "Return label probabilities for every statement.".to_string(),
        parameters,
    }
}

pub fn render_system_prompt(request: &ZeroShotRequest, tool_name: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("count", &request.texts.len());
    context.insert("hypothesis_template", request.hypothesis_template.as_str());
    context.insert("labels", &request.candidate_labels);
    context.insert("tool_name", tool_name);

    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render classification prompt")
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    results: Vec<ToolResult>,
}

#[derive(Debug, Deserialize)]
struct ToolResult {
    index: usize,
    labels: Vec<String>,
    scores: Vec<f64>,
}

fn parse_tool_args(value: Value, expected: usize) -> Result<Vec<LabelScores>> {
    let args: ToolArgs =
        serde_json::from_value(value).with_context(|| "invalid classification tool arguments")?;

    let mut slots: Vec<Option<LabelScores>> = vec![None; expected];
    for result in args.results {
        if result.labels.len() != result.scores.len() {
            return Err(anyhow!(
                "statement {} has {} labels but {} scores",
                result.index,
                result.labels.len(),
                result.scores.len()
            ));
        }
        let slot = slots
            .get_mut(result.index)
            .ok_or_else(|| anyhow!("statement index {} out of range", result.index))?;
        if slot.is_some() {
            return Err(anyhow!("statement {} scored more than once", result.index));
        }
        *slot = Some(LabelScores {
            labels: result.labels,
            scores: result.scores,
        });
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or_else(|| anyhow!("statement {} was not scored", index)))
        .collect()
}
