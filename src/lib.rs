use anyhow::{Context, Result};
use std::path::Path;

pub mod classification;
pub mod languages;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod render;
pub mod sentences;
pub mod server;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translation;

pub use pipeline::{LlmPipeline, Pipeline, ProcessResult};
pub use providers::{ChatProvider, Provider, ProviderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub model: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
    pub max_sentences: Option<usize>,
    pub format: OutputFormat,
}

/// Loads layered settings and applies the command-line overrides in `config`.
pub fn load_config_settings(config: &Config) -> Result<settings::Settings> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(max_sentences) = config.max_sentences {
        settings.max_sentences = max_sentences;
    }
    Ok(settings)
}

/// Resolves provider, key and model, then wires the pipeline.
pub fn build_pipeline(config: &Config, settings: &settings::Settings) -> Result<LlmPipeline> {
    let selection =
        providers::resolve_provider_selection(config.model.as_deref(), config.key.as_deref())?;
    let key = providers::resolve_key(selection.provider, config.key.as_deref())
        .with_context(|| "no API key found for selected provider")?;
    let model = selection
        .requested_model
        .unwrap_or_else(|| selection.provider.default_model().to_string());
    tracing::debug!(provider = selection.provider.as_str(), model = %model, "provider.selected");

    let provider = providers::build_provider(selection.provider, key, model);
    Ok(LlmPipeline::with_provider(provider, settings))
}

pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    let input = input.unwrap_or_default();
    if input.trim().is_empty() {
        return format_result(&ProcessResult::empty(), config.format);
    }

    let settings = load_config_settings(&config)?;
    let pipeline = build_pipeline(&config, &settings)?;
    let result = pipeline.process(&input).await?;
    format_result(&result, config.format)
}

pub fn format_result(result: &ProcessResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).with_context(|| "failed to encode result")
        }
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_text(result: &ProcessResult) -> String {
    if result.is_empty() {
        return "verdict: (empty input)".to_string();
    }

    let mut lines = vec![
        format!("language: {}", result.detected_language),
        format!(
            "verdict: {} (true {}%)",
            result.verdict_label,
            render::score_percent(result.overall_true_score)
        ),
        "translation:".to_string(),
    ];
    lines.extend(result.translated_text.lines().map(|line| format!("  {}", line)));
    if !result.sentence_scores.is_empty() {
        lines.push("sentences:".to_string());
        for score in &result.sentence_scores {
            lines.push(format!(
                "  [{:>3}%] {}",
                render::score_percent(score.true_score),
                score.sentence
            ));
        }
    }
    lines.join("\n")
}
