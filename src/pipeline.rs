use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classification::{
    NEUTRAL_SCORE, ProviderClassification, SentenceScore, TruthClassifier, ZeroShotBackend,
};
use crate::languages::{LanguageDetector, WhatlangDetector, detect_language};
use crate::providers::ChatProvider;
use crate::render::{NEUTRAL_COLOR, render_highlighted_html, verdict_from_score};
use crate::sentences;
use crate::settings::Settings;
use crate::translation::{ProviderTranslation, TranslationBackend, Translator};

/// Outcome of one [`Pipeline::process`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub detected_language: String,
    pub translated_text: String,
    pub overall_true_score: f64,
    pub verdict_label: String,
    pub verdict_color: String,
    pub highlighted_html: String,
    pub sentence_scores: Vec<SentenceScore>,
}

impl ProcessResult {
    /// Result for an article with no content after trimming.
    pub fn empty() -> Self {
        Self {
            detected_language: String::new(),
            translated_text: String::new(),
            overall_true_score: NEUTRAL_SCORE,
            verdict_label: String::new(),
            verdict_color: NEUTRAL_COLOR.to_string(),
            highlighted_html: String::new(),
            sentence_scores: Vec::new(),
        }
    }

    /// Only the empty-input result carries no verdict.
    pub fn is_empty(&self) -> bool {
        self.verdict_label.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Empty,
    LanguageDetected,
    Translated,
    Scored,
    Rendered,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Empty => "empty",
            Stage::LanguageDetected => "language_detected",
            Stage::Translated => "translated",
            Stage::Scored => "scored",
            Stage::Rendered => "rendered",
        }
    }
}

/// Detect, translate, score and render, in that order.
#[derive(Debug, Clone)]
pub struct Pipeline<D, T, C>
where
    D: LanguageDetector,
    T: TranslationBackend,
    C: ZeroShotBackend,
{
    detector: D,
    translator: Translator<T>,
    classifier: TruthClassifier<C>,
}

/// Pipeline wired to whatlang and a single chat provider.
pub type LlmPipeline = Pipeline<
    WhatlangDetector,
    ProviderTranslation<ChatProvider>,
    ProviderClassification<ChatProvider>,
>;

impl<D, T, C> Pipeline<D, T, C>
where
    D: LanguageDetector,
    T: TranslationBackend,
    C: ZeroShotBackend,
{
    pub fn new(detector: D, translator: Translator<T>, classifier: TruthClassifier<C>) -> Self {
        Self {
            detector,
            translator,
            classifier,
        }
    }

    /// Builds the stages from raw collaborators using the limits in `settings`.
    pub fn from_settings(detector: D, translation: T, zero_shot: C, settings: &Settings) -> Self {
        let translator = Translator::new(translation)
            .with_limits(settings.max_input_tokens, settings.max_new_tokens);
        let classifier = TruthClassifier::new(zero_shot)
            .with_hypothesis_template(settings.hypothesis_template.clone())
            .with_max_sentences(settings.max_sentences);
        Self::new(detector, translator, classifier)
    }

    pub fn max_sentences(&self) -> usize {
        self.classifier.max_sentences()
    }

    pub async fn process(&self, article: &str) -> Result<ProcessResult> {
        let article = article.trim();
        if article.is_empty() {
            log_stage(Stage::Empty);
            return Ok(ProcessResult::empty());
        }

        let detected_language = detect_language(&self.detector, article);
        log_stage(Stage::LanguageDetected);
        debug!(language = %detected_language, "pipeline.detected");

        let translated_text = self.translator.translate(article, &detected_language).await?;
        log_stage(Stage::Translated);

        let overall_true_score = self.classifier.score(&translated_text).await?;
        let verdict = verdict_from_score(overall_true_score);
        let sentences = sentences::split(&translated_text);
        let sentence_scores = self.classifier.score_sentences(&sentences).await?;
        log_stage(Stage::Scored);
        debug!(
            overall = overall_true_score,
            verdict = verdict.label.as_str(),
            sentences = sentence_scores.len(),
            "pipeline.scored"
        );

        let highlighted_html = render_highlighted_html(&sentence_scores);
        log_stage(Stage::Rendered);

        Ok(ProcessResult {
            detected_language,
            translated_text,
            overall_true_score,
            verdict_label: verdict.label.as_str().to_string(),
            verdict_color: verdict.color.to_string(),
            highlighted_html,
            sentence_scores,
        })
    }
}

impl LlmPipeline {
    /// Uses `provider` for both translation and zero-shot classification.
    pub fn with_provider(provider: ChatProvider, settings: &Settings) -> Self {
        Self::from_settings(
            WhatlangDetector::new(settings.detection.clone()),
            ProviderTranslation::new(provider.clone()),
            ProviderClassification::new(provider),
            settings,
        )
    }
}

fn log_stage(stage: Stage) {
    debug!(stage = stage.as_str(), "pipeline.stage");
}
