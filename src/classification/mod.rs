use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::providers::BackendFuture;
use crate::settings::{DEFAULT_HYPOTHESIS_TEMPLATE, DEFAULT_MAX_SENTENCES};

mod provider;

pub use provider::{
    ProviderClassification, TOOL_NAME, output_token_budget, render_system_prompt, tool_spec,
};

pub const TRUE_LABEL: &str = "true";
pub const FALSE_LABEL: &str = "false";

/// Score meaning "no information": used for blank text and for sentences past
/// the classification cap.
pub const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceScore {
    pub sentence: String,
    pub true_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZeroShotRequest {
    pub texts: Vec<String>,
    pub candidate_labels: Vec<String>,
    pub hypothesis_template: String,
}

/// Labels and scores for one classified text; the two vectors are aligned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelScores {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl LabelScores {
    /// Score of `label`, compared case-insensitively. When a label repeats the
    /// last occurrence wins.
    pub fn score_for(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .zip(&self.scores)
            .filter(|(name, _)| name.trim().eq_ignore_ascii_case(label))
            .map(|(_, score)| *score)
            .last()
    }
}

pub trait ZeroShotBackend: Send + Sync {
    /// Returns one [`LabelScores`] per input text, in input order.
    fn classify(&self, request: ZeroShotRequest) -> BackendFuture<Vec<LabelScores>>;
}

#[derive(Debug, Clone)]
pub struct TruthClassifier<B: ZeroShotBackend> {
    backend: B,
    hypothesis_template: String,
    max_sentences: usize,
}

impl<B: ZeroShotBackend> TruthClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            hypothesis_template: DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
            max_sentences: DEFAULT_MAX_SENTENCES,
        }
    }

    pub fn with_hypothesis_template(mut self, template: impl Into<String>) -> Self {
        self.hypothesis_template = template.into();
        self
    }

    pub fn with_max_sentences(mut self, max_sentences: usize) -> Self {
        self.max_sentences = max_sentences;
        self
    }

    pub fn max_sentences(&self) -> usize {
        self.max_sentences
    }

    /// Probability that `text` as a whole is true.
    ///
    /// Blank text scores [`NEUTRAL_SCORE`] without a backend call. A response
    /// without a "true" label scores 0.0.
    pub async fn score(&self, text: &str) -> Result<f64> {
        if text.trim().is_empty() {
            return Ok(NEUTRAL_SCORE);
        }
        let results = self.backend.classify(self.request(vec![text.to_string()])).await?;
        let first = results
            .first()
            .ok_or_else(|| anyhow!("zero-shot backend returned no result"))?;
        Ok(true_score(first))
    }

    /// Scores sentences in order, sending at most `cap` of them to the backend
    /// in a single batch. Sentences past the cap score [`NEUTRAL_SCORE`].
    pub async fn score_many(&self, sentences: &[String], cap: usize) -> Result<Vec<SentenceScore>> {
        if sentences.is_empty() {
            return Ok(Vec::new());
        }
        let limit = cap.min(sentences.len());
        let (limited, rest) = sentences.split_at(limit);

        let mut scores = Vec::with_capacity(sentences.len());
        if !limited.is_empty() {
            let results = self.backend.classify(self.request(limited.to_vec())).await?;
            if results.len() != limited.len() {
                return Err(anyhow!(
                    "zero-shot backend returned {} results for {} sentences",
                    results.len(),
                    limited.len()
                ));
            }
            scores.extend(limited.iter().zip(&results).map(|(sentence, result)| {
                SentenceScore {
                    sentence: sentence.clone(),
                    true_score: true_score(result),
                }
            }));
        }
        if !rest.is_empty() {
            debug!(
                classified = limited.len(),
                skipped = rest.len(),
                "sentence cap reached; remaining sentences scored neutral"
            );
        }
        scores.extend(rest.iter().map(|sentence| SentenceScore {
            sentence: sentence.clone(),
            true_score: NEUTRAL_SCORE,
        }));
        Ok(scores)
    }

    /// Shorthand for [`Self::score_many`] with the configured cap.
    pub async fn score_sentences(&self, sentences: &[String]) -> Result<Vec<SentenceScore>> {
        self.score_many(sentences, self.max_sentences).await
    }

    fn request(&self, texts: Vec<String>) -> ZeroShotRequest {
        ZeroShotRequest {
            texts,
            candidate_labels: vec![TRUE_LABEL.to_string(), FALSE_LABEL.to_string()],
            hypothesis_template: self.hypothesis_template.clone(),
        }
    }
}

fn true_score(result: &LabelScores) -> f64 {
    result.score_for(TRUE_LABEL).map(clamp_score).unwrap_or(0.0)
}

pub(crate) fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
