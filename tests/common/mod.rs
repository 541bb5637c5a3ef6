#![allow(dead_code)]

use anyhow::anyhow;
use std::sync::{Arc, Mutex};

use fake_news_scorer::Pipeline;
use fake_news_scorer::classification::{LabelScores, ZeroShotBackend, ZeroShotRequest};
use fake_news_scorer::languages::LanguageDetector;
use fake_news_scorer::providers::BackendFuture;
use fake_news_scorer::settings::Settings;
use fake_news_scorer::translation::{TranslationBackend, TranslationRequest};

/// Returns a fixed code, or fails when none is set.
#[derive(Clone, Default)]
pub struct FixedDetector {
    pub code: Option<&'static str>,
    pub calls: Arc<Mutex<usize>>,
}

impl FixedDetector {
    pub fn new(code: &'static str) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

impl LanguageDetector for FixedDetector {
    fn detect(&self, _text: &str) -> anyhow::Result<String> {
        *self.calls.lock().unwrap() += 1;
        self.code
            .map(str::to_string)
            .ok_or_else(|| anyhow!("detector unavailable"))
    }
}

/// Replies with a canned English text and records each request.
#[derive(Clone)]
pub struct CannedTranslation {
    pub reply: Result<String, String>,
    pub requests: Arc<Mutex<Vec<TranslationRequest>>>,
}

impl CannedTranslation {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            requests: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Arc::default(),
        }
    }
}

impl TranslationBackend for CannedTranslation {
    fn generate(&self, request: TranslationRequest) -> BackendFuture<String> {
        let reply = self.reply.clone();
        let requests = self.requests.clone();
        Box::pin(async move {
            requests.lock().unwrap().push(request);
            reply.map_err(|message| anyhow!(message))
        })
    }
}

/// "hoax" scores 0.1, "confirmed" scores 0.9, anything else 0.5.
#[derive(Clone, Default)]
pub struct KeywordClassifier {
    pub requests: Arc<Mutex<Vec<ZeroShotRequest>>>,
}

pub fn keyword_score(text: &str) -> f64 {
    if text.contains("hoax") {
        0.1
    } else if text.contains("confirmed") {
        0.9
    } else {
        0.5
    }
}

impl ZeroShotBackend for KeywordClassifier {
    fn classify(&self, request: ZeroShotRequest) -> BackendFuture<Vec<LabelScores>> {
        let requests = self.requests.clone();
        Box::pin(async move {
            let results = request
                .texts
                .iter()
                .map(|text| {
                    let score = keyword_score(text);
                    LabelScores {
                        labels: vec!["true".to_string(), "false".to_string()],
                        scores: vec![score, 1.0 - score],
                    }
                })
                .collect();
            requests.lock().unwrap().push(request);
            Ok(results)
        })
    }
}

pub type FakePipeline = Pipeline<FixedDetector, CannedTranslation, KeywordClassifier>;

pub fn pipeline(
    detector: FixedDetector,
    translation: CannedTranslation,
    classifier: KeywordClassifier,
) -> FakePipeline {
    Pipeline::from_settings(detector, translation, classifier, &Settings::default())
}
