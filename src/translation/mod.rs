use anyhow::{Result, anyhow};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::languages::{is_english, map_lang_code};
use crate::providers::BackendFuture;
use crate::settings::{DEFAULT_MAX_INPUT_TOKENS, DEFAULT_MAX_NEW_TOKENS};

mod provider;

pub use provider::{ProviderTranslation, TOOL_NAME, render_system_prompt, tool_spec};

pub const TARGET_LANGUAGE: &str = "en";

/// One translation job. The source language travels with the request so a
/// backend never holds per-call configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub max_new_tokens: u32,
}

pub trait TranslationBackend: Send + Sync {
    fn generate(&self, request: TranslationRequest) -> BackendFuture<String>;
}

#[derive(Debug, Clone)]
pub struct Translator<B: TranslationBackend> {
    backend: B,
    max_input_tokens: usize,
    max_new_tokens: u32,
}

impl<B: TranslationBackend> Translator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }

    pub fn with_limits(mut self, max_input_tokens: usize, max_new_tokens: u32) -> Self {
        self.max_input_tokens = max_input_tokens;
        self.max_new_tokens = max_new_tokens;
        self
    }

    /// Renders `text` in English.
    ///
    /// Blank input gives an empty string and English input is returned as is;
    /// neither reaches the backend. Backend errors are returned unchanged, and
    /// a reply that is empty once special tokens are stripped is an error.
    pub async fn translate(&self, text: &str, source_lang: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        if is_english(source_lang) {
            return Ok(text.to_string());
        }

        let source = map_lang_code(source_lang);
        let truncated = truncate_to_token_budget(text, self.max_input_tokens);
        if truncated.len() < text.len() {
            debug!(
                kept_bytes = truncated.len(),
                total_bytes = text.len(),
                "translation input truncated to {} tokens",
                self.max_input_tokens
            );
        }

        let raw = self
            .backend
            .generate(TranslationRequest {
                text: truncated.to_string(),
                source_lang: source,
                target_lang: TARGET_LANGUAGE.to_string(),
                max_new_tokens: self.max_new_tokens,
            })
            .await?;
        let cleaned = strip_special_tokens(&raw);
        if cleaned.is_empty() {
            return Err(anyhow!("translation backend returned only special tokens"));
        }
        Ok(cleaned)
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF | 0xF900..=0xFAFF
    )
}

/// Rough token count: every CJK character is a token, and so is every other
/// run of non-whitespace characters.
pub fn estimate_tokens(text: &str) -> usize {
    let mut count = 0usize;
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            in_word = false;
        } else if is_cjk(ch) {
            in_word = false;
            count += 1;
        } else if !in_word {
            in_word = true;
            count += 1;
        }
    }
    count
}

/// Longest prefix of `text` holding at most `max_tokens` tokens as counted by
/// [`estimate_tokens`].
pub fn truncate_to_token_budget(text: &str, max_tokens: usize) -> &str {
    let mut count = 0usize;
    let mut in_word = false;
    for (idx, ch) in text.char_indices() {
        let starts_token = if ch.is_whitespace() {
            in_word = false;
            false
        } else if is_cjk(ch) {
            in_word = false;
            true
        } else if !in_word {
            in_word = true;
            true
        } else {
            false
        };
        if starts_token {
            count += 1;
            if count > max_tokens {
                return text[..idx].trim_end();
            }
        }
    }
    text
}

static SPECIAL_TOKEN: OnceLock<Regex> = OnceLock::new();

fn special_token() -> &'static Regex {
    SPECIAL_TOKEN.get_or_init(|| {
        Regex::new(r"</?s>|<pad>|<unk>|__[a-z]{2,3}__").expect("valid special token regex")
    })
}

/// Removes sequence markers, language tags and control characters that
/// generation backends leak into decoded text.
pub fn strip_special_tokens(text: &str) -> String {
    let cleaned = special_token().replace_all(text, "");
    cleaned
        .chars()
        .filter(|ch| !ch.is_control() || matches!(ch, '\n' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}
