mod detector;

pub use detector::{LanguageDetector, WhatlangDetector, detect_language};

/// Language code returned whenever detection cannot produce an answer.
pub const FALLBACK_LANGUAGE: &str = "en";

/// Maps a detector language code onto the two-letter codes the translation
/// backend understands.
///
/// Total: unknown codes keep their first two characters, and an empty code
/// maps to English.
pub fn map_lang_code(code: &str) -> String {
    let code = normalize_code(code);
    if code.is_empty() {
        return FALLBACK_LANGUAGE.to_string();
    }
    if let Some(mapped) = special_code(&code) {
        return mapped.to_string();
    }
    code.chars().take(2).collect()
}

fn special_code(code: &str) -> Option<&'static str> {
    let mapped = match code {
        "zh-cn" | "zh-tw" | "zh" => "zh",
        "pt-br" => "pt",
        "sr" => "sr",
        // detectors trained on older ISO tables still emit jw for Javanese
        "jw" => "jv",
        "he" | "iw" => "he",
        "id" => "id",
        "fil" => "tl",
        "uk" => "uk",
        "no" | "nb" | "nn" => "no",
        _ => return None,
    };
    Some(mapped)
}

pub fn is_english(code: &str) -> bool {
    normalize_code(code).starts_with("en")
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}
