use anyhow::{Result, anyhow};
use tracing::{debug, warn};
use whatlang::Detector;

use super::FALLBACK_LANGUAGE;
use crate::settings::DetectionSettings;

/// Identifies the language of a piece of text.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<String>;
}

/// Runs `detector`, substituting English for any failure.
pub fn detect_language<D: LanguageDetector + ?Sized>(detector: &D, text: &str) -> String {
    match detector.detect(text) {
        Ok(code) if !code.trim().is_empty() => code,
        Ok(_) => {
            warn!("language detector returned an empty code; assuming {}", FALLBACK_LANGUAGE);
            FALLBACK_LANGUAGE.to_string()
        }
        Err(err) => {
            warn!("language detection failed ({}); assuming {}", err, FALLBACK_LANGUAGE);
            FALLBACK_LANGUAGE.to_string()
        }
    }
}

/// Trigram detector backed by `whatlang`.
///
/// Detection is a pure function of the input, so identical text always yields
/// the same code. The acceptance thresholds are fixed at construction.
#[derive(Debug, Clone)]
pub struct WhatlangDetector {
    settings: DetectionSettings,
}

impl WhatlangDetector {
    pub fn new(settings: DetectionSettings) -> Self {
        Self { settings }
    }
}

impl Default for WhatlangDetector {
    fn default() -> Self {
        Self::new(DetectionSettings::default())
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<String> {
        let info = Detector::new()
            .detect(text)
            .ok_or_else(|| anyhow!("no language features found in input"))?;
        if self.settings.require_reliable && !info.is_reliable() {
            return Err(anyhow!(
                "unreliable detection ({}, confidence {:.2})",
                info.lang().code(),
                info.confidence()
            ));
        }
        if info.confidence() < self.settings.min_confidence {
            return Err(anyhow!(
                "confidence {:.2} below threshold {:.2}",
                info.confidence(),
                self.settings.min_confidence
            ));
        }
        let code = detector_code(info.lang().code());
        debug!(lang = %code, confidence = info.confidence(), "language.detected");
        Ok(code)
    }
}

// whatlang speaks ISO 639-3; the rest of the pipeline expects the two-letter
// codes (plus zh-cn) that the translation mapper is keyed on.
fn detector_code(iso3: &str) -> String {
    let code = match iso3 {
        "afr" => "af",
        "aka" => "ak",
        "amh" => "am",
        "ara" => "ar",
        "aze" => "az",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh-cn",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "he",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "hye" => "hy",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jv",
        "jpn" => "ja",
        "kan" => "kn",
        "kat" => "ka",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "nb",
        "ori" => "or",
        "pan" => "pa",
        "pes" => "fa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "sna" => "sn",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tuk" => "tk",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "uzb" => "uz",
        "vie" => "vi",
        "yid" => "yi",
        "zul" => "zu",
        other => other,
    };
    code.to_string()
}
