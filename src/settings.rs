use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

pub const DEFAULT_MAX_INPUT_TOKENS: usize = 1024;
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 1024;
pub const DEFAULT_MAX_SENTENCES: usize = 40;
pub const DEFAULT_HYPOTHESIS_TEMPLATE: &str = "This statement is {}.";
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8787";

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub min_confidence: f64,
    pub require_reliable: bool,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            require_reliable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub detection: DetectionSettings,
    pub max_input_tokens: usize,
    pub max_new_tokens: u32,
    pub max_sentences: usize,
    pub hypothesis_template: String,
    pub server_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detection: DetectionSettings::default(),
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            max_sentences: DEFAULT_MAX_SENTENCES,
            hypothesis_template: DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    detection: Option<DetectionSection>,
    translation: Option<TranslationSection>,
    classification: Option<ClassificationSection>,
    server: Option<ServerSection>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectionSection {
    min_confidence: Option<f64>,
    require_reliable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSection {
    max_input_tokens: Option<usize>,
    max_new_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassificationSection {
    max_sentences: Option<usize>,
    hypothesis_template: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
}

/// Loads settings from every known location, later files overriding earlier ones.
///
/// Order: `./settings.toml`, `./settings.local.toml`, the same two names under
/// `~/.fake-news-scorer/`, then `extra_path` (which must exist).
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            debug!(path = %path.display(), "settings.layer");
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(detection) = incoming.detection {
            if let Some(min) = detection.min_confidence {
                if (0.0..=1.0).contains(&min) {
                    self.detection.min_confidence = min;
                } else {
                    warn!("ignoring detection.min_confidence {} (expected 0.0..=1.0)", min);
                }
            }
            if let Some(reliable) = detection.require_reliable {
                self.detection.require_reliable = reliable;
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(limit) = translation.max_input_tokens {
                if limit > 0 {
                    self.max_input_tokens = limit;
                }
            }
            if let Some(limit) = translation.max_new_tokens {
                if limit > 0 {
                    self.max_new_tokens = limit;
                }
            }
        }
        if let Some(classification) = incoming.classification {
            if let Some(limit) = classification.max_sentences {
                if limit > 0 {
                    self.max_sentences = limit;
                }
            }
            if let Some(template) = classification.hypothesis_template {
                if template.contains("{}") {
                    self.hypothesis_template = template;
                } else {
                    warn!("ignoring hypothesis_template without a {{}} placeholder");
                }
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr.trim().to_string();
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".fake-news-scorer"))
        }
    })
}
