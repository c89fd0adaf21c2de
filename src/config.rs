//! Configuration management for ci-explain
//!
//! Stores settings in ~/.config/ci-explain/config.json. Environment and CLI
//! overrides are applied by the binary, never here.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

use crate::extract::DEFAULT_MAX_LINES;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "phi3:mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_CONTEXT_CHARS: usize = 1000;
const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Ollama-compatible model service
    pub endpoint: String,
    pub model: String,
    /// Tail lines of the log kept as context
    pub max_lines: usize,
    /// Upper bound on the single model call
    pub timeout_secs: u64,
    /// Characters of snippet forwarded into the prompt
    pub context_chars: usize,
    /// Passed through verbatim as the request's `options`
    pub model_options: BTreeMap<String, Value>,
}

fn default_model_options() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("num_ctx".to_string(), Value::from(4096)),
        ("temperature".to_string(), Value::from(0.1)),
        ("top_p".to_string(), Value::from(0.9)),
        ("num_predict".to_string(), Value::from(800)),
        ("num_thread".to_string(), Value::from(8)),
    ])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_lines: DEFAULT_MAX_LINES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            context_chars: DEFAULT_CONTEXT_CHARS,
            model_options: default_model_options(),
        }
    }
}

impl Config {
    /// Reset out-of-range values to their defaults.
    pub fn sanitize(&mut self) {
        if self.max_lines == 0 {
            self.max_lines = DEFAULT_MAX_LINES;
        }
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            self.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if self.context_chars == 0 {
            self.context_chars = DEFAULT_CONTEXT_CHARS;
        }
        if self.model.trim().is_empty() {
            self.model = DEFAULT_MODEL.to_string();
        }
        if parse_http_url(&self.endpoint).is_none() {
            tracing::warn!(endpoint = %self.endpoint, "invalid model endpoint, using default");
            self.endpoint = DEFAULT_ENDPOINT.to_string();
        }
    }

    /// Full URL of the generate API for the configured endpoint.
    pub fn generate_url(&self) -> anyhow::Result<Url> {
        let base = parse_http_url(&self.endpoint)
            .with_context(|| format!("Invalid model endpoint: {}", self.endpoint))?;
        let mut path = base.path().trim_end_matches('/').to_string();
        path.push_str("/api/generate");
        let mut url = base;
        url.set_path(&path);
        Ok(url)
    }

    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ci-explain"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load config from `path`. A missing file yields defaults; a corrupt one
    /// is set aside as `config.json.corrupt` and defaults are used.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Config>(&content) {
            Ok(mut config) => {
                config.sanitize();
                config
            }
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    path = %path.display(),
                    "Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                    err
                );
                Self::default()
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().context("Could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let mut sanitized = self.clone();
        sanitized.sanitize();

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(&sanitized).context("Failed to serialize config")?;
        write_config_atomic(path, &content).context("Failed to write config")
    }
}

fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

fn write_config_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;
    file.write_all(content.as_bytes())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}
