//! Anthology configuration.
//!
//! Handles loading, merging, and validating `config.toml`. Stock defaults are
//! the base layer; the user's file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! By default the config lives next to the poems (`poems/config.toml`); the
//! `--config` flag points elsewhere. Relative paths inside the file resolve
//! against the directory that contains it.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! exclude = ["requirements.txt", "README.txt", "anthology_builder.py"]
//!
//! [document]
//! title = "Poem Anthology"
//! author = ""
//! # template_dir = "templates"  # unset = built-in template
//!
//! [compiler]
//! program = "pdflatex"
//! args = []                     # placed before the source file name
//!
//! [attachments]
//! # dawn = ["images/sunrise.jpg", "images/fog.png"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Name of the config file looked up in the poems directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Anthology configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnthologyConfig {
    /// File names in the poems directory that are never treated as poems.
    pub exclude: Vec<String>,
    /// Document metadata and template location.
    pub document: DocumentConfig,
    /// External typesetting program.
    pub compiler: CompilerConfig,
    /// Poem name → image paths, attached in listed order.
    pub attachments: BTreeMap<String, Vec<String>>,
}

/// File names skipped by default: files that commonly sit next to poems.
pub fn default_exclusions() -> Vec<String> {
    ["requirements.txt", "README.txt", "anthology_builder.py"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AnthologyConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclusions(),
            document: DocumentConfig::default(),
            compiler: CompilerConfig::default(),
            attachments: BTreeMap::new(),
        }
    }
}

impl AnthologyConfig {
    /// Validate config values are usable.
    ///
    /// Attachment paths are not checked here; each one is accepted or
    /// rejected on its own when it is staged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compiler.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "compiler.program must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Document metadata and template settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentConfig {
    /// Title on the cover page.
    pub title: String,
    /// Author on the cover page. Empty = no author line.
    pub author: String,
    /// Directory holding `anthology_template.tex`. `None` uses the
    /// built-in template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            title: "Poem Anthology".to_string(),
            author: String::new(),
            template_dir: None,
        }
    }
}

/// External compiler invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Program name or path, looked up on `PATH`.
    pub program: String,
    /// Extra arguments placed before the source file name.
    pub args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: "pdflatex".to_string(),
            args: Vec::new(),
        }
    }
}

/// Resolve a config-relative path against the config file's directory.
pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AnthologyConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AnthologyConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AnthologyConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults if it is absent.
pub fn load_config(path: &Path) -> Result<AnthologyConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_some() {
        tracing::debug!(path = %path.display(), "loaded config file");
    }
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Anthology Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Relative paths are resolved against the directory holding this file.
# Unknown keys will cause an error.

# Files in the poems directory that are never treated as poems.
exclude = ["requirements.txt", "README.txt", "anthology_builder.py"]

# ---------------------------------------------------------------------------
# Document
# ---------------------------------------------------------------------------
[document]
# Cover page title and author. LaTeX specials are escaped for you.
title = "Poem Anthology"
author = ""

# Directory holding a custom `anthology_template.tex` (Tera syntax).
# Leave unset to use the built-in template; `anthology init-template`
# writes a copy you can edit.
# template_dir = "templates"

# ---------------------------------------------------------------------------
# Compiler
# ---------------------------------------------------------------------------
[compiler]
# Program run (twice) on anthology.tex to produce anthology.pdf.
program = "pdflatex"

# Extra arguments placed before the source file name, e.g.
# args = ["-interaction=nonstopmode", "-halt-on-error"]
args = []

# ---------------------------------------------------------------------------
# Attachments
# ---------------------------------------------------------------------------
# Images per poem, keyed by poem name (the file name without .txt).
# Accepted types: png, jpg, jpeg, pdf. Order is kept.
[attachments]
# dawn = ["images/sunrise.jpg", "images/fog.png"]
"##
}
