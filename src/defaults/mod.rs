//! Global defaults: what a field resolves to when no directory sets it.
//!
//! The built-in values live on [`CounterDefaults`] as `#[config(default)]`
//! attributes. A user can shift them without touching any project:
//!
//! ```text
//! Compiled defaults      #[config(default = ...)]
//!   ↑ defaults.toml      each search path in order, deep-merged
//!   ↑ environment        CODE_COUNTER__LINE_THRESHOLDS__MID_THRESHOLD=500
//!   ↑ overrides          SettingsBuilder::default_override
//! ```
//!
//! [`load`] runs on pre-loaded data and does no I/O, so every layer can be
//! tested with synthetic input.

pub mod layers;
pub mod search;
pub mod strict;

use std::path::PathBuf;

use confique::Config;
use toml::{Table, Value};

use crate::error::{Result, SettingsError};
use crate::field::{Field, FieldValue};
use crate::resolve::ResolvedSettings;

/// Defaults for every settings field.
#[derive(Config, Debug, Clone, PartialEq)]
pub struct CounterDefaults {
    /// Badge emojis shown next to file counts.
    #[config(nested)]
    pub emojis: EmojiDefaults,

    /// Line counts at which a file or folder changes badge.
    #[config(nested)]
    pub line_thresholds: ThresholdDefaults,

    /// Glob patterns never counted.
    #[config(default = [
        "**/node_modules/**",
        "**/.git/**",
        "**/target/**",
        "**/dist/**",
        "**/out/**",
    ])]
    pub exclude_patterns: Vec<String>,

    /// Glob patterns to count. Empty means every file not excluded.
    #[config(default = [])]
    pub include_patterns: Vec<String>,
}

#[derive(Config, Debug, Clone, PartialEq)]
pub struct EmojiDefaults {
    /// Below the mid threshold.
    #[config(default = "🟢")]
    pub normal: String,

    /// Between the mid and high thresholds.
    #[config(default = "🟡")]
    pub warning: String,

    /// At or above the high threshold.
    #[config(default = "🔴")]
    pub danger: String,

    /// Badge emojis shown next to folder totals.
    #[config(nested)]
    pub folders: FolderEmojiDefaults,
}

#[derive(Config, Debug, Clone, PartialEq)]
pub struct FolderEmojiDefaults {
    #[config(default = "🟩")]
    pub normal: String,

    #[config(default = "🟨")]
    pub warning: String,

    #[config(default = "🟥")]
    pub danger: String,
}

#[derive(Config, Debug, Clone, PartialEq)]
pub struct ThresholdDefaults {
    /// Lines at which the warning badge starts.
    #[config(default = 300)]
    pub mid_threshold: u64,

    /// Lines at which the danger badge starts.
    #[config(default = 1000)]
    pub high_threshold: u64,
}

impl CounterDefaults {
    /// Compiled-in defaults only.
    pub fn builtin() -> Result<Self> {
        Ok(Self::builder().load()?)
    }

    pub fn value(&self, field: Field) -> FieldValue {
        match field {
            Field::EmojiNormal => self.emojis.normal.as_str().into(),
            Field::EmojiWarning => self.emojis.warning.as_str().into(),
            Field::EmojiDanger => self.emojis.danger.as_str().into(),
            Field::FolderEmojiNormal => self.emojis.folders.normal.as_str().into(),
            Field::FolderEmojiWarning => self.emojis.folders.warning.as_str().into(),
            Field::FolderEmojiDanger => self.emojis.folders.danger.as_str().into(),
            Field::MidThreshold => self.line_thresholds.mid_threshold.into(),
            Field::HighThreshold => self.line_thresholds.high_threshold.into(),
            Field::ExcludePatterns => self.exclude_patterns.clone().into(),
            Field::IncludePatterns => self.include_patterns.clone().into(),
        }
    }

    pub fn to_resolved(&self) -> ResolvedSettings {
        ResolvedSettings::from_fn(|field| self.value(field))
    }
}

/// Key of `field` in the defaults file, which follows Rust field names.
pub fn config_key(field: Field) -> &'static str {
    match field {
        Field::EmojiNormal => "emojis.normal",
        Field::EmojiWarning => "emojis.warning",
        Field::EmojiDanger => "emojis.danger",
        Field::FolderEmojiNormal => "emojis.folders.normal",
        Field::FolderEmojiWarning => "emojis.folders.warning",
        Field::FolderEmojiDanger => "emojis.folders.danger",
        Field::MidThreshold => "line_thresholds.mid_threshold",
        Field::HighThreshold => "line_thresholds.high_threshold",
        Field::ExcludePatterns => "exclude_patterns",
        Field::IncludePatterns => "include_patterns",
    }
}

/// Everything [`load`] needs, already read from disk and the environment.
#[derive(Debug, Clone, Default)]
pub struct DefaultsInput {
    /// Defaults files, lowest priority first.
    pub files: Vec<(PathBuf, String)>,
    pub env_vars: Vec<(String, String)>,
    /// `None` disables the environment layer.
    pub env_prefix: Option<String>,
    pub overrides: Vec<(Field, FieldValue)>,
    /// Reject unknown keys in defaults files.
    pub strict: bool,
}

/// Layer files, environment and overrides over the compiled defaults.
pub fn load(input: DefaultsInput) -> Result<CounterDefaults> {
    let mut merged = Table::new();

    for (path, content) in &input.files {
        if input.strict {
            strict::check_unknown_keys(content, path)?;
        }
        let table: Table = toml::from_str(content).map_err(|e| SettingsError::DefaultsParse {
            path: path.clone(),
            source: e,
        })?;
        layers::merge_into(&mut merged, table);
    }

    if let Some(prefix) = &input.env_prefix {
        layers::merge_into(&mut merged, layers::env_layer(prefix, &input.env_vars)?);
    }

    if !input.overrides.is_empty() {
        layers::merge_into(&mut merged, layers::override_layer(&input.overrides)?);
    }

    let layer: <CounterDefaults as Config>::Layer =
        Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| SettingsError::InvalidValue {
                key: "<defaults>".into(),
                reason: e.message().to_string(),
            })?;

    Ok(CounterDefaults::builder().preloaded(layer).load()?)
}
