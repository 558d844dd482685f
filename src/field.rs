//! The closed catalogue of settings fields and their typed values.
//!
//! Field names are dotted keys (`emojis.folders.danger`,
//! `lineThresholds.midThreshold`). Every read, write and reset is checked
//! against this catalogue so a typo in a field name fails loudly instead of
//! becoming a write-only no-op.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SettingsError};

/// Prefix used by legacy per-directory settings files.
pub const LEGACY_PREFIX: &str = "codeCounter.";

/// Largest count the TOML store can hold (TOML integers are signed 64-bit).
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// A recognized settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    EmojiNormal,
    EmojiWarning,
    EmojiDanger,
    FolderEmojiNormal,
    FolderEmojiWarning,
    FolderEmojiDanger,
    MidThreshold,
    HighThreshold,
    ExcludePatterns,
    IncludePatterns,
}

/// The shape of value a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Count,
    Patterns,
}

impl Field {
    /// Every field, in display order.
    pub const ALL: [Field; 10] = [
        Field::EmojiNormal,
        Field::EmojiWarning,
        Field::EmojiDanger,
        Field::FolderEmojiNormal,
        Field::FolderEmojiWarning,
        Field::FolderEmojiDanger,
        Field::MidThreshold,
        Field::HighThreshold,
        Field::ExcludePatterns,
        Field::IncludePatterns,
    ];

    /// The dotted key used in the store and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Field::EmojiNormal => "emojis.normal",
            Field::EmojiWarning => "emojis.warning",
            Field::EmojiDanger => "emojis.danger",
            Field::FolderEmojiNormal => "emojis.folders.normal",
            Field::FolderEmojiWarning => "emojis.folders.warning",
            Field::FolderEmojiDanger => "emojis.folders.danger",
            Field::MidThreshold => "lineThresholds.midThreshold",
            Field::HighThreshold => "lineThresholds.highThreshold",
            Field::ExcludePatterns => "excludePatterns",
            Field::IncludePatterns => "includePatterns",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::MidThreshold | Field::HighThreshold => FieldKind::Count,
            Field::ExcludePatterns | Field::IncludePatterns => FieldKind::Patterns,
            _ => FieldKind::Text,
        }
    }

    /// List-valued fields are inherited as a whole list, never merged.
    pub fn is_pattern_list(self) -> bool {
        self.kind() == FieldKind::Patterns
    }

    /// Look up a field by its dotted key.
    pub fn from_key(key: &str) -> Result<Field> {
        let key = key.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.key() == key)
            .ok_or_else(|| SettingsError::InvalidField(key.to_string()))
    }

    /// Look up a field by its legacy flat key (`codeCounter.emojis.normal`).
    /// Returns `None` for keys that are not recognized.
    pub fn from_legacy_key(key: &str) -> Option<Field> {
        let key = key.strip_prefix(LEGACY_PREFIX)?;
        Field::from_key(key).ok()
    }

    /// Key segments, used to nest the field inside a directory table.
    pub fn segments(self) -> std::str::Split<'static, char> {
        self.key().split('.')
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        Field::from_key(s)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldKind::Text => "text",
            FieldKind::Count => "count",
            FieldKind::Patterns => "pattern list",
        })
    }
}

/// A field value. Unset fields are represented by absence, never by an empty
/// value: `Patterns(vec![])` is an explicit empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Count(u64),
    Text(String),
    Patterns(Vec<String>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Count(_) => FieldKind::Count,
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Patterns(_) => FieldKind::Patterns,
        }
    }

    /// Reject a value whose kind does not match `field`, or a count the
    /// store cannot represent.
    pub fn check(&self, field: Field) -> Result<()> {
        if self.kind() != field.kind() {
            return Err(SettingsError::InvalidValue {
                key: field.key().into(),
                reason: format!("expected {}, got {}", field.kind(), self.kind()),
            });
        }
        match self {
            FieldValue::Count(n) if *n > MAX_COUNT => Err(SettingsError::InvalidValue {
                key: field.key().into(),
                reason: format!("{n} exceeds the largest storable count {MAX_COUNT}"),
            }),
            _ => Ok(()),
        }
    }

    /// Parse a raw user-entered string for `field`.
    ///
    /// Counts must be non-negative integers. Pattern lists accept a JSON array
    /// or a comma-separated list; an empty string is an explicit empty list.
    pub fn parse(field: Field, raw: &str) -> Result<FieldValue> {
        match field.kind() {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Count => {
                let value = raw
                    .trim()
                    .parse::<u64>()
                    .map(FieldValue::Count)
                    .map_err(|e| SettingsError::InvalidValue {
                        key: field.key().into(),
                        reason: e.to_string(),
                    })?;
                value.check(field)?;
                Ok(value)
            }
            FieldKind::Patterns => {
                let trimmed = raw.trim();
                if trimmed.starts_with('[') {
                    serde_json::from_str::<Vec<String>>(trimmed)
                        .map(FieldValue::Patterns)
                        .map_err(|e| SettingsError::InvalidValue {
                            key: field.key().into(),
                            reason: e.to_string(),
                        })
                } else {
                    Ok(FieldValue::Patterns(
                        trimmed
                            .split(',')
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(String::from)
                            .collect(),
                    ))
                }
            }
        }
    }

    /// Decode a value read from the TOML store.
    pub fn from_toml(field: Field, value: &toml::Value) -> Result<FieldValue> {
        let decoded = match (field.kind(), value) {
            (FieldKind::Text, toml::Value::String(s)) => Some(FieldValue::Text(s.clone())),
            (FieldKind::Count, toml::Value::Integer(i)) => {
                u64::try_from(*i).ok().map(FieldValue::Count)
            }
            (FieldKind::Patterns, toml::Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::Patterns),
            _ => None,
        };
        decoded.ok_or_else(|| SettingsError::InvalidValue {
            key: field.key().into(),
            reason: format!("expected {}, found `{value}`", field.kind()),
        })
    }

    /// Decode a value read from a legacy JSON settings file.
    pub fn from_json(field: Field, value: &serde_json::Value) -> Result<FieldValue> {
        let decoded = serde_json::from_value::<FieldValue>(value.clone())
            .ok()
            .filter(|v| v.kind() == field.kind())
            .ok_or_else(|| SettingsError::InvalidValue {
                key: field.key().into(),
                reason: format!("expected {}, found `{value}`", field.kind()),
            })?;
        decoded.check(field)?;
        Ok(decoded)
    }

    /// Encode for a `toml_edit` document. Fails for counts above
    /// [`MAX_COUNT`].
    pub fn to_toml_edit(&self, field: Field) -> Result<toml_edit::Value> {
        Ok(match self {
            FieldValue::Count(n) => {
                let n = i64::try_from(*n).map_err(|e| SettingsError::InvalidValue {
                    key: field.key().into(),
                    reason: e.to_string(),
                })?;
                toml_edit::Value::from(n)
            }
            FieldValue::Text(s) => toml_edit::Value::from(s.as_str()),
            FieldValue::Patterns(items) => {
                toml_edit::Value::Array(items.iter().map(String::as_str).collect())
            }
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_patterns(&self) -> Option<&[String]> {
        match self {
            FieldValue::Patterns(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Patterns(p) => {
                let json = serde_json::to_string(p).unwrap_or_else(|_| format!("{p:?}"));
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Count(n)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(p: Vec<String>) -> Self {
        FieldValue::Patterns(p)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(p: Vec<&str>) -> Self {
        FieldValue::Patterns(p.into_iter().map(String::from).collect())
    }
}
