//! Unknown-key detection for defaults files.
//!
//! The file is deserialized into the all-optional confique layer through
//! `serde_ignored`; every key the layer does not consume is reported with the
//! file path and the line it sits on.

use std::path::Path;

use confique::Config;

use super::CounterDefaults;
use crate::error::{Result, SettingsError};

type DefaultsLayer = <CounterDefaults as Config>::Layer;

pub fn check_unknown_keys(content: &str, path: &Path) -> Result<()> {
    let mut ignored = Vec::new();
    let deserializer = toml::Deserializer::new(content);
    let _: DefaultsLayer = serde_ignored::deserialize(deserializer, |key| {
        ignored.push(key.to_string());
    })
    .map_err(|e| SettingsError::DefaultsParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    if ignored.is_empty() {
        return Ok(());
    }

    Err(SettingsError::UnknownKeys(
        ignored
            .into_iter()
            .map(|key| SettingsError::UnknownKey {
                line: line_of(content, &key),
                key,
                path: path.to_path_buf(),
            })
            .collect(),
    ))
}

/// 1-indexed line on which `dotted` is assigned, or 0 if it cannot be found.
///
/// Tracks `[section]` headers and accepts dotted assignments
/// (`folders.danger = ...` inside `[emojis]`), comparing the full key path.
fn line_of(content: &str, dotted: &str) -> usize {
    let mut section = String::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('[').filter(|_| !line.starts_with("[[")) {
            section = normalize_key(header.split(']').next().unwrap_or_default());
            continue;
        }
        let Some((lhs, _)) = line.split_once('=') else {
            continue;
        };
        let key = normalize_key(lhs);
        let full = if section.is_empty() {
            key
        } else {
            format!("{section}.{key}")
        };
        if full == dotted {
            return index + 1;
        }
    }
    0
}

fn normalize_key(raw: &str) -> String {
    raw.split('.')
        .map(|s| s.trim().trim_matches('"'))
        .collect::<Vec<_>>()
        .join(".")
}
