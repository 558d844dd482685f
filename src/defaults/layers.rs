//! Building and merging the `toml::Table` layers that sit on top of the
//! compiled defaults.

use toml::{Table, Value};
use tracing::debug;

use super::config_key;
use crate::error::{Result, SettingsError};
use crate::field::{Field, FieldValue};

/// Merge `overlay` into `base`. Tables on both sides merge key by key;
/// anything else in `overlay` replaces what `base` had, so a pattern list is
/// always taken whole from the highest layer that sets it.
pub fn merge_into(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match value {
            Value::Table(incoming) if matches!(base.get(&key), Some(Value::Table(_))) => {
                if let Some(Value::Table(existing)) = base.get_mut(&key) {
                    merge_into(existing, incoming);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Table built from `{PREFIX}__SECTION__KEY` variables.
///
/// `__` separates nesting levels and segments are lowercased, so
/// `CODE_COUNTER__LINE_THRESHOLDS__MID_THRESHOLD` targets
/// `line_thresholds.mid_threshold`. Values are parsed by the kind of the field
/// they name: pattern lists take a JSON array or a comma-separated list.
/// Variables that name no field are skipped.
pub fn env_layer(prefix: &str, vars: &[(String, String)]) -> Result<Table> {
    let needle = format!("{prefix}__");
    let mut table = Table::new();

    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(&needle) else {
            continue;
        };
        let key = rest
            .split("__")
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(".");
        let Some(field) = Field::ALL.into_iter().find(|f| config_key(*f) == key) else {
            debug!(var = %name, "ignoring environment variable that names no settings field");
            continue;
        };
        let value = FieldValue::parse(field, raw).map_err(|e| match e {
            SettingsError::InvalidValue { reason, .. } => SettingsError::InvalidValue {
                key: name.clone(),
                reason,
            },
            other => other,
        })?;
        insert_dotted(&mut table, config_key(field), to_toml(&value)?);
    }
    Ok(table)
}

/// Table built from explicit per-field overrides. Later entries win.
pub fn override_layer(overrides: &[(Field, FieldValue)]) -> Result<Table> {
    let mut table = Table::new();
    for (field, value) in overrides {
        value.check(*field)?;
        insert_dotted(&mut table, config_key(*field), to_toml(value)?);
    }
    Ok(table)
}

fn insert_dotted(table: &mut Table, dotted: &str, value: Value) {
    match dotted.split_once('.') {
        None => {
            table.insert(dotted.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = table
                .entry(head)
                .or_insert_with(|| Value::Table(Table::new()));
            if !slot.is_table() {
                *slot = Value::Table(Table::new());
            }
            if let Value::Table(inner) = slot {
                insert_dotted(inner, rest, value);
            }
        }
    }
}

fn to_toml(value: &FieldValue) -> Result<Value> {
    Ok(match value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Count(n) => {
            Value::Integer(i64::try_from(*n).map_err(|e| SettingsError::InvalidValue {
                key: n.to_string(),
                reason: e.to_string(),
            })?)
        }
        FieldValue::Patterns(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
    })
}
