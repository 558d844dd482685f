//! Sparse per-directory settings records.

use std::collections::BTreeMap;
use std::collections::btree_map;

use toml::{Table, Value};

use crate::error::Result;
use crate::field::{Field, FieldValue};

/// The fields a single directory overrides. A missing field means "inherit".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsRecord {
    fields: BTreeMap<Field, FieldValue>,
}

impl SettingsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Set a field, rejecting values of the wrong kind.
    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        value.check(field)?;
        self.fields.insert(field, value);
        Ok(())
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn remove(&mut self, field: Field) -> Option<FieldValue> {
        self.fields.remove(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Field, FieldValue> {
        self.fields.iter()
    }

    pub fn fields(&self) -> Vec<Field> {
        self.fields.keys().copied().collect()
    }

    /// Overlay `other` on top of `self`; fields present in `other` win.
    pub fn merge(&mut self, other: &SettingsRecord) {
        for (field, value) in other {
            self.fields.insert(*field, value.clone());
        }
    }

    /// Decode a directory table from the store.
    ///
    /// Nested tables are walked into dotted keys (`emojis.folders.danger`).
    /// Unknown keys and mistyped values are errors: the caller decides whether
    /// that marks the record as damaged.
    pub fn from_table(table: &Table) -> Result<SettingsRecord> {
        let mut leaves = Vec::new();
        collect_leaves(table, "", &mut leaves);

        let mut record = SettingsRecord::new();
        for (key, value) in leaves {
            let field = Field::from_key(&key)?;
            record
                .fields
                .insert(field, FieldValue::from_toml(field, value)?);
        }
        Ok(record)
    }
}

impl<'a> IntoIterator for &'a SettingsRecord {
    type Item = (&'a Field, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, Field, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

fn collect_leaves<'a>(table: &'a Table, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    for (key, value) in table {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Table(sub) => collect_leaves(sub, &dotted, out),
            leaf => out.push((dotted, leaf)),
        }
    }
}
