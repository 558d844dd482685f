//! Durable settings store: one TOML document holding every directory record.
//!
//! ```toml
//! ["."]
//! lineThresholds.midThreshold = 300
//!
//! ["src/lib"]
//! excludePatterns = ["**/generated/**"]
//! emojis.folders.danger = "🔥"
//! ```
//!
//! Edits go through `toml_edit` so comments and ordering written by users
//! survive. Every mutation is a read-modify-write under the store mutex that
//! re-reads the document from disk inside the lock, so it always merges into
//! the latest state, including edits made outside this process. The result is
//! committed with a temp-file rename, so readers never observe a half-written
//! document.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use toml_edit::{DocumentMut, Item, TableLike};
use tracing::debug;

use crate::error::{Result, SettingsError};
use crate::field::Field;
use crate::path::{DirectoryPath, ProjectRoot};
use crate::record::SettingsRecord;

/// Written at the top of a store file when it is first created.
const STORE_HEADER: &str = "\
# Per-directory settings for code-counter.
# Each table is a directory relative to the project root (\".\" is the root).
";

/// A directory entry in the store that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamagedEntry {
    pub key: String,
    pub reason: String,
}

/// Every decodable record in the store at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    records: BTreeMap<DirectoryPath, SettingsRecord>,
    damaged: Vec<DamagedEntry>,
}

impl StoreSnapshot {
    pub fn get(&self, dir: &DirectoryPath) -> Option<&SettingsRecord> {
        self.records.get(dir)
    }

    /// The record for `dir`, or an empty one.
    pub fn record(&self, dir: &DirectoryPath) -> SettingsRecord {
        self.records.get(dir).cloned().unwrap_or_default()
    }

    /// Directories with at least one field set, sorted.
    pub fn directories(&self) -> Vec<DirectoryPath> {
        self.records.keys().cloned().collect()
    }

    pub fn damaged(&self) -> &[DamagedEntry] {
        &self.damaged
    }

    pub fn damage_for(&self, dir: &DirectoryPath) -> Option<&DamagedEntry> {
        self.damaged.iter().find(|d| d.key == dir.key())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The durable store for one project root.
#[derive(Debug)]
pub struct SettingsStore {
    root: ProjectRoot,
    file: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    /// `file` is taken relative to the project root unless absolute.
    pub fn new(root: ProjectRoot, file: impl AsRef<Path>) -> Self {
        let file = root.path().join(file);
        Self {
            root,
            file,
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &ProjectRoot {
        &self.root
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Load every record. Fails with `StoreCorrupt` only when the document
    /// itself does not parse; undecodable directory entries are reported in
    /// [`StoreSnapshot::damaged`].
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        match self.read_content()? {
            Some(content) => parse_snapshot(&self.root, &content, &self.file),
            None => Ok(StoreSnapshot::default()),
        }
    }

    /// The raw record for `dir`, empty when the directory has no settings.
    pub fn read(&self, dir: &DirectoryPath) -> Result<SettingsRecord> {
        let snapshot = self.snapshot()?;
        if let Some(damage) = snapshot.damage_for(dir) {
            return Err(SettingsError::corrupt(
                &self.file,
                format!("entry '{}': {}", damage.key, damage.reason),
            ));
        }
        Ok(snapshot.record(dir))
    }

    /// Merge `record` into the directory's record, creating it if absent.
    pub fn write(&self, dir: &DirectoryPath, record: &SettingsRecord) -> Result<()> {
        if record.is_empty() {
            return Ok(());
        }
        self.update(|doc| {
            apply_write(doc, dir.key(), record)?;
            Ok(true)
        })?;
        Ok(())
    }

    /// Merge several records in a single commit.
    pub fn write_many(&self, records: &[(DirectoryPath, SettingsRecord)]) -> Result<()> {
        if records.iter().all(|(_, r)| r.is_empty()) {
            return Ok(());
        }
        self.update(|doc| {
            for (dir, record) in records {
                apply_write(doc, dir.key(), record)?;
            }
            Ok(true)
        })?;
        Ok(())
    }

    /// Remove one field. Returns whether anything was removed; an unset
    /// field leaves the document untouched.
    pub fn reset_field(&self, dir: &DirectoryPath, field: Field) -> Result<bool> {
        self.update(|doc| Ok(apply_reset(doc, dir.key(), field)))
    }

    /// Remove a directory's whole record.
    pub fn delete(&self, dir: &DirectoryPath) -> Result<bool> {
        self.update(|doc| Ok(apply_delete(doc, dir.key())))
    }

    pub fn list_directories_with_settings(&self) -> Result<Vec<DirectoryPath>> {
        Ok(self.snapshot()?.directories())
    }

    fn read_content(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.file) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SettingsError::io(&self.file, e)),
        }
    }

    /// Read-modify-write under the store lock. `mutate` reports whether it
    /// changed the document; unchanged documents are not rewritten.
    fn update<F>(&self, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut DocumentMut) -> Result<bool>,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let content = self.read_content()?;
        let mut doc: DocumentMut = content
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e: toml_edit::TomlError| SettingsError::corrupt(&self.file, e.to_string()))?;

        if !mutate(&mut doc)? {
            return Ok(false);
        }
        if content.is_none() {
            prepend_header(&mut doc);
        }
        self.commit(&doc.to_string())?;
        Ok(true)
    }

    fn commit(&self, content: &str) -> Result<()> {
        let parent = self.file.parent().unwrap_or(self.root.path());
        std::fs::create_dir_all(parent).map_err(|e| SettingsError::io(parent, e))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| SettingsError::io(parent, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| SettingsError::io(tmp.path(), e))?;
        tmp.persist(&self.file)
            .map_err(|e| SettingsError::io(&self.file, e.error))?;

        debug!(file = %self.file.display(), bytes = content.len(), "committed settings store");
        Ok(())
    }
}

/// Decode a store document into a snapshot.
fn parse_snapshot(root: &ProjectRoot, content: &str, file: &Path) -> Result<StoreSnapshot> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| SettingsError::corrupt(file, e.message()))?;

    let mut snapshot = StoreSnapshot::default();
    for (key, value) in &table {
        let decoded = match value {
            toml::Value::Table(t) => root
                .from_key(key)
                .and_then(|dir| SettingsRecord::from_table(t).map(|record| (dir, record))),
            other => Err(SettingsError::InvalidValue {
                key: key.clone(),
                reason: format!("expected a directory table, found `{other}`"),
            }),
        };
        match decoded {
            Ok((dir, record)) if !record.is_empty() => {
                snapshot.records.insert(dir, record);
            }
            Ok(_) => {}
            Err(e) => snapshot.damaged.push(DamagedEntry {
                key: key.clone(),
                reason: e.to_string(),
            }),
        }
    }

    debug!(
        file = %file.display(),
        directories = snapshot.records.len(),
        damaged = snapshot.damaged.len(),
        "loaded settings store"
    );
    Ok(snapshot)
}

/// Put the store header above the first table of a newly created document.
fn prepend_header(doc: &mut DocumentMut) {
    let first = doc
        .as_table_mut()
        .iter_mut()
        .next()
        .and_then(|(_, item)| item.as_table_mut());
    if let Some(table) = first {
        table.decor_mut().set_prefix(format!("{STORE_HEADER}\n"));
    }
}

/// The directory key followed by the field's key segments.
fn field_path(dir_key: &str, field: Field) -> Vec<&str> {
    let mut segments = vec![dir_key];
    for segment in field.segments() {
        segments.push(segment);
    }
    segments
}

/// Write every field of `record` under the directory table `dir_key`,
/// creating intermediate tables as dotted keys. A scalar sitting where a
/// table belongs is left alone and reported.
fn apply_write(doc: &mut DocumentMut, dir_key: &str, record: &SettingsRecord) -> Result<()> {
    for (field, value) in record {
        let segments = field_path(dir_key, *field);
        let Some((leaf, parents)) = segments.split_last() else {
            continue;
        };

        let mut current = doc.as_table_mut();
        for (depth, segment) in parents.iter().enumerate() {
            current = child_table(current, segment, depth > 0).ok_or_else(|| {
                SettingsError::InvalidValue {
                    key: field.key().into(),
                    reason: format!("'{segment}' in the store is not a table"),
                }
            })?;
        }
        current.insert(leaf, toml_edit::value(value.to_toml_edit(*field)?));
    }
    Ok(())
}

/// Get or create the table `key` under `parent`, promoting an inline table.
/// `None` when `key` holds some other value.
fn child_table<'a>(
    parent: &'a mut toml_edit::Table,
    key: &str,
    dotted: bool,
) -> Option<&'a mut toml_edit::Table> {
    let item = parent.entry(key).or_insert(Item::None);
    if item.is_none() {
        let mut table = toml_edit::Table::new();
        table.set_dotted(dotted);
        *item = Item::Table(table);
    } else if let Item::Value(toml_edit::Value::InlineTable(inline)) = item {
        let table = std::mem::take(inline).into_table();
        *item = Item::Table(table);
    }
    item.as_table_mut()
}

fn apply_reset(doc: &mut DocumentMut, dir_key: &str, field: Field) -> bool {
    remove_path(doc.as_table_mut(), &field_path(dir_key, field))
}

fn apply_delete(doc: &mut DocumentMut, dir_key: &str) -> bool {
    doc.as_table_mut().remove(dir_key).is_some()
}

/// Remove the leaf at `segments`, pruning tables left empty on the way back
/// up. The directory table is the first segment, so it disappears with its
/// last field.
fn remove_path(table: &mut dyn TableLike, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [leaf] => table.remove(leaf).is_some(),
        [head, rest @ ..] => {
            let (removed, emptied) = match table.get_mut(head).and_then(Item::as_table_like_mut) {
                Some(child) => {
                    let removed = remove_path(child, rest);
                    (removed, child.is_empty())
                }
                None => return false,
            };
            if removed && emptied {
                table.remove(head);
            }
            removed
        }
    }
}
