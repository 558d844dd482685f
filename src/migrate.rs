//! One-shot import of legacy per-directory settings files.
//!
//! Older versions kept a `.code-counter.json` in every directory with
//! settings, holding flat keys such as `codeCounter.emojis.normal`. Migration
//! walks the project, converts each file into a store record, commits all of
//! them in one write and then moves the legacy files out of the way.
//!
//! Running it again is harmless: directories that already have a record in
//! the store are skipped, so a file left behind by a failed rename is never
//! imported twice.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, SettingsError};
use crate::field::{Field, FieldValue};
use crate::path::DirectoryPath;
use crate::record::SettingsRecord;
use crate::store::SettingsStore;
use crate::types::LegacyDisposition;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];

/// Suffix appended to legacy files under [`LegacyDisposition::Rename`].
pub const MIGRATED_SUFFIX: &str = ".migrated";

/// Outcome of a migration run. Individual file failures never abort the run.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    /// One `MigrationItemFailed` per file that could not be imported.
    pub errors: Vec<SettingsError>,
    /// Directories that received a record, sorted.
    pub directories: Vec<DirectoryPath>,
}

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub legacy_file_name: String,
    pub disposition: LegacyDisposition,
}

/// Import every legacy file under the store's project root.
///
/// Fails only when the store itself cannot be read or written; in that case
/// no legacy file is touched.
pub fn migrate(store: &SettingsStore, options: &MigrationOptions) -> Result<MigrationReport> {
    let root = store.root();
    let snapshot = store.snapshot()?;
    let mut report = MigrationReport::default();
    let mut batch: Vec<(DirectoryPath, SettingsRecord, PathBuf)> = Vec::new();

    for found in find_legacy_files(root.path(), store.file(), &options.legacy_file_name) {
        let file = match found {
            Ok(file) => file,
            Err(e) => {
                report.errors.push(e);
                continue;
            }
        };
        let parent = file.parent().unwrap_or(root.path());
        let dir = match root.directory(parent) {
            Ok(dir) => dir,
            Err(e) => {
                report.errors.push(item_failed(&file, e));
                continue;
            }
        };

        if snapshot.get(&dir).is_some() || snapshot.damage_for(&dir).is_some() {
            debug!(file = %file.display(), "directory already has settings, skipping legacy file");
            report.skipped += 1;
            continue;
        }

        match read_legacy_file(&file) {
            Ok(Some(record)) => batch.push((dir, record, file)),
            Ok(None) => {
                debug!(file = %file.display(), "legacy file has no recognized settings");
                report.skipped += 1;
            }
            Err(e) => report.errors.push(e),
        }
    }

    let records: Vec<(DirectoryPath, SettingsRecord)> = batch
        .iter()
        .map(|(dir, record, _)| (dir.clone(), record.clone()))
        .collect();
    store.write_many(&records)?;

    for (dir, _, file) in batch {
        dispose(&file, options.disposition);
        report.directories.push(dir);
    }
    report.directories.sort();
    report.migrated = report.directories.len();

    info!(
        root = %root,
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.errors.len(),
        "legacy settings migration finished"
    );
    Ok(report)
}

/// Legacy files under `root`, in sorted walk order. Symlinks are not
/// followed and the store's own directory is not entered.
fn find_legacy_files(
    root: &Path,
    store_file: &Path,
    file_name: &str,
) -> impl Iterator<Item = Result<PathBuf>> {
    let store_dir = store_file.parent().map(Path::to_path_buf);
    let file_name = file_name.to_string();

    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !SKIPPED_DIRS.contains(&name.as_ref())
                && store_dir.as_deref() != Some(entry.path())
        })
        .filter_map(move |entry| match entry {
            Ok(entry) => (entry.file_type().is_file() && entry.file_name() == file_name.as_str())
                .then(|| Ok(entry.into_path())),
            Err(e) => {
                let path = e.path().unwrap_or(Path::new("")).to_path_buf();
                Some(Err(SettingsError::MigrationItemFailed {
                    path,
                    reason: e.to_string(),
                }))
            }
        })
}

/// Read one legacy file. `Ok(None)` means it holds no recognized keys.
fn read_legacy_file(path: &Path) -> Result<Option<SettingsRecord>> {
    let content = fs::read_to_string(path).map_err(|e| item_failed(path, e))?;
    let json: Value = serde_json::from_str(&content).map_err(|e| item_failed(path, e))?;
    let Value::Object(object) = json else {
        return Err(item_failed(path, "expected a JSON object"));
    };

    let mut leaves = Vec::new();
    flatten(&object, "", &mut leaves);

    let mut record = SettingsRecord::new();
    for (key, value) in leaves {
        let Some(field) = Field::from_legacy_key(&key) else {
            debug!(file = %path.display(), key = %key, "ignoring unrecognized legacy key");
            continue;
        };
        let value = FieldValue::from_json(field, value).map_err(|e| item_failed(path, e))?;
        record.set(field, value).map_err(|e| item_failed(path, e))?;
    }
    Ok((!record.is_empty()).then_some(record))
}

/// `{"codeCounter": {"emojis": {"normal": ..}}}` and
/// `{"codeCounter.emojis.normal": ..}` both become `codeCounter.emojis.normal`.
fn flatten<'a>(object: &'a Map<String, Value>, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    for (key, value) in object {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten(inner, &dotted, out),
            leaf => out.push((dotted, leaf)),
        }
    }
}

fn dispose(file: &Path, disposition: LegacyDisposition) {
    let result = match disposition {
        LegacyDisposition::Keep => return,
        LegacyDisposition::Remove => fs::remove_file(file),
        LegacyDisposition::Rename => {
            let mut target = file.as_os_str().to_owned();
            target.push(MIGRATED_SUFFIX);
            fs::rename(file, PathBuf::from(target))
        }
    };
    if let Err(e) = result {
        warn!(file = %file.display(), error = %e, "could not dispose of migrated legacy file");
    }
}

fn item_failed(path: &Path, reason: impl ToString) -> SettingsError {
    SettingsError::MigrationItemFailed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::TestProject;

    fn options(disposition: LegacyDisposition) -> MigrationOptions {
        MigrationOptions {
            legacy_file_name: ".code-counter.json".into(),
            disposition,
        }
    }

    #[test]
    fn flat_keys_become_a_record() {
        let project = TestProject::new();
        let file = project.write_legacy(
            "src",
            r#"{
                "codeCounter.emojis.normal": "🔵",
                "codeCounter.lineThresholds.midThreshold": 500,
                "codeCounter.excludePatterns": ["**/gen/**"]
            }"#,
        );
        let store = project.store();
        let report = migrate(&store, &options(LegacyDisposition::Rename)).unwrap();

        assert_eq!(report.migrated, 1);
        assert!(report.errors.is_empty());
        let record = store.read(&project.dir("src")).unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.get(Field::MidThreshold), Some(&FieldValue::Count(500)));
        assert!(!file.exists());
        assert!(project.path().join("src/.code-counter.json.migrated").exists());
    }

    #[test]
    fn oversized_count_fails_the_file() {
        let project = TestProject::new();
        let file = project.write_legacy(
            "big",
            r#"{"codeCounter.lineThresholds.highThreshold": 18446744073709551615}"#,
        );
        let store = project.store();
        let report = migrate(&store, &options(LegacyDisposition::Rename)).unwrap();

        assert_eq!(report.migrated, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            report.errors[0],
            SettingsError::MigrationItemFailed { .. }
        ));
        assert!(file.exists());
        assert!(store.read(&project.dir("big")).unwrap().is_empty());
    }

    #[test]
    fn nested_objects_are_flattened() {
        let project = TestProject::new();
        project.write_legacy(
            "",
            r#"{"codeCounter": {"emojis": {"folders": {"danger": "🔥"}}}}"#,
        );
        let store = project.store();
        migrate(&store, &options(LegacyDisposition::Rename)).unwrap();
        let record = store.read(&project.root().top()).unwrap();
        assert_eq!(record.get(Field::FolderEmojiDanger), Some(&FieldValue::from("🔥")));
    }

    #[test]
    fn malformed_file_does_not_stop_the_run() {
        let project = TestProject::new();
        project.write_legacy("a", r#"{"codeCounter.emojis.normal": "a"}"#);
        let broken = project.write_legacy("b", "{ not json");
        project.write_legacy("c", r#"{"codeCounter.emojis.normal": "c"}"#);
        let store = project.store();

        let report = migrate(&store, &options(LegacyDisposition::Rename)).unwrap();
        assert_eq!(report.migrated, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            &report.errors[0],
            SettingsError::MigrationItemFailed { path, .. } if path == &broken
        ));
        assert!(broken.exists());
        assert_eq!(
            store.list_directories_with_settings().unwrap(),
            vec![project.dir("a"), project.dir("c")]
        );
    }

    #[test]
    fn mistyped_recognized_value_fails_the_file() {
        let project = TestProject::new();
        project.write_legacy(
            "a",
            r#"{"codeCounter.emojis.normal": "ok", "codeCounter.lineThresholds.highThreshold": "lots"}"#,
        );
        let store = project.store();
        let report = migrate(&store, &options(LegacyDisposition::Rename)).unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(store.read(&project.dir("a")).unwrap().is_empty());
    }

    #[test]
    fn non_object_json_fails_the_file() {
        let project = TestProject::new();
        project.write_legacy("a", "[1, 2, 3]");
        let report = migrate(&project.store(), &options(LegacyDisposition::Rename)).unwrap();
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let project = TestProject::new();
        let only_unknown = project.write_legacy("a", r#"{"codeCounter.color": "red", "other": 1}"#);
        project.write_legacy(
            "b",
            r#"{"codeCounter.emojis.danger": "x", "codeCounter.nope": true}"#,
        );
        let store = project.store();
        let report = migrate(&store, &options(LegacyDisposition::Rename)).unwrap();
        assert_eq!(report.migrated, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.errors.is_empty());
        assert!(only_unknown.exists());
        assert_eq!(store.read(&project.dir("b")).unwrap().len(), 1);
    }

    #[test]
    fn rerun_is_idempotent() {
        let project = TestProject::new();
        project.write_legacy("a", r#"{"codeCounter.emojis.normal": "a"}"#);
        let store = project.store();
        let opts = options(LegacyDisposition::Keep);

        let first = migrate(&store, &opts).unwrap();
        assert_eq!(first.migrated, 1);
        let before = std::fs::read_to_string(store.file()).unwrap();

        let second = migrate(&store, &opts).unwrap();
        assert_eq!(second.migrated, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(std::fs::read_to_string(store.file()).unwrap(), before);
    }

    #[test]
    fn existing_record_wins_over_legacy_file() {
        let project = TestProject::new();
        let store = project.store();
        let a = project.dir("a");
        store
            .write(&a, &SettingsRecord::new().with(Field::EmojiNormal, "store").unwrap())
            .unwrap();
        let legacy = project.write_legacy("a", r#"{"codeCounter.emojis.normal": "legacy"}"#);

        let report = migrate(&store, &options(LegacyDisposition::Rename)).unwrap();
        assert_eq!(report.skipped, 1);
        assert!(legacy.exists());
        assert_eq!(
            store.read(&a).unwrap().get(Field::EmojiNormal),
            Some(&FieldValue::from("store"))
        );
    }

    #[test]
    fn remove_disposition_deletes_file() {
        let project = TestProject::new();
        let file = project.write_legacy("a", r#"{"codeCounter.emojis.normal": "a"}"#);
        migrate(&project.store(), &options(LegacyDisposition::Remove)).unwrap();
        assert!(!file.exists());
        assert!(!project.path().join("a/.code-counter.json.migrated").exists());
    }

    #[test]
    fn vendored_directories_are_not_walked() {
        let project = TestProject::new();
        project.write_legacy("node_modules/pkg", r#"{"codeCounter.emojis.normal": "x"}"#);
        project.write_legacy(".git/hooks", r#"{"codeCounter.emojis.normal": "x"}"#);
        let report = migrate(&project.store(), &options(LegacyDisposition::Rename)).unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn corrupt_store_aborts_before_touching_files() {
        let project = TestProject::new();
        project.write_store("not [ toml");
        let file = project.write_legacy("a", r#"{"codeCounter.emojis.normal": "a"}"#);
        let result = migrate(&project.store(), &options(LegacyDisposition::Rename));
        assert!(matches!(result, Err(SettingsError::StoreCorrupt { .. })));
        assert!(file.exists());
    }
}
