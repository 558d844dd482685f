//! The settings service for one project root.
//!
//! Wraps the store with a cache of the loaded snapshot and of every
//! resolution computed from it. Every mutation runs the same post-step before
//! returning: invalidate the cache, then broadcast a [`SettingsChanged`]. The
//! cache mutex is held across snapshot load, resolve and memoise, and the
//! invalidation takes the same mutex after the store commit, so a resolution
//! computed from pre-write data is never served once a mutation returns.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{Result, SettingsError};
use crate::events::SettingsChanged;
use crate::field::{Field, FieldValue};
use crate::migrate::{self, MigrationOptions, MigrationReport};
use crate::path::{DirectoryPath, ProjectRoot};
use crate::provenance::{self, PatternMatcher, PatternSource};
use crate::record::SettingsRecord;
use crate::resolve::{self, Resolution, ResolveInput, ResolvedSettings};
use crate::store::{SettingsStore, StoreSnapshot};

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<Arc<StoreSnapshot>>,
    resolutions: HashMap<DirectoryPath, Resolution>,
}

/// Hierarchical settings for one project root. Share it behind an `Arc`.
#[derive(Debug)]
pub struct SettingsService {
    store: SettingsStore,
    defaults: ResolvedSettings,
    migration: MigrationOptions,
    cache: Mutex<CacheState>,
    events: broadcast::Sender<SettingsChanged>,
}

impl SettingsService {
    pub(crate) fn new(
        store: SettingsStore,
        defaults: ResolvedSettings,
        migration: MigrationOptions,
        events: broadcast::Sender<SettingsChanged>,
    ) -> Self {
        Self {
            store,
            defaults,
            migration,
            cache: Mutex::new(CacheState::default()),
            events,
        }
    }

    pub fn root(&self) -> &ProjectRoot {
        self.store.root()
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// The global defaults every field falls back to.
    pub fn defaults(&self) -> &ResolvedSettings {
        &self.defaults
    }

    /// Scope `path` to this project. Relative paths are taken from the root.
    pub fn directory(&self, path: impl AsRef<Path>) -> Result<DirectoryPath> {
        self.root().directory(path)
    }

    /// Effective settings for `path` with provenance.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<Resolution> {
        let dir = self.directory(path)?;
        let mut cache = self.lock_cache();
        if let Some(hit) = cache.resolutions.get(&dir) {
            return Ok(hit.clone());
        }

        let snapshot = self.load_snapshot(&mut cache)?;
        let resolution = resolve::resolve_chain(ResolveInput::new(
            dir.clone(),
            &self.defaults,
            |d| snapshot.get(d),
        ));
        cache.resolutions.insert(dir, resolution.clone());
        Ok(resolution)
    }

    pub fn resolved(&self, path: impl AsRef<Path>) -> Result<ResolvedSettings> {
        Ok(self.resolve(path)?.resolved)
    }

    /// The directory's own record. A damaged or unreadable store reads as
    /// empty.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<SettingsRecord> {
        let dir = self.directory(path)?;
        match self.store.read(&dir) {
            Err(SettingsError::StoreCorrupt { path, reason }) => {
                warn!(store = %path.display(), %reason, "settings store unreadable, treating as empty");
                Ok(SettingsRecord::new())
            }
            other => other,
        }
    }

    /// Merge `record` into the directory's record. An empty record changes
    /// nothing and sends no notification.
    pub fn write(&self, path: impl AsRef<Path>, record: &SettingsRecord) -> Result<()> {
        let dir = self.directory(path)?;
        if record.is_empty() {
            return Ok(());
        }
        self.store.write(&dir, record)?;
        debug!(dir = %dir, fields = record.len(), "wrote settings");
        self.changed(SettingsChanged::Written {
            fields: record.fields(),
            directory: dir,
        });
        Ok(())
    }

    pub fn set(&self, path: impl AsRef<Path>, field: Field, value: impl Into<FieldValue>) -> Result<()> {
        let record = SettingsRecord::new().with(field, value)?;
        self.write(path, &record)
    }

    /// Set a field from a dotted key and a raw string, as typed by a user.
    pub fn set_raw(&self, path: impl AsRef<Path>, key: &str, raw: &str) -> Result<()> {
        let field = Field::from_key(key)?;
        self.set(path, field, FieldValue::parse(field, raw)?)
    }

    /// Drop the directory's own value for `field` so it inherits again.
    /// Returns whether the directory had a value. Notifies either way.
    pub fn reset_field(&self, path: impl AsRef<Path>, field: Field) -> Result<bool> {
        let dir = self.directory(path)?;
        let removed = self.store.reset_field(&dir, field)?;
        debug!(dir = %dir, field = %field, removed, "reset field");
        self.changed(SettingsChanged::Reset {
            directory: dir,
            field,
        });
        Ok(removed)
    }

    pub fn reset(&self, path: impl AsRef<Path>, key: &str) -> Result<bool> {
        self.reset_field(path, Field::from_key(key)?)
    }

    /// Drop the directory's whole record.
    pub fn delete(&self, path: impl AsRef<Path>) -> Result<bool> {
        let dir = self.directory(path)?;
        let removed = self.store.delete(&dir)?;
        debug!(dir = %dir, removed, "deleted settings");
        self.changed(SettingsChanged::Deleted { directory: dir });
        Ok(removed)
    }

    pub fn list_directories_with_settings(&self) -> Result<Vec<DirectoryPath>> {
        let mut cache = self.lock_cache();
        Ok(self.load_snapshot(&mut cache)?.directories())
    }

    /// Each entry of a resolved pattern list with the directory it came from.
    pub fn patterns_with_sources(
        &self,
        path: impl AsRef<Path>,
        field: Field,
    ) -> Result<Vec<PatternSource>> {
        if !field.is_pattern_list() {
            return Err(SettingsError::NotAPatternField(field));
        }
        provenance::pattern_sources(&self.resolve(path)?, field)
    }

    /// Include/exclude matcher for files under `path`.
    pub fn matcher(&self, path: impl AsRef<Path>) -> Result<PatternMatcher> {
        PatternMatcher::new(&self.resolve(path)?)
    }

    /// Import legacy per-directory files into the store.
    pub fn migrate(&self) -> Result<MigrationReport> {
        let report = migrate::migrate(&self.store, &self.migration)?;
        if report.migrated > 0 {
            self.changed(SettingsChanged::Migrated {
                root: self.root().path().to_path_buf(),
                directories: report.directories.clone(),
            });
        }
        Ok(report)
    }

    /// Drop cached state so the next call re-reads the store, e.g. after the
    /// file was edited outside this process.
    pub fn invalidate(&self) {
        self.clear_cache();
        self.events
            .send(SettingsChanged::Invalidated {
                root: self.root().path().to_path_buf(),
            })
            .ok();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChanged> {
        self.events.subscribe()
    }

    fn changed(&self, event: SettingsChanged) {
        self.clear_cache();
        // No subscribers is not an error.
        self.events.send(event).ok();
    }

    fn clear_cache(&self) {
        let mut cache = self.lock_cache();
        cache.snapshot = None;
        cache.resolutions.clear();
    }

    fn lock_cache(&self) -> MutexGuard<'_, CacheState> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached snapshot, loading it on first use. An unparseable store is
    /// cached as empty so the warning is logged once per invalidation.
    fn load_snapshot(&self, cache: &mut CacheState) -> Result<Arc<StoreSnapshot>> {
        if let Some(snapshot) = &cache.snapshot {
            return Ok(snapshot.clone());
        }
        let snapshot = match self.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(SettingsError::StoreCorrupt { path, reason }) => {
                warn!(store = %path.display(), %reason, "settings store unreadable, treating as empty");
                StoreSnapshot::default()
            }
            Err(e) => return Err(e),
        };
        for damage in snapshot.damaged() {
            warn!(
                store = %self.store.file().display(),
                directory = %damage.key,
                reason = %damage.reason,
                "ignoring damaged settings entry"
            );
        }
        let snapshot = Arc::new(snapshot);
        cache.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::TestProject;
    use crate::resolve::Source;

    #[test]
    fn src_scenario() {
        let project = TestProject::new();
        let service = project.service();
        service.set("", Field::MidThreshold, 300u64).unwrap();
        service.set("src", Field::MidThreshold, 500u64).unwrap();

        let lib = service.resolve("src/lib").unwrap();
        assert_eq!(lib.resolved.count(Field::MidThreshold), Some(500));
        assert_eq!(
            lib.provenance.get(Field::MidThreshold),
            &Source::Directory(project.dir("src"))
        );

        assert!(service.reset_field("src", Field::MidThreshold).unwrap());
        let lib = service.resolve("src/lib").unwrap();
        assert_eq!(lib.resolved.count(Field::MidThreshold), Some(300));
        assert_eq!(
            lib.provenance.get(Field::MidThreshold),
            &Source::Directory(project.root().top())
        );
    }

    #[test]
    fn reset_reverts_to_inheritance() {
        let project = TestProject::new();
        let service = project.service();
        service.set("a/b", Field::EmojiDanger, "b").unwrap();

        assert_eq!(
            service.resolved("a/b/c").unwrap().text(Field::EmojiDanger),
            Some("b")
        );
        service.reset_field("a/b", Field::EmojiDanger).unwrap();

        for dir in ["a/b", "a/b/c"] {
            let res = service.resolve(dir).unwrap();
            assert_eq!(res.resolved.text(Field::EmojiDanger), Some("🔴"));
            assert_eq!(res.provenance.get(Field::EmojiDanger), &Source::Global);
        }
        assert!(service.list_directories_with_settings().unwrap().is_empty());
    }

    #[test]
    fn list_field_is_inherited_whole() {
        let project = TestProject::new();
        let service = project.service();
        service
            .set("", Field::ExcludePatterns, vec!["x", "y"])
            .unwrap();
        service.set("a", Field::ExcludePatterns, vec!["z"]).unwrap();

        let res = service.resolved("a/child").unwrap();
        assert_eq!(
            res.patterns(Field::ExcludePatterns),
            Some(&["z".to_string()][..])
        );
    }

    #[test]
    fn write_is_idempotent() {
        let project = TestProject::new();
        let service = project.service();
        service.set("src", Field::EmojiNormal, "n").unwrap();
        let first = service.resolve("src").unwrap();
        let content = std::fs::read_to_string(service.store().file()).unwrap();

        service.set("src", Field::EmojiNormal, "n").unwrap();
        assert_eq!(service.resolve("src").unwrap(), first);
        assert_eq!(
            std::fs::read_to_string(service.store().file()).unwrap(),
            content
        );
    }

    #[test]
    fn reset_is_idempotent() {
        let project = TestProject::new();
        let service = project.service();
        service.set("src", Field::EmojiNormal, "n").unwrap();
        assert!(service.reset_field("src", Field::EmojiNormal).unwrap());
        let after_first = service.resolve("src").unwrap();
        assert!(!service.reset_field("src", Field::EmojiNormal).unwrap());
        assert_eq!(service.resolve("src").unwrap(), after_first);
    }

    #[test]
    fn mutations_notify_after_invalidating() {
        let project = TestProject::new();
        let service = project.service();
        let mut rx = service.subscribe();

        service.resolve("src").unwrap();
        service.set("src", Field::HighThreshold, 5u64).unwrap();
        match rx.try_recv().unwrap() {
            SettingsChanged::Written { directory, fields } => {
                assert_eq!(directory, project.dir("src"));
                assert_eq!(fields, vec![Field::HighThreshold]);
                // A subscriber reacting to the event sees the new value.
                assert_eq!(
                    service.resolved(&directory).unwrap().count(Field::HighThreshold),
                    Some(5)
                );
            }
            other => panic!("unexpected {other:?}"),
        }

        // A no-op reset still notifies.
        service.reset_field("docs", Field::EmojiNormal).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            SettingsChanged::Reset { field: Field::EmojiNormal, .. }
        ));

        service.delete("src").unwrap();
        assert!(matches!(rx.try_recv().unwrap(), SettingsChanged::Deleted { .. }));
    }

    #[test]
    fn external_edit_needs_invalidation() {
        let project = TestProject::new();
        let service = project.service();
        assert_eq!(
            service.resolved("src").unwrap().count(Field::MidThreshold),
            Some(300)
        );

        // Another handle on the same file, as another process would have.
        project
            .store()
            .write(
                &project.dir("src"),
                &SettingsRecord::new().with(Field::MidThreshold, 42u64).unwrap(),
            )
            .unwrap();
        assert_eq!(
            service.resolved("src").unwrap().count(Field::MidThreshold),
            Some(300)
        );

        let mut rx = service.subscribe();
        service.invalidate();
        assert!(matches!(rx.try_recv().unwrap(), SettingsChanged::Invalidated { .. }));
        assert_eq!(
            service.resolved("src").unwrap().count(Field::MidThreshold),
            Some(42)
        );
    }

    #[test]
    fn out_of_scope_rejected_before_io() {
        let project = TestProject::new();
        let service = project.service();
        let err = service.set("/elsewhere/src", Field::EmojiNormal, "x").unwrap_err();
        assert!(matches!(err, SettingsError::OutOfScope { .. }));
        assert!(matches!(
            service.resolve("../outside"),
            Err(SettingsError::OutOfScope { .. })
        ));
        assert!(!service.store().file().exists());
    }

    #[test]
    fn corrupt_store_resolves_to_defaults_but_refuses_writes() {
        let project = TestProject::new();
        project.write_store("{{{ not toml");
        let service = project.service();

        let res = service.resolve("src").unwrap();
        assert_eq!(res.resolved, *service.defaults());
        assert!(service.read("src").unwrap().is_empty());
        assert!(service.list_directories_with_settings().unwrap().is_empty());
        assert!(matches!(
            service.set("src", Field::EmojiNormal, "x"),
            Err(SettingsError::StoreCorrupt { .. })
        ));
    }

    #[test]
    fn damaged_entry_falls_back_to_inheritance() {
        let project = TestProject::new();
        project.write_store(
            "[\".\"]\nemojis.normal = \"root\"\n\n[\"src\"]\nemojis.normal = 5\n",
        );
        let service = project.service();
        assert_eq!(
            service.resolved("src").unwrap().text(Field::EmojiNormal),
            Some("root")
        );
    }

    #[test]
    fn string_keyed_operations_validate_names() {
        let project = TestProject::new();
        let service = project.service();
        assert!(matches!(
            service.set_raw("src", "emojis.nromal", "x"),
            Err(SettingsError::InvalidField(_))
        ));
        assert!(matches!(
            service.reset("src", "lineThresholds"),
            Err(SettingsError::InvalidField(_))
        ));
        assert!(matches!(
            service.set_raw("src", "lineThresholds.midThreshold", "many"),
            Err(SettingsError::InvalidValue { .. })
        ));

        service
            .set_raw("src", "excludePatterns", "**/gen/**, **/tmp/**")
            .unwrap();
        assert_eq!(
            service
                .resolved("src")
                .unwrap()
                .patterns(Field::ExcludePatterns)
                .map(<[String]>::len),
            Some(2)
        );
    }

    #[test]
    fn empty_write_is_silent() {
        let project = TestProject::new();
        let service = project.service();
        let mut rx = service.subscribe();
        service.write("src", &SettingsRecord::new()).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(!service.store().file().exists());
    }

    #[test]
    fn oversized_count_is_rejected_not_truncated() {
        let project = TestProject::new();
        let service = project.service();
        let result = service.set_raw("src", "lineThresholds.midThreshold", &u64::MAX.to_string());
        assert!(matches!(result, Err(SettingsError::InvalidValue { .. })));
        assert!(matches!(
            service.set("src", Field::HighThreshold, u64::MAX),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(
            service.resolved("src").unwrap().count(Field::MidThreshold),
            Some(300)
        );
        assert!(!service.store().file().exists());
    }

    #[test]
    fn pattern_sources_through_service() {
        let project = TestProject::new();
        let service = project.service();
        service.set("a", Field::IncludePatterns, vec!["**/*.rs"]).unwrap();
        let sources = service
            .patterns_with_sources("a/b", Field::IncludePatterns)
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source, Source::Directory(project.dir("a")));
        assert!(matches!(
            service.patterns_with_sources("a", Field::MidThreshold),
            Err(SettingsError::NotAPatternField(Field::MidThreshold))
        ));
        assert!(service.matcher("a").unwrap().is_counted("a/x.rs"));
    }

    #[test]
    fn migration_invalidates_and_notifies() {
        let project = TestProject::new();
        let service = project.service();
        assert_eq!(
            service.resolved("legacy").unwrap().text(Field::EmojiNormal),
            Some("🟢")
        );
        project.write_legacy("legacy", r#"{"codeCounter.emojis.normal": "L"}"#);
        let mut rx = service.subscribe();

        let report = service.migrate().unwrap();
        assert_eq!(report.migrated, 1);
        assert!(matches!(rx.try_recv().unwrap(), SettingsChanged::Migrated { .. }));
        assert_eq!(
            service.resolved("legacy").unwrap().text(Field::EmojiNormal),
            Some("L")
        );
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let project = TestProject::new();
        let service = Arc::new(project.service());
        let dirs = ["a", "b", "c", "d"];

        std::thread::scope(|scope| {
            for (i, dir) in dirs.into_iter().enumerate() {
                let service = Arc::clone(&service);
                scope.spawn(move || {
                    service.set(dir, Field::MidThreshold, i as u64).unwrap();
                    service.resolve(dir).unwrap();
                });
            }
        });

        for (i, dir) in dirs.into_iter().enumerate() {
            assert_eq!(
                service.resolved(dir).unwrap().count(Field::MidThreshold),
                Some(i as u64)
            );
        }
    }

    #[test]
    fn service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SettingsService>();
    }
}
