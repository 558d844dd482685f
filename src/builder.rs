use std::path::{Path, PathBuf};

use tokio::sync::broadcast;

use crate::defaults::{self, CounterDefaults, DefaultsInput};
use crate::error::{Result, SettingsError};
use crate::events::{self, SettingsChanged};
use crate::field::{Field, FieldValue};
use crate::migrate::MigrationOptions;
use crate::path::ProjectRoot;
use crate::service::SettingsService;
use crate::store::SettingsStore;
use crate::types::{LegacyDisposition, SearchPath};

pub const DEFAULT_APP_NAME: &str = "code-counter";
/// Store location, relative to the project root.
pub const DEFAULT_STORE_FILE: &str = ".code-counter/settings.toml";
pub const DEFAULT_LEGACY_FILE: &str = ".code-counter.json";
pub const DEFAULT_DEFAULTS_FILE: &str = "defaults.toml";

/// Entry point for building a settings service.
pub struct Dirfig;

impl Dirfig {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }
}

/// Builder for a [`SettingsService`].
///
/// Two things are configured here:
///
/// - **The project**: [`project_root()`](Self::project_root), where its store
///   lives and how legacy files are found and disposed of.
/// - **The global defaults**: [`defaults_search_paths()`](Self::defaults_search_paths),
///   the environment prefix and per-field overrides layered over the
///   compiled-in values.
///
/// The builder is `Clone`, so one configured template can stamp out a service
/// per project root.
#[derive(Debug, Clone)]
pub struct SettingsBuilder {
    project_root: Option<PathBuf>,
    app_name: String,
    store_file: Option<PathBuf>,
    legacy_file_name: Option<String>,
    legacy_disposition: LegacyDisposition,
    defaults_search_paths: Option<Vec<SearchPath>>,
    defaults_file_name: Option<String>,
    env_prefix: Option<String>,
    env_enabled: bool,
    strict: bool,
    default_overrides: Vec<(Field, FieldValue)>,
    events: Option<broadcast::Sender<SettingsChanged>>,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBuilder {
    fn new() -> Self {
        Self {
            project_root: None,
            app_name: DEFAULT_APP_NAME.to_string(),
            store_file: None,
            legacy_file_name: None,
            legacy_disposition: LegacyDisposition::default(),
            defaults_search_paths: None,
            defaults_file_name: None,
            env_prefix: None,
            env_enabled: true,
            strict: true,
            default_overrides: Vec::new(),
            events: None,
        }
    }

    /// Absolute root of the project. Required.
    pub fn project_root(mut self, root: impl AsRef<Path>) -> Self {
        self.project_root = Some(root.as_ref().to_path_buf());
        self
    }

    /// Set the application name (default `"code-counter"`). It names the
    /// platform config directory and derives the env prefix.
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = name.to_string();
        self
    }

    /// Store file, relative to the project root unless absolute
    /// (default `.code-counter/settings.toml`).
    pub fn store_file(mut self, path: impl AsRef<Path>) -> Self {
        self.store_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Name of legacy per-directory files (default `.code-counter.json`).
    pub fn legacy_file_name(mut self, name: &str) -> Self {
        self.legacy_file_name = Some(name.to_string());
        self
    }

    /// What migration does with a legacy file once imported
    /// (default [`LegacyDisposition::Rename`]).
    pub fn legacy_disposition(mut self, disposition: LegacyDisposition) -> Self {
        self.legacy_disposition = disposition;
        self
    }

    /// Replace where defaults files are looked for (default `[Platform]`).
    /// Listed lowest priority first.
    pub fn defaults_search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.defaults_search_paths = Some(paths);
        self
    }

    /// Name of the defaults file (default `defaults.toml`).
    pub fn defaults_file_name(mut self, name: &str) -> Self {
        self.defaults_file_name = Some(name.to_string());
        self
    }

    /// Override the environment variable prefix (default: `app_name`
    /// uppercased with `-` turned into `_`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Disable environment variable loading entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Enable or disable strict mode (default: `true`).
    /// In strict mode, unknown keys in defaults files produce errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Override one global default. Highest priority of all default layers.
    pub fn default_override(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.default_overrides.push((field, value.into()));
        self
    }

    /// Send change notifications on an existing channel.
    pub(crate) fn events(mut self, sender: broadcast::Sender<SettingsChanged>) -> Self {
        self.events = Some(sender);
        self
    }

    fn effective_store_file(&self) -> PathBuf {
        self.store_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE))
    }

    fn effective_search_paths(&self) -> Vec<SearchPath> {
        self.defaults_search_paths
            .clone()
            .unwrap_or_else(|| vec![SearchPath::Platform])
    }

    fn effective_env_prefix(&self) -> Option<String> {
        if !self.env_enabled {
            return None;
        }
        Some(
            self.env_prefix
                .clone()
                .unwrap_or_else(|| self.app_name.to_uppercase().replace('-', "_")),
        )
    }

    fn migration_options(&self) -> MigrationOptions {
        MigrationOptions {
            legacy_file_name: self
                .legacy_file_name
                .clone()
                .unwrap_or_else(|| DEFAULT_LEGACY_FILE.to_string()),
            disposition: self.legacy_disposition,
        }
    }

    /// Read defaults files and the environment.
    fn defaults_input(&self) -> Result<DefaultsInput> {
        let file_name = self
            .defaults_file_name
            .as_deref()
            .unwrap_or(DEFAULT_DEFAULTS_FILE);
        let files =
            defaults::search::load_files(&self.effective_search_paths(), file_name, &self.app_name)?;
        let env_prefix = self.effective_env_prefix();
        let env_vars = if env_prefix.is_some() {
            std::env::vars().collect()
        } else {
            Vec::new()
        };

        Ok(DefaultsInput {
            files,
            env_vars,
            env_prefix,
            overrides: self.default_overrides.clone(),
            strict: self.strict,
        })
    }

    /// Resolve the global defaults through every layer.
    pub fn load_defaults(&self) -> Result<CounterDefaults> {
        defaults::load(self.defaults_input()?)
    }

    /// Build the service. Loads the global defaults; the store is not read
    /// until the first call that needs it.
    pub fn build(&self) -> Result<SettingsService> {
        let root = self
            .project_root
            .as_ref()
            .ok_or(SettingsError::ProjectRootRequired)?;
        let root = ProjectRoot::new(root)?;
        let defaults = self.load_defaults()?.to_resolved();
        let store = SettingsStore::new(root, self.effective_store_file());
        let events = self.events.clone().unwrap_or_else(events::channel);

        Ok(SettingsService::new(
            store,
            defaults,
            self.migration_options(),
            events,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::TestProject;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn app_name_derives_env_prefix() {
        let builder = Dirfig::builder();
        assert_eq!(builder.effective_env_prefix().as_deref(), Some("CODE_COUNTER"));
        let builder = builder.app_name("my-tool");
        assert_eq!(builder.effective_env_prefix().as_deref(), Some("MY_TOOL"));
    }

    #[test]
    fn override_env_prefix() {
        let builder = Dirfig::builder().env_prefix("CUSTOM");
        assert_eq!(builder.effective_env_prefix().as_deref(), Some("CUSTOM"));
    }

    #[test]
    fn no_env_disables_prefix() {
        assert_eq!(Dirfig::builder().env_prefix("X").no_env().effective_env_prefix(), None);
    }

    #[test]
    fn search_paths_default_to_platform() {
        assert_eq!(
            Dirfig::builder().effective_search_paths(),
            vec![SearchPath::Platform]
        );
        let builder = Dirfig::builder().defaults_search_paths(vec![SearchPath::Home(".cc")]);
        assert_eq!(builder.effective_search_paths(), vec![SearchPath::Home(".cc")]);
    }

    #[test]
    fn store_and_legacy_defaults() {
        let builder = Dirfig::builder();
        assert_eq!(
            builder.effective_store_file(),
            PathBuf::from(".code-counter/settings.toml")
        );
        let options = builder.migration_options();
        assert_eq!(options.legacy_file_name, ".code-counter.json");
        assert_eq!(options.disposition, LegacyDisposition::Rename);
    }

    #[test]
    fn build_requires_project_root() {
        assert!(matches!(
            Dirfig::builder().no_env().build(),
            Err(SettingsError::ProjectRootRequired)
        ));
    }

    #[test]
    fn build_rejects_relative_root() {
        assert!(matches!(
            Dirfig::builder()
                .project_root("relative/dir")
                .defaults_search_paths(vec![])
                .no_env()
                .build(),
            Err(SettingsError::RootNotAbsolute(_))
        ));
    }

    #[test]
    fn defaults_file_and_override_feed_the_service() {
        let project = TestProject::new();
        let config = TempDir::new().unwrap();
        fs::write(
            config.path().join("defaults.toml"),
            "[line_thresholds]\nmid_threshold = 120\nhigh_threshold = 400\n",
        )
        .unwrap();

        let service = project
            .builder()
            .defaults_search_paths(vec![SearchPath::Path(config.path().to_path_buf())])
            .default_override(Field::HighThreshold, 999u64)
            .build()
            .unwrap();
        let resolved = service.resolved("src").unwrap();
        assert_eq!(resolved.count(Field::MidThreshold), Some(120));
        assert_eq!(resolved.count(Field::HighThreshold), Some(999));
    }

    #[test]
    fn strict_defaults_file_fails_build() {
        let project = TestProject::new();
        let config = TempDir::new().unwrap();
        fs::write(config.path().join("defaults.toml"), "typo = 1\n").unwrap();

        let builder = project
            .builder()
            .defaults_search_paths(vec![SearchPath::Path(config.path().to_path_buf())]);
        assert!(matches!(builder.build(), Err(SettingsError::UnknownKeys(_))));
        assert!(builder.strict(false).build().is_ok());
    }

    #[test]
    fn custom_store_file() {
        let project = TestProject::new();
        let service = project
            .builder()
            .store_file("config/dirs.toml")
            .build()
            .unwrap();
        service.set("src", Field::EmojiNormal, "x").unwrap();
        assert!(project.path().join("config/dirs.toml").exists());
    }

    #[test]
    fn mistyped_override_fails_build() {
        let project = TestProject::new();
        let result = project
            .builder()
            .default_override(Field::MidThreshold, "lots")
            .build();
        assert!(matches!(result, Err(SettingsError::InvalidValue { .. })));
    }
}
