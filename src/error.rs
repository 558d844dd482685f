use std::path::PathBuf;

use thiserror::Error;

use crate::field::Field;

/// Every failure the settings core can report.
///
/// `StoreCorrupt` is recoverable: the service logs it and treats the affected
/// directory as having no settings. `MigrationItemFailed` never escapes a
/// migration run; it is collected into the report instead.
#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum SettingsError {
    #[error("Path {path} is outside the project root {root}")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(dirfig::out_of_scope),
            help("settings can only be stored for directories inside the project root")
        )
    )]
    OutOfScope { path: PathBuf, root: PathBuf },

    #[error("Settings store {path} is unreadable: {reason}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(dirfig::store_corrupt)))]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Could not migrate {path}: {reason}")]
    MigrationItemFailed { path: PathBuf, reason: String },

    #[error("Unknown settings field '{0}'")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(dirfig::invalid_field),
            help("run `settings list` to see every recognized field")
        )
    )]
    InvalidField(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("'{0}' is not a pattern list field")]
    NotAPatternField(Field),

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unknown key '{key}' in {path} (line {line})")]
    UnknownKey {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown keys in defaults file")]
    UnknownKeys(Vec<SettingsError>),

    #[error("Failed to parse {path}: {source}")]
    DefaultsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Defaults error: {0}")]
    Defaults(#[from] confique::Error),

    #[error("Project root is required, call .project_root() on the builder")]
    ProjectRootRequired,

    #[error("Project root must be an absolute path: {0}")]
    RootNotAbsolute(PathBuf),
}

pub type Result<T, E = SettingsError> = std::result::Result<T, E>;

impl SettingsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SettingsError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SettingsError::StoreCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
