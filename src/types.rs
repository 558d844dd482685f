use std::path::PathBuf;

use crate::field::Field;

/// Where to look for the user-level defaults file.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// A subdirectory under the user's home directory, e.g. `Home(".code-counter")`.
    Home(&'static str),
    /// An explicit absolute directory.
    Path(PathBuf),
}

/// What happens to a legacy settings file once its contents are in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyDisposition {
    /// Rename to `<name>.migrated` next to the original.
    #[default]
    Rename,
    /// Delete the file.
    Remove,
    /// Leave it where it is.
    Keep,
}

/// A settings operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
///
/// `dir` is taken relative to the project root; `None` means the root itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsAction {
    /// Every resolved field with where it came from.
    List { dir: Option<PathBuf> },
    /// One resolved field with its source.
    Get { dir: Option<PathBuf>, key: String },
    /// Store a raw value for one field.
    Set {
        dir: Option<PathBuf>,
        key: String,
        value: String,
    },
    /// Drop a directory's own value so the field inherits again.
    Reset { dir: Option<PathBuf>, key: String },
    /// Drop a directory's whole record.
    Delete { dir: Option<PathBuf> },
    /// Directories that have settings of their own.
    Dirs,
    /// Each pattern of a list field with the directory that contributed it.
    Sources { dir: Option<PathBuf>, field: Field },
    /// Import legacy per-directory files into the store.
    Migrate,
    /// Commented template for the user defaults file.
    Defaults { output: Option<PathBuf> },
}
