//! Change notifications for collaborators that cache derived views.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::field::Field;
use crate::path::DirectoryPath;

/// Capacity of the notification channel. A subscriber that falls further
/// behind than this sees `RecvError::Lagged` and should refresh everything.
pub const CHANNEL_CAPACITY: usize = 64;

/// Something changed settings under a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChanged {
    Written {
        directory: DirectoryPath,
        fields: Vec<Field>,
    },
    Reset {
        directory: DirectoryPath,
        field: Field,
    },
    Deleted {
        directory: DirectoryPath,
    },
    Migrated {
        root: PathBuf,
        directories: Vec<DirectoryPath>,
    },
    /// Cached state for a root was dropped, e.g. after an external edit.
    Invalidated {
        root: PathBuf,
    },
}

impl SettingsChanged {
    /// The directory a change is confined to, or `None` when it may affect
    /// the whole tree.
    pub fn directory(&self) -> Option<&DirectoryPath> {
        match self {
            SettingsChanged::Written { directory, .. }
            | SettingsChanged::Reset { directory, .. }
            | SettingsChanged::Deleted { directory } => Some(directory),
            SettingsChanged::Migrated { .. } | SettingsChanged::Invalidated { .. } => None,
        }
    }

    /// Whether resolved settings for `dir` may have changed. A change at a
    /// directory affects it and every descendant.
    pub fn affects(&self, dir: &DirectoryPath) -> bool {
        self.directory()
            .is_none_or(|changed| changed.is_ancestor_of(dir))
    }
}

impl fmt::Display for SettingsChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsChanged::Written { directory, fields } => {
                let keys: Vec<&str> = fields.iter().map(|f| f.key()).collect();
                write!(f, "wrote {} in {}", keys.join(", "), directory.key())
            }
            SettingsChanged::Reset { directory, field } => {
                write!(f, "reset {field} in {}", directory.key())
            }
            SettingsChanged::Deleted { directory } => {
                write!(f, "deleted settings of {}", directory.key())
            }
            SettingsChanged::Migrated { directories, .. } => {
                write!(f, "migrated {} legacy directories", directories.len())
            }
            SettingsChanged::Invalidated { root } => {
                write!(f, "invalidated {}", root.display())
            }
        }
    }
}

pub(crate) fn channel() -> broadcast::Sender<SettingsChanged> {
    broadcast::channel(CHANNEL_CAPACITY).0
}
