//! Project-scoped directory paths and ancestor chains.
//!
//! A [`DirectoryPath`] is only ever produced by [`ProjectRoot::directory`], so
//! holding one proves the path is lexically inside the project root. Paths are
//! kept with forward slashes internally and converted to native form only at
//! I/O boundaries.
//!
//! Ancestor chains are recomputed from the path string every time they are
//! needed. There is no live directory tree to go stale when directories are
//! added, moved or deleted.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SettingsError};

/// Store key used for the project root itself.
pub const ROOT_KEY: &str = ".";

/// The absolute root every [`DirectoryPath`] is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRoot {
    path: PathBuf,
    display: Arc<str>,
}

impl ProjectRoot {
    /// Create a root from an absolute path. `.` and `..` segments are folded
    /// lexically; the filesystem is not touched.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(SettingsError::RootNotAbsolute(path.to_path_buf()));
        }
        let path = normalize_lexically(path);
        let display = forward_slashes(&path);
        Ok(Self {
            path,
            display: display.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The root as a [`DirectoryPath`].
    pub fn top(&self) -> DirectoryPath {
        DirectoryPath::new(self.display.clone(), String::new())
    }

    /// Scope `path` to this root.
    ///
    /// Relative inputs are taken relative to the root. Any `..` segment below
    /// the root, or an absolute path elsewhere, is rejected with
    /// [`SettingsError::OutOfScope`].
    pub fn directory(&self, path: impl AsRef<Path>) -> Result<DirectoryPath> {
        let input = path.as_ref();
        let out_of_scope = || SettingsError::OutOfScope {
            path: input.to_path_buf(),
            root: self.path.clone(),
        };

        let absolute = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.path.join(input)
        };
        let rest = absolute
            .strip_prefix(&self.path)
            .map_err(|_| out_of_scope())?;

        let mut segments = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return Err(out_of_scope()),
            }
        }
        Ok(DirectoryPath::new(self.display.clone(), segments.join("/")))
    }

    /// Resolve a store key (`"."` or `"src/lib"`) back into a directory.
    pub fn from_key(&self, key: &str) -> Result<DirectoryPath> {
        if key == ROOT_KEY || key.is_empty() {
            return Ok(self.top());
        }
        if Path::new(key).is_absolute() || key.starts_with('/') {
            return Err(SettingsError::OutOfScope {
                path: key.into(),
                root: self.path.clone(),
            });
        }
        self.directory(key)
    }
}

impl fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// A directory inside a project root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectoryPath {
    absolute: String,
    relative: String,
    root: Arc<str>,
}

impl DirectoryPath {
    fn new(root: Arc<str>, relative: String) -> Self {
        let absolute = if relative.is_empty() {
            root.to_string()
        } else if root.ends_with('/') {
            format!("{root}{relative}")
        } else {
            format!("{root}/{relative}")
        };
        Self {
            absolute,
            relative,
            root,
        }
    }

    /// Absolute path with forward slashes.
    pub fn as_str(&self) -> &str {
        &self.absolute
    }

    /// Path relative to the project root; empty for the root itself.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Key under which this directory's record is stored.
    pub fn key(&self) -> &str {
        if self.relative.is_empty() {
            ROOT_KEY
        } else {
            &self.relative
        }
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.absolute)
    }

    /// The immediate parent, or `None` at the project root.
    pub fn parent(&self) -> Option<DirectoryPath> {
        if self.is_root() {
            return None;
        }
        let parent = match self.relative.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        };
        Some(DirectoryPath::new(self.root.clone(), parent))
    }

    /// Directories from the project root down to `self`, inclusive.
    pub fn chain(&self) -> Vec<DirectoryPath> {
        let mut chain = vec![DirectoryPath::new(self.root.clone(), String::new())];
        if self.is_root() {
            return chain;
        }
        let mut prefix = String::new();
        for segment in self.relative.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            chain.push(DirectoryPath::new(self.root.clone(), prefix.clone()));
        }
        chain
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_ancestor_of(&self, other: &DirectoryPath) -> bool {
        self.root == other.root
            && (self.is_root()
                || other.relative == self.relative
                || other
                    .relative
                    .strip_prefix(&self.relative)
                    .is_some_and(|rest| rest.starts_with('/')))
    }
}

impl fmt::Display for DirectoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute)
    }
}

impl AsRef<Path> for DirectoryPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.absolute)
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn forward_slashes(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.len() > 1 {
        s.trim_end_matches('/').to_string()
    } else {
        s
    }
}
