//! Locating and reading defaults files.
//!
//! Each [`SearchPath`] names one directory. Directories are listed lowest
//! priority first and every `{dir}/{file_name}` that exists is loaded, so the
//! caller can merge them in order. Missing directories and files are skipped;
//! any other I/O failure is an error.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Result, SettingsError};
use crate::types::SearchPath;

/// The concrete directory for one search path, if it can be determined.
pub fn resolve_dir(search_path: &SearchPath, app_name: &str) -> Option<PathBuf> {
    match search_path {
        SearchPath::Platform => directories::ProjectDirs::from("", "", app_name)
            .map(|dirs| dirs.config_dir().to_path_buf()),
        SearchPath::Home(subdir) => {
            directories::UserDirs::new().map(|dirs| dirs.home_dir().join(subdir))
        }
        SearchPath::Path(p) => Some(p.clone()),
    }
}

/// Read every defaults file found along `search_paths`, lowest priority first.
pub fn load_files(
    search_paths: &[SearchPath],
    file_name: &str,
    app_name: &str,
) -> Result<Vec<(PathBuf, String)>> {
    let mut found = Vec::new();
    for dir in search_paths.iter().filter_map(|sp| resolve_dir(sp, app_name)) {
        let path = dir.join(file_name);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded defaults file");
                found.push((path, content));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SettingsError::io(path, e)),
        }
    }
    Ok(found)
}
