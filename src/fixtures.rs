#[cfg(test)]
pub mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use crate::builder::{DEFAULT_LEGACY_FILE, DEFAULT_STORE_FILE, Dirfig, SettingsBuilder};
    use crate::path::{DirectoryPath, ProjectRoot};
    use crate::service::SettingsService;
    use crate::store::SettingsStore;

    /// A throwaway project tree with its own store.
    pub struct TestProject {
        dir: TempDir,
        root: ProjectRoot,
    }

    impl TestProject {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = ProjectRoot::new(dir.path()).unwrap();
            Self { dir, root }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        pub fn root(&self) -> &ProjectRoot {
            &self.root
        }

        pub fn dir(&self, relative: &str) -> DirectoryPath {
            self.root.directory(relative).unwrap()
        }

        /// A store handle independent of any service, as a second process
        /// would have.
        pub fn store(&self) -> SettingsStore {
            SettingsStore::new(self.root.clone(), DEFAULT_STORE_FILE)
        }

        pub fn write_store(&self, content: &str) {
            let path = self.path().join(DEFAULT_STORE_FILE);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        /// Write a legacy settings file into `relative` and return its path.
        pub fn write_legacy(&self, relative: &str, content: &str) -> PathBuf {
            let dir = self.path().join(relative);
            fs::create_dir_all(&dir).unwrap();
            let path = dir.join(DEFAULT_LEGACY_FILE);
            fs::write(&path, content).unwrap();
            path
        }

        /// Builder that ignores the user's config directory and environment.
        pub fn hermetic_builder() -> SettingsBuilder {
            Dirfig::builder().defaults_search_paths(vec![]).no_env()
        }

        pub fn builder(&self) -> SettingsBuilder {
            Self::hermetic_builder().project_root(self.path())
        }

        pub fn service(&self) -> SettingsService {
            self.builder().build().unwrap()
        }
    }

    #[test]
    fn fresh_project_has_no_store() {
        let project = TestProject::new();
        assert!(!project.path().join(DEFAULT_STORE_FILE).exists());
        assert!(project.dir("").is_root());
    }
}
