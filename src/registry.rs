//! One live [`SettingsService`] per project root.
//!
//! Collaborators that only know a path ask the registry for the service
//! instead of building their own, so every caller for a root shares one
//! cache and one notification channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use crate::builder::{Dirfig, SettingsBuilder};
use crate::error::Result;
use crate::events::{self, SettingsChanged};
use crate::path::ProjectRoot;
use crate::service::SettingsService;

#[derive(Debug)]
pub struct ServiceRegistry {
    template: SettingsBuilder,
    events: broadcast::Sender<SettingsChanged>,
    services: Mutex<HashMap<PathBuf, Arc<SettingsService>>>,
}

impl ServiceRegistry {
    /// Services are built from `template` with the project root filled in.
    pub fn new(template: SettingsBuilder) -> Self {
        Self {
            template,
            events: events::channel(),
            services: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry, using the default builder.
    pub fn global() -> &'static ServiceRegistry {
        static GLOBAL: OnceLock<ServiceRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| ServiceRegistry::new(Dirfig::builder()))
    }

    /// The service for `root`, built on first access.
    pub fn get_service(&self, root: impl AsRef<Path>) -> Result<Arc<SettingsService>> {
        let key = Self::key(root.as_ref())?;
        let mut services = self.lock();
        if let Some(service) = services.get(&key) {
            return Ok(Arc::clone(service));
        }

        let service = Arc::new(
            self.template
                .clone()
                .project_root(&key)
                .events(self.events.clone())
                .build()?,
        );
        debug!(root = %key.display(), "created settings service");
        services.insert(key, Arc::clone(&service));
        Ok(service)
    }

    /// Forget the service for `root`. Its caches are dropped too, so anyone
    /// still holding it re-reads the store on the next call. Returns whether
    /// a service was registered.
    pub fn invalidate(&self, root: impl AsRef<Path>) -> Result<bool> {
        let key = Self::key(root.as_ref())?;
        let removed = self.lock().remove(&key);
        match &removed {
            Some(service) => service.invalidate(),
            None => {
                self.events
                    .send(SettingsChanged::Invalidated { root: key.clone() })
                    .ok();
            }
        }
        debug!(root = %key.display(), registered = removed.is_some(), "invalidated settings service");
        Ok(removed.is_some())
    }

    /// Invalidate and drop every service.
    pub fn clear_all(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, service) in drained {
            service.invalidate();
        }
    }

    /// Changes from every service this registry creates.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChanged> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn key(root: &Path) -> Result<PathBuf> {
        Ok(ProjectRoot::new(root)?.path().to_path_buf())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<SettingsService>>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
