//! Hierarchical per-directory settings for a code-counting tool.
//!
//! Every directory of a project may carry a sparse set of settings (badge
//! emojis, line thresholds, include and exclude globs). A directory without
//! a value for a field inherits it from the nearest ancestor that has one,
//! and from the global defaults when none does. All records live in one
//! TOML store under the project root.
//!
//! ```ignore
//! let service = Dirfig::builder()
//!     .project_root("/work/my-project")
//!     .build()?;
//!
//! service.set("src", Field::MidThreshold, 500u64)?;
//! let resolution = service.resolve("src/lib")?;
//! assert_eq!(resolution.resolved.count(Field::MidThreshold), Some(500));
//! assert_eq!(resolution.provenance.get(Field::MidThreshold).to_string(), "src");
//! ```
//!
//! # Layers
//!
//! ```text
//! Compiled defaults       #[config(default = ...)] on CounterDefaults
//!        ↑ overridden by
//! Defaults files          search paths in order, later paths win
//!        ↑ overridden by
//! Environment vars        CODE_COUNTER__LINE_THRESHOLDS__MID_THRESHOLD
//!        ↑ overridden by
//! Builder overrides       .default_override()
//!        ↑ overridden by
//! Project root record     "." in the store
//!        ↑ overridden by
//! Each nested directory   nearest ancestor wins, per field
//! ```
//!
//! The first four layers collapse into the global defaults when the service
//! is built. The directory layers are resolved on every call, from a cached
//! snapshot of the store.
//!
//! # The store
//!
//! `.code-counter/settings.toml` holds one table per directory, keyed by its
//! path relative to the root:
//!
//! ```toml
//! ["."]
//! emojis.normal = "🟢"
//!
//! ["src/generated"]
//! excludePatterns = ["**/*.pb.rs"]
//! ```
//!
//! Edits go through `toml_edit`, so hand-written comments survive, and every
//! write re-reads the file under a lock and replaces it atomically. A
//! malformed document is reported as [`SettingsError::StoreCorrupt`] rather
//! than silently overwritten. A single malformed directory entry only
//! affects that directory.
//!
//! # Provenance
//!
//! Each [`Resolution`] names, per field, the directory that supplied the
//! value ([`Source`]). Pattern lists can be broken down entry by entry with
//! [`SettingsService::patterns_with_sources`], and a [`PatternMatcher`] tells
//! why a file is or is not counted.
//!
//! # Changes and caching
//!
//! Resolutions are memoised per service. Every mutation drops the cache
//! before it announces a [`SettingsChanged`] on a broadcast channel, so a
//! subscriber that resolves in response always sees the new state. Edits
//! made outside the service are picked up after
//! [`SettingsService::invalidate`] or [`ServiceRegistry::invalidate`].
//!
//! # Legacy migration
//!
//! [`SettingsService::migrate`] imports the older per-directory
//! `.code-counter.json` files. Malformed files are reported and skipped;
//! the rest are committed in one write.
//!
//! # Clap adapter
//!
//! With the `clap` feature (on by default), [`SettingsArgs`] gives an
//! application `settings list|get|set|reset|delete|dirs|sources|migrate|defaults`.
//! It converts into a [`SettingsAction`] that
//! [`SettingsService::handle`] runs.

pub mod defaults;
pub mod error;
pub mod events;
pub mod field;
pub mod migrate;
pub mod path;
pub mod provenance;
pub mod record;
pub mod resolve;
pub mod store;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod ops;
mod registry;
mod service;

#[cfg(test)]
mod fixtures;

pub use builder::{Dirfig, SettingsBuilder};
#[cfg(feature = "clap")]
pub use cli::{SettingsArgs, SettingsSubcommand};
pub use defaults::CounterDefaults;
pub use error::{Result, SettingsError};
pub use events::SettingsChanged;
pub use field::{Field, FieldKind, FieldValue};
pub use migrate::MigrationReport;
pub use ops::{ListingEntry, SettingsResult, generate_template};
pub use path::{DirectoryPath, ProjectRoot};
pub use provenance::{PatternMatcher, PatternSource, Verdict};
pub use record::SettingsRecord;
pub use registry::ServiceRegistry;
pub use resolve::{Provenance, Resolution, ResolvedSettings, Source};
pub use service::SettingsService;
pub use store::SettingsStore;
pub use types::{LegacyDisposition, SearchPath, SettingsAction};
