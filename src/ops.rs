//! Settings operations behind [`SettingsAction`], and the results callers
//! display.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::defaults::CounterDefaults;
use crate::error::{Result, SettingsError};
use crate::field::{Field, FieldValue};
use crate::service::SettingsService;
use crate::types::SettingsAction;

/// One resolved field in a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub key: String,
    pub value: String,
    pub source: String,
    /// Set on the listed directory itself rather than inherited.
    pub overridden: bool,
}

/// Result of a settings operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsResult {
    /// Every resolved field of a directory.
    Listing {
        directory: String,
        entries: Vec<ListingEntry>,
    },
    /// One resolved field and where it came from.
    Value {
        key: String,
        value: String,
        source: String,
    },
    ValueSet {
        directory: String,
        key: String,
        value: String,
    },
    ValueReset {
        directory: String,
        key: String,
        removed: bool,
    },
    Deleted {
        directory: String,
        removed: bool,
    },
    /// Directories with settings of their own.
    Directories(Vec<String>),
    /// Each pattern of a list field with its source.
    Sources {
        key: String,
        entries: Vec<(String, String)>,
    },
    Migrated {
        migrated: usize,
        skipped: usize,
        errors: Vec<String>,
    },
    /// A generated defaults template.
    Template(String),
    TemplateWritten { path: PathBuf },
}

impl fmt::Display for SettingsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsResult::Listing { directory, entries } => {
                write!(f, "# {directory}")?;
                for entry in entries {
                    let marker = if entry.overridden { "*" } else { " " };
                    write!(
                        f,
                        "\n{marker} {} = {}  ({})",
                        entry.key, entry.value, entry.source
                    )?;
                }
                Ok(())
            }
            SettingsResult::Value { key, value, source } => {
                write!(f, "{key} = {value}  ({source})")
            }
            SettingsResult::ValueSet {
                directory,
                key,
                value,
            } => write!(f, "Set {key} = {value} in {directory}"),
            SettingsResult::ValueReset {
                directory,
                key,
                removed: true,
            } => write!(f, "Reset {key} in {directory}, now inherited"),
            SettingsResult::ValueReset {
                directory, key, ..
            } => write!(f, "{key} was not set in {directory}"),
            SettingsResult::Deleted {
                directory,
                removed: true,
            } => write!(f, "Deleted settings of {directory}"),
            SettingsResult::Deleted { directory, .. } => {
                write!(f, "{directory} has no settings")
            }
            SettingsResult::Directories(dirs) if dirs.is_empty() => {
                write!(f, "No directory has settings")
            }
            SettingsResult::Directories(dirs) => write!(f, "{}", dirs.join("\n")),
            SettingsResult::Sources { key, entries } if entries.is_empty() => {
                write!(f, "{key} is empty")
            }
            SettingsResult::Sources { entries, .. } => {
                for (i, (pattern, source)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{pattern}  ({source})")?;
                }
                Ok(())
            }
            SettingsResult::Migrated {
                migrated,
                skipped,
                errors,
            } => {
                write!(f, "Migrated {migrated}, skipped {skipped}, failed {}", errors.len())?;
                for error in errors {
                    write!(f, "\n  {error}")?;
                }
                Ok(())
            }
            SettingsResult::Template(t) => write!(f, "{t}"),
            SettingsResult::TemplateWritten { path } => {
                write!(f, "Defaults template written to {}", path.display())
            }
        }
    }
}

/// Commented TOML template for the user defaults file, from the doc comments
/// on [`CounterDefaults`].
pub fn generate_template() -> String {
    confique::toml::template::<CounterDefaults>(confique::toml::FormatOptions::default())
}

impl SettingsService {
    /// Run a [`SettingsAction`] (list / get / set / reset / delete / dirs /
    /// sources / migrate / defaults).
    pub fn handle(&self, action: &SettingsAction) -> Result<SettingsResult> {
        match action {
            SettingsAction::List { dir } => {
                let resolution = self.resolve(target(dir))?;
                let entries = resolution
                    .resolved
                    .iter()
                    .map(|(field, value)| ListingEntry {
                        key: field.key().to_string(),
                        value: value.to_string(),
                        source: resolution.provenance.get(field).to_string(),
                        overridden: resolution.is_overridden(field),
                    })
                    .collect();
                Ok(SettingsResult::Listing {
                    directory: resolution.directory.key().to_string(),
                    entries,
                })
            }
            SettingsAction::Get { dir, key } => {
                let field = Field::from_key(key)?;
                let resolution = self.resolve(target(dir))?;
                Ok(SettingsResult::Value {
                    key: field.key().to_string(),
                    value: resolution.resolved.get(field).to_string(),
                    source: resolution.provenance.get(field).to_string(),
                })
            }
            SettingsAction::Set { dir, key, value } => {
                let field = Field::from_key(key)?;
                let parsed = FieldValue::parse(field, value)?;
                let directory = self.directory(target(dir))?;
                self.set(&directory, field, parsed.clone())?;
                Ok(SettingsResult::ValueSet {
                    directory: directory.key().to_string(),
                    key: field.key().to_string(),
                    value: parsed.to_string(),
                })
            }
            SettingsAction::Reset { dir, key } => {
                let field = Field::from_key(key)?;
                let directory = self.directory(target(dir))?;
                let removed = self.reset_field(&directory, field)?;
                Ok(SettingsResult::ValueReset {
                    directory: directory.key().to_string(),
                    key: field.key().to_string(),
                    removed,
                })
            }
            SettingsAction::Delete { dir } => {
                let directory = self.directory(target(dir))?;
                let removed = self.delete(&directory)?;
                Ok(SettingsResult::Deleted {
                    directory: directory.key().to_string(),
                    removed,
                })
            }
            SettingsAction::Dirs => Ok(SettingsResult::Directories(
                self.list_directories_with_settings()?
                    .iter()
                    .map(|d| d.key().to_string())
                    .collect(),
            )),
            SettingsAction::Sources { dir, field } => {
                let entries = self
                    .patterns_with_sources(target(dir), *field)?
                    .into_iter()
                    .map(|entry| (entry.pattern, entry.source.to_string()))
                    .collect();
                Ok(SettingsResult::Sources {
                    key: field.key().to_string(),
                    entries,
                })
            }
            SettingsAction::Migrate => {
                let report = self.migrate()?;
                Ok(SettingsResult::Migrated {
                    migrated: report.migrated,
                    skipped: report.skipped,
                    errors: report.errors.iter().map(ToString::to_string).collect(),
                })
            }
            SettingsAction::Defaults { output } => {
                let template = generate_template();
                match output {
                    Some(path) => {
                        if let Some(parent) = path.parent() {
                            std::fs::create_dir_all(parent)
                                .map_err(|e| SettingsError::io(parent, e))?;
                        }
                        std::fs::write(path, &template).map_err(|e| SettingsError::io(path, e))?;
                        Ok(SettingsResult::TemplateWritten { path: path.clone() })
                    }
                    None => Ok(SettingsResult::Template(template)),
                }
            }
        }
    }

    /// Handle an action and print the result to stdout.
    pub fn handle_and_print(&self, action: &SettingsAction) -> Result<()> {
        println!("{}", self.handle(action)?);
        Ok(())
    }
}

fn target(dir: &Option<PathBuf>) -> &Path {
    dir.as_deref().unwrap_or(Path::new(""))
}
