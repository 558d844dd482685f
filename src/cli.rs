//! Clap adapter for the settings operations.
//!
//! Compiled only with the `clap` feature (on by default). [`SettingsArgs`]
//! can be flattened or nested into an application's own parser to get
//! `settings list|get|set|reset|delete|dirs|sources|migrate|defaults`.
//! [`SettingsArgs::into_action()`] is the only bridge to the core; everything
//! after it goes through [`SettingsService::handle()`](crate::SettingsService::handle).

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::field::Field;
use crate::types::SettingsAction;

/// Clap-derived args for the `settings` subcommand group.
///
/// ```ignore
/// #[derive(Subcommand)]
/// enum Commands {
///     Settings(SettingsArgs),
/// }
/// ```
#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Directory to operate on, relative to the project root.
    /// Defaults to the root itself.
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub action: Option<SettingsSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum SettingsSubcommand {
    /// Show every resolved setting of the directory and where it comes from.
    List,
    /// Show one resolved setting.
    Get {
        /// Setting key (e.g. "emojis.normal").
        key: String,
    },
    /// Store a setting on the directory.
    Set {
        /// Setting key (e.g. "lineThresholds.midThreshold").
        key: String,
        /// Value. Pattern lists take a JSON array or comma-separated globs.
        value: String,
    },
    /// Remove a setting from the directory so it is inherited again.
    Reset {
        key: String,
    },
    /// Remove every setting of the directory.
    Delete,
    /// List directories that have settings of their own.
    Dirs,
    /// Show each pattern of a list setting with the directory it came from.
    Sources {
        /// "excludePatterns" or "includePatterns".
        #[arg(value_parser = parse_field)]
        field: Field,
    },
    /// Import legacy per-directory settings files.
    Migrate,
    /// Generate a commented defaults file.
    Defaults {
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_field(key: &str) -> Result<Field, String> {
    Field::from_key(key).map_err(|e| e.to_string())
}

impl SettingsArgs {
    /// Convert clap-parsed args into a [`SettingsAction`].
    ///
    /// Bare `settings` maps to `List`. `--dir` is ignored by the actions that
    /// span the whole project.
    pub fn into_action(self) -> SettingsAction {
        let dir = self.dir;
        match self.action {
            None | Some(SettingsSubcommand::List) => SettingsAction::List { dir },
            Some(SettingsSubcommand::Get { key }) => SettingsAction::Get { dir, key },
            Some(SettingsSubcommand::Set { key, value }) => SettingsAction::Set { dir, key, value },
            Some(SettingsSubcommand::Reset { key }) => SettingsAction::Reset { dir, key },
            Some(SettingsSubcommand::Delete) => SettingsAction::Delete { dir },
            Some(SettingsSubcommand::Dirs) => SettingsAction::Dirs,
            Some(SettingsSubcommand::Sources { field }) => SettingsAction::Sources { dir, field },
            Some(SettingsSubcommand::Migrate) => SettingsAction::Migrate,
            Some(SettingsSubcommand::Defaults { output }) => SettingsAction::Defaults { output },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: SettingsArgs,
    }

    fn parse(args: &[&str]) -> SettingsAction {
        TestCli::try_parse_from(args)
            .unwrap()
            .settings
            .into_action()
    }

    #[test]
    fn bare_is_list_of_root() {
        assert_eq!(parse(&["test"]), SettingsAction::List { dir: None });
        assert_eq!(parse(&["test", "list"]), SettingsAction::List { dir: None });
    }

    #[test]
    fn dir_before_or_after_subcommand() {
        let expected = SettingsAction::Get {
            dir: Some(PathBuf::from("src/lib")),
            key: "emojis.normal".into(),
        };
        assert_eq!(
            parse(&["test", "--dir", "src/lib", "get", "emojis.normal"]),
            expected
        );
        assert_eq!(
            parse(&["test", "get", "emojis.normal", "--dir", "src/lib"]),
            expected
        );
    }

    #[test]
    fn parse_set() {
        assert_eq!(
            parse(&["test", "set", "lineThresholds.midThreshold", "500", "--dir", "src"]),
            SettingsAction::Set {
                dir: Some(PathBuf::from("src")),
                key: "lineThresholds.midThreshold".into(),
                value: "500".into(),
            }
        );
    }

    #[test]
    fn parse_reset_and_delete() {
        assert_eq!(
            parse(&["test", "reset", "emojis.danger"]),
            SettingsAction::Reset {
                dir: None,
                key: "emojis.danger".into(),
            }
        );
        assert_eq!(
            parse(&["test", "delete", "--dir", "a"]),
            SettingsAction::Delete {
                dir: Some(PathBuf::from("a")),
            }
        );
    }

    #[test]
    fn project_wide_actions() {
        assert_eq!(parse(&["test", "dirs"]), SettingsAction::Dirs);
        assert_eq!(parse(&["test", "migrate"]), SettingsAction::Migrate);
    }

    #[test]
    fn parse_sources() {
        assert_eq!(
            parse(&["test", "sources", "excludePatterns"]),
            SettingsAction::Sources {
                dir: None,
                field: Field::ExcludePatterns,
            }
        );
    }

    #[test]
    fn sources_rejects_unknown_key() {
        assert!(TestCli::try_parse_from(["test", "sources", "bogus"]).is_err());
    }

    #[test]
    fn parse_defaults_output() {
        assert_eq!(
            parse(&["test", "defaults"]),
            SettingsAction::Defaults { output: None }
        );
        assert_eq!(
            parse(&["test", "defaults", "-o", "out.toml"]),
            SettingsAction::Defaults {
                output: Some(PathBuf::from("out.toml")),
            }
        );
    }

    #[test]
    fn invalid_subcommand_errors() {
        assert!(TestCli::try_parse_from(["test", "nope"]).is_err());
    }
}
