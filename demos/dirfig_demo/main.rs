//! # dirfig demo application
//!
//! A small command line front end over a project's directory settings, used
//! to try the library by hand.
//!
//! ```sh
//! cargo run --example dirfig_demo -- --root /tmp/proj settings set --dir src emojis.normal ok
//! cargo run --example dirfig_demo -- --root /tmp/proj settings list --dir src/lib
//! cargo run --example dirfig_demo -- --root /tmp/proj check src/gen/out.rs
//! RUST_LOG=dirfig=debug cargo run --example dirfig_demo -- --root /tmp/proj settings migrate
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dirfig::{Dirfig, SettingsArgs, SettingsError, Verdict};

#[derive(Parser, Debug)]
#[command(name = "dirfig-demo")]
struct Cli {
    /// Project root. Defaults to the working directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage directory settings.
    Settings(SettingsArgs),
    /// Tell whether a file would be counted, and why not.
    Check {
        /// File path relative to the project root.
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SettingsError> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().map_err(|e| SettingsError::Io {
            path: PathBuf::from("."),
            source: e,
        })?,
    };
    let service = Dirfig::builder().project_root(&root).build()?;

    match cli.command {
        Commands::Settings(args) => service.handle_and_print(&args.into_action()),
        Commands::Check { file } => {
            let parent = file.parent().unwrap_or(Path::new(""));
            let matcher = service.matcher(parent)?;
            let relative = file.to_string_lossy();
            match matcher.verdict(&relative) {
                Verdict::Counted => println!("{relative}: counted"),
                Verdict::Excluded { pattern, source } => {
                    println!("{relative}: excluded by {pattern} ({source})")
                }
                Verdict::NotIncluded => println!("{relative}: matches no include pattern"),
            }
            Ok(())
        }
    }
}
