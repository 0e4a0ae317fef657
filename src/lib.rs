//! A recipe for the `cli` C++ library: fetch the release tarball, patch its build scripts, build
//! and test it with CMake, and stage headers and binaries into a cached package.
//!
//! The binary is a thin wrapper around [`cli_recipe_main`].  The stages themselves are driven by
//! [`orchestrator::Orchestrator`].

pub mod buildinfo;
pub mod cache;
pub mod cli;
pub mod cmake;
pub mod config;
pub mod downloader;
pub mod error;
mod helpers;
mod logging;
pub mod orchestrator;
pub mod packager;
pub mod patch;
pub mod recipe;

#[cfg(test)]
mod testdata;

pub use cli::CliArgs;
pub use error::{Error, Result};

/// Re-export of the snafu [`snafu::Report`] type so that callers can refer to this type without
/// taking an explicit snafu dep
pub use snafu::Report as SnafuReport;

use cli::Command;
use config::Config;
use orchestrator::{CreateOptions, Orchestrator};
use snafu::ResultExt;

/// Main entry point, meant to be called from `main.rs`.
#[snafu::report]
pub fn cli_recipe_main() -> Result<()> {
    let args = CliArgs::parse_from_cli_args();

    logging::init(&args);

    if args.version {
        print_version();
        return Ok(());
    }

    let Some(command) = args.command.clone() else {
        use clap::CommandFactory;

        CliArgs::command()
            .error(clap::error::ErrorKind::MissingSubcommand, "a subcommand is required")
            .exit();
    };

    let config = Config::load(&args)?;
    logging::apply_config(&config, &args);

    let options = args.option_set()?;
    let settings = args.build_settings()?;
    tracing::debug!("Options: {options:?}, settings: {settings:?}");

    let orchestrator = Orchestrator::new(config, options, settings)?;

    match command {
        Command::Create {
            deploy_to,
            keep_build,
            force,
        } => {
            let outcome = orchestrator.create(&CreateOptions {
                deploy_to,
                keep_build,
                force,
            })?;

            if outcome.stages.is_empty() {
                tracing::warn!("Package {} already exists; use --force to rebuild", outcome.package_id);
            }
            println!("{}", outcome.package_path.display());
        }
        Command::Source { dest } => {
            let source_dir = orchestrator.source(&dest)?;
            println!("{}", source_dir.display());
        }
        Command::Info => {
            let info = orchestrator.info()?;
            let json = serde_json::to_string_pretty(&info).context(error::JsonSnafu)?;
            println!("{json}");
        }
        Command::Deploy { to } => {
            for file in orchestrator.deploy(&to)? {
                println!("{}", to.join(file).display());
            }
        }
    }

    Ok(())
}

fn print_version() {
    let version = env!("CARGO_PKG_VERSION");

    match (
        option_env!("VERGEN_GIT_SHA"),
        option_env!("VERGEN_GIT_COMMIT_DATE"),
    ) {
        (Some(sha), Some(date)) if sha != "VERGEN_IDEMPOTENT_OUTPUT" && date != "VERGEN_IDEMPOTENT_OUTPUT" => {
            eprintln!("cli-recipe {version} ({sha} {date})");
        }
        _ => {
            eprintln!("cli-recipe {version}");
        }
    }
}
