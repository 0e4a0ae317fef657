use crate::{CliArgs, config::Config};
use std::{io::IsTerminal, sync::OnceLock};
use tracing::Level;
use tracing_subscriber::{EnvFilter, reload};

/// Env var holding a tracing filter just for this tool.  Takes priority over `RUST_LOG`.
pub(crate) const LOG_ENV: &str = "CLI_RECIPE_LOG";

/// Filter used for `-v` and above, before the level is appended.
///
/// The HTTP stack is noisy at DEBUG, so it stays at INFO unless a filter is given explicitly.
const DEFAULT_TRACING_FILTER: &str = "info,hyper_util=info,reqwest=info,rustls=info";

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Set once in [`init`], so that [`apply_config`] can swap the filter after config is loaded.
static RELOAD_HANDLE: OnceLock<ReloadHandle> = OnceLock::new();

/// Filter from the environment, [`LOG_ENV`] first, then `RUST_LOG`.
fn env_filter() -> Option<EnvFilter> {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .ok()
}

/// Initialize tracing based on the verbosity the user asked for.
///
/// - `0`: WARN and ERROR only, printed as bare messages so a successful run is quiet
/// - `1`: INFO, with timestamp and target
/// - `2`: DEBUG
/// - `3+`: TRACE
///
/// An explicit filter in `CLI_RECIPE_LOG` or `RUST_LOG` replaces the verbosity-derived one.
///
/// # Panics
///
/// Panics if a global subscriber was already installed.
pub(crate) fn init(args: &CliArgs) {
    use tracing_subscriber::{fmt, prelude::*};

    let (level, use_simple_format) = match args.verbose {
        0 => (Level::WARN, true),
        1 => (Level::INFO, false),
        2 => (Level::DEBUG, false),
        _ => (Level::TRACE, false),
    };

    let filter = env_filter().unwrap_or_else(|| {
        if args.verbose == 0 {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new(format!("{DEFAULT_TRACING_FILTER},cli_recipe={level}"))
        }
    });

    let (filter, reload_handle) = reload::Layer::new(filter);
    let _ = RELOAD_HANDLE.set(reload_handle);

    let use_ansi = std::io::stderr().is_terminal();

    if use_simple_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .with_ansi(use_ansi)
                    .without_time(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(use_ansi),
            )
            .init();
    }
}

/// Apply `log_level` from the config, unless `-v` or a log env var already decided the filter.
///
/// Must be called after [`init`].  An invalid filter string is reported and ignored.
pub(crate) fn apply_config(config: &Config, args: &CliArgs) {
    if args.verbose > 0 {
        tracing::debug!("Not applying config log_level: CLI verbosity flag takes precedence");
        return;
    }

    if std::env::var_os(LOG_ENV).is_some() || std::env::var_os("RUST_LOG").is_some() {
        tracing::debug!("Not applying config log_level: environment variable takes precedence");
        return;
    }

    let Some(log_level) = &config.log_level else {
        return;
    };

    let new_filter = match EnvFilter::try_new(log_level) {
        Ok(filter) => filter,
        Err(e) => {
            tracing::warn!("Invalid log_level in config file: {log_level}: {e}");
            return;
        }
    };

    match RELOAD_HANDLE.get() {
        Some(handle) => match handle.reload(new_filter) {
            Ok(()) => tracing::debug!("Applied log level from config: {log_level}"),
            Err(e) => tracing::warn!("Failed to reload log filter: {e}"),
        },
        None => tracing::warn!("Reload handle not initialized; cannot apply config log level"),
    }
}

/// Initialize tracing for tests, once per process.
///
/// Output goes through the test writer so it only shows for failing tests.  Defaults to DEBUG;
/// `CLI_RECIPE_LOG` or `RUST_LOG` override.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::fmt;

    static INIT: OnceLock<()> = OnceLock::new();

    INIT.get_or_init(|| {
        let filter = env_filter().unwrap_or_else(|| EnvFilter::new("debug"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_level(true)
            .try_init();
    });
}
