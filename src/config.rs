use crate::{Result, cli::CliArgs, error};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use snafu::ResultExt;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Name of the config file looked up in each config location.
pub const CONFIG_FILE_NAME: &str = "cli-recipe.toml";

/// Prefix for environment variables that override config values, e.g. `CLI_RECIPE_OFFLINE=true`.
const ENV_PREFIX: &str = "CLI_RECIPE_";

/// Environment variables with the [`ENV_PREFIX`] that are not config values.
const ENV_NON_CONFIG: &[&str] = &["LOG", "APP_DIR", "SYSTEM_CONFIG_DIR"];

/// Config keys whose environment values are taken verbatim.  figment would otherwise parse a
/// digit-only checksum as a number and drop its leading zeros.
const ENV_VERBATIM: &[&str] = &["SOURCE_SHA256"];

/// The package-manager style toggle for running the upstream test suite.
const RUN_TESTS_ENV: &str = "CONAN_RUN_TESTS";

/// Where a locally installed dependency lives.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Installation prefix, containing `include/` and `lib/`
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Installed version, checked against the recipe's version requirement
    #[serde(default)]
    pub version: Option<String>,
}

/// Configuration settings for cli-recipe.
///
/// Values are layered, lowest priority first:
/// 1. Built-in defaults
/// 2. System config file (`/etc/cli-recipe.toml` or the `--system-config-dir` override)
/// 3. User config file (in the platform config dir, or `<app-dir>/config`)
/// 4. `cli-recipe.toml` in the current directory
/// 5. Environment: `CONAN_RUN_TESTS`, then `CLI_RECIPE_*` (nested keys separated by `__`)
/// 6. Command line flags
///
/// `--config-file` replaces layers 2-4 with exactly that one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory where downloaded source tarballs are cached
    pub cache_dir: PathBuf,

    /// Directory where finished packages are stored, keyed by package id
    pub package_dir: PathBuf,

    /// Directory under which temporary work and build directories are created.
    ///
    /// Only the finished package is retained; these are removed after each run unless asked to
    /// keep them.
    pub build_dir: PathBuf,

    /// Never touch the network.  Only a previously cached tarball can be used.
    pub offline: bool,

    /// Build and run the upstream test suite
    #[serde(deserialize_with = "deserialize_flag")]
    pub run_tests: bool,

    /// Tracing filter applied when neither `-v` nor a log env var is given
    pub log_level: Option<String>,

    /// Per-request timeout for the tarball download
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,

    /// Override the upstream tarball URL, e.g. to use a mirror.  Also accepts `file://` URLs
    /// and plain paths.
    pub source_url: Option<String>,

    /// Expected SHA-256 of the tarball, as lowercase hex.  When set, a mismatch is fatal.
    pub source_sha256: Option<String>,

    /// Explicit path to `cmake`; otherwise found on the `PATH`
    pub cmake: Option<PathBuf>,

    /// Explicit path to `ctest`; otherwise found next to `cmake` or on the `PATH`
    pub ctest: Option<PathBuf>,

    /// Local Boost installation
    #[serde(default)]
    pub boost: DependencyConfig,
}

/// The directories the defaults are derived from.
#[derive(Clone, Debug)]
struct AppDirs {
    system_config_dir: Option<PathBuf>,
    user_config_dir: PathBuf,
    cache_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppDirs {
    fn resolve(args: &CliArgs) -> Self {
        use etcetera::{AppStrategy, AppStrategyArgs, choose_app_strategy};

        let system_config_dir = args.system_config_dir.clone().or_else(default_system_config_dir);

        if let Some(app_dir) = &args.app_dir {
            return Self {
                system_config_dir,
                user_config_dir: app_dir.join("config"),
                cache_dir: app_dir.join("cache"),
                data_dir: app_dir.to_path_buf(),
            };
        }

        match choose_app_strategy(AppStrategyArgs {
            top_level_domain: "org".to_string(),
            author: "anelson-labs".to_string(),
            app_name: "cli-recipe".to_string(),
        }) {
            Ok(strategy) => Self {
                system_config_dir,
                user_config_dir: strategy.config_dir(),
                cache_dir: strategy.cache_dir(),
                data_dir: strategy.data_dir(),
            },
            Err(e) => {
                // No home directory.  Fall back to a dot dir in the working directory rather than
                // refusing to run at all.
                tracing::warn!("Unable to determine home directory ({e}); using ./.cli-recipe");
                let base = PathBuf::from(".cli-recipe");
                Self {
                    system_config_dir,
                    user_config_dir: base.join("config"),
                    cache_dir: base.join("cache"),
                    data_dir: base,
                }
            }
        }
    }
}

fn default_system_config_dir() -> Option<PathBuf> {
    if cfg!(unix) {
        Some(PathBuf::from("/etc"))
    } else {
        std::env::var_os("ProgramData").map(|p| PathBuf::from(p).join("cli-recipe"))
    }
}

impl Config {
    fn defaults(dirs: &AppDirs) -> Self {
        Self {
            cache_dir: dirs.cache_dir.clone(),
            package_dir: dirs.data_dir.join("packages"),
            build_dir: dirs.data_dir.join("build"),
            offline: false,
            run_tests: true,
            log_level: None,
            http_timeout: Duration::from_secs(30),
            source_url: None,
            source_sha256: None,
            cmake: None,
            ctest: None,
            boost: DependencyConfig::default(),
        }
    }

    /// Load the configuration, honoring any config-related command line arguments the user
    /// provided.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let dirs = AppDirs::resolve(args);
        let cwd = std::env::current_dir().with_context(|_| error::IoSnafu { path: PathBuf::from(".") })?;

        let config_files = match &args.config_file {
            Some(file) => vec![file.clone()],
            None => {
                let mut files = Vec::new();
                if let Some(system) = &dirs.system_config_dir {
                    files.push(system.join(CONFIG_FILE_NAME));
                }
                files.push(dirs.user_config_dir.join(CONFIG_FILE_NAME));
                files.push(cwd.join(CONFIG_FILE_NAME));
                files
            }
        };

        let mut config = Self::load_from(&dirs, &config_files, args.config_file.is_some())?;

        // Command line flags have the last word
        if args.offline {
            config.offline = true;
        }

        config.expand_paths();
        Ok(config)
    }

    fn load_from(dirs: &AppDirs, config_files: &[PathBuf], exact: bool) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::defaults(dirs)));

        for file in config_files {
            tracing::debug!("Reading config file {}", file.display());
            figment = if exact {
                figment.merge(Toml::file_exact(file))
            } else {
                figment.merge(Toml::file(file))
            };
        }

        if let Some(value) = Env::var(RUN_TESTS_ENV) {
            figment = figment.merge(("run_tests", run_tests_enabled(&value)));
        }

        let figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(ENV_NON_CONFIG)
                .ignore(ENV_VERBATIM)
                .split("__"),
        );

        let figment = ENV_VERBATIM.iter().fold(figment, |figment, key| {
            match Env::var(&format!("{ENV_PREFIX}{key}")) {
                Some(value) => figment.merge((key.to_ascii_lowercase(), value)),
                None => figment,
            }
        });

        figment.extract().context(error::ConfigSnafu)
    }

    /// Expand `~` and environment variables in every configured path.
    ///
    /// A path referring to an unset variable is left as written.
    fn expand_paths(&mut self) {
        fn expand(path: &Path) -> PathBuf {
            let raw = path.to_string_lossy();
            match shellexpand::full(&raw) {
                Ok(expanded) => PathBuf::from(expanded.as_ref()),
                Err(e) => {
                    tracing::warn!("Unable to expand {raw}: {e}");
                    path.to_path_buf()
                }
            }
        }

        self.cache_dir = expand(&self.cache_dir);
        self.package_dir = expand(&self.package_dir);
        self.build_dir = expand(&self.build_dir);
        self.cmake = self.cmake.as_deref().map(expand);
        self.ctest = self.ctest.as_deref().map(expand);
        self.boost.root = self.boost.root.as_deref().map(expand);
    }
}

/// How the package-manager toggle has always read: only `1` or `true` (any case) enables tests,
/// and every other value, including an empty one, disables them.
fn run_tests_enabled(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Accept the usual spellings of a boolean flag: real booleans, integers (non-zero is true), and
/// strings such as `"False"` or `"yes"`.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl serde::de::Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a boolean, an integer, or a string such as \"true\" or \"0\"")
        }

        fn visit_bool<E: serde::de::Error>(self, v: bool) -> std::result::Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<bool, E> {
            crate::recipe::parse_bool(v)
                .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}

/// Build an isolated [`Config`] rooted in a fresh temp dir, for tests.
#[cfg(test)]
pub(crate) fn create_test_env() -> (tempfile::TempDir, Config) {
    let temp_dir = tempfile::tempdir().unwrap();
    let dirs = AppDirs {
        system_config_dir: None,
        user_config_dir: temp_dir.path().join("config"),
        cache_dir: temp_dir.path().join("cache"),
        data_dir: temp_dir.path().to_path_buf(),
    };
    let config = Config::defaults(&dirs);
    (temp_dir, config)
}
