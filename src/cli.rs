use crate::{
    Result,
    recipe::{BuildSettings, OptionSet},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "cli-recipe")]
#[command(about = "Fetch, patch, build, test and package the `cli` C++ library")]
#[command(disable_version_flag = true)]
pub struct CliArgs {
    /// Print version information and exit
    #[arg(short = 'V', long, global = true)]
    pub version: bool,

    /// Use verbose output (-vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Read configuration only from this file.
    ///
    /// By default, `cli-recipe.toml` is read from the system config directory, the user config
    /// directory, and the current directory, in that order, with later files taking priority.
    /// Specifying a file here disables that search.
    #[arg(
        long,
        value_name = "FILE",
        global = true,
        conflicts_with_all = ["system_config_dir", "app_dir"]
    )]
    pub config_file: Option<PathBuf>,

    /// Override the system config directory (`/etc` on Unix, `%ProgramData%\cli-recipe` on
    /// Windows).
    #[arg(long, value_name = "PATH", global = true, env = "CLI_RECIPE_SYSTEM_CONFIG_DIR")]
    pub system_config_dir: Option<PathBuf>,

    /// Root all application data under this directory.
    ///
    /// - Config: `<app-dir>/config/cli-recipe.toml`
    /// - Tarball cache: `<app-dir>/cache/`
    /// - Packages: `<app-dir>/packages/`
    /// - Build directories: `<app-dir>/build/`
    #[arg(long, value_name = "PATH", global = true, env = "CLI_RECIPE_APP_DIR")]
    pub app_dir: Option<PathBuf>,

    /// Never touch the network; only a previously cached source tarball can be used
    #[arg(long, global = true)]
    pub offline: bool,

    /// Set a package option, e.g. `-o use_boost=False` or `-o boost:shared=True`
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", global = true)]
    pub options: Vec<String>,

    /// Override a detected build setting, e.g. `-s build_type=Debug`
    #[arg(short = 's', long = "setting", value_name = "KEY=VALUE", global = true)]
    pub settings: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run every stage: fetch, patch, build, test, package, and optionally deploy
    Create {
        /// After packaging, deploy the package's `bin/` into this directory
        #[arg(long, value_name = "DIR")]
        deploy_to: Option<PathBuf>,

        /// Keep the work and build directories instead of removing them
        #[arg(long)]
        keep_build: bool,

        /// Rebuild even if a package with the same id already exists
        #[arg(long)]
        force: bool,
    },

    /// Fetch and patch the upstream source into a directory, without building
    Source {
        /// Directory to extract into
        #[arg(value_name = "DIR", default_value = ".")]
        dest: PathBuf,
    },

    /// Print the recipe metadata, effective options, settings and package id as JSON
    Info,

    /// Deploy the `bin/` of an existing package into a directory
    Deploy {
        /// Destination directory
        #[arg(value_name = "DIR")]
        to: PathBuf,
    },
}

impl CliArgs {
    /// Parse the process's command line.
    pub fn parse_from_cli_args() -> Self {
        Self::parse()
    }

    /// Parse from an arbitrary iterator of arguments, without the program name.
    #[cfg(test)]
    pub fn parse_from_test_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let args = std::iter::once(std::ffi::OsString::from("cli-recipe")).chain(args.into_iter().map(Into::into));
        Self::parse_from(args)
    }

    /// The effective option set: defaults with each `-o` applied in order.
    pub fn option_set(&self) -> Result<OptionSet> {
        OptionSet::from_pairs(&self.options)
    }

    /// The effective settings: detected from the host, then each `-s` applied in order.
    pub fn build_settings(&self) -> Result<BuildSettings> {
        BuildSettings::detect().with_overrides(&self.settings)
    }
}
