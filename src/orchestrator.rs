//! The recipe lifecycle: fetch, patch, configure, build, test, package, deploy.
//!
//! Every stage runs in order and any failure aborts the run.  Work happens in a throwaway
//! directory under [`Config::build_dir`]; only the finished package is kept.

use crate::{
    Result,
    buildinfo::{BuildInfo, ResolvedDependency},
    cache::PackageStore,
    cmake::{self, BuildSystem},
    config::{Config, DependencyConfig},
    downloader::{self, SourceFetcher},
    error,
    packager::{self, PackageManifest},
    patch::SourcePatch,
    recipe::{self, BuildDefinitions, BuildSettings, CLI_PACKAGE, OptionSet, PackageId, PackageIdentity},
};
use serde::Serialize;
use snafu::ResultExt;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Lifecycle stages, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Patch,
    Configure,
    Build,
    Test,
    Package,
    Deploy,
}

/// Caller's choices for a `create` run.
#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    /// Deploy the package's binaries here after packaging
    pub deploy_to: Option<PathBuf>,

    /// Keep the work directory instead of deleting it
    pub keep_build: bool,

    /// Rebuild even when the package already exists
    pub force: bool,
}

/// What a `create` run did.
#[derive(Clone, Debug, Serialize)]
pub struct CreateOutcome {
    pub package_id: PackageId,
    pub package_path: PathBuf,

    /// Stages that actually ran.  Empty apart from deploy when the package already existed.
    pub stages: Vec<Stage>,

    /// Contents of the package, if it was staged by this run
    pub manifest: Option<PackageManifest>,

    /// Deployed files, relative to the deploy directory
    pub deployed: Vec<PathBuf>,

    /// The work directory, if it was kept
    pub work_dir: Option<PathBuf>,
}

/// Everything there is to know about the recipe under the current options and settings.
#[derive(Clone, Debug, Serialize)]
pub struct RecipeInfo {
    #[serde(flatten)]
    pub identity: PackageIdentity,
    pub options: OptionSet,
    pub settings: BuildSettings,
    pub header_only: bool,
    pub package_id: String,
    pub requires: Vec<String>,
    pub definitions: Vec<String>,
    pub run_tests: bool,
}

/// Runs the recipe for one option set and one set of build settings.
#[derive(Debug)]
pub struct Orchestrator {
    config: Config,
    identity: PackageIdentity,
    options: OptionSet,
    settings: BuildSettings,
    fetcher: Box<dyn SourceFetcher>,
    build_system: Box<dyn BuildSystem>,
    store: PackageStore,
}

impl Orchestrator {
    /// Create an orchestrator using the real downloader and CMake.
    pub fn new(config: Config, options: OptionSet, settings: BuildSettings) -> Result<Self> {
        let fetcher = downloader::create_fetcher(config.clone())?;
        let build_system = cmake::create_build_system(&config);

        Ok(Self::with_collaborators(
            config,
            options,
            settings,
            Box::new(fetcher),
            Box::new(build_system),
        ))
    }

    /// Create an orchestrator with explicit fetcher and build system implementations.
    pub fn with_collaborators(
        config: Config,
        options: OptionSet,
        settings: BuildSettings,
        fetcher: Box<dyn SourceFetcher>,
        build_system: Box<dyn BuildSystem>,
    ) -> Self {
        let store = PackageStore::new(&config);
        Self {
            config,
            identity: CLI_PACKAGE,
            options,
            settings,
            fetcher,
            build_system,
            store,
        }
    }

    pub fn package_id(&self) -> Result<PackageId> {
        recipe::package_id(&self.identity, &self.options, &self.settings)
    }

    /// CMake definitions for the build, or `None` for a header-only package, which is never
    /// built.
    pub fn definitions(&self) -> Option<BuildDefinitions> {
        (!self.options.is_header_only()).then(|| BuildDefinitions::for_build(&self.settings, self.config.run_tests))
    }

    pub fn info(&self) -> Result<RecipeInfo> {
        Ok(RecipeInfo {
            identity: self.identity.clone(),
            options: self.options,
            settings: self.settings.clone(),
            header_only: self.options.is_header_only(),
            package_id: self.package_id()?.id,
            requires: recipe::requirements(&self.options)
                .iter()
                .map(ToString::to_string)
                .collect(),
            definitions: self.definitions().map(|d| d.to_args()).unwrap_or_default(),
            run_tests: self.config.run_tests,
        })
    }

    /// Fetch the source into `dest` and apply the source patches, without building.
    ///
    /// Returns the extracted source directory.
    pub fn source(&self, dest: &Path) -> Result<PathBuf> {
        let source_dir = self.fetcher.fetch(&self.identity, dest)?;
        self.apply(&SourcePatch::build_info(&self.identity), dest)?;
        Ok(source_dir)
    }

    /// Run the whole lifecycle, reusing an existing package unless `force` is set.
    pub fn create(&self, opts: &CreateOptions) -> Result<CreateOutcome> {
        let package_id = self.package_id()?;
        let mut stages = Vec::new();
        let mut manifest = None;
        let mut work_dir = None;

        tracing::info!(
            "Creating {}/{} (package id {package_id}, header_only={})",
            self.identity.name,
            self.identity.version,
            package_id.header_only
        );

        let (package_path, _staged) =
            self.store
                .get_or_package(&self.identity, &package_id, opts.force, |staging_dir| {
                    let work = self.work_dir()?;
                    let result = self.build_package(work.path(), staging_dir, &mut stages);

                    // Kept even when a stage failed, since that is when it is most useful
                    if opts.keep_build {
                        let kept = work.keep();
                        tracing::info!("Keeping work directory {}", kept.display());
                        work_dir = Some(kept);
                    }

                    manifest = Some(result?);
                    Ok(())
                })?;

        let deployed = match &opts.deploy_to {
            Some(deploy_dir) => {
                let deployed = packager::deploy(&package_path, deploy_dir)?;
                stages.push(Stage::Deploy);
                deployed
            }
            None => Vec::new(),
        };

        Ok(CreateOutcome {
            package_id,
            package_path,
            stages,
            manifest,
            deployed,
            work_dir,
        })
    }

    /// Deploy the binaries of an existing package for the current options and settings.
    pub fn deploy(&self, deploy_dir: &Path) -> Result<Vec<PathBuf>> {
        let package_id = self.package_id()?;
        let Some(package_path) = self.store.get(&self.identity, &package_id) else {
            return error::PackageNotFoundSnafu {
                name: self.identity.name,
                version: self.identity.version,
                package_id: package_id.id,
            }
            .fail();
        };

        packager::deploy(&package_path, deploy_dir)
    }

    fn work_dir(&self) -> Result<tempfile::TempDir> {
        let build_root = &self.config.build_dir;
        fs::create_dir_all(build_root).with_context(|_| error::IoSnafu {
            path: build_root.clone(),
        })?;

        tempfile::Builder::new()
            .prefix(&format!("{}-", self.identity.source_dir_name()))
            .tempdir_in(build_root)
            .with_context(|_| error::TempDirCreationSnafu {
                parent: build_root.clone(),
            })
    }

    /// Fetch through package, staging into `package_dir`.
    fn build_package(&self, work: &Path, package_dir: &Path, stages: &mut Vec<Stage>) -> Result<PackageManifest> {
        let source_dir = self.fetcher.fetch(&self.identity, work)?;
        stages.push(Stage::Fetch);

        self.apply(&SourcePatch::build_info(&self.identity), work)?;

        let build_dir = work.join("build");

        if self.options.is_header_only() {
            stages.push(Stage::Patch);
            tracing::info!("Header-only package; skipping configure, build and test");
        } else {
            if !self.options.boost_shared {
                self.apply(&SourcePatch::static_boost_test(&self.identity), work)?;
            }
            stages.push(Stage::Patch);

            self.write_build_info(&build_dir)?;

            let definitions = BuildDefinitions::for_build(&self.settings, self.config.run_tests);

            self.build_system
                .configure(&source_dir, &build_dir, &definitions)?;
            stages.push(Stage::Configure);

            self.build_system
                .build(&build_dir, &self.settings.build_type)?;
            stages.push(Stage::Build);

            if definitions.builds_tests() {
                self.build_system
                    .test(&build_dir, &self.settings.build_type)?;
                stages.push(Stage::Test);
            } else {
                tracing::info!("Tests disabled; skipping test stage");
            }
        }

        let manifest = packager::package(&source_dir, &build_dir, package_dir, self.options.is_header_only())?;
        stages.push(Stage::Package);

        tracing::info!(
            "Packaged {} headers and {} binaries",
            manifest.headers.len(),
            manifest.binaries.len()
        );
        Ok(manifest)
    }

    fn apply(&self, patch: &SourcePatch, work: &Path) -> Result<()> {
        let outcome = patch.apply(work)?;
        tracing::debug!("Patch of {}: {outcome:?}", patch.file.display());
        Ok(())
    }

    fn write_build_info(&self, build_dir: &Path) -> Result<PathBuf> {
        let dependencies = recipe::requirements(&self.options)
            .iter()
            .map(|decl| {
                let local = match decl.name {
                    "boost" => self.config.boost.clone(),
                    _ => DependencyConfig::default(),
                };
                ResolvedDependency::resolve(decl, &local, self.options.boost_shared)
            })
            .collect::<Result<Vec<_>>>()?;

        BuildInfo {
            settings: &self.settings,
            options: &self.options,
            dependencies: &dependencies,
        }
        .write(build_dir)
    }
}
