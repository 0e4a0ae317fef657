//! Utility functions to help run our CLI as part of a test
use assert_cmd::Command;
use assert_fs::TempDir;
use std::path::{Path, PathBuf};

/// Fixture release, laid out the way the upstream tarball extracts.
const SOURCE_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/sources/cli-release");

pub(crate) struct TestFs {
    pub(crate) app_root: TempDir,
    pub(crate) system_root: TempDir,
    pub(crate) cwd: TempDir,
}

impl TestFs {
    fn new() -> Self {
        let system_root = TempDir::with_prefix("cli-recipe-sys-").unwrap();
        let app_root = TempDir::with_prefix("cli-recipe-app-").unwrap();
        let cwd = TempDir::with_prefix("cli-recipe-cwd-").unwrap();

        Self {
            app_root,
            system_root,
            cwd,
        }
    }
}

/// Represents the `cli-recipe` binary for use in tests.
pub(crate) struct CliRecipe {
    pub(crate) cmd: Command,
    pub(crate) test_fs: Option<TestFs>,
    pub(crate) source_tarball: Option<PathBuf>,
}

impl CliRecipe {
    /// Creates a new `CliRecipe` that locates the bin
    pub(crate) fn find() -> Self {
        let mut cmd = Command::cargo_bin("cli-recipe").expect("Failed to find cli-recipe binary");

        // Tests must not pick up the caller's settings
        for var in ["CONAN_RUN_TESTS", "CLI_RECIPE_LOG", "RUST_LOG", "CLI_RECIPE_SOURCE_URL"] {
            cmd.env_remove(var);
        }

        Self {
            cmd,
            test_fs: None,
            source_tarball: None,
        }
    }

    /// Start over with a fresh command, keeping the same isolated filesystem.
    ///
    /// The source URL set by [`Self::with_local_source`] is carried over too.
    pub(crate) fn reset(self) -> Self {
        let mut me = Self::find();

        if let Some(tarball) = self.source_tarball {
            me.set_source_tarball(tarball);
        }

        if let Some(test_fs) = self.test_fs {
            me.set_test_env(test_fs);
        }

        me
    }

    /// Construct an isolated filesystem structure for running the command, so that config files
    /// and caches on the host are never used.
    pub(crate) fn with_test_fs() -> Self {
        let mut me = Self::find();
        let test_fs = TestFs::new();
        me.set_test_env(test_fs);
        me
    }

    /// Like [`Self::with_test_fs`], with the source URL pointed at a tarball of the fixture
    /// release so nothing is downloaded.
    pub(crate) fn with_local_source() -> Self {
        let mut me = Self::with_test_fs();
        let tarball = write_fixture_tarball(me.test_fs().system_root.path());
        me.set_source_tarball(tarball);
        me
    }

    fn set_source_tarball(&mut self, tarball: PathBuf) {
        self.cmd.env("CLI_RECIPE_SOURCE_URL", &tarball);
        self.source_tarball = Some(tarball);
    }

    pub(crate) fn test_fs(&self) -> &TestFs {
        self.test_fs.as_ref().expect("test_fs not set")
    }

    pub(crate) fn test_fs_app_root(&self) -> &TempDir {
        &self.test_fs().app_root
    }

    fn set_test_env(&mut self, test_fs: TestFs) {
        self.cmd
            .arg("--system-config-dir")
            .arg(test_fs.system_root.path());
        self.cmd.arg("--app-dir").arg(test_fs.app_root.path());
        self.cmd.current_dir(test_fs.cwd.path());

        self.test_fs = Some(test_fs);
    }
}

/// Write a gzipped tarball of the fixture release into `dir`, returning its path.
pub(crate) fn write_fixture_tarball(dir: &Path) -> PathBuf {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all("cli-1.2.1", Path::new(SOURCE_FIXTURE).join("cli-1.2.1"))
        .unwrap();
    let bytes = builder.into_inner().unwrap().finish().unwrap();

    let path = dir.join("cli-v1.2.1.tar.gz");
    std::fs::write(&path, bytes).unwrap();
    path
}
