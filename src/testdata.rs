//! Module exposing a strongly typed interface to the test fixtures located in the `testdata`
//! directory.
//!
//! This module is only built with tests are enabled.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

const TESTDATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata");

/// A copy of an upstream source release, as it looks right after the tarball is extracted.
#[derive(Debug)]
pub(crate) struct SourceTestCase {
    /// The name of the test case, which is also the name of the directory under
    /// `testdata/sources`.
    #[allow(dead_code)]
    pub name: &'static str,

    /// The full path to the test case directory.
    ///
    /// NEVER EVER EVER MODIFY FILES HERE!  This is the canonical source of truth for the test case.
    /// Instead, use `work_dir` to get a temporary copy of the test case that tests can modify at
    /// will.
    path: PathBuf,

    /// The temp dir containing a copy of the test case.
    temp_dir: TempDir,
}

impl SourceTestCase {
    /// The `cli` v1.2.1 release layout: `cli-1.2.1/` with root and test build scripts, headers
    /// under `include/`, and a few non-header files that must never be packaged.
    pub(crate) fn cli_release() -> Self {
        Self::load("cli-release")
    }

    /// Directory that plays the role of the recipe's work directory, containing `cli-1.2.1/`.
    pub(crate) fn work_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The pristine copy in the repository, for comparisons.
    pub(crate) fn pristine_path(&self) -> &Path {
        &self.path
    }

    /// Build a gzipped tarball of the pristine test case, as GitHub would serve it.
    pub(crate) fn tarball(&self) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for entry in fs::read_dir(&self.path).unwrap() {
            let entry = entry.unwrap();
            builder
                .append_dir_all(entry.file_name(), entry.path())
                .unwrap();
        }
        let encoder = builder.into_inner().unwrap();
        encoder.finish().unwrap()
    }

    /// Load a test case from the filesystem, by name
    fn load(name: &'static str) -> Self {
        let path = Path::new(TESTDATA_DIR).join("sources").join(name);
        assert!(
            path.exists() && path.is_dir(),
            "Test case '{name}' doesn't exist: {}",
            path.display()
        );

        let temp_dir = tempfile::tempdir().unwrap();
        crate::helpers::copy_tree(&path, temp_dir.path()).unwrap();

        Self { name, path, temp_dir }
    }
}

/// Lay down a fake build output under `build_dir/bin`, including a nested `sub/tool`, which is
/// what the packaging and deploy stages disagree about.
pub(crate) fn fake_build_output(build_dir: &Path) -> Vec<PathBuf> {
    let files = [
        PathBuf::from("bin").join("complete"),
        PathBuf::from("bin").join("test_suite"),
        PathBuf::from("bin").join("sub").join("tool"),
    ];

    for rel in &files {
        let path = build_dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh\necho {}", rel.display()).unwrap();
    }

    files.to_vec()
}

/// Get the path to the test config files, used for testing various config loading scenarios.
///
/// Unlike the source fixtures, these are not copied to a temp directory.  The config load tests
/// read the files directly.
pub(crate) fn config_test_data() -> PathBuf {
    Path::new(TESTDATA_DIR).join("configs")
}
