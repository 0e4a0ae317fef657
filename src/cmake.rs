//! Driving the upstream CMake build.
//!
//! [`BuildSystem`] is the seam between the orchestrator and the external toolchain.  The real
//! implementation shells out to `cmake` and `ctest`; tests substitute a recorder.

use crate::{Result, config::Config, error, recipe::BuildDefinitions};
use snafu::{OptionExt, ResultExt};
use std::{
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

/// Configure, build and test operations against an out-of-source build directory.
pub trait BuildSystem: std::fmt::Debug {
    /// Generate the build system for `source_dir` in `build_dir` with the given definitions.
    fn configure(&self, source_dir: &Path, build_dir: &Path, definitions: &BuildDefinitions) -> Result<()>;

    /// Build every target of a configured build directory.
    fn build(&self, build_dir: &Path, build_type: &str) -> Result<()>;

    /// Run the test suite of a built build directory.
    fn test(&self, build_dir: &Path, build_type: &str) -> Result<()>;
}

/// Create the default [`BuildSystem`], which runs the `cmake` and `ctest` executables.
///
/// Executables are located lazily, so a header-only package never needs CMake installed.
pub fn create_build_system(config: &Config) -> impl BuildSystem + use<> {
    CMakeBuildSystem {
        cmake: config.cmake.clone(),
        ctest: config.ctest.clone(),
    }
}

#[derive(Clone, Debug)]
struct CMakeBuildSystem {
    cmake: Option<PathBuf>,
    ctest: Option<PathBuf>,
}

impl CMakeBuildSystem {
    fn cmake_path(&self) -> Result<PathBuf> {
        match &self.cmake {
            Some(path) => Ok(path.clone()),
            None => find_executable("cmake"),
        }
    }

    /// `ctest` ships next to `cmake`, so prefer the sibling of whichever `cmake` is in use.
    fn ctest_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.ctest {
            return Ok(path.clone());
        }

        if let Ok(cmake) = self.cmake_path() {
            let sibling = cmake.with_file_name(format!("ctest{}", std::env::consts::EXE_SUFFIX));
            if sibling.is_file() {
                return Ok(sibling);
            }
        }

        find_executable("ctest")
    }
}

impl BuildSystem for CMakeBuildSystem {
    fn configure(&self, source_dir: &Path, build_dir: &Path, definitions: &BuildDefinitions) -> Result<()> {
        let mut cmd = Command::new(self.cmake_path()?);
        cmd.arg("-S")
            .arg(source_dir)
            .arg("-B")
            .arg(build_dir)
            .args(definitions.to_args());

        let status = run(&mut cmd)?;
        if !status.success() {
            return error::ConfigureFailedSnafu {
                exit_code: status.code(),
            }
            .fail();
        }
        Ok(())
    }

    fn build(&self, build_dir: &Path, build_type: &str) -> Result<()> {
        let mut cmd = Command::new(self.cmake_path()?);
        cmd.arg("--build")
            .arg(build_dir)
            .args(["--config", build_type]);

        let status = run(&mut cmd)?;
        if !status.success() {
            return error::BuildFailedSnafu {
                exit_code: status.code(),
            }
            .fail();
        }
        Ok(())
    }

    fn test(&self, build_dir: &Path, build_type: &str) -> Result<()> {
        let mut cmd = Command::new(self.ctest_path()?);
        cmd.current_dir(build_dir)
            .args(["-C", build_type, "--output-on-failure"]);

        let status = run(&mut cmd)?;
        if !status.success() {
            return error::TestFailedSnafu {
                exit_code: status.code(),
            }
            .fail();
        }
        Ok(())
    }
}

/// Run a command to completion.
///
/// The child's stdout is sent to our stderr, keeping our own stdout free for command results.
fn run(cmd: &mut Command) -> Result<ExitStatus> {
    let program = PathBuf::from(cmd.get_program());
    tracing::info!(
        "Running {} {}",
        program.display(),
        cmd.get_args()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(std::io::stderr()))
        .status()
        .with_context(|_| error::CommandExecutionSnafu { program })
}

/// Find an executable on the `PATH`.
fn find_executable(name: &str) -> Result<PathBuf> {
    which::which(name)
        .ok()
        .context(error::ExecutableNotFoundSnafu { name })
}
