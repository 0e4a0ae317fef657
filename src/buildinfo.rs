//! Generation of the `conanbuildinfo.cmake` script that the patched upstream build includes.
//!
//! The script defines a `conan_basic_setup()` macro which sends every runtime artifact to
//! `${CMAKE_BINARY_DIR}/bin` (the directory the packaging stage later collects) and points CMake
//! at whichever dependencies were resolved for this build.

use crate::{
    Result,
    config::DependencyConfig,
    error,
    recipe::{BuildSettings, DependencyDeclaration, OptionSet},
};
use semver::Version;
use snafu::ResultExt;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

/// File name the root build script patch includes from the build directory.
pub const BUILD_INFO_FILE: &str = "conanbuildinfo.cmake";

/// A [`DependencyDeclaration`] matched up with what is actually installed on this machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub name: String,

    /// The installed version, if configured.  When absent, CMake's own package search decides.
    pub version: Option<Version>,

    /// Installation prefix, if configured.
    pub root: Option<PathBuf>,

    pub shared: bool,
}

impl ResolvedDependency {
    /// Resolve `decl` against the local configuration for that dependency.
    ///
    /// A configured version must satisfy the declaration's requirement.  Boost versions are
    /// sometimes written without a patch component (`1.83`), which is accepted as `1.83.0`.
    pub fn resolve(decl: &DependencyDeclaration, config: &DependencyConfig, shared: bool) -> Result<Self> {
        let version = match &config.version {
            Some(raw) => {
                let normalized = if raw.matches('.').count() == 1 {
                    format!("{raw}.0")
                } else {
                    raw.clone()
                };
                let version = Version::parse(&normalized).with_context(|_| error::InvalidDependencyVersionSnafu {
                    name: decl.name,
                    version: raw.clone(),
                })?;

                if !decl.requirement.matches(&version) {
                    return error::DependencyVersionMismatchSnafu {
                        name: decl.name,
                        requirement: decl.requirement.to_string(),
                        found: version,
                    }
                    .fail();
                }

                Some(version)
            }
            None => None,
        };

        Ok(Self {
            name: decl.name.to_string(),
            version,
            root: config.root.clone(),
            shared,
        })
    }
}

/// Everything the generated script needs to know.
#[derive(Clone, Debug)]
pub struct BuildInfo<'a> {
    pub settings: &'a BuildSettings,
    pub options: &'a OptionSet,
    pub dependencies: &'a [ResolvedDependency],
}

/// Renders the CMake script.
impl fmt::Display for BuildInfo<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(out, "# Generated by cli-recipe {}. Do not edit.", env!("CARGO_PKG_VERSION"))?;
        writeln!(out)?;
        writeln!(out, "set(CONAN_SETTINGS_OS \"{}\")", self.settings.os)?;
        writeln!(out, "set(CONAN_SETTINGS_COMPILER \"{}\")", self.settings.compiler)?;
        writeln!(out, "set(CONAN_SETTINGS_ARCH \"{}\")", self.settings.arch)?;
        writeln!(out, "set(CONAN_SETTINGS_BUILD_TYPE \"{}\")", self.settings.build_type)?;

        let names: Vec<_> = self.dependencies.iter().map(|d| d.name.as_str()).collect();
        writeln!(out, "set(CONAN_DEPENDENCIES {})", names.join(" "))?;

        for dep in self.dependencies {
            let upper = dep.name.to_ascii_uppercase();
            writeln!(out)?;
            if let Some(version) = &dep.version {
                writeln!(out, "set(CONAN_{upper}_VERSION \"{version}\")")?;
            }
            if let Some(root) = &dep.root {
                let root = cmake_path(root);
                writeln!(out, "set(CONAN_{upper}_ROOT \"{root}\")")?;
                writeln!(out, "set(CONAN_INCLUDE_DIRS_{upper} \"{root}/include\")")?;
                writeln!(out, "set(CONAN_LIB_DIRS_{upper} \"{root}/lib\")")?;
            }
        }

        writeln!(out)?;
        writeln!(out, "macro(conan_basic_setup)")?;
        writeln!(out, "    set(CMAKE_RUNTIME_OUTPUT_DIRECTORY ${{CMAKE_BINARY_DIR}}/bin)")?;
        writeln!(out, "    set(CMAKE_ARCHIVE_OUTPUT_DIRECTORY ${{CMAKE_BINARY_DIR}}/lib)")?;
        writeln!(out, "    set(CMAKE_LIBRARY_OUTPUT_DIRECTORY ${{CMAKE_BINARY_DIR}}/lib)")?;
        writeln!(out, "    foreach(_conan_config DEBUG RELEASE RELWITHDEBINFO MINSIZEREL)")?;
        writeln!(
            out,
            "        set(CMAKE_RUNTIME_OUTPUT_DIRECTORY_${{_conan_config}} ${{CMAKE_BINARY_DIR}}/bin)"
        )?;
        writeln!(out, "    endforeach()")?;

        for dep in self.dependencies {
            let upper = dep.name.to_ascii_uppercase();
            if dep.root.is_some() {
                writeln!(out, "    include_directories(${{CONAN_INCLUDE_DIRS_{upper}}})")?;
                writeln!(out, "    link_directories(${{CONAN_LIB_DIRS_{upper}}})")?;
                writeln!(out, "    set({upper}_ROOT ${{CONAN_{upper}_ROOT}})")?;
            }
            if dep.name == "boost" {
                let static_libs = if dep.shared { "OFF" } else { "ON" };
                writeln!(out, "    set(Boost_USE_STATIC_LIBS {static_libs})")?;
            }
        }

        writeln!(out, "endmacro()")
    }
}

impl BuildInfo<'_> {
    /// Render and write the script into `build_dir`, returning its path.
    pub fn write(&self, build_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(build_dir).with_context(|_| error::IoSnafu {
            path: build_dir.to_path_buf(),
        })?;

        let path = build_dir.join(BUILD_INFO_FILE);
        fs::write(&path, self.to_string()).with_context(|_| error::IoSnafu { path: path.clone() })?;

        tracing::debug!(
            "Wrote build info for {} dependencies (use_boost={}) to {}",
            self.dependencies.len(),
            self.options.use_boost,
            path.display()
        );
        Ok(path)
    }
}

/// CMake wants forward slashes, even on Windows.
fn cmake_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}
