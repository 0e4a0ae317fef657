//! Staging build results into the package layout, and deploying a package's binaries.
//!
//! The two copies of `bin/` differ on purpose: packaging flattens it, deployment keeps its
//! structure.

use crate::{Result, error, helpers};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Files from the source tree that are part of the package.
pub const HEADER_PATTERNS: &[&str] = &["*.h"];

/// Directory, in the build dir and in the package, holding executables.
pub const BIN_DIR: &str = "bin";

/// What ended up in a package, as paths relative to the package root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PackageManifest {
    pub headers: Vec<PathBuf>,
    pub binaries: Vec<PathBuf>,
}

/// Stage a package into `package_dir`.
///
/// - Every `*.h` under `source_dir` is copied with its path relative to `source_dir` preserved.
/// - Every file under `build_dir/bin` is copied directly into `package_dir/bin`, discarding any
///   subdirectories.  When two files flatten to the same name, the later one in path order wins
///   and a warning is logged.
///
/// A header-only package may have no `bin` directory at all; for any other package its absence
/// means the build did not produce what was expected, which is an error.
pub fn package(source_dir: &Path, build_dir: &Path, package_dir: &Path, header_only: bool) -> Result<PackageManifest> {
    if !source_dir.is_dir() {
        return error::PackagingIoSnafu { path: source_dir }.fail();
    }

    let headers = helpers::matching_files(source_dir, HEADER_PATTERNS)?;
    for rel_path in &headers {
        helpers::copy_file(&source_dir.join(rel_path), &package_dir.join(rel_path))?;
    }
    tracing::debug!("Packaged {} headers from {}", headers.len(), source_dir.display());

    let bin_dir = build_dir.join(BIN_DIR);
    let binaries = if bin_dir.is_dir() {
        package_binaries(&bin_dir, &package_dir.join(BIN_DIR))?
    } else if header_only {
        tracing::debug!("No {} for header-only package; skipping binaries", bin_dir.display());
        Vec::new()
    } else {
        return error::PackagingIoSnafu { path: bin_dir }.fail();
    };

    Ok(PackageManifest { headers, binaries })
}

fn package_binaries(bin_dir: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut flattened: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

    for rel_path in helpers::matching_files(bin_dir, &[])? {
        let Some(file_name) = rel_path.file_name() else {
            continue;
        };
        let dest_rel = Path::new(BIN_DIR).join(file_name);

        if let Some(previous) = flattened.insert(dest_rel.clone(), rel_path.clone()) {
            tracing::warn!(
                "{} and {} both flatten to {}; keeping {}",
                previous.display(),
                rel_path.display(),
                dest_rel.display(),
                rel_path.display()
            );
        }
    }

    for (dest_rel, rel_path) in &flattened {
        let file_name = dest_rel.file_name().expect("BUG: flattened path has no file name");
        helpers::copy_file(&bin_dir.join(rel_path), &dest_dir.join(file_name))?;
    }

    Ok(flattened.into_keys().collect())
}

/// Copy `package_dir/bin` into `deploy_dir/bin`, preserving its directory structure.
///
/// Returns the deployed files, relative to `deploy_dir`.  A package without a `bin` directory
/// deploys nothing.
pub fn deploy(package_dir: &Path, deploy_dir: &Path) -> Result<Vec<PathBuf>> {
    let src = package_dir.join(BIN_DIR);
    if !src.is_dir() {
        tracing::info!("Package at {} has no binaries to deploy", package_dir.display());
        return Ok(Vec::new());
    }

    let copied = helpers::copy_tree(&src, &deploy_dir.join(BIN_DIR))?;
    tracing::info!("Deployed {} files to {}", copied.len(), deploy_dir.join(BIN_DIR).display());

    Ok(copied.into_iter().map(|p| Path::new(BIN_DIR).join(p)).collect())
}
