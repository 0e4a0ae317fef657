use crate::{
    Result,
    config::Config,
    error,
    recipe::{PackageId, PackageIdentity},
};
use snafu::ResultExt;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// On-disk store of finished packages.
///
/// Packages live at `<package_dir>/<name>-<version>/<package_id>/`.  A package directory only
/// ever appears there fully staged: it is assembled in a temp dir next to its final location and
/// renamed into place, so an interrupted run leaves nothing that looks like a package.
#[derive(Clone, Debug)]
pub struct PackageStore {
    root: PathBuf,
}

impl PackageStore {
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.package_dir.clone(),
        }
    }

    /// Where the package with this id lives, whether or not it exists yet.
    pub fn package_path(&self, identity: &PackageIdentity, package_id: &PackageId) -> PathBuf {
        self.root
            .join(identity.source_dir_name())
            .join(&package_id.id)
    }

    /// The path of an existing package, if there is one.
    pub fn get(&self, identity: &PackageIdentity, package_id: &PackageId) -> Option<PathBuf> {
        let path = self.package_path(identity, package_id);
        path.is_dir().then_some(path)
    }

    /// Get an existing package, or stage a new one with `stage`.
    ///
    /// `stage` receives an empty directory to fill.  If it fails, nothing is stored.  With
    /// `force`, an existing package is replaced by a freshly staged one.
    ///
    /// Returns the package path and whether `stage` ran.
    pub fn get_or_package<F>(
        &self,
        identity: &PackageIdentity,
        package_id: &PackageId,
        force: bool,
        stage: F,
    ) -> Result<(PathBuf, bool)>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let package_path = self.package_path(identity, package_id);

        if !force && package_path.is_dir() {
            tracing::info!("Package {package_id} already exists at {}", package_path.display());
            return Ok((package_path, false));
        }

        let parent = package_path.parent().expect("BUG: Package path has no parent");
        fs::create_dir_all(parent).with_context(|_| error::IoSnafu {
            path: parent.to_path_buf(),
        })?;

        let temp_dir = tempfile::tempdir_in(parent).with_context(|_| error::TempDirCreationSnafu {
            parent: parent.to_path_buf(),
        })?;

        stage(temp_dir.path())?;

        if force && package_path.is_dir() {
            tracing::debug!("Replacing existing package at {}", package_path.display());
            fs::remove_dir_all(&package_path).with_context(|_| error::IoSnafu {
                path: package_path.clone(),
            })?;
        }

        let temp_path = temp_dir.keep();

        match fs::rename(&temp_path, &package_path) {
            Ok(()) => Ok((package_path, true)),
            Err(e) if package_path.is_dir() => {
                // Another run staged the same package first.  Same id means same contents.
                tracing::debug!("Package appeared concurrently ({e}); using the existing one");
                let _ = fs::remove_dir_all(&temp_path);
                Ok((package_path, true))
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&temp_path);
                Err(e).with_context(|_| error::RenameFileSnafu {
                    src: temp_path.clone(),
                    dst: package_path.clone(),
                })
            }
        }
    }
}
