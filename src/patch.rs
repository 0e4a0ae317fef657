//! Exact-text patches applied to the fetched source tree.
//!
//! Each patch replaces a single anchor line with replacement text.  The anchor must appear
//! exactly once, otherwise the file is left untouched and the patch fails.  A file that already
//! contains the full replacement is treated as patched and left alone, so running the source
//! stage twice over the same tree never stacks the injected lines.

use crate::{Result, error, recipe::PackageIdentity};
use snafu::ResultExt;
use std::{
    borrow::Cow,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// A single textual substitution against a file relative to the work directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePatch {
    /// Path of the file to patch, relative to the directory the tarball was extracted into
    pub file: PathBuf,
    pub anchor: Cow<'static, str>,
    pub replacement: Cow<'static, str>,
}

/// What [`SourcePatch::apply`] did to the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    AlreadyApplied,
}

impl SourcePatch {
    /// The root build script patch, which pulls the generated build info into the upstream
    /// project right after its `project()` declaration.
    pub fn build_info(identity: &PackageIdentity) -> Self {
        let anchor = format!(
            "project({} VERSION {} LANGUAGES CXX)",
            identity.name,
            identity.bare_version()
        );
        let replacement = format!(
            "{anchor}\ninclude(${{CMAKE_BINARY_DIR}}/{})\nconan_basic_setup()",
            crate::buildinfo::BUILD_INFO_FILE
        );

        Self {
            file: Path::new(&identity.source_dir_name()).join("CMakeLists.txt"),
            anchor: Cow::Owned(anchor),
            replacement: Cow::Owned(replacement),
        }
    }

    /// The test build script patch that stops the test suite from asking for a dynamically
    /// linked Boost.Test.  Needed whenever Boost is linked statically.
    pub fn static_boost_test(identity: &PackageIdentity) -> Self {
        const DYN_LINK: &str = r#"target_compile_definitions(test_suite PRIVATE "BOOST_TEST_DYN_LINK=1")"#;

        Self {
            file: Path::new(&identity.source_dir_name())
                .join("test")
                .join("CMakeLists.txt"),
            anchor: Cow::Borrowed(DYN_LINK),
            replacement: Cow::Owned(format!("#{DYN_LINK}")),
        }
    }

    /// Apply this patch to the tree rooted at `work_dir`.
    ///
    /// The write is atomic: the patched contents go to a temporary file in the same directory
    /// which then replaces the original.
    pub fn apply(&self, work_dir: &Path) -> Result<PatchOutcome> {
        let path = work_dir.join(&self.file);
        let contents = fs::read_to_string(&path).with_context(|_| error::IoSnafu { path: path.clone() })?;

        let patched = match self.patch_text(&contents, &path)? {
            Some(patched) => patched,
            None => {
                tracing::info!("Patch already present in {}; leaving it alone", path.display());
                return Ok(PatchOutcome::AlreadyApplied);
            }
        };

        let parent = path
            .parent()
            .unwrap_or_else(|| panic!("BUG: patch target {} has no parent", path.display()));
        let mut temp = tempfile::NamedTempFile::new_in(parent).with_context(|_| error::IoSnafu {
            path: parent.to_path_buf(),
        })?;
        temp.write_all(patched.as_bytes())
            .with_context(|_| error::IoSnafu {
                path: temp.path().to_path_buf(),
            })?;
        temp.persist(&path)
            .with_context(|_| error::PersistFileSnafu { path: path.clone() })?;

        tracing::debug!("Patched {}", path.display());
        Ok(PatchOutcome::Applied)
    }

    /// Compute the patched text, or `None` if `contents` already carries the replacement.
    fn patch_text(&self, contents: &str, path: &Path) -> Result<Option<String>> {
        if contents.contains(self.replacement.as_ref()) {
            return Ok(None);
        }

        match contents.matches(self.anchor.as_ref()).count() {
            0 => error::PatchAnchorNotFoundSnafu {
                path,
                anchor: self.anchor.as_ref(),
            }
            .fail(),
            1 => Ok(Some(contents.replacen(
                self.anchor.as_ref(),
                self.replacement.as_ref(),
                1,
            ))),
            count => error::PatchAnchorAmbiguousSnafu {
                path,
                anchor: self.anchor.as_ref(),
                count,
            }
            .fail(),
        }
    }
}
