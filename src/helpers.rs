use crate::{Result, error};
use snafu::ResultExt;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// List every regular file under `root` whose path relative to `root` matches one of `patterns`.
///
/// Patterns use gitignore glob syntax, so a pattern without a slash (e.g. `*.h`) matches at any
/// depth.  Hidden files and files excluded by any `.gitignore` in the tree are still listed;
/// none of the usual ignore filters apply.
///
/// Returned paths are relative to `root` and sorted.
pub(crate) fn matching_files(root: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>> {
    use ignore::{WalkBuilder, overrides::OverrideBuilder};

    let mut overrides = OverrideBuilder::new(root);
    for pattern in patterns {
        overrides
            .add(pattern)
            .with_context(|_| error::InvalidPatternSnafu { pattern: *pattern })?;
    }
    let overrides = overrides.build().with_context(|_| error::InvalidPatternSnafu {
        pattern: patterns.join(","),
    })?;

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .overrides(overrides)
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = result.with_context(|_| error::WalkDirSnafu {
            root: root.to_path_buf(),
        })?;

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or_else(|_| panic!("BUG: walked path {} escaped its root", entry.path().display()));
        files.push(rel_path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Copy every file under `src` to `dst`, preserving directory structure.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<Vec<PathBuf>> {
    let files = matching_files(src, &[])?;
    for rel_path in &files {
        copy_file(&src.join(rel_path), &dst.join(rel_path))?;
    }
    Ok(files)
}

/// Copy a single file, creating the destination's parent directories as needed.
pub(crate) fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).with_context(|_| error::IoSnafu {
            path: parent.to_path_buf(),
        })?;
    }

    fs::copy(src, dst).with_context(|_| error::CopyFileSnafu {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
    })?;

    Ok(())
}
