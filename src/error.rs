use snafu::prelude::*;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    // Option and setting parsing
    #[snafu(display("Invalid option '{input}': {reason}"))]
    InvalidOption { input: String, reason: String },

    #[snafu(display("Invalid setting '{input}': {reason}"))]
    InvalidSetting { input: String, reason: String },

    #[snafu(display("Invalid version '{version}' for dependency '{name}': {source}"))]
    InvalidDependencyVersion {
        name: String,
        version: String,
        source: semver::Error,
    },

    #[snafu(display(
        "Dependency '{name}' is configured at version {found}, which does not satisfy the \
         requirement '{requirement}'"
    ))]
    DependencyVersionMismatch {
        name: String,
        requirement: String,
        found: semver::Version,
    },

    #[snafu(display("Failed to load configuration: {source}"))]
    Config {
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },

    // Source acquisition
    #[snafu(display("Failed to build HTTP client: {source}"))]
    HttpClientBuild { source: reqwest::Error },

    #[snafu(display("Failed to fetch '{url}': {source}"))]
    HttpRequest { url: String, source: reqwest::Error },

    #[snafu(display("Failed to fetch '{url}': server responded with HTTP {status}"))]
    HttpStatus { url: String, status: u16 },

    #[snafu(display("Invalid source URL '{url}': {source}"))]
    InvalidUrl { url: String, source: url::ParseError },

    #[snafu(display("Cannot fetch '{url}': network required but offline mode enabled"))]
    OfflineMode { url: String },

    #[snafu(display(
        "Checksum mismatch for '{url}': expected sha256 {expected}, got {actual}"
    ))]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[snafu(display("Failed to extract source tarball: {source}"))]
    TarExtraction { source: std::io::Error },

    #[snafu(display(
        "Source tarball did not contain the expected directory '{}'",
        expected.display()
    ))]
    ExtractedDirMissing { expected: PathBuf },

    // Source patching
    #[snafu(display(
        "Patch anchor not found in {}: expected exactly one occurrence of '{anchor}'",
        path.display()
    ))]
    PatchAnchorNotFound { path: PathBuf, anchor: String },

    #[snafu(display(
        "Patch anchor is ambiguous in {}: found {count} occurrences of '{anchor}', expected exactly one",
        path.display()
    ))]
    PatchAnchorAmbiguous {
        path: PathBuf,
        anchor: String,
        count: usize,
    },

    // External build driver
    #[snafu(display("Executable '{name}' not found in PATH"))]
    ExecutableNotFound { name: String },

    #[snafu(display("Failed to execute {}: {}", program.display(), source))]
    CommandExecution { program: PathBuf, source: std::io::Error },

    #[snafu(display(
        "CMake configure failed with exit code {}",
        exit_code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
    ))]
    ConfigureFailed { exit_code: Option<i32> },

    #[snafu(display(
        "CMake build failed with exit code {}",
        exit_code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
    ))]
    BuildFailed { exit_code: Option<i32> },

    #[snafu(display(
        "Test suite failed with exit code {}",
        exit_code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
    ))]
    TestFailed { exit_code: Option<i32> },

    // Packaging and deployment
    #[snafu(display("Expected packaging input {} does not exist", path.display()))]
    PackagingIo { path: PathBuf },

    #[snafu(display(
        "No package {package_id} for {name}/{version}; run `cli-recipe create` with the same options first"
    ))]
    PackageNotFound {
        name: String,
        version: String,
        package_id: String,
    },

    #[snafu(display("Failed to walk {}: {}", root.display(), source))]
    WalkDir { root: PathBuf, source: ignore::Error },

    #[snafu(display("Invalid file pattern '{pattern}': {source}"))]
    InvalidPattern { pattern: String, source: ignore::Error },

    #[snafu(display("Failed to copy {} to {}: {}", src.display(), dst.display(), source))]
    CopyFile {
        src: PathBuf,
        dst: PathBuf,
        source: std::io::Error,
    },

    // General
    #[snafu(display("{}: {}", path.display(), source))]
    Io { path: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to rename {} to {}: {}", src.display(), dst.display(), source))]
    RenameFile {
        src: PathBuf,
        dst: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to create temporary directory in {}: {}", parent.display(), source))]
    TempDirCreation { parent: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to write {}: {}", path.display(), source))]
    PersistFile {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("JSON serialization error: {source}"))]
    Json { source: serde_json::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
