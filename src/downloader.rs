use crate::{Result, config::Config, error, recipe::PackageIdentity};
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use snafu::{IntoError, ResultExt};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// Timeout for establishing a connection, separate from the configurable per-request timeout.
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Abstract interface for acquiring the upstream source tree.
///
/// The trait abstraction allows the orchestrator to be tested without a network, and alternative
/// implementations (e.g., pre-extracted trees) to be plugged in.
pub trait SourceFetcher: std::fmt::Debug {
    /// Fetch the release tarball for `identity` and extract it into `work_dir`.
    ///
    /// Returns the path of the extracted source directory, `work_dir/<name>-<version>`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The download fails or the server returns a non-success status
    /// - A checksum is configured and the tarball does not match it
    /// - Offline mode is enabled and the tarball is not already cached
    /// - The tarball does not extract to the expected directory
    fn fetch(&self, identity: &PackageIdentity, work_dir: &Path) -> Result<PathBuf>;
}

/// Create the default [`SourceFetcher`], which downloads over HTTP(S) or reads local files and
/// keeps a copy of each tarball in the cache directory.
pub fn create_fetcher(config: Config) -> Result<impl SourceFetcher> {
    TarballFetcher::new(config)
}

/// Where a tarball comes from, after interpreting the configured URL.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TarballLocation {
    Remote(url::Url),
    Local(PathBuf),
}

impl TarballLocation {
    /// Interpret `source` as either a remote URL or a local file.
    ///
    /// `file://` URLs and anything that is not an `http`/`https` URL are read from disk.
    fn parse(source: &str) -> Result<Self> {
        match url::Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            Ok(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|()| {
                    error::InvalidUrlSnafu { url: source }.into_error(url::ParseError::RelativeUrlWithoutBase)
                })?;
                Ok(Self::Local(path))
            }
            _ => Ok(Self::Local(PathBuf::from(source))),
        }
    }
}

#[derive(Debug, Clone)]
struct TarballFetcher {
    client: Client,
    config: Config,
}

impl TarballFetcher {
    fn new(config: Config) -> Result<Self> {
        let user_agent = format!(
            "cli-recipe/{} ({})",
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_REPOSITORY")
        );

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.http_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context(error::HttpClientBuildSnafu)?;

        Ok(Self { client, config })
    }

    fn source_url<'a>(&'a self, identity: &'a PackageIdentity) -> &'a str {
        self.config.source_url.as_deref().unwrap_or(identity.source_url)
    }

    /// Path of the cached copy of the tarball from `source`.
    ///
    /// The URL is part of the key, so pointing at a mirror never picks up a tarball that was
    /// downloaded from somewhere else.
    fn cache_path(&self, identity: &PackageIdentity, source: &str) -> PathBuf {
        let url_hash = format!("{:x}", Sha256::digest(source.as_bytes()));
        self.config.cache_dir.join("tarballs").join(format!(
            "{}-{}-{}.tar.gz",
            identity.name,
            identity.tag,
            &url_hash[..16]
        ))
    }

    /// Get the tarball bytes.
    ///
    /// Remote tarballs are cached and served from the cache afterwards.  Local files are read
    /// fresh every time, so replacing one is picked up by the next run.
    fn tarball(&self, identity: &PackageIdentity) -> Result<Vec<u8>> {
        let source = self.source_url(identity);

        let url = match TarballLocation::parse(source)? {
            TarballLocation::Local(path) => {
                tracing::info!("Reading source tarball from {}", path.display());
                let bytes = fs::read(&path).with_context(|_| error::IoSnafu { path: path.clone() })?;
                self.verify(source, &bytes)?;
                return Ok(bytes);
            }
            TarballLocation::Remote(url) => url,
        };

        let cache_path = self.cache_path(identity, source);

        if cache_path.exists() {
            tracing::debug!("Using cached tarball {}", cache_path.display());
            let bytes = fs::read(&cache_path).with_context(|_| error::IoSnafu {
                path: cache_path.clone(),
            })?;

            if let Err(e) = self.verify(source, &bytes) {
                // Drop the bad copy so that the next run downloads a fresh one
                tracing::warn!("Cached tarball {} failed verification; removing it", cache_path.display());
                let _ = fs::remove_file(&cache_path);
                return Err(e);
            }

            return Ok(bytes);
        }

        if self.config.offline {
            return error::OfflineModeSnafu { url: url.as_str() }.fail();
        }

        let bytes = self.download(&url)?;
        self.verify(source, &bytes)?;
        self.store(&cache_path, &bytes)?;

        Ok(bytes)
    }

    fn download(&self, url: &url::Url) -> Result<Vec<u8>> {
        tracing::info!("Downloading {url}");

        let response = self
            .client
            .get(url.clone())
            .send()
            .with_context(|_| error::HttpRequestSnafu { url: url.as_str() })?;

        let status = response.status();
        if !status.is_success() {
            return error::HttpStatusSnafu {
                url: url.as_str(),
                status: status.as_u16(),
            }
            .fail();
        }

        let bytes = response
            .bytes()
            .with_context(|_| error::HttpRequestSnafu { url: url.as_str() })?;

        tracing::debug!("Downloaded {} bytes from {url}", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Check `bytes` against the configured checksum, if there is one.
    fn verify(&self, source: &str, bytes: &[u8]) -> Result<()> {
        let Some(expected) = &self.config.source_sha256 else {
            return Ok(());
        };

        let actual = format!("{:x}", Sha256::digest(bytes));
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return error::ChecksumMismatchSnafu {
                url: source,
                expected: expected.trim(),
                actual,
            }
            .fail();
        }

        Ok(())
    }

    /// Atomically write the tarball into the cache.
    fn store(&self, cache_path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = cache_path.parent().expect("BUG: Cache path has no parent");
        fs::create_dir_all(parent).with_context(|_| error::IoSnafu {
            path: parent.to_path_buf(),
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(parent).with_context(|_| error::IoSnafu {
            path: parent.to_path_buf(),
        })?;
        temp.write_all(bytes).with_context(|_| error::IoSnafu {
            path: temp.path().to_path_buf(),
        })?;
        temp.persist(cache_path).with_context(|_| error::PersistFileSnafu {
            path: cache_path.to_path_buf(),
        })?;

        Ok(())
    }
}

impl SourceFetcher for TarballFetcher {
    fn fetch(&self, identity: &PackageIdentity, work_dir: &Path) -> Result<PathBuf> {
        let bytes = self.tarball(identity)?;

        fs::create_dir_all(work_dir).with_context(|_| error::IoSnafu {
            path: work_dir.to_path_buf(),
        })?;

        let tar_gz = flate2::read::GzDecoder::new(bytes.as_slice());
        let mut archive = tar::Archive::new(tar_gz);
        archive.unpack(work_dir).context(error::TarExtractionSnafu)?;

        let source_dir = work_dir.join(identity.source_dir_name());
        if !source_dir.is_dir() {
            return error::ExtractedDirMissingSnafu { expected: source_dir }.fail();
        }

        tracing::info!("Extracted source to {}", source_dir.display());
        Ok(source_dir)
    }
}
