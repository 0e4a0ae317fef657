//! The static description of the recipe: what is being packaged, which knobs the caller can turn,
//! and how those knobs translate into dependencies, build definitions and a package identity.
//!
//! Everything in here is pure data and pure functions.  Nothing touches the filesystem or the
//! network; that is left to the stages in [`crate::orchestrator`].

use crate::{Result, error};
use semver::VersionReq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use snafu::{OptionExt, ResultExt};
use std::{collections::BTreeMap, fmt};

/// Immutable identity of the package this recipe produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageIdentity {
    pub name: &'static str,
    pub version: &'static str,
    pub license: &'static str,
    /// Upstream project home page
    pub url: &'static str,
    /// Exact release tarball to fetch
    pub source_url: &'static str,
    /// Release tag the tarball corresponds to
    pub tag: &'static str,
}

/// The one and only package this recipe knows how to build.
pub const CLI_PACKAGE: PackageIdentity = PackageIdentity {
    name: "cli",
    version: "v1.2.1",
    license: "BSL-1.0",
    url: "https://github.com/daniele77/cli",
    source_url: "https://github.com/daniele77/cli/archive/refs/tags/v1.2.1.tar.gz",
    tag: "v1.2.1",
};

impl PackageIdentity {
    /// Name of the directory the release tarball extracts to, e.g. `cli-1.2.1`.
    ///
    /// GitHub strips the leading `v` from the tag when naming the archive's top-level directory.
    pub fn source_dir_name(&self) -> String {
        let version = self.version.strip_prefix('v').unwrap_or(self.version);
        format!("{}-{}", self.name, version)
    }

    /// Version string without the leading `v`, as it appears in the upstream `project()` call.
    pub fn bare_version(&self) -> &'static str {
        self.version.strip_prefix('v').unwrap_or(self.version)
    }
}

/// Options the caller may set before configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionSet {
    /// Build against Boost.Asio, producing binaries.  When off, the package is header-only.
    pub use_boost: bool,

    /// Whether the Boost dependency is linked dynamically (`boost:shared`).
    pub boost_shared: bool,
}

impl Default for OptionSet {
    fn default() -> Self {
        Self {
            use_boost: true,
            boost_shared: false,
        }
    }
}

impl OptionSet {
    /// Parse `key=value` pairs on top of the defaults.
    ///
    /// Recognized keys are `use_boost` and `boost:shared` (also accepted as `boost_shared`).
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut options = Self::default();

        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = split_pair(pair).with_context(|| error::InvalidOptionSnafu {
                input: pair,
                reason: "expected KEY=VALUE",
            })?;
            let value = parse_bool(value).with_context(|| error::InvalidOptionSnafu {
                input: pair,
                reason: format!("'{value}' is not a boolean"),
            })?;

            match key {
                "use_boost" => options.use_boost = value,
                "boost:shared" | "boost_shared" => options.boost_shared = value,
                other => {
                    return error::InvalidOptionSnafu {
                        input: pair,
                        reason: format!("unknown option '{other}'"),
                    }
                    .fail();
                }
            }
        }

        Ok(options)
    }

    /// A package built without Boost carries no compiled artifact.
    pub fn is_header_only(&self) -> bool {
        !self.use_boost
    }
}

/// Build settings supplied by whoever invokes the recipe.  Read-only to the recipe.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildSettings {
    pub os: String,
    pub compiler: String,
    pub arch: String,
    pub build_type: String,
}

impl BuildSettings {
    /// Settings describing the host this process is running on.
    pub fn detect() -> Self {
        let compiler = std::env::var("CXX")
            .ok()
            .and_then(|cxx| {
                std::path::Path::new(&cxx)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "c++".to_string());

        Self {
            os: std::env::consts::OS.to_string(),
            compiler,
            arch: std::env::consts::ARCH.to_string(),
            build_type: "Release".to_string(),
        }
    }

    /// Apply `key=value` overrides on top of `self`.
    pub fn with_overrides<S: AsRef<str>>(mut self, pairs: &[S]) -> Result<Self> {
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = split_pair(pair).with_context(|| error::InvalidSettingSnafu {
                input: pair,
                reason: "expected KEY=VALUE",
            })?;

            let slot = match key {
                "os" => &mut self.os,
                "compiler" => &mut self.compiler,
                "arch" => &mut self.arch,
                "build_type" => &mut self.build_type,
                other => {
                    return error::InvalidSettingSnafu {
                        input: pair,
                        reason: format!("unknown setting '{other}'"),
                    }
                    .fail();
                }
            };
            *slot = value.to_string();
        }

        Ok(self)
    }
}

/// A version-constrained edge to another package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DependencyDeclaration {
    pub name: &'static str,
    pub requirement: VersionReq,
}

impl fmt::Display for DependencyDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/[{}]", self.name, self.requirement)
    }
}

/// One row of the dependency rule table.
struct DependencyRule {
    applies: fn(&OptionSet) -> bool,
    name: &'static str,
    requirement: &'static str,
}

fn uses_boost(options: &OptionSet) -> bool {
    options.use_boost
}

const DEPENDENCY_RULES: &[DependencyRule] = &[DependencyRule {
    applies: uses_boost,
    name: "boost",
    requirement: ">1.55.0",
}];

/// Evaluate the rule table against `options`.
pub fn requirements(options: &OptionSet) -> Vec<DependencyDeclaration> {
    DEPENDENCY_RULES
        .iter()
        .filter(|rule| (rule.applies)(options))
        .map(|rule| DependencyDeclaration {
            name: rule.name,
            requirement: VersionReq::parse(rule.requirement)
                .unwrap_or_else(|e| panic!("BUG: invalid requirement in rule table: {e}")),
        })
        .collect()
}

/// Value of a single build definition passed to the external build system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DefinitionValue {
    Bool(bool),
    String(String),
}

impl fmt::Display for DefinitionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("ON"),
            Self::Bool(false) => f.write_str("OFF"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Ordered map of build definitions, rendered as `-DKEY=VALUE`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildDefinitions(BTreeMap<String, DefinitionValue>);

impl BuildDefinitions {
    pub const USE_BOOST_ASIO: &'static str = "CLI_UseBoostAsio";
    pub const BUILD_EXAMPLES: &'static str = "CLI_BuildExamples";
    pub const BUILD_TESTS: &'static str = "CLI_BuildTests";
    pub const BUILD_TYPE: &'static str = "CMAKE_BUILD_TYPE";

    /// The definitions for a build with the given settings.
    ///
    /// `CLI_BuildTests` is present only when `run_tests` is set.
    pub fn for_build(settings: &BuildSettings, run_tests: bool) -> Self {
        let mut defs = Self::default();
        defs.set(Self::USE_BOOST_ASIO, true);
        defs.set(Self::BUILD_EXAMPLES, true);
        if run_tests {
            defs.set(Self::BUILD_TESTS, true);
        }
        defs.set(Self::BUILD_TYPE, settings.build_type.clone());
        defs
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DefinitionValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&DefinitionValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether the test suite will be built, and therefore should be run.
    pub fn builds_tests(&self) -> bool {
        matches!(self.get(Self::BUILD_TESTS), Some(DefinitionValue::Bool(true)))
    }

    /// Render as `-DKEY=VALUE` command line arguments.
    pub fn to_args(&self) -> Vec<String> {
        self.0.iter().map(|(k, v)| format!("-D{k}={v}")).collect()
    }
}

impl From<bool> for DefinitionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for DefinitionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for DefinitionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Content-derived identity of a built package, used as the cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PackageId {
    pub id: String,
    pub header_only: bool,
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Compute the package id for the given inputs.
///
/// Header-only packages hash only the package name and version, so builds that differ only in
/// settings collapse to the same id.  Everything else hashes options, settings and requirements.
pub fn package_id(identity: &PackageIdentity, options: &OptionSet, settings: &BuildSettings) -> Result<PackageId> {
    #[derive(Serialize)]
    struct IdDocument<'a> {
        name: &'a str,
        version: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<&'a OptionSet>,
        #[serde(skip_serializing_if = "Option::is_none")]
        settings: Option<&'a BuildSettings>,
        requires: Vec<String>,
    }

    let header_only = options.is_header_only();
    let doc = if header_only {
        IdDocument {
            name: identity.name,
            version: identity.version,
            options: None,
            settings: None,
            requires: Vec::new(),
        }
    } else {
        IdDocument {
            name: identity.name,
            version: identity.version,
            options: Some(options),
            settings: Some(settings),
            requires: requirements(options).iter().map(|d| d.to_string()).collect(),
        }
    };

    let json = serde_json::to_vec(&doc).context(error::JsonSnafu)?;
    let digest = Sha256::digest(&json);

    Ok(PackageId {
        id: format!("{digest:x}"),
        header_only,
    })
}

/// Interpret the usual spellings of a boolean, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let (key, value) = pair.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}
