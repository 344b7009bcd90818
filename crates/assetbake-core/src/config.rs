use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LoadError;

/// One entry per asset type: how to invoke the external processor that
/// builds assets of that type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Command line template. The serialized task file path is appended as
    /// the final argument at invocation time.
    pub proc: String,

    /// Options applied to every asset of this type unless the descriptor
    /// overrides them per key.
    #[serde(rename = "defaultprocessoptions", default)]
    pub default_options: serde_json::Map<String, Value>,

    /// Processor version tag. Bumping it invalidates every cache record
    /// for the type.
    pub version: serde_json::Number,
}

/// Global build configuration, loaded once per run and shared read-only
/// across all tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Shell commands run before asset discovery.
    #[serde(default)]
    pub prebuild: Vec<String>,

    /// Shell commands run after deployment.
    #[serde(default)]
    pub postbuild: Vec<String>,

    /// Processor table keyed by asset type tag.
    #[serde(default)]
    pub processors: FxHashMap<String, ProcessorConfig>,

    /// Opaque build configuration passed through to every cache record and
    /// task file; any change to it invalidates all cached builds.
    #[serde(default)]
    pub global: Value,
}

impl BuilderConfig {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::ConfigRead {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| LoadError::ConfigParse {
            path: path.to_owned(),
            source,
        })
    }
}

/// Build-wide directories, exposed to command lines and path templates as
/// `%(name)` tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildParams {
    /// Root folder containing all `.asset` descriptors.
    pub asset_directory: PathBuf,
    /// Where data persisted between builds is stored.
    pub cache_directory: PathBuf,
    /// Where deployed assets are written.
    pub output_directory: PathBuf,
    /// Per-asset scratch space; not expected to persist beyond one build.
    pub tmp_directory: PathBuf,
    /// Where the tool was invoked from.
    pub working_directory: PathBuf,
}

impl BuildParams {
    /// Literal, single-pass `%(name)` substitution. Unrecognized tokens
    /// are left untouched and replacement values are not re-scanned.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for (token, value) in [
            ("%(asset_directory)", &self.asset_directory),
            ("%(cache_directory)", &self.cache_directory),
            ("%(output_directory)", &self.output_directory),
            ("%(tmp_directory)", &self.tmp_directory),
            ("%(working_directory)", &self.working_directory),
        ] {
            out = out.replace(token, &value.to_string_lossy());
        }
        out
    }
}
