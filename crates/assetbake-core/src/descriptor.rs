use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::AssetId;

/// The authored unit: one `.asset` JSON file.
///
/// Field names mirror the on-disk format exactly. Descriptors are
/// rewritten in place when a processor returns updated metadata, so
/// serialization must round-trip every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub uuid: AssetId,

    /// Selects the processor entry used to build this asset.
    #[serde(rename = "type")]
    pub asset_type: String,

    /// Display name; unique per build only for debug-manifest purposes.
    #[serde(rename = "friendlyname")]
    pub friendly_name: String,

    /// Files the build reads, authored relative to the descriptor's own
    /// directory.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    /// Assets a downstream loader must make available before this one.
    /// Recorded for index construction; never used to order builds.
    #[serde(default)]
    pub prerequisites: Vec<AssetId>,

    /// Asset-specific overrides for the processor's default options.
    #[serde(rename = "processoptions", default)]
    pub process_options: Map<String, Value>,
}

/// Processor defaults overlaid with descriptor-local options. Later keys
/// win on conflict.
pub fn effective_options(
    defaults: &Map<String, Value>,
    overrides: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
