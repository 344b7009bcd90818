use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProcessorConfig;
use crate::descriptor::AssetDescriptor;
use crate::paths::relative_to;

use super::Result;

/// Modification time of one input file. Seconds and nanoseconds are kept
/// as separate integers so the JSON form round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStamp {
    pub file: PathBuf,
    pub secs: u64,
    pub nanos: u32,
}

/// Snapshot of everything that can invalidate a build: the descriptor as
/// loaded, the processor entry in effect, the opaque global build config
/// and the input file timestamps.
///
/// A persisted record is evidence that no rebuild is needed only while it
/// is structurally equal, after input paths on both sides are made
/// relative to the asset root, to the record recomputed from current
/// state. Any difference at all means rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub asset: AssetDescriptor,
    pub process: ProcessorConfig,
    #[serde(rename = "buildconfig")]
    pub build_config: Value,
    #[serde(rename = "filestamps")]
    pub file_stamps: Vec<FileStamp>,
}

impl CacheRecord {
    /// Build the candidate record for the asset's current on-disk state.
    /// Declared inputs that are not existing files contribute no stamp.
    pub fn capture(
        descriptor: &AssetDescriptor,
        process: &ProcessorConfig,
        build_config: &Value,
    ) -> Result<Self> {
        let mut file_stamps = Vec::with_capacity(descriptor.inputs.len());
        for input in &descriptor.inputs {
            if !input.is_file() {
                continue;
            }
            let modified = std::fs::metadata(input)?.modified()?;
            let elapsed = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
            file_stamps.push(FileStamp {
                file: input.clone(),
                secs: elapsed.as_secs(),
                nanos: elapsed.subsec_nanos(),
            });
        }
        Ok(CacheRecord {
            asset: descriptor.clone(),
            process: process.clone(),
            build_config: build_config.clone(),
            file_stamps,
        })
    }

    /// Copy with input paths relative to `asset_root`: the form persisted
    /// to disk, so records stay portable across machines with different
    /// absolute paths.
    pub fn normalized(&self, asset_root: &Path) -> CacheRecord {
        let mut record = self.clone();
        record.asset.inputs = record
            .asset
            .inputs
            .iter()
            .map(|input| relative_to(input, asset_root))
            .collect();
        for stamp in &mut record.file_stamps {
            stamp.file = relative_to(&stamp.file, asset_root);
        }
        record
    }

    pub fn load(path: &Path) -> Result<CacheRecord> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Persist the normalized form. Written at most once per asset per
    /// run, only after a successful build.
    pub fn store(&self, path: &Path, asset_root: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.normalized(asset_root))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn descriptor(inputs: Vec<PathBuf>) -> AssetDescriptor {
        serde_json::from_value(json!({
            "uuid": "{AA53D0BE-98A0-42DD-9500-88B375EDC136}",
            "type": "blob",
            "friendlyname": "Raw",
            "inputs": inputs,
            "prerequisites": [],
            "processoptions": {}
        }))
        .unwrap()
    }

    fn process() -> ProcessorConfig {
        serde_json::from_value(json!({
            "proc": "blobproc",
            "defaultprocessoptions": {},
            "version": 1
        }))
        .unwrap()
    }

    #[test]
    fn test_capture_stamps_existing_inputs_only() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.bin");
        std::fs::write(&present, b"data").unwrap();
        let missing = dir.path().join("missing.bin");

        let record = CacheRecord::capture(
            &descriptor(vec![present.clone(), missing]),
            &process(),
            &Value::Null,
        )
        .unwrap();

        assert_eq!(record.file_stamps.len(), 1);
        assert_eq!(record.file_stamps[0].file, present);
    }

    #[test]
    fn test_normalized_is_portable_across_roots() {
        let make = |root: &str| {
            let mut record = CacheRecord {
                asset: descriptor(vec![PathBuf::from(format!("{root}/meshes/bunny.obj"))]),
                process: process(),
                build_config: json!({"platform": "pc"}),
                file_stamps: vec![FileStamp {
                    file: PathBuf::from(format!("{root}/meshes/bunny.obj")),
                    secs: 1000,
                    nanos: 42,
                }],
            };
            record = record.normalized(Path::new(root));
            record
        };

        assert_eq!(make("/machine-a/assets"), make("/machine-b/assets"));
    }

    #[test]
    fn test_store_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.bin");
        std::fs::write(&input, b"data").unwrap();

        let record =
            CacheRecord::capture(&descriptor(vec![input]), &process(), &json!({"p": 1})).unwrap();
        let cache_file = dir.path().join("record.cache");
        record.store(&cache_file, dir.path()).unwrap();

        let loaded = CacheRecord::load(&cache_file).unwrap();
        assert_eq!(loaded, record.normalized(dir.path()));
    }
}
