use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{BuildParams, BuilderConfig, ProcessorConfig};
use crate::descriptor::{effective_options, AssetDescriptor};
use crate::error::LoadError;
use crate::id::AssetId;
use crate::paths::absolutize;

/// Extension that marks a file as an asset descriptor.
pub const DESCRIPTOR_EXTENSION: &str = "asset";

/// Every path derived for one asset. All of them are keyed off the
/// asset's identifier, so no two tasks ever contend on the filesystem.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    /// The descriptor file itself; write-back target.
    pub descriptor: PathBuf,
    /// Directory containing the descriptor. Declared inputs resolve
    /// against it.
    pub source_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub tmp_dir: PathBuf,
    /// Persisted cache record.
    pub cache_file: PathBuf,
    /// Serialized task handed to the processor as its sole argument.
    pub task_file: PathBuf,
    /// Where the processor writes its output contract.
    pub output_file: PathBuf,
    /// Final deployed artifact: `<output>/<flat-hex>.bin`, independent of
    /// the asset's original location, type or name.
    pub deployed_file: PathBuf,
}

/// One fully resolved asset, ready to dispatch.
#[derive(Debug, Clone)]
pub struct AssetEntry {
    /// Descriptor with inputs absolutized against the source directory.
    pub descriptor: AssetDescriptor,
    /// Descriptor exactly as authored, inputs still relative; the
    /// baseline for write-back comparison.
    pub authored: AssetDescriptor,
    pub processor: ProcessorConfig,
    /// Processor defaults merged with descriptor-local overrides.
    pub options: Map<String, Value>,
    /// Processor command line with build parameters substituted.
    pub cmdline: String,
    pub paths: AssetPaths,
}

/// Debug-manifest entry for one de-duplicated display name.
#[derive(Debug, Clone, Serialize)]
pub struct NameEntry {
    pub filepath: Vec<String>,
    pub prerequisites: Vec<String>,
}

/// Display name to artifact mapping, emitted as `filelisting.json`. Used
/// only for the debug manifest, never for build decisions. Insertion
/// order is preserved so the manifest is deterministic.
pub type FriendlyNameRegistry = IndexMap<String, NameEntry>;

pub struct LoadedAssets {
    pub assets: Vec<AssetEntry>,
    pub registry: FriendlyNameRegistry,
}

/// Walk the asset directory and resolve every descriptor into the
/// in-memory asset table.
///
/// Any descriptor that fails to parse or resolve aborts the whole load
/// with the failing path; a malformed descriptor is a configuration
/// error, not a build error, and partial tables are never produced.
pub fn load_assets(
    config: &BuilderConfig,
    params: &BuildParams,
) -> Result<LoadedAssets, LoadError> {
    let mut assets = Vec::new();
    let mut registry = FriendlyNameRegistry::default();
    let mut seen: FxHashMap<AssetId, PathBuf> = FxHashMap::default();

    for entry in WalkDir::new(&params.asset_directory).follow_links(false) {
        let entry = entry.map_err(|source| LoadError::Walk {
            path: params.asset_directory.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path
            .extension()
            .map(|ext| ext == DESCRIPTOR_EXTENSION)
            .unwrap_or(false)
        {
            let asset = resolve_descriptor(path, config, params)?;
            let id = asset.descriptor.uuid;
            if let Some(previous) = seen.insert(id, path.to_owned()) {
                return Err(LoadError::DuplicateId {
                    id,
                    path: path.to_owned(),
                    previous,
                });
            }
            register_friendly_name(&mut registry, &asset.authored);
            assets.push(asset);
        }
    }

    info!("Loaded {} asset descriptor(s)", assets.len());
    Ok(LoadedAssets { assets, registry })
}

fn resolve_descriptor(
    path: &Path,
    config: &BuilderConfig,
    params: &BuildParams,
) -> Result<AssetEntry, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::DescriptorRead {
        path: path.to_owned(),
        source,
    })?;
    let authored: AssetDescriptor =
        serde_json::from_str(&text).map_err(|source| LoadError::DescriptorParse {
            path: path.to_owned(),
            source,
        })?;

    let process = config
        .processors
        .get(&authored.asset_type)
        .ok_or_else(|| LoadError::UnknownProcessor {
            asset_type: authored.asset_type.clone(),
            path: path.to_owned(),
        })?;

    let options = effective_options(&process.default_options, &authored.process_options);

    let source_dir = path
        .parent()
        .map(Path::to_owned)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut descriptor = authored.clone();
    descriptor.inputs = authored
        .inputs
        .iter()
        .map(|input| absolutize(input, &source_dir))
        .collect();

    let id = descriptor.uuid;
    let cache_dir = id
        .shard_path(&params.cache_directory)
        .map_err(|source| LoadError::CreateDir {
            path: params.cache_directory.clone(),
            source,
        })?;
    let tmp_dir = id
        .tmp_path(&params.tmp_directory)
        .map_err(|source| LoadError::CreateDir {
            path: params.tmp_directory.clone(),
            source,
        })?;

    let hex = id.flat_hex();
    let paths = AssetPaths {
        descriptor: path.to_owned(),
        source_dir,
        cache_file: cache_dir.join(format!("{hex}.cache")),
        task_file: cache_dir.join(format!("{hex}.in.json")),
        output_file: cache_dir.join(format!("{hex}.bin")),
        deployed_file: params.output_directory.join(format!("{hex}.bin")),
        cache_dir,
        tmp_dir,
    };

    let cmdline = params.substitute(&process.proc);

    Ok(AssetEntry {
        descriptor,
        authored,
        processor: process.clone(),
        options,
        cmdline,
        paths,
    })
}

/// Register the asset under its display name, resolving collisions by
/// appending a deterministic numeric suffix.
fn register_friendly_name(registry: &mut FriendlyNameRegistry, descriptor: &AssetDescriptor) {
    let mut name = descriptor.friendly_name.clone();
    let mut count = 1u32;
    while registry.contains_key(&name) {
        name = format!("{}_{:02x}", descriptor.friendly_name, count);
        count += 1;
    }
    if name != descriptor.friendly_name {
        warn!(
            "Friendly name conflict: '{}' renamed to '{}'",
            descriptor.friendly_name, name
        );
    }

    registry.insert(
        name,
        NameEntry {
            filepath: vec![format!("{}.bin", descriptor.uuid.flat_hex())],
            prerequisites: descriptor
                .prerequisites
                .iter()
                .map(|id| format!("{}.bin", id.flat_hex()))
                .collect(),
        },
    );
}
