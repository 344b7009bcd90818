use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::id::AssetId;
use crate::processor::ProcessError;

/// Configuration and load-time failures. Fatal: the run aborts before any
/// build starts, and partial asset tables are never produced.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read build config '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse build config '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to scan asset directory '{path}': {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Failed to read asset descriptor '{path}': {source}")]
    DescriptorRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse asset descriptor '{path}': {source}")]
    DescriptorParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unknown processor type '{asset_type}' in '{path}'")]
    UnknownProcessor { asset_type: String, path: PathBuf },

    #[error("Duplicate asset identifier {id} in '{path}', already declared in '{previous}'")]
    DuplicateId {
        id: AssetId,
        path: PathBuf,
        previous: PathBuf,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures on the single-threaded write side of the pipeline. These
/// escalate to run-level errors: a half-deployed output tree is worse
/// than a failed run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Failed to write deployed artifact '{path}': {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid base64 payload for asset {id}: {source}")]
    Payload {
        id: AssetId,
        source: base64::DecodeError,
    },

    #[error("Failed to rewrite descriptor '{path}': {source}")]
    WriteBack {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize '{path}': {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write debug manifest '{path}': {source}")]
    Manifest {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-task failure inside the dispatcher. Isolated to one asset: the
/// result stream reports it and the run continues.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Run-level failure of the whole pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}
