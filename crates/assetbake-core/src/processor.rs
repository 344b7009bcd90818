use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::{BuildParams, ProcessorConfig};
use crate::descriptor::AssetDescriptor;
use crate::id::AssetId;
use crate::loader::AssetEntry;

/// Everything an external processor needs for one build, serialized to
/// the task file whose path becomes the processor's single argument.
///
/// The key names are a wire contract shared with the per-type processor
/// executables; do not rename them.
#[derive(Debug, Clone, Serialize)]
pub struct BuildTask {
    pub uuid: AssetId,
    #[serde(rename = "assetpath")]
    pub asset_path: PathBuf,
    /// Descriptor with inputs absolutized.
    #[serde(rename = "assetmetadata")]
    pub metadata: AssetDescriptor,
    pub process: ProcessorConfig,
    /// Merged effective options.
    #[serde(rename = "processoptions")]
    pub options: Map<String, Value>,
    #[serde(rename = "buildconfig")]
    pub build_config: Value,
    #[serde(rename = "buildparams")]
    pub params: BuildParams,
    /// Substituted command line, without the trailing task file argument.
    pub cmdline: String,
    #[serde(rename = "cache_directory")]
    pub cache_dir: PathBuf,
    #[serde(rename = "tmp_directory")]
    pub tmp_dir: PathBuf,
    #[serde(rename = "cache_file")]
    pub cache_file: PathBuf,
    /// The task file itself; processors can re-read their own task here.
    #[serde(rename = "input_file")]
    pub task_file: PathBuf,
    /// Where the processor must leave its output contract.
    #[serde(rename = "output_file")]
    pub output_file: PathBuf,
    #[serde(rename = "final_dest")]
    pub deployed_file: PathBuf,
}

impl BuildTask {
    pub fn new(entry: &AssetEntry, build_config: &Value, params: &BuildParams) -> Self {
        BuildTask {
            uuid: entry.descriptor.uuid,
            asset_path: entry.paths.descriptor.clone(),
            metadata: entry.descriptor.clone(),
            process: entry.processor.clone(),
            options: entry.options.clone(),
            build_config: build_config.clone(),
            params: params.clone(),
            cmdline: entry.cmdline.clone(),
            cache_dir: entry.paths.cache_dir.clone(),
            tmp_dir: entry.paths.tmp_dir.clone(),
            cache_file: entry.paths.cache_file.clone(),
            task_file: entry.paths.task_file.clone(),
            output_file: entry.paths.output_file.clone(),
            deployed_file: entry.paths.deployed_file.clone(),
        }
    }
}

/// Payload section of the processor output contract.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildOutput {
    /// Base64-encoded artifact bytes.
    pub data: String,

    #[serde(default)]
    pub warnings: Vec<String>,

    /// Informational only; the process exit code is the authoritative
    /// failure signal.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Contract the processor writes to [`BuildTask::output_file`] before
/// exiting zero: the task's metadata, possibly mutated (notably `inputs`,
/// to record transitive dependencies discovered during processing), plus
/// the build payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorOutput {
    #[serde(rename = "assetmetadata")]
    pub metadata: AssetDescriptor,
    #[serde(rename = "buildoutput")]
    pub build_output: BuildOutput,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Empty processor command line")]
    EmptyCommand,

    #[error("Failed to serialize task file '{path}': {source}")]
    TaskEncode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write task file '{path}': {source}")]
    TaskWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to spawn processor '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Processor exited with {status}")]
    NonZeroExit { status: ExitStatus },

    #[error("Failed to read processor output '{path}': {source}")]
    OutputRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse processor output '{path}': {source}")]
    OutputParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Capability interface for turning one task into built output.
///
/// The pipeline does not care how the work happens: production builds go
/// through [`CommandProcessor`], tests may substitute an in-process
/// implementation. Implementations must also leave the serialized output
/// contract at [`BuildTask::output_file`], since cache-valid runs read it
/// back without invoking the processor again.
pub trait Processor: Sync {
    fn invoke(&self, task: &BuildTask) -> Result<ProcessorOutput, ProcessError>;
}

/// Invokes the configured external command with the task file path
/// appended as its sole extra argument, waits for exit and reads back the
/// output contract.
///
/// The command line is split on whitespace and executed directly, not
/// through a shell; nothing is passed to the child beyond what the
/// command line template encodes.
#[derive(Debug, Default)]
pub struct CommandProcessor;

impl Processor for CommandProcessor {
    fn invoke(&self, task: &BuildTask) -> Result<ProcessorOutput, ProcessError> {
        let text = serde_json::to_string_pretty(task).map_err(|source| ProcessError::TaskEncode {
            path: task.task_file.clone(),
            source,
        })?;
        std::fs::write(&task.task_file, text).map_err(|source| ProcessError::TaskWrite {
            path: task.task_file.clone(),
            source,
        })?;

        let mut parts = task.cmdline.split_whitespace();
        let program = parts.next().ok_or(ProcessError::EmptyCommand)?;

        debug!("Invoking '{}' for asset {}", task.cmdline, task.uuid);
        let status = Command::new(program)
            .args(parts)
            .arg(&task.task_file)
            .status()
            .map_err(|source| ProcessError::Spawn {
                command: task.cmdline.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ProcessError::NonZeroExit { status });
        }

        read_processor_output(&task.output_file)
    }
}

/// Read and parse an output contract, either just produced or left over
/// from a previous build being reused.
pub fn read_processor_output(path: &Path) -> Result<ProcessorOutput, ProcessError> {
    let text = std::fs::read_to_string(path).map_err(|source| ProcessError::OutputRead {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ProcessError::OutputParse {
        path: path.to_owned(),
        source,
    })
}
