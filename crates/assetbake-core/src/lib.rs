//! Incremental asset-build pipeline.
//!
//! Discovers declarative `.asset` descriptors under a source tree, decides
//! which assets are stale relative to a persisted cache, rebuilds stale
//! ones by invoking external per-type processors, and deploys the
//! resulting binaries under a content-addressed name.

pub mod cache;
pub mod config;
pub mod deploy;
pub mod descriptor;
pub mod error;
pub mod hooks;
pub mod id;
pub mod loader;
mod paths;
pub mod pipeline;
pub mod processor;

pub use config::{BuildParams, BuilderConfig, ProcessorConfig};
pub use descriptor::{effective_options, AssetDescriptor};
pub use error::{DeployError, LoadError, PipelineError, TaskError};
pub use id::AssetId;
pub use pipeline::{run, BuildOutcome, BuildReport, BuildResult};
pub use processor::{BuildTask, CommandProcessor, ProcessError, Processor, ProcessorOutput};
