use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cache::{is_build_required, CacheRecord};
use crate::config::{BuildParams, BuilderConfig};
use crate::deploy::Deployer;
use crate::descriptor::AssetDescriptor;
use crate::error::{PipelineError, TaskError};
use crate::hooks::run_hooks;
use crate::id::AssetId;
use crate::loader::{load_assets, AssetEntry, LoadedAssets};
use crate::paths::{absolutize, relative_to};
use crate::processor::{read_processor_output, BuildTask, Processor, ProcessorOutput};

/// Outcome of one asset's task.
#[derive(Debug)]
pub enum BuildOutcome {
    /// Processor invocation failed; nothing deployable. The asset's cache
    /// record has been removed so the next run retries it.
    Failed(TaskError),
    /// Freshly built; the payload must be deployed.
    Built(ProcessorOutput),
    /// Cache was valid; prior output read back, nothing to deploy.
    Reused(ProcessorOutput),
}

/// One asset's result, sent over the result stream to the deployment
/// phase. Carries everything deployment needs so results stay
/// self-contained.
#[derive(Debug)]
pub struct BuildResult {
    pub id: AssetId,
    pub friendly_name: String,
    /// Descriptor as authored; write-back comparison baseline.
    pub authored: AssetDescriptor,
    pub descriptor_path: PathBuf,
    pub deployed_file: PathBuf,
    pub outcome: BuildOutcome,
}

/// Per-run counters, reported after the result stream drains.
#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    pub built: usize,
    pub reused: usize,
    pub failed: Vec<(AssetId, String)>,
}

/// Execute a full pipeline run: pre hooks, discovery, one task per asset
/// across the worker pool, streamed deployment, debug manifest, post
/// hooks.
///
/// Tasks for different assets are independent: they may run in any order
/// and overlap arbitrarily, and results are consumed in arrival order.
/// Prerequisite identifiers are recorded for downstream index
/// construction only; they never order builds.
pub fn run(
    config: &BuilderConfig,
    params: &BuildParams,
    processor: &dyn Processor,
) -> Result<BuildReport, PipelineError> {
    run_hooks("prebuild", &config.prebuild, params);

    let LoadedAssets { assets, registry } = load_assets(config, params)?;

    let deployer = Deployer::new(params);
    let mut report = BuildReport::default();
    let mut deploy_error = None;

    let (tx, rx) = crossbeam_channel::unbounded();
    let asset_list = &assets;
    // in_place_scope keeps this thread out of the worker pool: draining
    // must not occupy a pool slot or a single-threaded pool could never
    // run the producer.
    rayon::in_place_scope(|scope| {
        scope.spawn(move |_| {
            asset_list.par_iter().for_each_with(tx, |tx, entry| {
                let _ = tx.send(run_task(entry, config, params, processor));
            });
        });

        // Deployment runs here on the calling thread, draining results as
        // they arrive. The channel closes once every task has sent.
        for result in &rx {
            if deploy_error.is_some() {
                continue;
            }
            if let Err(error) = deployer.handle(result, &mut report) {
                deploy_error = Some(error);
            }
        }
    });

    if let Some(error) = deploy_error {
        return Err(error.into());
    }

    deployer.write_manifest(&registry)?;

    info!(
        "Build finished: {} built, {} reused, {} failed",
        report.built,
        report.reused,
        report.failed.len()
    );

    run_hooks("postbuild", &config.postbuild, params);
    Ok(report)
}

fn run_task(
    entry: &AssetEntry,
    config: &BuilderConfig,
    params: &BuildParams,
    processor: &dyn Processor,
) -> BuildResult {
    BuildResult {
        id: entry.descriptor.uuid,
        friendly_name: entry.descriptor.friendly_name.clone(),
        authored: entry.authored.clone(),
        descriptor_path: entry.paths.descriptor.clone(),
        deployed_file: entry.paths.deployed_file.clone(),
        outcome: build_asset(entry, config, params, processor),
    }
}

/// Validate-then-build for one asset. Validation and build are one task
/// so a stale check can never race a concurrent build of the same asset.
fn build_asset(
    entry: &AssetEntry,
    config: &BuilderConfig,
    params: &BuildParams,
    processor: &dyn Processor,
) -> BuildOutcome {
    let candidate = match CacheRecord::capture(&entry.descriptor, &entry.processor, &config.global)
    {
        Ok(candidate) => candidate,
        Err(error) => return BuildOutcome::Failed(error.into()),
    };

    if !is_build_required(
        &entry.paths.cache_file,
        &entry.paths.output_file,
        &candidate,
        &params.asset_directory,
    ) {
        match read_processor_output(&entry.paths.output_file) {
            Ok(output) => {
                debug!(
                    "Reusing cached asset '{}' ({})",
                    entry.descriptor.friendly_name, entry.descriptor.uuid
                );
                return BuildOutcome::Reused(normalize_output(output, entry));
            }
            Err(error) => {
                warn!(
                    "Prior output for asset '{}' ({}) is unreadable, rebuilding: {error}",
                    entry.descriptor.friendly_name, entry.descriptor.uuid
                );
            }
        }
    }

    debug!(
        "Building asset '{}' ({})",
        entry.descriptor.friendly_name, entry.descriptor.uuid
    );
    let task = BuildTask::new(entry, &config.global, params);
    match processor.invoke(&task) {
        Err(error) => {
            // Drop the stale record so the next run retries this asset.
            if entry.paths.cache_file.is_file() {
                let _ = std::fs::remove_file(&entry.paths.cache_file);
            }
            BuildOutcome::Failed(error.into())
        }
        Ok(output) => {
            if let Err(error) = candidate.store(&entry.paths.cache_file, &params.asset_directory)
            {
                return BuildOutcome::Failed(error.into());
            }
            BuildOutcome::Built(normalize_output(output, entry))
        }
    }
}

/// Inputs the processor reports back are re-expressed relative to the
/// descriptor's own directory, the form they are authored in. Paths the
/// processor already returned relative are taken as-is.
fn normalize_output(mut output: ProcessorOutput, entry: &AssetEntry) -> ProcessorOutput {
    output.metadata.inputs = output
        .metadata
        .inputs
        .iter()
        .map(|input| {
            if input.is_absolute() {
                relative_to(&absolutize(input, &entry.paths.source_dir), &entry.paths.source_dir)
            } else {
                input.clone()
            }
        })
        .collect();
    output
}
