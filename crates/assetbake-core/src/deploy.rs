use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{error, info, warn};

use crate::config::BuildParams;
use crate::error::DeployError;
use crate::loader::FriendlyNameRegistry;
use crate::pipeline::{BuildOutcome, BuildReport, BuildResult};
use crate::processor::ProcessorOutput;

/// Debug manifest mapping friendly names to deployed artifacts.
pub const FILE_LISTING_NAME: &str = "filelisting.json";

/// Consumes build results as they arrive and performs the single-threaded
/// write side of the pipeline: artifact deployment, descriptor write-back
/// and the debug manifest.
pub struct Deployer<'a> {
    params: &'a BuildParams,
}

impl<'a> Deployer<'a> {
    pub fn new(params: &'a BuildParams) -> Self {
        Deployer { params }
    }

    /// Handle one result off the stream. A failed build is reported and
    /// counted without stopping the batch; a write failure on this side
    /// aborts the run.
    pub fn handle(
        &self,
        result: BuildResult,
        report: &mut BuildReport,
    ) -> Result<(), DeployError> {
        match &result.outcome {
            BuildOutcome::Failed(cause) => {
                error!(
                    "Asset '{}' ({}) failed to build: {cause}",
                    result.friendly_name, result.id
                );
                report
                    .failed
                    .push((result.id, result.friendly_name.clone()));
            }
            BuildOutcome::Built(output) => {
                for warning in &output.build_output.warnings {
                    warn!("Asset '{}' ({}): {warning}", result.friendly_name, result.id);
                }
                for message in &output.build_output.errors {
                    warn!(
                        "Asset '{}' ({}) reported: {message}",
                        result.friendly_name, result.id
                    );
                }
                self.sync_descriptor(&result, output)?;
                self.deploy_artifact(&result, output)?;
                info!("Deployed asset '{}' ({})", result.friendly_name, result.id);
                report.built += 1;
            }
            BuildOutcome::Reused(output) => {
                self.sync_descriptor(&result, output)?;
                report.reused += 1;
            }
        }
        Ok(())
    }

    /// Emit the debug manifest. Called once, after the result stream has
    /// drained.
    pub fn write_manifest(&self, registry: &FriendlyNameRegistry) -> Result<(), DeployError> {
        let path = self.params.output_directory.join(FILE_LISTING_NAME);
        let text =
            serde_json::to_string_pretty(registry).map_err(|source| DeployError::Encode {
                path: path.clone(),
                source,
            })?;
        std::fs::write(&path, text).map_err(|source| DeployError::Manifest { path, source })
    }

    /// Persist processor-side descriptor mutations back to the authoring
    /// location, keeping authored files in sync with auto-discovered
    /// data such as dependency lists. Skipped when nothing changed.
    fn sync_descriptor(
        &self,
        result: &BuildResult,
        output: &ProcessorOutput,
    ) -> Result<(), DeployError> {
        if output.metadata == result.authored {
            return Ok(());
        }
        info!(
            "Updating descriptor '{}' with processor changes",
            result.descriptor_path.display()
        );
        let text = serde_json::to_string_pretty(&output.metadata).map_err(|source| {
            DeployError::Encode {
                path: result.descriptor_path.clone(),
                source,
            }
        })?;
        std::fs::write(&result.descriptor_path, text).map_err(|source| DeployError::WriteBack {
            path: result.descriptor_path.clone(),
            source,
        })
    }

    fn deploy_artifact(
        &self,
        result: &BuildResult,
        output: &ProcessorOutput,
    ) -> Result<(), DeployError> {
        let bytes = BASE64
            .decode(output.build_output.data.as_bytes())
            .map_err(|source| DeployError::Payload {
                id: result.id,
                source,
            })?;
        write_atomic(&result.deployed_file, &bytes).map_err(|source| DeployError::Artifact {
            path: result.deployed_file.clone(),
            source,
        })
    }
}

/// Write to a sibling temp file, then rename over the target, so readers
/// never observe a partial artifact. The temp name is derived from the
/// asset's own filename and therefore contention-free.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    use crate::descriptor::AssetDescriptor;
    use crate::loader::NameEntry;

    fn sample_descriptor() -> AssetDescriptor {
        serde_json::from_value(json!({
            "uuid": "{AA53D0BE-98A0-42DD-9500-88B375EDC136}",
            "type": "blob",
            "friendlyname": "Raw",
            "inputs": ["raw.bin"],
            "prerequisites": [],
            "processoptions": {}
        }))
        .unwrap()
    }

    fn params(out: &Path) -> BuildParams {
        BuildParams {
            asset_directory: out.to_owned(),
            cache_directory: out.to_owned(),
            output_directory: out.to_owned(),
            tmp_directory: out.to_owned(),
            working_directory: out.to_owned(),
        }
    }

    fn built_result(dir: &Path, payload: &str) -> BuildResult {
        let descriptor = sample_descriptor();
        let output: ProcessorOutput = serde_json::from_value(json!({
            "assetmetadata": serde_json::to_value(&descriptor).unwrap(),
            "buildoutput": {"data": payload, "warnings": [], "errors": []}
        }))
        .unwrap();
        BuildResult {
            id: descriptor.uuid,
            friendly_name: descriptor.friendly_name.clone(),
            authored: descriptor,
            descriptor_path: dir.join("raw.asset"),
            deployed_file: dir.join("aa53d0be98a042dd950088b375edc136.bin"),
            outcome: BuildOutcome::Built(output),
        }
    }

    #[test]
    fn test_built_result_deploys_decoded_payload() {
        let dir = TempDir::new().unwrap();
        let p = params(dir.path());
        let deployer = Deployer::new(&p);
        let mut report = BuildReport::default();

        // "hello" in base64.
        let result = built_result(dir.path(), "aGVsbG8=");
        let deployed = result.deployed_file.clone();
        deployer.handle(result, &mut report).unwrap();

        assert_eq!(std::fs::read(deployed).unwrap(), b"hello");
        assert_eq!(report.built, 1);
    }

    #[test]
    fn test_deploy_overwrites_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let p = params(dir.path());
        let deployer = Deployer::new(&p);
        let mut report = BuildReport::default();

        let result = built_result(dir.path(), "aGVsbG8=");
        let deployed = result.deployed_file.clone();
        std::fs::write(&deployed, b"stale artifact").unwrap();
        deployer.handle(result, &mut report).unwrap();

        assert_eq!(std::fs::read(deployed).unwrap(), b"hello");
    }

    #[test]
    fn test_invalid_payload_is_run_level_error() {
        let dir = TempDir::new().unwrap();
        let p = params(dir.path());
        let deployer = Deployer::new(&p);
        let mut report = BuildReport::default();

        let result = built_result(dir.path(), "not-base64!!!");
        let error = deployer.handle(result, &mut report).err().unwrap();
        assert!(matches!(error, DeployError::Payload { .. }));
    }

    #[test]
    fn test_unchanged_descriptor_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let p = params(dir.path());
        let deployer = Deployer::new(&p);
        let mut report = BuildReport::default();

        let result = built_result(dir.path(), "aGVsbG8=");
        let descriptor_path = result.descriptor_path.clone();
        deployer.handle(result, &mut report).unwrap();

        // No write-back happened; the authored file was never created.
        assert!(!descriptor_path.exists());
    }

    #[test]
    fn test_mutated_descriptor_is_written_back() {
        let dir = TempDir::new().unwrap();
        let p = params(dir.path());
        let deployer = Deployer::new(&p);
        let mut report = BuildReport::default();

        let mut result = built_result(dir.path(), "aGVsbG8=");
        if let BuildOutcome::Built(output) = &mut result.outcome {
            output.metadata.inputs.push(PathBuf::from("discovered.png"));
        }
        let descriptor_path = result.descriptor_path.clone();
        deployer.handle(result, &mut report).unwrap();

        let rewritten: AssetDescriptor =
            serde_json::from_str(&std::fs::read_to_string(descriptor_path).unwrap()).unwrap();
        assert_eq!(rewritten.inputs.len(), 2);
        assert_eq!(rewritten.inputs[1], PathBuf::from("discovered.png"));
    }

    #[test]
    fn test_failed_result_is_counted_not_fatal() {
        let dir = TempDir::new().unwrap();
        let p = params(dir.path());
        let deployer = Deployer::new(&p);
        let mut report = BuildReport::default();

        let descriptor = sample_descriptor();
        let result = BuildResult {
            id: descriptor.uuid,
            friendly_name: descriptor.friendly_name.clone(),
            authored: descriptor,
            descriptor_path: dir.path().join("raw.asset"),
            deployed_file: dir.path().join("raw.bin"),
            outcome: BuildOutcome::Failed(crate::error::TaskError::Process(
                crate::processor::ProcessError::EmptyCommand,
            )),
        };
        deployer.handle(result, &mut report).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.built, 0);
    }

    #[test]
    fn test_manifest_is_written_to_output_root() {
        let dir = TempDir::new().unwrap();
        let p = params(dir.path());
        let deployer = Deployer::new(&p);

        let mut registry = FriendlyNameRegistry::default();
        registry.insert(
            "Raw".to_string(),
            NameEntry {
                filepath: vec!["aa53d0be98a042dd950088b375edc136.bin".to_string()],
                prerequisites: vec![],
            },
        );
        deployer.write_manifest(&registry).unwrap();

        let manifest: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(FILE_LISTING_NAME)).unwrap(),
        )
        .unwrap();
        assert_eq!(
            manifest["Raw"]["filepath"][0],
            "aa53d0be98a042dd950088b375edc136.bin"
        );
    }
}
