//! Reference pass-through processor: base64-encodes an asset's first
//! input file as the build payload. Useful for raw binary assets that
//! need no conversion, and as the subprocess fixture for the CLI tests.
//!
//! Recognized process options:
//! - `logfile`: append one line per invocation (lets callers count real
//!   builds across runs)
//! - `fail`: exit non-zero without producing output
//! - `discoverinputs`: extra input paths reported back in the metadata,
//!   as a processor doing dependency scanning would

use std::io::Write;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

fn main() -> anyhow::Result<()> {
    let task_path = std::env::args()
        .nth(1)
        .context("Usage: assetbake-blobproc <task-file>")?;
    let text = std::fs::read_to_string(&task_path)
        .with_context(|| format!("Failed to read task file '{task_path}'"))?;
    let mut task: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse task file '{task_path}'"))?;

    let options = task.get("processoptions").cloned().unwrap_or_default();

    if let Some(logfile) = options.get("logfile").and_then(|v| v.as_str()) {
        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(logfile)
            .with_context(|| format!("Failed to open log file '{logfile}'"))?;
        let uuid = task.get("uuid").and_then(|v| v.as_str()).unwrap_or("?");
        writeln!(log, "{uuid}")?;
    }

    if options.get("fail").and_then(|v| v.as_bool()).unwrap_or(false) {
        bail!("Forced failure requested by process options");
    }

    let first = task["assetmetadata"]["inputs"]
        .as_array()
        .and_then(|inputs| inputs.first())
        .and_then(|v| v.as_str())
        .context("Asset declares no inputs")?
        .to_owned();
    let payload =
        std::fs::read(&first).with_context(|| format!("Failed to read input '{first}'"))?;

    if let Some(discovered) = options.get("discoverinputs").and_then(|v| v.as_array()) {
        let inputs = task["assetmetadata"]["inputs"]
            .as_array_mut()
            .context("Malformed task metadata")?;
        inputs.extend(discovered.iter().cloned());
    }

    task["buildoutput"] = serde_json::json!({
        "data": BASE64.encode(&payload),
        "warnings": [],
        "errors": []
    });

    let output_file = task
        .get("output_file")
        .and_then(|v| v.as_str())
        .context("Task has no output_file")?
        .to_owned();
    std::fs::write(&output_file, serde_json::to_string_pretty(&task)?)
        .with_context(|| format!("Failed to write output '{output_file}'"))?;

    Ok(())
}
