use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use assetbake_core::cache::{CACHE_DIR_NAME, TMP_DIR_NAME, WORKING_DIR_NAME};
use assetbake_core::{run, BuildParams, BuilderConfig, CommandProcessor};

/// Assetbake - incremental asset build pipeline
#[derive(Parser, Debug)]
#[command(name = "assetbake")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Asset source directory, scanned recursively for .asset descriptors
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Binary output directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Delete all cached build data before building
    #[arg(long)]
    clean: bool,

    /// Global build configuration file
    #[arg(long, value_name = "FILE", default_value = "builderconfig.json")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for detailed logs, RUST_LOG=info for normal output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let working_directory =
        std::env::current_dir().context("Failed to determine working directory")?;

    let asset_directory = working_directory.join(&cli.directory);
    let asset_directory = asset_directory.canonicalize().with_context(|| {
        format!(
            "Asset directory '{}' is not accessible",
            asset_directory.display()
        )
    })?;

    let output_directory = working_directory.join(&cli.output);
    std::fs::create_dir_all(&output_directory).with_context(|| {
        format!(
            "Failed to create output directory '{}'",
            output_directory.display()
        )
    })?;
    let output_directory = output_directory.canonicalize()?;

    let working_state = output_directory.join(WORKING_DIR_NAME);
    let cache_directory = working_state.join(CACHE_DIR_NAME);
    let tmp_directory = working_state.join(TMP_DIR_NAME);

    if cli.clean {
        info!("Cleaning cached build data");
        for dir in [&cache_directory, &tmp_directory] {
            if dir.exists() {
                std::fs::remove_dir_all(dir)
                    .with_context(|| format!("Failed to clean '{}'", dir.display()))?;
            }
        }
    }
    std::fs::create_dir_all(&cache_directory)?;
    std::fs::create_dir_all(&tmp_directory)?;

    let config = BuilderConfig::load(&cli.config)?;

    let params = BuildParams {
        asset_directory,
        cache_directory,
        output_directory,
        tmp_directory,
        working_directory,
    };

    let report = run(&config, &params, &CommandProcessor)?;

    if !report.failed.is_empty() {
        info!(
            "{} asset(s) failed and will be retried next run",
            report.failed.len()
        );
    }

    Ok(())
}
