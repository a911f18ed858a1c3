//! Command-line entry point.
//!
//! Renders one location per invocation and exits non-zero when any stage
//! fails, including a failed data fetch.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coastglow::compose::ComposeOptions;
use coastglow::fetch::{
    FetchConfig, OverpassClient, DEFAULT_MAX_SIZE, DEFAULT_NOMINATIM_URL, DEFAULT_OVERPASS_URL,
    DEFAULT_TIMEOUT_SECS,
};
use coastglow::raster::{RenderOptions, DEFAULT_OUTPUT};
use coastglow::region::DEFAULT_LOCATION;
use coastglow::{LabelOrder, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "coastglow")]
#[command(about = "Render a glowing coastline map with lighthouses from OpenStreetMap")]
struct Args {
    /// Place name (e.g. "Boothbay, Maine, USA")
    #[arg(default_value = DEFAULT_LOCATION)]
    location: String,

    /// Output PNG path
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Output resolution
    #[arg(long, default_value = "300")]
    dpi: u32,

    /// Overpass query timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Overpass maximum query size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE)]
    max_size: u64,

    /// Overpass API interpreter URL
    #[arg(long, default_value = DEFAULT_OVERPASS_URL)]
    overpass_url: String,

    /// Nominatim search URL
    #[arg(long, default_value = DEFAULT_NOMINATIM_URL)]
    nominatim_url: String,

    /// Leave out the lighthouse label key
    #[arg(long)]
    no_labels: bool,

    /// Stacking order of the label key
    #[arg(long, value_enum, default_value = "fetch-order")]
    label_order: LabelOrder,

    /// Fetch and compose only, do not write an image
    #[arg(long)]
    dry_run: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let fetch_config = FetchConfig {
        overpass_url: args.overpass_url.clone(),
        nominatim_url: args.nominatim_url.clone(),
        timeout: Duration::from_secs(args.timeout),
        max_size: args.max_size,
        ..FetchConfig::default()
    };
    let client = OverpassClient::new(fetch_config).context("Failed to create HTTP client")?;

    let pipeline = Pipeline::new(client)
        .with_compose_options(ComposeOptions {
            show_labels: !args.no_labels,
            label_order: args.label_order,
        })
        .with_render_options(RenderOptions {
            output: args.output.clone(),
            dpi: args.dpi,
            ..RenderOptions::default()
        });

    if args.dry_run {
        let plan = pipeline
            .plan(&args.location)
            .await
            .with_context(|| format!("Failed to plan map for '{}'", args.location))?;
        info!(
            "Dry run: {} layers, viewport {}",
            plan.instructions.len(),
            plan.viewport
        );
        return Ok(());
    }

    let outcome = pipeline
        .run(&args.location)
        .await
        .with_context(|| format!("Failed to render map for '{}'", args.location))?;

    println!("Image saved to {}", outcome.output.display());
    Ok(())
}
