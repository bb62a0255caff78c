//! Raster catalog command line tool.
//!
//! Creates catalogs, registers Zarr rasters under user-defined keys and
//! queries datasets, metadata and tiles. Results are written to stdout as
//! JSON; logs go to stderr.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use raster_driver::{DriverSettings, RasterDriver};

#[derive(Parser, Debug)]
#[command(name = "rastercat")]
#[command(about = "Key-indexed raster catalogs with metadata and tiles")]
struct Args {
    /// Catalog location (`sqlite://PATH`, a file path or `memory://NAME`)
    #[arg(short, long, env = "RASTERCAT_CATALOG")]
    catalog: String,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize an empty catalog
    Create {
        /// Key names in order, each optionally `NAME=DESCRIPTION`
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Register a raster under the given keys
    Ingest {
        /// Path of the Zarr raster to read
        path: String,

        /// Key values in schema order
        #[arg(required = true)]
        keys: Vec<String>,

        /// Register without computing metadata
        #[arg(long)]
        skip_metadata: bool,

        /// Locator to store instead of PATH
        #[arg(long)]
        override_path: Option<String>,

        /// Extra metadata as a JSON object
        #[arg(long)]
        extra: Option<String>,

        /// Statistics policy: auto, exact or chunked
        #[arg(long, default_value = "auto")]
        stats: String,

        /// Decimate to ROWSxCOLS before computing statistics
        #[arg(long)]
        max_shape: Option<String>,
    },

    /// Print the key names and descriptions
    Keys,

    /// List datasets
    List {
        /// Filter as `KEY=VALUE`; repeating a key matches any of its values
        #[arg(short, long)]
        filter: Vec<String>,

        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: u64,

        /// Page size (default: everything)
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Print the metadata of a dataset
    Metadata {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Remove a dataset
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Compute a tile of a dataset
    Tile {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Web Mercator extent `minx,miny,maxx,maxy` (default: whole raster)
        #[arg(long)]
        bounds: Option<String>,

        /// Output shape ROWSxCOLS (default: RASTERCAT_DEFAULT_TILE_SIZE)
        #[arg(long)]
        size: Option<String>,

        /// Nearest-neighbour resampling
        #[arg(long)]
        preserve_values: bool,

        /// Print every sample instead of a summary
        #[arg(long)]
        values: bool,
    },

    /// Restamp the catalog with a newer version
    Migrate {
        /// Target version (default: this build's version)
        #[arg(long)]
        target: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let settings = DriverSettings::from_env();
    debug!(settings = ?settings, "Loaded settings");

    let driver = RasterDriver::open(&args.catalog, settings)
        .await
        .with_context(|| format!("failed to open catalog '{}'", args.catalog))?;

    let output = commands::run(&driver, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
