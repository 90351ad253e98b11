//! PDF Workbench - Entry point
//!
//! MCP server for merging, splitting, compressing, rasterizing and
//! protecting PDF files over stdio.

use clap::Parser;
use pdf_workbench::{run_server_with_config, RasterConfig, ServerConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pdf-workbench")]
#[command(version, about = "MCP server for PDF file tools")]
struct Args {
    /// Directories exposed as resources; file paths outside them are refused
    #[arg(long = "resource-dir", env = "PDF_WORKBENCH_RESOURCE_DIRS", value_delimiter = ',')]
    resource_dirs: Vec<String>,

    /// Directory outputs are written to when a tool gets no output path
    #[arg(long, env = "PDF_WORKBENCH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Maximum total bytes held in the output cache
    #[arg(long, env = "PDF_WORKBENCH_CACHE_MAX_BYTES", default_value_t = 512 * 1024 * 1024)]
    cache_max_bytes: usize,

    /// Maximum number of cached outputs
    #[arg(long, env = "PDF_WORKBENCH_CACHE_MAX_ENTRIES", default_value_t = 100)]
    cache_max_entries: usize,

    /// Highest rendering resolution accepted by rasterizing tools
    #[arg(long, env = "PDF_WORKBENCH_MAX_DPI", default_value_t = 600)]
    max_dpi: u32,

    /// Largest pixel area of one rendered page
    #[arg(long, env = "PDF_WORKBENCH_MAX_IMAGE_PIXELS", default_value_t = 100_000_000)]
    max_image_pixels: u64,

    /// Directories searched for the PDFium library before the system path
    #[arg(long = "pdfium-dir", env = "PDFIUM_LIB_DIRS", value_delimiter = ',')]
    pdfium_dirs: Vec<PathBuf>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let raster = if self.pdfium_dirs.is_empty() {
            RasterConfig::default()
        } else {
            RasterConfig {
                library_dirs: self.pdfium_dirs,
            }
        };

        ServerConfig {
            resource_dirs: self.resource_dirs,
            output_dir: self.output_dir,
            cache_max_bytes: self.cache_max_bytes,
            cache_max_entries: self.cache_max_entries,
            max_dpi: self.max_dpi,
            max_image_pixels: self.max_image_pixels,
            raster,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_workbench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        resource_dirs = ?args.resource_dirs,
        "Starting PDF workbench"
    );

    run_server_with_config(args.into_config()).await
}
