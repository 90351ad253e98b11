//! Server and backend configuration

use std::path::PathBuf;

/// Where to find the PDFium shared library.
///
/// Built once at start-up and handed to [`crate::pdf::Rasterizer`]; nothing
/// reads library locations from global state.
#[derive(Debug, Clone)]
pub struct RasterConfig {
    /// Directories searched (in order) for the platform PDFium library
    /// before falling back to the system library search path.
    pub library_dirs: Vec<PathBuf>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            library_dirs: vec![PathBuf::from("./"), PathBuf::from("/opt/pdfium/lib")],
        }
    }
}

/// Security and resource configuration for the PDF workbench server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories to expose as PDF resources (also the sandbox for paths)
    pub resource_dirs: Vec<String>,
    /// Directory outputs are written to when a tool gets no explicit output path
    pub output_dir: Option<PathBuf>,
    /// Maximum total bytes in cache (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum number of cache entries (default: 100)
    pub cache_max_entries: usize,
    /// Maximum rendering resolution for rasterizing tools (default: 600)
    pub max_dpi: u32,
    /// Maximum total pixel area of one rendered page (default: 100_000_000)
    pub max_image_pixels: u64,
    /// PDFium binding configuration
    pub raster: RasterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            output_dir: None,
            cache_max_bytes: 512 * 1024 * 1024, // 512MB
            cache_max_entries: 100,
            max_dpi: 600,
            max_image_pixels: 100_000_000,
            raster: RasterConfig::default(),
        }
    }
}
