//! MCP Server implementation using rmcp

use crate::config::ServerConfig;
use crate::error::Error;
use crate::ops::{
    self, CompressSettings, CompressionEngine, FailedAttempt, FailedPage, ImageFormat,
    ImageSettings, PageSelection, ProtectSettings, ProtectionGuarantee, ProtectionStrategy,
};
use crate::pdf::{Permissions, QpdfWrapper, Rasterizer};
use crate::pipeline::{
    self, validate, validate_all, Operation, OutputFile, OutputKind, ProgressTracker, Rejected,
    SharedObserver, TracingObserver, ValidatedPdf,
};
use crate::source::{
    resolve_base64, resolve_cache, resolve_path, CacheManager, PathSandbox, SourceFile,
};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, service::RequestContext, tool, tool_handler, tool_router, RoleServer,
    ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where a tool reads its input PDF from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
        /// Original file name, used to name outputs (must end in .pdf)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Reference to a cached output of an earlier tool call
    CacheRef {
        /// Cache key from previous operation
        cache_key: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if let Some(obj) = value.as_object() {
            if let Some(v) = obj.get("path") {
                if let Some(s) = v.as_str() {
                    return Ok(PdfSource::Path {
                        path: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"path\" must be a string"));
            }
            if let Some(v) = obj.get("base64") {
                let Some(s) = v.as_str() else {
                    return Err(serde::de::Error::custom("\"base64\" must be a string"));
                };
                let name = match obj.get("name") {
                    None | Some(serde_json::Value::Null) => None,
                    Some(serde_json::Value::String(n)) => Some(n.clone()),
                    Some(_) => return Err(serde::de::Error::custom("\"name\" must be a string")),
                };
                return Ok(PdfSource::Base64 {
                    base64: s.to_string(),
                    name,
                });
            }
            if let Some(v) = obj.get("cache_key") {
                if let Some(s) = v.as_str() {
                    return Ok(PdfSource::CacheRef {
                        cache_key: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"cache_key\" must be a string"));
            }
            let keys: Vec<&String> = obj.keys().collect();
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got keys: {:?}",
                keys
            )))
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )))
        }
    }
}

/// PDF workbench MCP server
#[derive(Clone)]
pub struct PdfServer {
    cache: Arc<RwLock<CacheManager>>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
    rasterizer: Arc<Rasterizer>,
    sandbox: PathSandbox,
    observer: SharedObserver,
}

// ============================================================================
// Request/Response types for list_pdfs
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListPdfsParams {
    /// Directory to search for PDF files
    pub directory: String,
    /// Search subdirectories recursively (default: false)
    #[serde(default)]
    pub recursive: bool,
    /// Filename pattern to filter (e.g., "report*.pdf"). Supports glob patterns.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PdfFileInfo {
    /// Full path to the PDF file
    pub path: String,
    /// Filename only
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListPdfsResult {
    /// Directory that was searched
    pub directory: String,
    /// List of PDF files found
    pub files: Vec<PdfFileInfo>,
    /// Total number of files found
    pub total_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for inspect_pdfs
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InspectPdfsParams {
    /// PDF sources to check
    pub sources: Vec<PdfSource>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Serialize, JsonSchema)]
pub struct InspectPdfResult {
    /// Source identifier
    pub source: String,
    /// Whether the file parsed as a PDF with at least one page
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// File size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Whether opening the file needs a password
    pub requires_password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for merge_pdfs
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MergePdfsParams {
    /// PDF sources to merge (in order). Invalid files are skipped and reported.
    pub sources: Vec<PdfSource>,
    /// Output file path (optional). If provided, saves the merged PDF to this path.
    /// Supports both absolute and relative paths.
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Default, Serialize, JsonSchema)]
pub struct MergePdfsResult {
    /// Number of sources given
    pub source_count: u32,
    /// Number of sources that went into the output
    pub merged_count: u32,
    /// Sources left out, with the reason
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedSource>,
    /// Conventional file name of the output
    pub output_file_name: String,
    /// Cache key for the output PDF, for chaining. Absent when it does not fit in the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    /// Total pages in output PDF
    pub output_page_count: u32,
    /// Path where PDF was saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}

impl From<Rejected> for SkippedSource {
    fn from(rejected: Rejected) -> Self {
        Self {
            source: rejected.name,
            reason: rejected.reason,
        }
    }
}

// ============================================================================
// Request/Response types for split_pdf
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// One page (`page`)
    Single,
    /// A contiguous range (`start` to `end`)
    Range,
    /// Every page as its own PDF, bundled in a zip
    All,
    /// A page expression (`pages`)
    Pages,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SplitPdfParams {
    /// Source PDF to split
    pub source: PdfSource,
    /// Split mode: "single", "range", "all" or "pages"
    pub mode: SplitMode,
    /// Page number for mode "single" (1-indexed)
    #[serde(default)]
    pub page: Option<u32>,
    /// First page for mode "range" (1-indexed, inclusive)
    #[serde(default)]
    pub start: Option<u32>,
    /// Last page for mode "range" (1-indexed, inclusive)
    #[serde(default)]
    pub end: Option<u32>,
    /// Pages for mode "pages" using qpdf page range syntax.
    ///
    /// - "1-5" : pages 1 through 5
    /// - "1,3,5" : specific pages
    /// - "z" : last page, "r2" : second to last
    /// - "z-1" : all pages in reverse order
    /// - "1-z:odd" / "1-z:even" : odd or even pages of a range
    /// - "1,1" : duplicates allowed
    #[serde(default)]
    pub pages: Option<String>,
    /// Output file path (optional). If provided, saves the output to this path.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SplitPart {
    pub file_name: String,
    /// Cache key of this single-page PDF; absent when it was evicted by later parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

#[derive(Debug, Default, Serialize, JsonSchema)]
pub struct SplitPdfResult {
    /// Source identifier
    pub source: String,
    /// Conventional file name of the output
    pub output_file_name: String,
    /// Cache key for the output, for chaining. Absent when it does not fit in the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    /// MIME type of the output: a PDF, or a zip for mode "all"
    pub output_mime_type: String,
    /// Number of pages taken from the source
    pub output_page_count: u32,
    /// Individual PDFs inside the zip (mode "all")
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<SplitPart>,
    /// Path where the output was saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for compress_pdf
// ============================================================================

fn default_quality() -> u8 {
    ops::compress::DEFAULT_QUALITY
}

fn default_raster_dpi() -> u32 {
    ops::compress::DEFAULT_RASTER_DPI
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompressPdfParams {
    /// PDF sources to compress, each independently
    pub sources: Vec<PdfSource>,
    /// JPEG quality 0-100 for the raster engine (default: 80). Lower is smaller.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Compression engine: "raster" (default, re-renders pages as images) or
    /// "structural" (lossless rewrite)
    #[serde(default)]
    pub engine: CompressionEngine,
    /// Rendering resolution for the raster engine (default: 150)
    #[serde(default = "default_raster_dpi")]
    pub raster_dpi: u32,
    /// Directory to save outputs in (optional), under their conventional names
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Serialize, JsonSchema)]
pub struct CompressPdfResult {
    /// Source identifier
    pub source: String,
    /// Conventional file name of the output
    pub output_file_name: String,
    /// Cache key for the output PDF, for chaining. Absent when it does not fit in the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    /// Engine that ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<CompressionEngine>,
    /// JPEG quality that was applied (raster engine only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Original file size in bytes
    pub original_size: usize,
    /// Output file size in bytes
    pub compressed_size: usize,
    /// Output size over input size
    pub compression_ratio: f64,
    /// Bytes saved
    pub bytes_saved: usize,
    /// The compressed result was not smaller, so the original was returned
    pub kept_original: bool,
    /// Path where PDF was saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for convert_pdf_to_images
// ============================================================================

fn default_dpi() -> u32 {
    ops::images::DEFAULT_DPI
}

fn default_jpeg_quality() -> u8 {
    ops::images::DEFAULT_JPEG_QUALITY
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConvertPdfToImagesParams {
    /// Source PDF
    pub source: PdfSource,
    /// Image format: "png" (default) or "jpeg"
    #[serde(default)]
    pub format: ImageFormat,
    /// Rendering resolution (default: 300)
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// JPEG quality 1-100 (default: 90)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Pages to convert (qpdf page range syntax, default: all pages)
    #[serde(default)]
    pub pages: Option<String>,
    /// Output file path for the zip (optional)
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Serialize, JsonSchema)]
pub struct ConvertPdfToImagesResult {
    /// Source identifier
    pub source: String,
    /// Conventional file name of the zip
    pub output_file_name: String,
    /// Cache key for the zip, for chaining. Absent when it does not fit in the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    /// Number of images in the zip
    pub image_count: u32,
    /// Pages rendered (1-indexed)
    pub rendered_pages: Vec<u32>,
    /// Pages that could not be rendered
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_pages: Vec<FailedPage>,
    /// Path where the zip was saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for protect_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProtectPdfParams {
    /// Source PDF to protect
    pub source: PdfSource,
    /// Owner password (required to change permissions)
    pub owner_password: String,
    /// User password (required to open the PDF). Defaults to the owner password.
    #[serde(default)]
    pub user_password: Option<String>,
    /// Permission flags; everything is allowed unless turned off
    #[serde(flatten)]
    pub permissions: Permissions,
    /// Weakest acceptable protection: "none", "cosmetic" or "encrypted" (default)
    #[serde(default)]
    pub minimum_guarantee: ProtectionGuarantee,
    /// Strategies to try in order: "aes256", "aes128", "watermark".
    /// Default: all three in that order.
    #[serde(default)]
    pub strategies: Option<Vec<ProtectionStrategy>>,
    /// Output file path (optional). If provided, saves the protected PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password for source PDF (if already encrypted)
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Serialize, JsonSchema)]
pub struct ProtectPdfResult {
    /// Source identifier
    pub source: String,
    /// Conventional file name of the output
    pub output_file_name: String,
    /// Cache key for the output PDF, for chaining. Absent when it does not fit in the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    /// Strategy that produced the output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ProtectionStrategy>,
    /// Protection the output actually has
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantee: Option<ProtectionGuarantee>,
    /// Strategies that failed before one worked
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<FailedAttempt>,
    /// Informational messages (not errors)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
    /// Path where PDF was saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new PdfServer with specified resource directories
    pub fn with_resource_dirs(dirs: Vec<String>) -> Self {
        Self::with_config(ServerConfig {
            resource_dirs: dirs,
            ..ServerConfig::default()
        })
    }

    /// Create a new PdfServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let cache = CacheManager::new(config.cache_max_entries, config.cache_max_bytes);
        Self {
            cache: Arc::new(RwLock::new(cache)),
            tool_router: Self::tool_router(),
            rasterizer: Arc::new(Rasterizer::new(config.raster.clone())),
            sandbox: PathSandbox::new(config.resource_dirs.clone()),
            observer: Arc::new(TracingObserver),
            config: Arc::new(config),
        }
    }

    /// Validate PDF files and report their page counts
    #[tool(
        description = "Check PDF files before processing: whether each is a valid PDF, its page count, size, and whether it needs a password. Non-PDF files are rejected.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"name\": \"file.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn inspect_pdfs(&self, Parameters(params): Parameters<InspectPdfsParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_inspect(source, params.password.clone())
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "inspect_pdfs failed");
                    InspectPdfResult {
                        source: Self::source_name(source),
                        error: Some(e.client_message()),
                        ..Default::default()
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Merge multiple PDFs into one
    #[tool(
        description = "Merge multiple PDF files into one (merged.pdf). Pages are combined in the order given. Invalid files are skipped and listed in the result; the merge fails only if no valid file remains. The output is cached for chaining.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"name\": \"file.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn merge_pdfs(&self, Parameters(params): Parameters<MergePdfsParams>) -> String {
        let result = self.process_merge_pdfs(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "merge_pdfs failed");
            MergePdfsResult {
                source_count: params.sources.len() as u32,
                error: Some(e.client_message()),
                ..Default::default()
            }
        });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Split a PDF
    #[tool(
        description = "Extract pages from a PDF. Modes: \"single\" (one page, <name>_page-N.pdf), \"range\" (start..end, <name>_pages-S-E.pdf), \"all\" (every page as its own PDF, zipped as <name>_pages.zip), \"pages\" (qpdf page expression such as \"1-3,z\", <name>_selection.pdf). Outputs are cached for chaining.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"name\": \"file.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn split_pdf(&self, Parameters(params): Parameters<SplitPdfParams>) -> String {
        let result = self.process_split_pdf(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "split_pdf failed");
            SplitPdfResult {
                source: Self::source_name(&params.source),
                error: Some(e.client_message()),
                ..Default::default()
            }
        });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Compress PDFs
    #[tool(
        description = "Reduce PDF file size. Engine \"raster\" (default) re-renders every page as a JPEG at the given quality (0-100, default 80) and resolution (default 150 dpi); text becomes an image. Engine \"structural\" rewrites the file losslessly. If the result would not be smaller, the original is returned and kept_original is true. Output: <name>_compressed.pdf.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"name\": \"file.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn compress_pdf(&self, Parameters(params): Parameters<CompressPdfParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_compress_pdf(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "compress_pdf failed");
                    CompressPdfResult {
                        source: Self::source_name(source),
                        error: Some(e.client_message()),
                        ..Default::default()
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Convert PDF pages to images
    #[tool(
        description = "Render PDF pages to PNG or JPEG images and bundle them in a zip (<name>_images.zip, entries images/page-N.png). Default 300 dpi, JPEG quality 90. Pages that fail to render are listed in failed_pages; the call fails only if no page renders.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"name\": \"file.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn convert_pdf_to_images(
        &self,
        Parameters(params): Parameters<ConvertPdfToImagesParams>,
    ) -> String {
        let result = self
            .process_convert_pdf_to_images(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "convert_pdf_to_images failed");
                ConvertPdfToImagesResult {
                    source: Self::source_name(&params.source),
                    error: Some(e.client_message()),
                    ..Default::default()
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Password-protect a PDF
    #[tool(
        description = "Password-protect a PDF (<name>_protected.pdf). Strategies are tried in order (default aes256, aes128, watermark); strategies weaker than minimum_guarantee (default \"encrypted\") are never used. The result reports the strategy used, the guarantee actually provided, failed attempts, and notices. user_password defaults to owner_password. Permissions: print (full/low/none), modify, copy, annotate, fill_forms, accessibility, assembly.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"name\": \"file.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn protect_pdf(&self, Parameters(params): Parameters<ProtectPdfParams>) -> String {
        let result = self.process_protect_pdf(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "protect_pdf failed");
            ProtectPdfResult {
                source: Self::source_name(&params.source),
                error: Some(e.client_message()),
                ..Default::default()
            }
        });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// List PDF files in a directory
    #[tool(
        description = "List PDF files in a directory.

Returns for each file:
- Full path (can be used directly with other tools)
- Filename
- File size in bytes
- Last modified time

Supports recursive search and glob pattern filtering."
    )]
    async fn list_pdfs(&self, Parameters(params): Parameters<ListPdfsParams>) -> String {
        let result = self.process_list_pdfs(&params).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "list_pdfs failed");
            ListPdfsResult {
                directory: params.directory.clone(),
                files: vec![],
                total_count: 0,
                error: Some(e.client_message()),
            }
        });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl PdfServer {
    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { name, .. } => {
                name.clone().unwrap_or_else(|| "<base64>".to_string())
            }
            PdfSource::CacheRef { cache_key } => format!("<cache:{}>", cache_key),
        }
    }

    /// File intake: only PDFs get past this point
    async fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<SourceFile> {
        match source {
            PdfSource::Path { path } => {
                self.sandbox.check_read(path)?;
                resolve_path(path)
            }
            PdfSource::Base64 { base64, name } => resolve_base64(base64, name.as_deref()),
            PdfSource::CacheRef { cache_key } => resolve_cache(cache_key, &self.cache).await,
        }
    }

    async fn run_blocking<T, F>(work: F) -> crate::error::Result<T>
    where
        F: FnOnce() -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| Error::TaskJoin {
                reason: e.to_string(),
            })?
    }

    fn progress(&self, operation: &str) -> ProgressTracker {
        ProgressTracker::new(operation, self.observer.clone())
    }

    fn check_dpi(&self, dpi: u32) -> crate::error::Result<()> {
        if dpi == 0 || dpi > self.config.max_dpi {
            return Err(Error::InvalidParameter {
                reason: format!("dpi must be between 1 and {}", self.config.max_dpi),
            });
        }
        Ok(())
    }

    /// Cache an output so the next tool can pick it up
    async fn cache_output(&self, output: &OutputFile) -> Option<String> {
        self.cache_outputs(&[output]).await.pop().flatten()
    }

    /// Cache a batch under one lock. A key is returned only for entries
    /// still present once the whole batch is in, so callers never hand out
    /// keys that the batch itself evicted.
    async fn cache_outputs(&self, outputs: &[&OutputFile]) -> Vec<Option<String>> {
        let cache_guard = self.cache.write().await;
        let stored: Vec<Option<String>> = outputs
            .iter()
            .map(|output| {
                let key = cache_guard.generate_unique_key();
                cache_guard
                    .put(key.clone(), output.file_name.clone(), output.data.clone())
                    .then_some(key)
            })
            .collect();

        let keys: Vec<Option<String>> = stored
            .into_iter()
            .map(|key| key.filter(|k| cache_guard.contains(k)))
            .collect();

        let uncached = keys.iter().filter(|k| k.is_none()).count();
        if uncached > 0 {
            tracing::warn!(
                uncached,
                total = outputs.len(),
                "outputs did not fit in the cache"
            );
        }
        tracing::debug!(
            entries = cache_guard.len(),
            total_bytes = cache_guard.total_bytes(),
            "cached outputs"
        );
        keys
    }

    fn write_output(
        &self,
        output: &OutputFile,
        output_path: Option<&str>,
    ) -> crate::error::Result<Option<String>> {
        let written = pipeline::deliver(
            output,
            output_path,
            self.config.output_dir.as_deref(),
            &self.sandbox,
        )?;
        Ok(written.map(|p| p.display().to_string()))
    }

    async fn process_inspect(
        &self,
        source: &PdfSource,
        password: Option<String>,
    ) -> crate::error::Result<InspectPdfResult> {
        let resolved = self.resolve_source(source).await?;
        let name = resolved.name.clone();
        let size = resolved.size() as u64;

        let (requires_password, validated) = Self::run_blocking(move || {
            let requires_password = matches!(
                QpdfWrapper::page_count(&resolved.data, None),
                Err(Error::PasswordRequired)
            );
            let validated = validate(resolved, password.as_deref()).map(|pdf| pdf.page_count);
            Ok((requires_password, validated))
        })
        .await?;

        let mut result = InspectPdfResult {
            source: name,
            size: Some(size),
            requires_password,
            ..Default::default()
        };
        match validated {
            Ok(page_count) => {
                result.valid = true;
                result.page_count = Some(page_count);
            }
            Err(e) => {
                tracing::debug!(error = %e, "source failed validation");
                result.error = Some(e.client_message());
            }
        }
        Ok(result)
    }

    async fn process_merge_pdfs(
        &self,
        params: &MergePdfsParams,
    ) -> crate::error::Result<MergePdfsResult> {
        if params.sources.is_empty() {
            return Err(Error::InvalidParameter {
                reason: "No PDF sources provided".to_string(),
            });
        }

        // Intake failures are skipped just like validation failures
        let mut resolved = Vec::new();
        let mut skipped = Vec::new();
        for source in &params.sources {
            match self.resolve_source(source).await {
                Ok(file) => resolved.push(file),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping rejected source");
                    skipped.push(SkippedSource {
                        source: Self::source_name(source),
                        reason: e.client_message(),
                    });
                }
            }
        }

        let intake_skipped = skipped.len();
        let mut progress = self.progress("merge_pdfs");
        let (outcome, rejected) = Self::run_blocking(move || {
            let mut op = Operation::new("merge_pdfs");
            op.begin_validation()?;
            let (valid, rejected) = validate_all(resolved, None);
            op.finish_validation(!valid.is_empty())?;
            if valid.is_empty() {
                return Err(Error::NoValidInputs {
                    skipped: intake_skipped + rejected.len(),
                });
            }

            let outcome = op.process(|| ops::merge(&valid, rejected.len(), &mut progress))?;
            Ok((outcome, rejected))
        })
        .await?;

        skipped.extend(rejected.into_iter().map(SkippedSource::from));

        let output_cache_key = self.cache_output(&outcome.output).await;
        let output_path = self.write_output(&outcome.output, params.output_path.as_deref())?;

        Ok(MergePdfsResult {
            source_count: params.sources.len() as u32,
            merged_count: outcome.merged.len() as u32,
            skipped,
            output_file_name: outcome.output.file_name,
            output_cache_key,
            output_page_count: outcome.page_count,
            output_path,
            error: None,
        })
    }

    fn page_selection(params: &SplitPdfParams) -> crate::error::Result<PageSelection> {
        let missing = |field: &str| Error::InvalidParameter {
            reason: format!("mode requires \"{}\"", field),
        };

        Ok(match params.mode {
            SplitMode::Single => PageSelection::Single(params.page.ok_or_else(|| missing("page"))?),
            SplitMode::Range => PageSelection::Range {
                start: params.start.ok_or_else(|| missing("start"))?,
                end: params.end.ok_or_else(|| missing("end"))?,
            },
            SplitMode::All => PageSelection::All,
            SplitMode::Pages => {
                PageSelection::Expression(params.pages.clone().ok_or_else(|| missing("pages"))?)
            }
        })
    }

    async fn process_split_pdf(
        &self,
        params: &SplitPdfParams,
    ) -> crate::error::Result<SplitPdfResult> {
        let selection = Self::page_selection(params)?;
        let resolved = self.resolve_source(&params.source).await?;
        let source_name = resolved.name.clone();
        let password = params.password.clone();
        let mut progress = self.progress("split_pdf");

        let outcome = Self::run_blocking(move || {
            let mut op = Operation::new("split_pdf");
            let pdf = validate_for(&mut op, resolved, password.as_deref())?;
            op.process(|| ops::split(&pdf, &selection, password.as_deref(), &mut progress))
        })
        .await?;

        // Parts first, delivered output last: LRU drops the earliest parts
        let mut batch: Vec<&OutputFile> = outcome.parts.iter().collect();
        batch.push(&outcome.output);
        let mut keys = self.cache_outputs(&batch).await;
        let output_cache_key = keys.pop().flatten();
        let parts: Vec<SplitPart> = outcome
            .parts
            .iter()
            .zip(keys)
            .map(|(part, cache_key)| SplitPart {
                file_name: part.file_name.clone(),
                cache_key,
            })
            .collect();
        let output_path = self.write_output(&outcome.output, params.output_path.as_deref())?;

        Ok(SplitPdfResult {
            source: source_name,
            output_mime_type: outcome.output.kind.mime_type().to_string(),
            output_file_name: outcome.output.file_name,
            output_cache_key,
            output_page_count: outcome.page_count,
            parts,
            output_path,
            error: None,
        })
    }

    async fn process_compress_pdf(
        &self,
        source: &PdfSource,
        params: &CompressPdfParams,
    ) -> crate::error::Result<CompressPdfResult> {
        if params.engine == CompressionEngine::Raster {
            self.check_dpi(params.raster_dpi)?;
        }
        let settings = CompressSettings {
            quality: params.quality,
            engine: params.engine,
            dpi: params.raster_dpi,
            max_pixels: self.config.max_image_pixels,
        };

        let resolved = self.resolve_source(source).await?;
        let source_name = resolved.name.clone();
        let password = params.password.clone();
        let rasterizer = self.rasterizer.clone();
        let mut progress = self.progress("compress_pdf");

        let outcome = Self::run_blocking(move || {
            let mut op = Operation::new("compress_pdf");
            let pdf = validate_for(&mut op, resolved, password.as_deref())?;
            op.process(|| {
                ops::compress(
                    &pdf,
                    &settings,
                    &rasterizer,
                    password.as_deref(),
                    &mut progress,
                )
            })
        })
        .await?;

        let output_cache_key = self.cache_output(&outcome.output).await;
        let target = params
            .output_dir
            .as_ref()
            .map(|dir| Path::new(dir).join(&outcome.output.file_name).display().to_string());
        let output_path = self.write_output(&outcome.output, target.as_deref())?;

        Ok(CompressPdfResult {
            source: source_name,
            output_cache_key,
            engine: Some(outcome.engine),
            quality: outcome.applied_quality,
            original_size: outcome.original_size,
            compressed_size: outcome.compressed_size,
            compression_ratio: outcome.ratio(),
            bytes_saved: outcome.bytes_saved(),
            kept_original: outcome.kept_original,
            output_file_name: outcome.output.file_name,
            output_path,
            error: None,
        })
    }

    async fn process_convert_pdf_to_images(
        &self,
        params: &ConvertPdfToImagesParams,
    ) -> crate::error::Result<ConvertPdfToImagesResult> {
        self.check_dpi(params.dpi)?;
        let settings = ImageSettings {
            format: params.format,
            dpi: params.dpi,
            jpeg_quality: params.jpeg_quality,
            pages: params.pages.clone(),
            max_pixels: self.config.max_image_pixels,
        };

        let resolved = self.resolve_source(&params.source).await?;
        let source_name = resolved.name.clone();
        let password = params.password.clone();
        let rasterizer = self.rasterizer.clone();
        let mut progress = self.progress("convert_pdf_to_images");

        let outcome = Self::run_blocking(move || {
            let mut op = Operation::new("convert_pdf_to_images");
            let pdf = validate_for(&mut op, resolved, password.as_deref())?;
            op.process(|| {
                ops::convert_to_images(
                    &pdf,
                    &settings,
                    &rasterizer,
                    password.as_deref(),
                    &mut progress,
                )
            })
        })
        .await?;

        let output_cache_key = self.cache_output(&outcome.output).await;
        let output_path = self.write_output(&outcome.output, params.output_path.as_deref())?;

        Ok(ConvertPdfToImagesResult {
            source: source_name,
            output_file_name: outcome.output.file_name,
            output_cache_key,
            image_count: outcome.rendered.len() as u32,
            rendered_pages: outcome.rendered,
            failed_pages: outcome.failed_pages,
            output_path,
            error: None,
        })
    }

    async fn process_protect_pdf(
        &self,
        params: &ProtectPdfParams,
    ) -> crate::error::Result<ProtectPdfResult> {
        let settings = ProtectSettings {
            owner_password: params.owner_password.clone(),
            user_password: params.user_password.clone(),
            permissions: params.permissions.clone(),
            minimum: params.minimum_guarantee,
            strategies: params.strategies.clone().unwrap_or_default(),
        };

        let resolved = self.resolve_source(&params.source).await?;
        let source_name = resolved.name.clone();
        let password = params.password.clone();
        let mut progress = self.progress("protect_pdf");

        let outcome = Self::run_blocking(move || {
            let mut op = Operation::new("protect_pdf");
            let pdf = validate_for(&mut op, resolved, password.as_deref())?;
            op.process(|| ops::protect(&pdf, &settings, password.as_deref(), &mut progress))
        })
        .await?;

        let output_cache_key = self.cache_output(&outcome.output).await;
        let output_path = self.write_output(&outcome.output, params.output_path.as_deref())?;

        Ok(ProtectPdfResult {
            source: source_name,
            output_file_name: outcome.output.file_name,
            output_cache_key,
            strategy: Some(outcome.strategy),
            guarantee: Some(outcome.guarantee),
            attempts: outcome.attempts,
            notices: outcome.notices,
            output_path,
            error: None,
        })
    }

    fn process_list_pdfs(&self, params: &ListPdfsParams) -> crate::error::Result<ListPdfsResult> {
        self.sandbox.check_read(&params.directory)?;

        let dir_path = Path::new(&params.directory);

        if !dir_path.exists() {
            return Err(Error::PdfNotFound {
                path: params.directory.clone(),
            });
        }

        if !dir_path.is_dir() {
            return Err(Error::InvalidParameter {
                reason: format!("{} is not a directory", params.directory),
            });
        }

        let mut files = Vec::new();

        let pattern = params
            .pattern
            .as_ref()
            .and_then(|p| glob::Pattern::new(p).ok());

        Self::collect_pdfs(dir_path, params.recursive, &pattern, &mut files)?;

        // Sort by path for consistent ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let total_count = files.len() as u32;

        Ok(ListPdfsResult {
            directory: params.directory.clone(),
            files,
            total_count,
            error: None,
        })
    }

    fn collect_pdfs(
        dir: &Path,
        recursive: bool,
        pattern: &Option<glob::Pattern>,
        files: &mut Vec<PdfFileInfo>,
    ) -> crate::error::Result<()> {
        let entries = std::fs::read_dir(dir).map_err(Error::Io)?;

        for entry in entries.flatten() {
            let path = entry.path();

            if path.is_dir() {
                if recursive {
                    let _ = Self::collect_pdfs(&path, recursive, pattern, files);
                }
                continue;
            }

            if !path.is_file() || !crate::source::has_pdf_extension(&path) {
                continue;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if let Some(ref pat) = pattern {
                if !pat.matches(&name) {
                    continue;
                }
            }

            let metadata = std::fs::metadata(&path).ok();
            let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            let modified = metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .and_then(|d| chrono::DateTime::from_timestamp(d.as_secs() as i64, 0))
                .map(|dt| dt.to_rfc3339());

            files.push(PdfFileInfo {
                path: path.to_string_lossy().to_string(),
                name,
                size,
                modified,
            });
        }

        Ok(())
    }
}

/// Run validation inside the operation's lifecycle
fn validate_for(
    op: &mut Operation,
    source: SourceFile,
    password: Option<&str>,
) -> crate::error::Result<ValidatedPdf> {
    op.begin_validation()?;
    match validate(source, password) {
        Ok(pdf) => {
            op.finish_validation(true)?;
            Ok(pdf)
        }
        Err(e) => {
            op.finish_validation(false)?;
            Err(e)
        }
    }
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF workbench: merge, split, compress, convert to images and password-protect \
                 PDF files. Every output is cached; pass its cache_key as the source of the next \
                 tool to chain operations. PDF files in configured directories are also exposed \
                 as resources."
                    .into(),
            ),
        }
    }

    /// List available PDF resources from configured directories
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let mut resources = Vec::new();

        for dir in self.config.resource_dirs.iter() {
            let params = ListPdfsParams {
                directory: dir.clone(),
                recursive: true,
                pattern: None,
            };

            if let Ok(list_result) = self.process_list_pdfs(&params) {
                for file in list_result.files {
                    let uri = format!("file://{}", file.path);
                    let mut resource = RawResource::new(uri.clone(), file.name.clone());
                    resource.mime_type = Some(OutputKind::Pdf.mime_type().to_string());
                    resource.description = Some(format!(
                        "PDF file ({} bytes){}",
                        file.size,
                        file.modified
                            .as_ref()
                            .map(|m| format!(", modified: {}", m))
                            .unwrap_or_default()
                    ));
                    resource.size = Some(file.size as u32);

                    resources.push(Annotated {
                        raw: resource,
                        annotations: None,
                    });
                }
            }
        }

        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: Default::default(),
        })
    }

    /// Read a PDF resource and return its inspection summary
    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let uri = &request.uri;

        let Some(path) = uri.strip_prefix("file://") else {
            return Err(ErrorData::invalid_params(
                "Only file:// URIs are supported",
                None,
            ));
        };

        if self.sandbox.check_read(path).is_err() {
            return Err(ErrorData::invalid_params(
                "Resource not found in configured directories",
                None,
            ));
        }

        let source = PdfSource::Path {
            path: path.to_string(),
        };

        match self.process_inspect(&source, None).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result)
                    .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::TextResourceContents {
                        uri: uri.clone(),
                        mime_type: Some("application/json".to_string()),
                        text,
                        meta: Default::default(),
                    }],
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "read_resource failed");
                Err(ErrorData::internal_error(e.client_message(), None))
            }
        }
    }
}

/// Run the MCP server without resource directories
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = PdfServer::with_config(config);

    if let Err(e) = server.rasterizer.check() {
        tracing::warn!(
            error = %e,
            "PDFium not available: compress (raster) and convert_pdf_to_images will fail"
        );
    }

    tracing::info!("PDF workbench server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{page_widths, sample_pdf};
    use base64::Engine;
    use pretty_assertions::assert_eq;

    fn base64_source(name: &str, pages: u32) -> PdfSource {
        PdfSource::Base64 {
            base64: base64::engine::general_purpose::STANDARD.encode(sample_pdf(pages)),
            name: Some(name.to_string()),
        }
    }

    async fn cached(server: &PdfServer, key: &str) -> Vec<u8> {
        server.cache.read().await.get(key).unwrap().data
    }

    #[test]
    fn test_source_name() {
        assert_eq!(
            PdfServer::source_name(&PdfSource::Path {
                path: "/test.pdf".to_string()
            }),
            "/test.pdf"
        );
        assert_eq!(
            PdfServer::source_name(&PdfSource::Base64 {
                base64: "...".to_string(),
                name: None,
            }),
            "<base64>"
        );
        assert_eq!(
            PdfServer::source_name(&PdfSource::CacheRef {
                cache_key: "abc123".to_string()
            }),
            "<cache:abc123>"
        );
    }

    #[test]
    fn test_pdf_source_deserialization() {
        let source: PdfSource = serde_json::from_str(r#"{"path": "/test.pdf"}"#).unwrap();
        assert!(matches!(source, PdfSource::Path { .. }));

        let source: PdfSource =
            serde_json::from_str(r#"{"base64": "JVBERi0xLjQ=", "name": "a.pdf"}"#).unwrap();
        assert!(matches!(
            source,
            PdfSource::Base64 { name: Some(ref n), .. } if n == "a.pdf"
        ));

        let source: PdfSource = serde_json::from_str(r#"{"cache_key": "abc123"}"#).unwrap();
        assert!(matches!(source, PdfSource::CacheRef { .. }));

        assert!(serde_json::from_str::<PdfSource>(r#"{"url": "https://x/y.pdf"}"#).is_err());
        assert!(serde_json::from_str::<PdfSource>(r#""/test.pdf""#).is_err());
    }

    #[test]
    fn test_params_defaults() {
        let params: CompressPdfParams =
            serde_json::from_str(r#"{"sources": [{"path": "/a.pdf"}]}"#).unwrap();
        assert_eq!(params.quality, 80);
        assert_eq!(params.engine, CompressionEngine::Raster);
        assert_eq!(params.raster_dpi, 150);

        let params: ConvertPdfToImagesParams =
            serde_json::from_str(r#"{"source": {"path": "/a.pdf"}}"#).unwrap();
        assert_eq!(params.format, ImageFormat::Png);
        assert_eq!(params.dpi, 300);
        assert_eq!(params.jpeg_quality, 90);

        let params: ProtectPdfParams = serde_json::from_str(
            r#"{"source": {"path": "/a.pdf"}, "owner_password": "o", "print": "low", "copy": false}"#,
        )
        .unwrap();
        assert_eq!(params.minimum_guarantee, ProtectionGuarantee::Encrypted);
        assert_eq!(params.permissions.print, crate::pdf::PrintLevel::Low);
        assert!(!params.permissions.copy);
        assert!(params.permissions.modify);
        assert!(params.strategies.is_none());
    }

    #[tokio::test]
    async fn test_inspect_reports_pages_and_rejects_text() {
        let server = PdfServer::new();

        let result = server
            .process_inspect(&base64_source("a.pdf", 3), None)
            .await
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.page_count, Some(3));
        assert!(!result.requires_password);

        let text = PdfSource::Base64 {
            base64: base64::engine::general_purpose::STANDARD.encode(b"hello"),
            name: Some("notes.txt".to_string()),
        };
        let err = server.process_inspect(&text, None).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFile { .. }));
    }

    #[tokio::test]
    async fn test_merge_skips_invalid_and_caches_output() {
        let server = PdfServer::new();
        let params = MergePdfsParams {
            sources: vec![
                base64_source("a.pdf", 2),
                PdfSource::Base64 {
                    base64: base64::engine::general_purpose::STANDARD.encode(b"%PDF-junk"),
                    name: Some("broken.pdf".to_string()),
                },
                base64_source("b.pdf", 1),
            ],
            output_path: None,
        };

        let result = server.process_merge_pdfs(&params).await.unwrap();
        assert_eq!(result.source_count, 3);
        assert_eq!(result.merged_count, 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].source, "broken.pdf");
        assert_eq!(result.output_file_name, "merged.pdf");
        assert_eq!(result.output_page_count, 3);

        let merged = cached(&server, result.output_cache_key.as_deref().unwrap()).await;
        assert_eq!(page_widths(&merged), vec![301.0, 302.0, 301.0]);
    }

    #[tokio::test]
    async fn test_merge_without_valid_inputs() {
        let server = PdfServer::new();
        let params = MergePdfsParams {
            sources: vec![PdfSource::Path {
                path: "/nonexistent/file.pdf".to_string(),
            }],
            output_path: None,
        };
        let err = server.process_merge_pdfs(&params).await.unwrap_err();
        assert!(matches!(err, Error::NoValidInputs { skipped: 1 }));
    }

    #[tokio::test]
    async fn test_split_then_chain_from_cache() {
        let server = PdfServer::new();
        let params = SplitPdfParams {
            source: base64_source("report.pdf", 5),
            mode: SplitMode::Range,
            page: None,
            start: Some(2),
            end: Some(4),
            pages: None,
            output_path: None,
            password: None,
        };

        let result = server.process_split_pdf(&params).await.unwrap();
        assert_eq!(result.output_file_name, "report_pages-2-4.pdf");
        assert_eq!(result.output_mime_type, "application/pdf");
        assert_eq!(result.output_page_count, 3);

        // Second split reads the first one's cached output
        let params = SplitPdfParams {
            source: PdfSource::CacheRef {
                cache_key: result.output_cache_key.unwrap(),
            },
            mode: SplitMode::Single,
            page: Some(1),
            start: None,
            end: None,
            pages: None,
            output_path: None,
            password: None,
        };
        let result = server.process_split_pdf(&params).await.unwrap();
        assert_eq!(result.output_file_name, "report_pages-2-4_page-1.pdf");
        let data = cached(&server, result.output_cache_key.as_deref().unwrap()).await;
        assert_eq!(page_widths(&data), vec![302.0]);
    }

    #[tokio::test]
    async fn test_split_all_caches_every_part() {
        let server = PdfServer::new();
        let params = SplitPdfParams {
            source: base64_source("deck.pdf", 3),
            mode: SplitMode::All,
            page: None,
            start: None,
            end: None,
            pages: None,
            output_path: None,
            password: None,
        };

        let result = server.process_split_pdf(&params).await.unwrap();
        assert_eq!(result.output_file_name, "deck_pages.zip");
        assert_eq!(result.output_mime_type, "application/zip");
        assert_eq!(result.parts.len(), 3);
        for part in &result.parts {
            let data = cached(&server, part.cache_key.as_deref().unwrap()).await;
            assert_eq!(QpdfWrapper::page_count(&data, None).unwrap(), 1);
        }

        // Zips are cached but are not valid PDF input
        let inspect = server
            .process_inspect(
                &PdfSource::CacheRef {
                    cache_key: result.output_cache_key.unwrap(),
                },
                None,
            )
            .await;
        assert!(matches!(inspect, Err(Error::UnsupportedFile { .. })));
    }

    #[tokio::test]
    async fn test_split_all_reports_only_live_cache_keys() {
        let server = PdfServer::with_config(ServerConfig {
            cache_max_entries: 5,
            ..ServerConfig::default()
        });
        let params = SplitPdfParams {
            source: base64_source("long.pdf", 8),
            mode: SplitMode::All,
            page: None,
            start: None,
            end: None,
            pages: None,
            output_path: None,
            password: None,
        };

        let result = server.process_split_pdf(&params).await.unwrap();
        assert_eq!(result.parts.len(), 8);

        let zip_key = result.output_cache_key.as_deref().unwrap();
        assert!(server.cache.read().await.contains(zip_key));

        let live: Vec<&str> = result
            .parts
            .iter()
            .filter_map(|part| part.cache_key.as_deref())
            .collect();
        assert_eq!(live.len(), 4);
        for key in live {
            assert!(server.cache.read().await.contains(key));
        }
        // The newest parts are the ones kept
        assert!(result.parts[..4].iter().all(|p| p.cache_key.is_none()));
    }

    #[tokio::test]
    async fn test_output_over_cache_budget_has_no_key() {
        let server = PdfServer::with_config(ServerConfig {
            cache_max_bytes: 16,
            ..ServerConfig::default()
        });
        let params = MergePdfsParams {
            sources: vec![base64_source("a.pdf", 1), base64_source("b.pdf", 1)],
            output_path: None,
        };

        let result = server.process_merge_pdfs(&params).await.unwrap();
        assert_eq!(result.output_page_count, 2);
        assert_eq!(result.output_cache_key, None);
        assert!(server.cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_split_mode_requires_its_fields() {
        let server = PdfServer::new();
        let params = SplitPdfParams {
            source: base64_source("a.pdf", 2),
            mode: SplitMode::Range,
            page: None,
            start: Some(1),
            end: None,
            pages: None,
            output_path: None,
            password: None,
        };
        let err = server.process_split_pdf(&params).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_compress_structural_and_dpi_bounds() {
        let server = PdfServer::new();
        let params = CompressPdfParams {
            sources: vec![base64_source("big.pdf", 2)],
            quality: 50,
            engine: CompressionEngine::Structural,
            raster_dpi: 150,
            output_dir: None,
            password: None,
        };
        let result = server
            .process_compress_pdf(&params.sources[0], &params)
            .await
            .unwrap();
        assert_eq!(result.output_file_name, "big_compressed.pdf");
        assert!(result.compressed_size <= result.original_size);
        assert_eq!(result.quality, None);

        let params = CompressPdfParams {
            engine: CompressionEngine::Raster,
            raster_dpi: 10_000,
            ..params
        };
        let err = server
            .process_compress_pdf(&params.sources[0], &params)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_protect_writes_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let server = PdfServer::with_config(ServerConfig {
            output_dir: Some(dir.path().to_path_buf()),
            ..ServerConfig::default()
        });
        let params: ProtectPdfParams = serde_json::from_value(serde_json::json!({
            "source": {
                "base64": base64::engine::general_purpose::STANDARD.encode(sample_pdf(1)),
                "name": "letter.pdf"
            },
            "owner_password": "owner-secret"
        }))
        .unwrap();

        let result = server.process_protect_pdf(&params).await.unwrap();
        assert_eq!(result.strategy, Some(ProtectionStrategy::Aes256));
        assert_eq!(result.guarantee, Some(ProtectionGuarantee::Encrypted));

        let written = dir.path().join("letter_protected.pdf");
        assert_eq!(result.output_path, Some(written.display().to_string()));
        let data = std::fs::read(&written).unwrap();
        assert!(matches!(
            QpdfWrapper::page_count(&data, None),
            Err(Error::PasswordRequired)
        ));
    }

    #[tokio::test]
    async fn test_sandbox_blocks_outside_paths() {
        let allowed = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let outside = other.path().join("x.pdf");
        std::fs::write(&outside, sample_pdf(1)).unwrap();

        let server =
            PdfServer::with_resource_dirs(vec![allowed.path().display().to_string()]);
        let err = server
            .process_inspect(
                &PdfSource::Path {
                    path: outside.display().to_string(),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PathAccessDenied { .. }));
    }

    #[test]
    fn test_list_pdfs_filters_extension_and_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report-1.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("report-2.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("nested.pdf"), b"%PDF").unwrap();

        let server = PdfServer::new();
        let flat = server
            .process_list_pdfs(&ListPdfsParams {
                directory: dir.path().display().to_string(),
                recursive: false,
                pattern: None,
            })
            .unwrap();
        assert_eq!(flat.total_count, 2);

        let deep = server
            .process_list_pdfs(&ListPdfsParams {
                directory: dir.path().display().to_string(),
                recursive: true,
                pattern: Some("report*".to_string()),
            })
            .unwrap();
        let names: Vec<&str> = deep.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["report-1.pdf", "report-2.PDF"]);
    }
}
