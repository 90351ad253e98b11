//! PDF Workbench Library
//!
//! This crate provides MCP tools for everyday PDF work:
//! - `inspect_pdfs`: Validate PDFs and report page counts
//! - `merge_pdfs`: Combine PDFs in order, skipping invalid inputs
//! - `split_pdf`: Extract single pages, ranges, page expressions, or every page
//! - `compress_pdf`: Shrink PDFs by re-rendering pages or rewriting structure
//! - `convert_pdf_to_images`: Render pages to PNG or JPEG, bundled in a zip
//! - `protect_pdf`: Password-protect PDFs with a fallback strategy chain
//! - `list_pdfs`: List PDF files in a directory
//!
//! Every output is cached and can be fed to the next tool by cache key.

pub mod config;
pub mod error;
pub mod ops;
pub mod pdf;
pub mod pipeline;
pub mod server;
pub mod source;

#[cfg(test)]
mod test_support;

pub use config::{RasterConfig, ServerConfig};
pub use error::{Error, Result};
pub use server::{
    run_server, run_server_with_config, ListPdfsParams, ListPdfsResult, PdfFileInfo, PdfServer,
    PdfSource,
};
