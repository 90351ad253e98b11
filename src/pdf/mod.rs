//! PDF processing layer
//!
//! qpdf handles the object model (page copying, optimization, encryption),
//! PDFium renders pages, lopdf authors new documents and zip bundles
//! multi-file outputs.

mod archive;
mod author;
mod qpdf;
mod render;

pub use archive::ArchiveBuilder;
pub use author::{build_image_document, stamp_text, JpegPage};
pub use qpdf::{parse_page_expression, EncryptionLevel, Permissions, PrintLevel, QpdfWrapper};
pub use render::{
    encode_jpeg, encode_png, RasterPage, Rasterizer, RenderOptions, POINTS_PER_INCH,
};
