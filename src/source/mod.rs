//! Source intake and output caching

pub mod cache;
pub mod resolver;
pub mod sandbox;

pub use cache::{CacheEntry, CacheManager};
pub use resolver::{
    has_pdf_extension, has_pdf_header, resolve_base64, resolve_cache, resolve_path, SourceFile,
};
pub use sandbox::PathSandbox;
