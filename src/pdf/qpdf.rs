//! qpdf FFI wrapper: the PDF object-model backend
//!
//! Page copying (split/merge), structural optimization and encryption all go
//! through the qpdf crate (vendored FFI).

use crate::error::{Error, Result};
use qpdf::{
    EncryptionParams, EncryptionParamsR4, EncryptionParamsR6, ObjectStreamMode, PrintPermission,
    QPdf,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

/// Print permission granted to users opening a protected document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrintLevel {
    #[default]
    Full,
    Low,
    None,
}

impl From<PrintLevel> for PrintPermission {
    fn from(level: PrintLevel) -> Self {
        match level {
            PrintLevel::Full => PrintPermission::Full,
            PrintLevel::Low => PrintPermission::Low,
            PrintLevel::None => PrintPermission::None,
        }
    }
}

fn allowed() -> bool {
    true
}

/// Permission flags written into the encryption dictionary.
/// Every flag defaults to allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Permissions {
    /// Printing: "full" (default), "low" (low resolution only) or "none"
    #[serde(default)]
    pub print: PrintLevel,
    /// Modify page content
    #[serde(default = "allowed")]
    pub modify: bool,
    /// Copy or extract text and images
    #[serde(default = "allowed")]
    pub copy: bool,
    /// Add or change annotations
    #[serde(default = "allowed")]
    pub annotate: bool,
    /// Fill in existing form fields
    #[serde(default = "allowed")]
    pub fill_forms: bool,
    /// Extract content for accessibility tools. AES encryption always
    /// grants this, whatever the flag says.
    #[serde(default = "allowed")]
    pub accessibility: bool,
    /// Insert, rotate or delete pages
    #[serde(default = "allowed")]
    pub assembly: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            print: PrintLevel::Full,
            modify: true,
            copy: true,
            annotate: true,
            fill_forms: true,
            accessibility: true,
            assembly: true,
        }
    }
}

/// Encryption algorithm revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionLevel {
    /// R6, AES-256
    Aes256,
    /// R4, AES-128
    Aes128,
}

/// Parse a qpdf-compatible page range expression into 0-indexed page indices.
///
/// Supports:
/// - `N` (single page, 1-indexed)
/// - `N-M` (range)
/// - `z` (last page), `rN` (N-th from last)
/// - `z-1` (reverse all pages)
/// - `N-M:odd`, `N-M:even`, `:odd`, `:even` (odd/even filter; bare form means all pages)
/// - Comma-separated combinations
pub fn parse_page_expression(range: &str, num_pages: u32) -> Result<Vec<u32>> {
    if num_pages == 0 {
        return Err(Error::InvalidPdf {
            reason: "PDF has no pages".to_string(),
        });
    }

    let mut all_indices: Vec<u32> = Vec::new();

    for part in range.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (range_part, modifier) = if let Some(r) = part.strip_suffix(":odd") {
            (r, Some("odd"))
        } else if let Some(r) = part.strip_suffix(":even") {
            (r, Some("even"))
        } else {
            (part, None)
        };

        let pages = if range_part.is_empty() {
            (1..=num_pages).collect::<Vec<u32>>()
        } else if let Some((start, end)) = range_part.split_once('-') {
            let start = resolve_page_ref(start, num_pages)?;
            let end = resolve_page_ref(end, num_pages)?;

            if start <= end {
                (start..=end).collect::<Vec<u32>>()
            } else {
                (end..=start).rev().collect::<Vec<u32>>()
            }
        } else {
            vec![resolve_page_ref(range_part, num_pages)?]
        };

        // odd/even refers to position within the range, as in qpdf
        let filtered: Vec<u32> = match modifier {
            Some("odd") => pages.into_iter().step_by(2).collect(),
            Some("even") => pages.into_iter().skip(1).step_by(2).collect(),
            _ => pages,
        };

        all_indices.extend(filtered);
    }

    if all_indices.is_empty() {
        return Err(Error::InvalidPageRange {
            range: range.to_string(),
        });
    }

    Ok(all_indices.iter().map(|p| p - 1).collect())
}

/// Resolve a page reference (1-indexed) to a page number.
/// Handles: numeric "N", "z" (last), "rN" (N-th from last)
fn resolve_page_ref(s: &str, num_pages: u32) -> Result<u32> {
    let s = s.trim();
    if s == "z" {
        return Ok(num_pages);
    }
    if let Some(r_num) = s.strip_prefix('r') {
        let n: u32 = r_num.parse().map_err(|_| Error::InvalidPageRange {
            range: s.to_string(),
        })?;
        if n == 0 || n > num_pages {
            return Err(Error::InvalidPageRange {
                range: s.to_string(),
            });
        }
        return Ok(num_pages - n + 1);
    }
    let page: u32 = s.parse().map_err(|_| Error::InvalidPageRange {
        range: s.to_string(),
    })?;
    if page == 0 || page > num_pages {
        return Err(Error::PageOutOfBounds {
            page,
            total: num_pages,
        });
    }
    Ok(page)
}

/// Open a QPdf from memory, optionally with password
fn open_qpdf(data: &[u8], password: Option<&str>) -> Result<QPdf> {
    match password {
        Some(pwd) => QPdf::read_from_memory_encrypted(data, pwd),
        None => QPdf::read_from_memory(data),
    }
    .map_err(|e| map_qpdf_error(e, password.is_some()))
}

/// Map qpdf crate errors to our error types
fn map_qpdf_error(e: qpdf::QPdfError, password_supplied: bool) -> Error {
    match e.error_code() {
        qpdf::QPdfErrorCode::InvalidPassword if password_supplied => Error::IncorrectPassword,
        qpdf::QPdfErrorCode::InvalidPassword => Error::PasswordRequired,
        qpdf::QPdfErrorCode::DamagedPdf | qpdf::QPdfErrorCode::PagesError => {
            Error::InvalidPdf {
                reason: e.to_string(),
            }
        }
        _ => Error::QpdfError {
            reason: e.to_string(),
        },
    }
}

fn write_error(e: qpdf::QPdfError) -> Error {
    Error::QpdfError {
        reason: e.to_string(),
    }
}

impl QpdfWrapper {
    /// Parse the document and return its page count.
    ///
    /// This is the validation step every tool runs before transforming.
    pub fn page_count(input_data: &[u8], password: Option<&str>) -> Result<u32> {
        let qpdf = open_qpdf(input_data, password)?;
        qpdf.get_num_pages()
            .map_err(|e| map_qpdf_error(e, password.is_some()))
    }

    /// Copy the given pages (0-indexed, in order, duplicates allowed) into a new PDF
    pub fn extract_pages(
        input_data: &[u8],
        indices: &[u32],
        password: Option<&str>,
    ) -> Result<Vec<u8>> {
        if indices.is_empty() {
            return Err(Error::InvalidPageRange {
                range: "no pages selected".to_string(),
            });
        }

        let source = open_qpdf(input_data, password)?;
        let num_pages = source
            .get_num_pages()
            .map_err(|e| map_qpdf_error(e, password.is_some()))?;

        let dest = QPdf::empty();

        for &idx in indices {
            let page = source.get_page(idx).ok_or(Error::PageOutOfBounds {
                page: idx + 1,
                total: num_pages,
            })?;
            let copied = dest.copy_from_foreign(&page);
            dest.add_page(&copied, false).map_err(write_error)?;
        }

        let mut writer = dest.writer();
        writer.preserve_encryption(false);
        writer.write_to_memory().map_err(write_error)
    }

    /// Concatenate every page of every input, in input order.
    /// `on_input` is called with each input's index once its pages are copied.
    pub fn merge(inputs: &[&[u8]], mut on_input: impl FnMut(usize)) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(Error::NoValidInputs { skipped: 0 });
        }

        let dest = QPdf::empty();

        for (i, input_data) in inputs.iter().enumerate() {
            let source = QPdf::read_from_memory(input_data).map_err(|e| Error::QpdfError {
                reason: format!("Failed to read input PDF {}: {}", i, e),
            })?;

            let pages = source.get_pages().map_err(|e| Error::QpdfError {
                reason: format!("Failed to get pages from input PDF {}: {}", i, e),
            })?;

            for page in &pages {
                let copied = dest.copy_from_foreign(page);
                dest.add_page(&copied, false).map_err(write_error)?;
            }
            on_input(i);
        }

        dest.writer().write_to_memory().map_err(write_error)
    }

    /// Encrypt a PDF so that it needs `user_password` to open and
    /// `owner_password` to lift the permission restrictions.
    pub fn encrypt(
        input_data: &[u8],
        level: EncryptionLevel,
        user_password: &str,
        owner_password: &str,
        permissions: &Permissions,
        source_password: Option<&str>,
    ) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, source_password)?;

        let encryption = match level {
            EncryptionLevel::Aes256 => EncryptionParams::R6(EncryptionParamsR6 {
                user_password: user_password.to_string(),
                owner_password: owner_password.to_string(),
                allow_accessibility: permissions.accessibility,
                allow_extract: permissions.copy,
                allow_assemble: permissions.assembly,
                allow_annotate_and_form: permissions.annotate,
                allow_form_filling: permissions.fill_forms,
                allow_modify_other: permissions.modify,
                allow_print: permissions.print.into(),
                encrypt_metadata: true,
            }),
            EncryptionLevel::Aes128 => EncryptionParams::R4(EncryptionParamsR4 {
                user_password: user_password.to_string(),
                owner_password: owner_password.to_string(),
                allow_accessibility: permissions.accessibility,
                allow_extract: permissions.copy,
                allow_assemble: permissions.assembly,
                allow_annotate_and_form: permissions.annotate,
                allow_form_filling: permissions.fill_forms,
                allow_modify_other: permissions.modify,
                allow_print: permissions.print.into(),
                encrypt_metadata: true,
                use_aes: true,
            }),
        };

        let mut writer = qpdf.writer();
        writer
            .preserve_encryption(false)
            .encryption_params(encryption);
        writer.write_to_memory().map_err(write_error)
    }

    /// Write an unencrypted copy of the document
    pub fn decrypt(input_data: &[u8], password: Option<&str>) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, password)?;
        let mut writer = qpdf.writer();
        writer.preserve_encryption(false);
        writer.write_to_memory().map_err(write_error)
    }

    /// Rewrite a PDF with object streams, recompressed streams and
    /// unreferenced objects dropped. Page content is untouched.
    pub fn optimize(input_data: &[u8], password: Option<&str>) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, password)?;

        let mut writer = qpdf.writer();
        writer
            .object_stream_mode(ObjectStreamMode::Generate)
            .compress_streams(true)
            .preserve_unreferenced_objects(false)
            .preserve_encryption(false);
        writer.write_to_memory().map_err(write_error)
    }
}
