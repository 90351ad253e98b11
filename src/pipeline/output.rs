//! Output naming and delivery

use crate::error::Result;
use crate::source::PathSandbox;
use std::path::{Path, PathBuf};

/// Base name used when a source has no usable stem
pub const FALLBACK_BASE_NAME: &str = "document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Pdf,
    Zip,
}

impl OutputKind {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Pdf => "pdf",
            OutputKind::Zip => "zip",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputKind::Pdf => "application/pdf",
            OutputKind::Zip => "application/zip",
        }
    }
}

/// A produced file, ready to cache or write
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub file_name: String,
    pub data: Vec<u8>,
    pub kind: OutputKind,
}

impl OutputFile {
    pub fn pdf(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
            kind: OutputKind::Pdf,
        }
    }

    pub fn zip(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
            kind: OutputKind::Zip,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// The source's file name without directories and without a trailing `.pdf`
pub fn base_name(source_name: &str) -> String {
    let file_name = source_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_name);

    let stem = match file_name.len().checked_sub(4) {
        Some(cut)
            if file_name.is_char_boundary(cut)
                && file_name[cut..].eq_ignore_ascii_case(".pdf") =>
        {
            &file_name[..cut]
        }
        _ => file_name,
    };

    let stem = stem.trim();
    if stem.is_empty() || stem.starts_with('<') {
        FALLBACK_BASE_NAME.to_string()
    } else {
        stem.to_string()
    }
}

/// `<base>_<suffix>.<ext>`
pub fn output_file_name(source_name: &str, suffix: &str, kind: OutputKind) -> String {
    format!("{}_{}.{}", base_name(source_name), suffix, kind.extension())
}

/// Write an output to disk.
///
/// An explicit `output_path` must pass the sandbox. Without one the file goes
/// to `output_dir` under its own name; with neither nothing is written.
pub fn deliver(
    output: &OutputFile,
    output_path: Option<&str>,
    output_dir: Option<&Path>,
    sandbox: &PathSandbox,
) -> Result<Option<PathBuf>> {
    let target = match (output_path, output_dir) {
        (Some(path), _) => {
            sandbox.check_write(path)?;
            PathBuf::from(path)
        }
        (None, Some(dir)) => dir.join(&output.file_name),
        (None, None) => return Ok(None),
    };

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(&target, &output.data)?;
    tracing::info!(path = %target.display(), size = output.size(), "output written");
    Ok(Some(target))
}
