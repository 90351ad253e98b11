//! Validation: a source is usable only if qpdf can parse it and it has pages

use crate::error::{Error, Result};
use crate::pdf::QpdfWrapper;
use crate::source::SourceFile;

/// A source that parsed as a PDF
#[derive(Debug, Clone)]
pub struct ValidatedPdf {
    pub source: SourceFile,
    pub page_count: u32,
}

impl ValidatedPdf {
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn data(&self) -> &[u8] {
        &self.source.data
    }
}

/// A source excluded from a batch, with the reason shown to the caller
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Rejected {
    pub name: String,
    pub reason: String,
}

/// Parse `source` and count its pages.
///
/// Password problems are reported as such; every other parse failure
/// becomes `InvalidPdf`.
pub fn validate(source: SourceFile, password: Option<&str>) -> Result<ValidatedPdf> {
    let page_count = match QpdfWrapper::page_count(&source.data, password) {
        Ok(count) => count,
        Err(e @ (Error::PasswordRequired | Error::IncorrectPassword)) => return Err(e),
        Err(e) => {
            return Err(Error::InvalidPdf {
                reason: e.to_string(),
            })
        }
    };

    if page_count == 0 {
        return Err(Error::InvalidPdf {
            reason: "PDF has no pages".to_string(),
        });
    }

    tracing::debug!(name = %source.name, page_count, "validated");
    Ok(ValidatedPdf { source, page_count })
}

/// Validate a batch, keeping the order of the usable files and reporting the rest
pub fn validate_all(
    sources: Vec<SourceFile>,
    password: Option<&str>,
) -> (Vec<ValidatedPdf>, Vec<Rejected>) {
    let mut valid = Vec::with_capacity(sources.len());
    let mut rejected = Vec::new();

    for source in sources {
        let name = source.name.clone();
        match validate(source, password) {
            Ok(pdf) => valid.push(pdf),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "skipping invalid PDF");
                rejected.push(Rejected {
                    name,
                    reason: e.client_message(),
                });
            }
        }
    }

    (valid, rejected)
}
