//! Merge: concatenate documents in list order

use crate::error::{Error, Result};
use crate::pdf::QpdfWrapper;
use crate::pipeline::{OutputFile, ProgressTracker, ValidatedPdf};

/// Merged output file name
pub const MERGED_FILE_NAME: &str = "merged.pdf";

#[derive(Debug)]
pub struct MergeOutcome {
    pub output: OutputFile,
    pub page_count: u32,
    /// Names of the inputs that went in, in order
    pub merged: Vec<String>,
}

/// Merge validated inputs. `skipped` is how many inputs validation dropped,
/// reported when nothing is left to merge.
pub fn merge(
    inputs: &[ValidatedPdf],
    skipped: usize,
    progress: &mut ProgressTracker,
) -> Result<MergeOutcome> {
    if inputs.is_empty() {
        return Err(Error::NoValidInputs { skipped });
    }

    progress.start(inputs.len());

    let data: Vec<&[u8]> = inputs.iter().map(|pdf| pdf.data()).collect();
    let merged = QpdfWrapper::merge(&data, |_| progress.advance())?;

    let page_count = QpdfWrapper::page_count(&merged, None)?;
    progress.finish();

    Ok(MergeOutcome {
        output: OutputFile::pdf(MERGED_FILE_NAME, merged),
        page_count,
        merged: inputs.iter().map(|pdf| pdf.name().to_string()).collect(),
    })
}
