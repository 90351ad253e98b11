//! Split: extract pages into new documents

use crate::error::{Error, Result};
use crate::pdf::{parse_page_expression, ArchiveBuilder, QpdfWrapper};
use crate::pipeline::{output_file_name, OutputFile, OutputKind, ProgressTracker, ValidatedPdf};

/// Which pages to take (1-indexed, inclusive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSelection {
    Single(u32),
    Range { start: u32, end: u32 },
    /// Every page as its own document
    All,
    /// qpdf page-range expression
    Expression(String),
}

impl PageSelection {
    /// 0-indexed pages of a single-output selection
    fn indices(&self, page_count: u32) -> Result<Vec<u32>> {
        match self {
            PageSelection::Single(page) => {
                if *page < 1 || *page > page_count {
                    return Err(Error::PageOutOfBounds {
                        page: *page,
                        total: page_count,
                    });
                }
                Ok(vec![page - 1])
            }
            PageSelection::Range { start, end } => {
                if *start < 1 || start > end || *end > page_count {
                    return Err(Error::InvalidPageRange {
                        range: format!("{}-{} (document has {} pages)", start, end, page_count),
                    });
                }
                Ok((start - 1..*end).collect())
            }
            PageSelection::All => Ok((0..page_count).collect()),
            PageSelection::Expression(expr) => parse_page_expression(expr, page_count),
        }
    }

    fn suffix(&self) -> String {
        match self {
            PageSelection::Single(page) => format!("page-{}", page),
            PageSelection::Range { start, end } => format!("pages-{}-{}", start, end),
            PageSelection::All => "pages".to_string(),
            PageSelection::Expression(_) => "selection".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct SplitOutcome {
    /// The delivered file: one PDF, or a zip for `All`
    pub output: OutputFile,
    /// The individual PDFs inside a zip output; empty otherwise
    pub parts: Vec<OutputFile>,
    pub page_count: u32,
}

pub fn split(
    pdf: &ValidatedPdf,
    selection: &PageSelection,
    password: Option<&str>,
    progress: &mut ProgressTracker,
) -> Result<SplitOutcome> {
    if *selection == PageSelection::All {
        return split_all(pdf, password, progress);
    }

    let indices = selection.indices(pdf.page_count)?;
    progress.start(1);

    let data = QpdfWrapper::extract_pages(pdf.data(), &indices, password)?;
    progress.advance();

    let file_name = output_file_name(pdf.name(), &selection.suffix(), OutputKind::Pdf);
    progress.finish();

    Ok(SplitOutcome {
        output: OutputFile::pdf(file_name, data),
        parts: Vec::new(),
        page_count: indices.len() as u32,
    })
}

fn split_all(
    pdf: &ValidatedPdf,
    password: Option<&str>,
    progress: &mut ProgressTracker,
) -> Result<SplitOutcome> {
    progress.start(pdf.page_count as usize);

    let mut archive = ArchiveBuilder::new();
    let mut parts = Vec::with_capacity(pdf.page_count as usize);

    for index in 0..pdf.page_count {
        let data = QpdfWrapper::extract_pages(pdf.data(), &[index], password)?;
        let file_name = output_file_name(
            pdf.name(),
            &PageSelection::Single(index + 1).suffix(),
            OutputKind::Pdf,
        );
        archive.add(&file_name, &data)?;
        parts.push(OutputFile::pdf(file_name, data));
        progress.advance();
    }

    let zip_name = output_file_name(pdf.name(), &PageSelection::All.suffix(), OutputKind::Zip);
    let zip = archive.finish()?;
    progress.finish();

    Ok(SplitOutcome {
        output: OutputFile::zip(zip_name, zip),
        parts,
        page_count: pdf.page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::validate;
    use crate::test_support::{page_widths, sample_source};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Cursor;

    fn doc(pages: u32) -> ValidatedPdf {
        validate(sample_source("/in/report.pdf", pages), None).unwrap()
    }

    #[test]
    fn test_split_single_page() {
        let mut progress = ProgressTracker::silent("split");
        let outcome = split(&doc(4), &PageSelection::Single(3), None, &mut progress).unwrap();

        assert_eq!(outcome.output.file_name, "report_page-3.pdf");
        assert_eq!(page_widths(&outcome.output.data), vec![303.0]);
        assert!(outcome.parts.is_empty());
    }

    #[test]
    fn test_split_range_in_source_order() {
        let mut progress = ProgressTracker::silent("split");
        let selection = PageSelection::Range { start: 2, end: 4 };
        let outcome = split(&doc(5), &selection, None, &mut progress).unwrap();

        assert_eq!(outcome.output.file_name, "report_pages-2-4.pdf");
        assert_eq!(outcome.page_count, 3);
        assert_eq!(
            page_widths(&outcome.output.data),
            vec![302.0, 303.0, 304.0]
        );
        assert_eq!(progress.percent(), 100);
    }

    #[rstest]
    #[case(0, 2)]
    #[case(3, 2)]
    #[case(2, 6)]
    fn test_split_range_out_of_bounds(#[case] start: u32, #[case] end: u32) {
        let mut progress = ProgressTracker::silent("split");
        let result = split(
            &doc(5),
            &PageSelection::Range { start, end },
            None,
            &mut progress,
        );
        assert!(matches!(result, Err(Error::InvalidPageRange { .. })));
    }

    #[test]
    fn test_split_single_out_of_bounds() {
        let mut progress = ProgressTracker::silent("split");
        let result = split(&doc(2), &PageSelection::Single(3), None, &mut progress);
        assert!(matches!(
            result,
            Err(Error::PageOutOfBounds { page: 3, total: 2 })
        ));
    }

    #[test]
    fn test_split_all_zips_one_page_files() {
        let mut progress = ProgressTracker::silent("split");
        let outcome = split(&doc(3), &PageSelection::All, None, &mut progress).unwrap();

        assert_eq!(outcome.output.file_name, "report_pages.zip");
        assert_eq!(outcome.output.kind, OutputKind::Zip);
        assert_eq!(outcome.parts.len(), 3);
        for (i, part) in outcome.parts.iter().enumerate() {
            assert_eq!(part.file_name, format!("report_page-{}.pdf", i + 1));
            assert_eq!(page_widths(&part.data), vec![301.0 + i as f32]);
        }

        let archive = zip::ZipArchive::new(Cursor::new(outcome.output.data)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec!["report_page-1.pdf", "report_page-2.pdf", "report_page-3.pdf"]
        );
    }

    #[test]
    fn test_split_expression() {
        let mut progress = ProgressTracker::silent("split");
        let selection = PageSelection::Expression("z,1".to_string());
        let outcome = split(&doc(4), &selection, None, &mut progress).unwrap();

        assert_eq!(outcome.output.file_name, "report_selection.pdf");
        assert_eq!(page_widths(&outcome.output.data), vec![304.0, 301.0]);
    }
}
