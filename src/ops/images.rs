//! PDF to images: one raster file per page, bundled in a zip

use crate::error::{Error, Result};
use crate::pdf::{
    encode_jpeg, encode_png, parse_page_expression, ArchiveBuilder, Rasterizer, RenderOptions,
};
use crate::pipeline::{output_file_name, OutputFile, OutputKind, ProgressTracker, ValidatedPdf};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub format: ImageFormat,
    pub dpi: u32,
    pub jpeg_quality: u8,
    /// Page expression; all pages when absent
    pub pages: Option<String>,
    pub max_pixels: u64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            dpi: DEFAULT_DPI,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            pages: None,
            max_pixels: 100_000_000,
        }
    }
}

/// A page that could not be rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct FailedPage {
    pub page: u32,
    pub error: String,
}

#[derive(Debug)]
pub struct ImagesOutcome {
    pub output: OutputFile,
    /// 1-indexed pages present in the archive
    pub rendered: Vec<u32>,
    pub failed_pages: Vec<FailedPage>,
}

/// Archive entry name for a page
pub fn entry_name(page: u32, format: ImageFormat) -> String {
    format!("images/page-{}.{}", page, format.extension())
}

pub fn convert_to_images(
    pdf: &ValidatedPdf,
    settings: &ImageSettings,
    rasterizer: &Rasterizer,
    password: Option<&str>,
    progress: &mut ProgressTracker,
) -> Result<ImagesOutcome> {
    let page_numbers: Vec<u32> = match &settings.pages {
        Some(expr) => parse_page_expression(expr, pdf.page_count)?
            .into_iter()
            .map(|index| index + 1)
            .collect(),
        None => (1..=pdf.page_count).collect(),
    };

    let options = RenderOptions {
        dpi: settings.dpi,
        max_pixels: settings.max_pixels,
    };

    progress.start(page_numbers.len());
    let mut archive = ArchiveBuilder::new();
    let mut rendered = Vec::new();
    let mut failed_pages = Vec::new();
    let mut first_error = None;

    rasterizer.render_pages(pdf.data(), password, &page_numbers, options, |page, result| {
        let encoded = result.and_then(|raster| match settings.format {
            ImageFormat::Png => encode_png(&raster.image),
            ImageFormat::Jpeg => encode_jpeg(&raster.image, settings.jpeg_quality),
        });

        match encoded {
            Ok(bytes) => {
                archive.add(&entry_name(page, settings.format), &bytes)?;
                rendered.push(page);
                progress.advance();
            }
            Err(e) => {
                progress.fail_unit(page as usize, &e.to_string());
                failed_pages.push(FailedPage {
                    page,
                    error: e.client_message(),
                });
                first_error.get_or_insert(e);
            }
        }
        Ok(())
    })?;

    // Partial output is fine; an empty archive is not.
    if rendered.is_empty() {
        return Err(first_error.unwrap_or_else(|| Error::InvalidPageRange {
            range: settings.pages.clone().unwrap_or_default(),
        }));
    }

    let zip = archive.finish()?;
    progress.finish();

    Ok(ImagesOutcome {
        output: OutputFile::zip(output_file_name(pdf.name(), "images", OutputKind::Zip), zip),
        rendered,
        failed_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RasterConfig;
    use crate::pipeline::validate;
    use crate::test_support::{pdfium_available, sample_source};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_entry_names() {
        assert_eq!(entry_name(1, ImageFormat::Png), "images/page-1.png");
        assert_eq!(entry_name(12, ImageFormat::Jpeg), "images/page-12.jpeg");
    }

    #[test]
    fn test_format_accepts_jpg_alias() {
        let format: ImageFormat = serde_json::from_str("\"jpg\"").unwrap();
        assert_eq!(format, ImageFormat::Jpeg);
        let format: ImageFormat = serde_json::from_str("\"png\"").unwrap();
        assert_eq!(format, ImageFormat::Png);
    }

    #[test]
    fn test_bad_page_expression_fails_before_rendering() {
        let pdf = validate(sample_source("doc.pdf", 2), None).unwrap();
        let settings = ImageSettings {
            pages: Some("5".to_string()),
            ..Default::default()
        };
        let rasterizer = Rasterizer::new(RasterConfig::default());
        let mut progress = ProgressTracker::silent("images");

        let result = convert_to_images(&pdf, &settings, &rasterizer, None, &mut progress);
        assert!(matches!(result, Err(Error::PageOutOfBounds { page: 5, .. })));
    }

    #[test]
    fn test_convert_selected_pages_to_jpeg() {
        if !pdfium_available() {
            eprintln!("skipping: PDFium library not available");
            return;
        }

        let pdf = validate(sample_source("doc.pdf", 3), None).unwrap();
        let settings = ImageSettings {
            format: ImageFormat::Jpeg,
            dpi: 72,
            pages: Some("1,3".to_string()),
            ..Default::default()
        };
        let rasterizer = Rasterizer::new(RasterConfig::default());
        let mut progress = ProgressTracker::silent("images");

        let outcome =
            convert_to_images(&pdf, &settings, &rasterizer, None, &mut progress).unwrap();
        assert_eq!(outcome.output.file_name, "doc_images.zip");
        assert_eq!(outcome.rendered, vec![1, 3]);
        assert!(outcome.failed_pages.is_empty());

        let mut archive = zip::ZipArchive::new(Cursor::new(outcome.output.data)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(1).unwrap().name(), "images/page-3.jpeg");
    }

    #[test]
    fn test_run_fails_when_every_page_fails() {
        if !pdfium_available() {
            eprintln!("skipping: PDFium library not available");
            return;
        }

        let pdf = validate(sample_source("doc.pdf", 2), None).unwrap();
        let settings = ImageSettings {
            dpi: 300,
            max_pixels: 10,
            ..Default::default()
        };
        let rasterizer = Rasterizer::new(RasterConfig::default());
        let mut progress = ProgressTracker::silent("images");

        let result = convert_to_images(&pdf, &settings, &rasterizer, None, &mut progress);
        assert!(matches!(
            result,
            Err(Error::ImageDimensionExceeded { .. })
        ));
    }
}
