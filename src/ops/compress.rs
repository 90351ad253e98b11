//! Compress: shrink a document, never grow it

use crate::error::Result;
use crate::pdf::{
    build_image_document, encode_jpeg, JpegPage, QpdfWrapper, Rasterizer, RenderOptions,
};
use crate::pipeline::{output_file_name, OutputFile, OutputKind, ProgressTracker, ValidatedPdf};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_RASTER_DPI: u32 = 150;

/// How the document gets smaller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompressionEngine {
    /// Re-render every page as a JPEG image. Large savings, text becomes pixels.
    #[default]
    Raster,
    /// Lossless rewrite: object streams, recompressed streams, unused objects dropped
    Structural,
}

#[derive(Debug, Clone, Copy)]
pub struct CompressSettings {
    /// 0-100, applied as 1-100
    pub quality: u8,
    pub engine: CompressionEngine,
    pub dpi: u32,
    pub max_pixels: u64,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            engine: CompressionEngine::Raster,
            dpi: DEFAULT_RASTER_DPI,
            max_pixels: 100_000_000,
        }
    }
}

impl CompressSettings {
    /// The JPEG quality actually used by the raster engine
    pub fn applied_quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }
}

#[derive(Debug)]
pub struct CompressOutcome {
    pub output: OutputFile,
    pub engine: CompressionEngine,
    /// JPEG quality used; `None` for the structural engine
    pub applied_quality: Option<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    /// The result was not smaller, so the input is returned unchanged
    pub kept_original: bool,
}

impl CompressOutcome {
    /// Output size over input size
    pub fn ratio(&self) -> f64 {
        if self.original_size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.original_size as f64
        }
    }

    pub fn bytes_saved(&self) -> usize {
        self.original_size.saturating_sub(self.compressed_size)
    }
}

pub fn compress(
    pdf: &ValidatedPdf,
    settings: &CompressSettings,
    rasterizer: &Rasterizer,
    password: Option<&str>,
    progress: &mut ProgressTracker,
) -> Result<CompressOutcome> {
    let (candidate, applied_quality) = match settings.engine {
        CompressionEngine::Raster => (
            rasterize(pdf, settings, rasterizer, password, progress)?,
            Some(settings.applied_quality()),
        ),
        CompressionEngine::Structural => {
            progress.start(1);
            let data = QpdfWrapper::optimize(pdf.data(), password)?;
            progress.advance();
            (data, None)
        }
    };

    let original_size = pdf.data().len();
    let kept_original = candidate.len() >= original_size;
    let data = if kept_original {
        tracing::info!(
            name = %pdf.name(),
            original_size,
            candidate_size = candidate.len(),
            "compressed result not smaller, keeping original"
        );
        pdf.data().to_vec()
    } else {
        candidate
    };

    progress.finish();

    let output = OutputFile::pdf(
        output_file_name(pdf.name(), "compressed", OutputKind::Pdf),
        data,
    );
    Ok(CompressOutcome {
        engine: settings.engine,
        applied_quality,
        original_size,
        compressed_size: output.size(),
        kept_original,
        output,
    })
}

/// Render every page and rebuild the document from JPEGs
fn rasterize(
    pdf: &ValidatedPdf,
    settings: &CompressSettings,
    rasterizer: &Rasterizer,
    password: Option<&str>,
    progress: &mut ProgressTracker,
) -> Result<Vec<u8>> {
    let page_numbers: Vec<u32> = (1..=pdf.page_count).collect();
    let quality = settings.applied_quality();
    let options = RenderOptions {
        dpi: settings.dpi,
        max_pixels: settings.max_pixels,
    };

    progress.start(page_numbers.len());
    let mut pages = Vec::with_capacity(page_numbers.len());

    rasterizer.render_pages(pdf.data(), password, &page_numbers, options, |_, rendered| {
        // Every page must survive, a document with holes is not a compressed copy.
        let rendered = rendered?;
        let jpeg = encode_jpeg(&rendered.image, quality)?;
        pages.push(JpegPage {
            width_pt: rendered.width_pt,
            height_pt: rendered.height_pt,
            width_px: rendered.image.width(),
            height_px: rendered.image.height(),
            jpeg,
        });
        progress.advance();
        Ok(())
    })?;

    build_image_document(&pages)
}
