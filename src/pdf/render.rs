//! Page rasterization via PDFium

use crate::config::RasterConfig;
use crate::error::{Error, Result};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;

/// Points per inch in PDF user space
pub const POINTS_PER_INCH: f32 = 72.0;

/// One rendered page
pub struct RasterPage {
    /// 1-indexed page number
    pub page: u32,
    /// Page size in points
    pub width_pt: f32,
    pub height_pt: f32,
    pub image: DynamicImage,
}

/// Rendering parameters for one run
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub dpi: u32,
    /// Upper bound on `width_px * height_px` for a single page
    pub max_pixels: u64,
}

impl RenderOptions {
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / POINTS_PER_INCH
    }
}

/// Renders PDF pages to bitmaps.
///
/// Holds the library search configuration only; PDFium is bound per call.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    config: RasterConfig,
}

impl Rasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    fn bind(&self) -> Result<Pdfium> {
        for dir in &self.config.library_dirs {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
                Ok(bindings) => return Ok(Pdfium::new(bindings)),
                Err(e) => {
                    tracing::trace!(dir = %dir.display(), error = %e, "pdfium not found")
                }
            }
        }

        let bindings = Pdfium::bind_to_system_library().map_err(|e| Error::Pdfium {
            reason: format!("Failed to bind to PDFium library: {}", e),
        })?;
        Ok(Pdfium::new(bindings))
    }

    /// Bind the library once to report whether rendering is available
    pub fn check(&self) -> Result<()> {
        self.bind().map(|_| ())
    }

    /// Render the given pages (1-indexed) in order.
    ///
    /// `on_page` receives every page's outcome, so one bad page does not end
    /// the run; returning an error from the callback does. Opening the
    /// document is the only failure reported through the return value.
    pub fn render_pages<F>(
        &self,
        data: &[u8],
        password: Option<&str>,
        page_numbers: &[u32],
        options: RenderOptions,
        mut on_page: F,
    ) -> Result<()>
    where
        F: FnMut(u32, Result<RasterPage>) -> Result<()>,
    {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(data, password)
            .map_err(|e| match e {
                PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                    if password.is_some() {
                        Error::IncorrectPassword
                    } else {
                        Error::PasswordRequired
                    }
                }
                _ => Error::Pdfium {
                    reason: format!("{}", e),
                },
            })?;

        let pages = document.pages();
        let page_count = pages.len() as u32;
        let scale = options.scale();

        for &page_num in page_numbers {
            let rendered = if page_num < 1 || page_num > page_count {
                Err(Error::PageOutOfBounds {
                    page: page_num,
                    total: page_count,
                })
            } else {
                pages
                    .get((page_num - 1) as u16)
                    .map_err(|e| Error::Pdfium {
                        reason: format!("Failed to get page {}: {}", page_num, e),
                    })
                    .and_then(|page| render_page(&page, page_num, scale, options.max_pixels))
            };

            on_page(page_num, rendered)?;
        }

        Ok(())
    }
}

fn render_page(page: &PdfPage, page_num: u32, scale: f32, max_pixels: u64) -> Result<RasterPage> {
    let width_pt = page.width().value;
    let height_pt = page.height().value;

    let width_px = (width_pt * scale).ceil().max(1.0) as u64;
    let height_px = (height_pt * scale).ceil().max(1.0) as u64;
    if width_px * height_px > max_pixels {
        return Err(Error::ImageDimensionExceeded {
            detail: format!(
                "page {} would render at {}x{} pixels (limit {} pixels)",
                page_num, width_px, height_px, max_pixels
            ),
        });
    }

    let config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page.render_with_config(&config).map_err(|e| Error::Pdfium {
        reason: format!("Failed to render page {}: {}", page_num, e),
    })?;

    Ok(RasterPage {
        page: page_num,
        width_pt,
        height_pt,
        image: bitmap.as_image(),
    })
}

/// Encode as PNG
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Encode as baseline JPEG. Alpha is dropped; `quality` is clamped to 1..=100.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut bytes = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pdfium_available, sample_pdf};
    use image::{Rgba, RgbaImage};

    fn checkerboard() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(32, 32, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([20, 40, 60, 128])
            }
        }))
    }

    #[test]
    fn test_render_options_scale() {
        let options = RenderOptions {
            dpi: 144,
            max_pixels: 1,
        };
        assert_eq!(options.scale(), 2.0);
    }

    #[test]
    fn test_encode_png_signature() {
        let bytes = encode_png(&checkerboard()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let bytes = encode_jpeg(&checkerboard(), 0).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 32);
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_render_pages_reports_each_page() {
        if !pdfium_available() {
            eprintln!("skipping: PDFium library not available");
            return;
        }

        let rasterizer = Rasterizer::new(RasterConfig::default());
        let pdf = sample_pdf(2);
        let mut seen = Vec::new();

        rasterizer
            .render_pages(
                &pdf,
                None,
                &[2, 9],
                RenderOptions {
                    dpi: 72,
                    max_pixels: 10_000_000,
                },
                |page, result| {
                    seen.push((page, result.map(|p| p.image.width())));
                    Ok(())
                },
            )
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 2);
        assert_eq!(*seen[0].1.as_ref().unwrap(), 302);
        assert!(matches!(seen[1].1, Err(Error::PageOutOfBounds { page: 9, .. })));
    }

    #[test]
    fn test_render_pages_enforces_pixel_limit() {
        if !pdfium_available() {
            eprintln!("skipping: PDFium library not available");
            return;
        }

        let rasterizer = Rasterizer::new(RasterConfig::default());
        let pdf = sample_pdf(1);
        let mut outcome = None;

        rasterizer
            .render_pages(
                &pdf,
                None,
                &[1],
                RenderOptions {
                    dpi: 300,
                    max_pixels: 1_000,
                },
                |_, result| {
                    outcome = Some(result.map(|_| ()));
                    Ok(())
                },
            )
            .unwrap();

        assert!(matches!(
            outcome,
            Some(Err(Error::ImageDimensionExceeded { .. }))
        ));
    }
}
