//! Document authoring with lopdf: image-only documents and page stamps

use crate::error::Result;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// A JPEG that becomes one full page of a new document
pub struct JpegPage {
    /// Page size in points
    pub width_pt: f32,
    pub height_pt: f32,
    /// Pixel size of the encoded image
    pub width_px: u32,
    pub height_px: u32,
    pub jpeg: Vec<u8>,
}

fn image_stream(page: &JpegPage) -> Stream {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(page.width_px as i64));
    dict.set("Height", Object::Integer(page.height_px as i64));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    // Already DCT encoded, a Flate pass on top would only cost time.
    Stream::new(dict, page.jpeg.clone()).with_compression(false)
}

/// Build a document whose pages each show one JPEG stretched over the full
/// page, at the page's original size
pub fn build_image_document(pages: &[JpegPage]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for page in pages {
        let image_id = doc.add_object(image_stream(page));

        let content = format!(
            "q {:.2} 0 0 {:.2} 0 0 cm /Im0 Do Q",
            page.width_pt, page.height_pt
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page.width_pt),
                Object::Real(page.height_pt),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => Object::Reference(image_id),
                },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(pages.len() as i64),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}

const STAMP_FONT: &str = "WbStampF1";

/// Resolve a reference one level deep
fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resources in effect for a page: its own, or inherited through the page tree
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = doc.get_dictionary(page_id).ok();
    // Page trees are shallow; the bound stops reference cycles.
    for _ in 0..32 {
        let Some(node) = current else { break };
        if let Some(Object::Dictionary(resources)) =
            node.get(b"Resources").ok().and_then(|r| deref(doc, r))
        {
            return resources.clone();
        }
        current = match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => doc.get_dictionary(*parent_id).ok(),
            _ => None,
        };
    }
    Dictionary::new()
}

/// Same as [`effective_resources`] with the stamp font added to `/Font`
fn resources_with_font(doc: &Document, page_id: ObjectId, font_id: ObjectId) -> Dictionary {
    let mut resources = effective_resources(doc, page_id);

    let mut fonts = match resources.get(b"Font").ok().and_then(|f| deref(doc, f)) {
        Some(Object::Dictionary(fonts)) => fonts.clone(),
        _ => Dictionary::new(),
    };
    fonts.set(STAMP_FONT, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let mut current = doc.get_dictionary(page_id).ok();
    for _ in 0..32 {
        let Some(node) = current else { break };
        if let Some(Object::Array(values)) =
            node.get(b"MediaBox").ok().and_then(|m| deref(doc, m))
        {
            let nums: Vec<f32> = values
                .iter()
                .filter_map(|v| match v {
                    Object::Integer(i) => Some(*i as f32),
                    Object::Real(r) => Some(*r),
                    _ => None,
                })
                .collect();
            if nums.len() == 4 {
                return ((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs());
            }
        }
        current = match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => doc.get_dictionary(*parent_id).ok(),
            _ => None,
        };
    }
    (612.0, 792.0)
}

/// Content that draws `text` diagonally across a page of the given size
fn stamp_content(text: &str, width: f32, height: f32) -> String {
    let size = (width.min(height) / 7.0).max(12.0);
    // Helvetica-Bold capitals average about 0.72 em
    let text_width = text.chars().count() as f32 * size * 0.72;
    let (cos, sin) = (std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2);
    let tx = width / 2.0 - (text_width / 2.0) * cos + (size / 3.0) * sin;
    let ty = height / 2.0 - (text_width / 2.0) * sin - (size / 3.0) * cos;
    let escaped = text
        .replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)");

    format!(
        "Q q 0.75 0.1 0.1 rg BT /{} {:.2} Tf {:.4} {:.4} {:.4} {:.4} {:.2} {:.2} Tm ({}) Tj ET Q",
        STAMP_FONT, size, cos, sin, -sin, cos, tx, ty, escaped
    )
}

/// Draw `text` diagonally over every page of an unencrypted document.
///
/// The existing content is wrapped in `q`/`Q` so its graphics state cannot
/// leak into the stamp.
pub fn stamp_text(data: &[u8], text: &str) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(data)?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q".to_vec()));

    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for page_id in page_ids {
        let (width, height) = page_size(&doc, page_id);
        let resources = resources_with_font(&doc, page_id, font_id);
        let stamp_id = doc.add_object(Stream::new(
            dictionary! {},
            stamp_content(text, width, height).into_bytes(),
        ));

        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        let mut contents = vec![Object::Reference(open_id)];
        match page.get(b"Contents") {
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            Ok(existing @ Object::Reference(_)) => contents.push(existing.clone()),
            _ => {}
        }
        contents.push(Object::Reference(stamp_id));

        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}
