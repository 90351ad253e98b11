//! Fixture documents for unit tests.
//!
//! Page `i` (1-indexed) gets a MediaBox width of `300 + i` points so page
//! order survives every transform and can be read back with [`page_widths`].

use crate::source::SourceFile;
use lopdf::{dictionary, Document, Object, Stream};

/// Build an `n`-page PDF with a line of text on every page
pub fn sample_pdf(n: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for i in 1..=n {
        let content = format!("BT /F1 24 Tf 40 700 Td (Page {}) Tj ET", i);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(300 + i as i64),
                Object::Integer(792),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => Object::Reference(font_id),
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
            "Count" => Object::Integer(n as i64),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// A sample document wrapped as an intake result
pub fn sample_source(name: &str, n: u32) -> SourceFile {
    SourceFile::new(name, sample_pdf(n))
}

/// MediaBox widths of every page, in page order
pub fn page_widths(data: &[u8]) -> Vec<f32> {
    let doc = Document::load_mem(data).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap();
            let media_box = match media_box {
                Object::Reference(id) => doc.get_object(*id).unwrap(),
                other => other,
            };
            let values = media_box.as_array().unwrap();
            match &values[2] {
                Object::Integer(v) => *v as f32,
                Object::Real(v) => *v,
                other => panic!("unexpected MediaBox entry {:?}", other),
            }
        })
        .collect()
}

/// True when the PDFium library can be bound in this environment
pub fn pdfium_available() -> bool {
    crate::pdf::Rasterizer::new(crate::config::RasterConfig::default())
        .check()
        .is_ok()
}
