//! Generated fixture documents shared by the integration tests.
//!
//! Page `i` of a generated document has a MediaBox width of `300 + i`, so
//! page identity and order can be checked after any transform.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};
use pdf_workbench::source::SourceFile;

pub fn build_pdf(pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let kids: Vec<Object> = (1..=pages)
        .map(|i| {
            let content = format!("BT /F1 18 Tf 36 720 Td (Fixture page {}) Tj ET", i);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(300 + i as i64),
                    Object::Integer(792),
                ],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            page_id.into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("fixture should serialize");
    buf
}

pub fn source(name: &str, pages: u32) -> SourceFile {
    SourceFile::new(name, build_pdf(pages))
}

/// Page widths in page order; each identifies the fixture page it came from
pub fn page_widths(data: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(data).expect("output should parse");
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).expect("page dictionary");
            let media_box = match page.get(b"MediaBox").expect("MediaBox") {
                Object::Reference(r) => doc.get_object(*r).expect("MediaBox object"),
                other => other,
            };
            match &media_box.as_array().expect("MediaBox array")[2] {
                Object::Integer(v) => *v,
                Object::Real(v) => v.round() as i64,
                other => panic!("unexpected MediaBox entry {:?}", other),
            }
        })
        .collect()
}

pub fn pdfium_available() -> bool {
    pdf_workbench::pdf::Rasterizer::new(pdf_workbench::RasterConfig::default())
        .check()
        .is_ok()
}
