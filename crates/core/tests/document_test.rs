//! Loading, xref chains, object streams and the page tree.

mod common;

use common::{PdfBuilder, two_page_document};
use quire_core::document::{Document, DocumentOptions, Version, XrefEntry};
use quire_core::error::PdfError;
use quire_core::model::{Name, ObjectId, PdfObject};

#[test]
fn loads_minimal_document() {
    let doc = Document::load(two_page_document(), "").unwrap();
    assert_eq!(doc.version(), Version { major: 1, minor: 4 });
    assert!(!doc.is_encrypted());
    assert!(doc.is_dict_type(doc.root(), "Catalog"));
    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.object_ids().len(), 7);
}

#[test]
fn pages_inherit_media_box_and_resources() {
    let doc = Document::load(two_page_document(), "").unwrap();
    let page = doc.page(1).unwrap();
    assert_eq!(page.id(), Some(ObjectId::new(3, 0)));
    assert_eq!(page.media_box(), Some((0.0, 0.0, 612.0, 792.0)));
    assert_eq!(page.bbox(), page.media_box());
    assert!(page.resources().contains_key(&Name::new("Font")));
    assert_eq!(&page.contents().unwrap()[..], b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET");

    let second = doc.page(2).unwrap();
    assert_eq!(second.rotate(), 270);
}

#[test]
fn page_numbers_out_of_range() {
    let doc = Document::load(two_page_document(), "").unwrap();
    assert!(matches!(doc.page(0), Err(PdfError::RuntimeData(_))));
    assert!(matches!(doc.page(3), Err(PdfError::RuntimeData(_))));
}

#[test]
fn nested_page_tree_and_inherited_attributes() {
    let mut b = PdfBuilder::new("1.5");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(
        2,
        "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 3 /MediaBox [0 0 200 200] \
         /Resources << /Font << /F1 9 0 R >> /ExtGState << /G0 << /LW 2 >> >> >> >>",
    );
    b.object(3, "<< /Type /Page /Parent 2 0 R /TrimBox [10 10 20 20] >>");
    b.object(
        4,
        "<< /Type /Pages /Parent 2 0 R /Kids [5 0 R 6 0 R] /Count 2 /Rotate 90 \
         /Resources << /ExtGState << /G0 << /LW 5 >> >> >> >>",
    );
    b.object(5, "<< /Type /Page /Parent 4 0 R /CropBox [50 50 0 0] >>");
    b.object(6, "<< /Type /Page /Parent 4 0 R /Contents [7 0 R 8 0 R] >>");
    b.stream(7, "", b"q");
    b.stream(8, "", b"Q");
    b.object(9, "<< /Type /Font /Subtype /Type1 >>");
    let xref = b.xref("/Size 10 /Root 1 0 R");
    let doc = Document::load(b.finish(xref), "").unwrap();

    assert_eq!(doc.page_count(), 3);
    let first = doc.page(1).unwrap();
    assert_eq!(first.bbox(), Some((10.0, 10.0, 20.0, 20.0)));
    assert_eq!(first.rotate(), 0);

    let second = doc.page(2).unwrap();
    assert_eq!(second.id(), Some(ObjectId::new(5, 0)));
    assert_eq!(second.crop_box(), Some((0.0, 0.0, 50.0, 50.0)));
    assert_eq!(second.bbox(), second.crop_box());
    assert_eq!(second.rotate(), 90);
    // Child resource categories replace the parent's.
    let gs = second.resources()[&Name::new("ExtGState")].as_dict().unwrap();
    let g0 = gs[&Name::new("G0")].as_dict().unwrap();
    assert_eq!(g0[&Name::new("LW")], PdfObject::Int(5));
    assert!(second.resources().contains_key(&Name::new("Font")));

    let third = doc.page(3).unwrap();
    assert_eq!(&third.contents().unwrap()[..], b"q\nQ");
    assert_eq!(third.media_box(), Some((0.0, 0.0, 200.0, 200.0)));
}

#[test]
fn non_stream_contents_element_is_format_error() {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    b.object(3, "<< /Type /Page /Parent 2 0 R /Contents [4 0 R 5 0 R] >>");
    b.stream(4, "", b"q Q");
    b.object(5, "42");
    let xref = b.xref("/Size 6 /Root 1 0 R");
    let doc = Document::load(b.finish(xref), "").unwrap();
    let err = doc.page(1).unwrap().contents().unwrap_err();
    assert!(matches!(err, PdfError::Format { .. }), "{err}");
}

#[test]
fn malformed_media_box_is_format_error() {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612] >>");
    b.object(3, "<< /Type /Page /Parent 2 0 R >>");
    let xref = b.xref("/Size 4 /Root 1 0 R");
    let doc = Document::load(b.finish(xref), "").unwrap();
    assert!(matches!(doc.page(1), Err(PdfError::Format { .. })));
}

#[test]
fn incremental_update_overrides_older_revision() {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    b.object(3, "(old)");
    b.object(4, "(kept)");
    let first = b.xref("/Size 5 /Root 1 0 R");
    b.raw(format!("startxref\n{first}\n%%EOF\n").as_bytes());
    b.object(3, "(new)");
    let second = b.xref(&format!("/Size 5 /Root 1 0 R /Prev {first}"));
    let doc = Document::load(b.finish(second), "").unwrap();

    assert_eq!(doc.dereference(ObjectId::new(3, 0)).unwrap(), PdfObject::String(b"new".to_vec()));
    assert_eq!(doc.dereference(ObjectId::new(4, 0)).unwrap(), PdfObject::String(b"kept".to_vec()));
    assert_eq!(doc.page_count(), 0);
}

#[test]
fn prev_loop_terminates() {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    let offset = b.len();
    let xref = b.xref(&format!("/Size 3 /Root 1 0 R /Prev {offset}"));
    assert_eq!(xref, offset);
    let doc = Document::load(b.finish(xref), "").unwrap();
    assert_eq!(doc.object_ids().len(), 2);
}

#[test]
fn missing_root_is_runtime_error() {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Pages /Kids [] /Count 0 >>");
    let xref = b.xref("/Size 2");
    let err = Document::load(b.finish(xref), "").unwrap_err();
    assert!(matches!(err, PdfError::RuntimeData(_)), "{err}");
}

#[test]
fn xref_stream_with_object_stream() {
    let mut b = PdfBuilder::new("1.5");
    let catalog = b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    let objstm = b.object_stream(
        5,
        &[
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>"),
        ],
    );
    let content = b.stream(4, "", b"0 g");
    let xref = b.xref_stream(
        6,
        "/Root 1 0 R",
        &[
            (1, 1, catalog as u32, 0),
            (2, 2, 5, 0),
            (3, 2, 5, 1),
            (4, 1, content as u32, 0),
            (5, 1, objstm as u32, 0),
        ],
    );
    let doc = Document::load(b.finish(xref), "").unwrap();

    assert_eq!(doc.page_count(), 1);
    assert!(doc.xref_entries().any(|(num, e)| num == 3 && e == XrefEntry::Compressed { container: 5, index: 1 }));
    let page = doc.page(1).unwrap();
    assert_eq!(page.id(), Some(ObjectId::new(3, 0)));
    assert_eq!(&page.contents().unwrap()[..], b"0 g");
}

#[test]
fn object_stream_offsets_that_overflow_read_as_null() {
    let mut b = PdfBuilder::new("1.5");
    let catalog = b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    let pages = b.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    let first = b.stream(5, "/Type /ObjStm /N 1 /First 9223372036854775807", b"7 1 (x)");
    let huge = b.stream(6, "/Type /ObjStm /N 1 /First 4", b"8 9223372036854775807 (y)");
    let xref = b.xref_stream(
        9,
        "/Root 1 0 R",
        &[
            (1, 1, catalog as u32, 0),
            (2, 1, pages as u32, 0),
            (5, 1, first as u32, 0),
            (6, 1, huge as u32, 0),
            (7, 2, 5, 0),
            (8, 2, 6, 0),
        ],
    );
    let doc = Document::load(b.finish(xref), "").unwrap();

    assert_eq!(doc.dereference(ObjectId::new(7, 0)).unwrap(), PdfObject::Null);
    assert_eq!(doc.dereference(ObjectId::new(8, 0)).unwrap(), PdfObject::Null);
}

#[test]
fn hybrid_file_reads_xrefstm() {
    let mut file = PdfBuilder::new("1.5");
    let o1 = file.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    let o2 = file.object(2, "<< /Type /Pages /Kids [] /Count 0 /Extra 7 0 R >>");
    let objstm = file.object_stream(8, &[(7, "(compressed)")]);
    let stm = file.xref_stream(9, "", &[(7, 2, 8, 0), (8, 1, objstm as u32, 0)]);

    // The classic section only lists the uncompressed objects.
    let xref = file.len();
    file.raw(
        format!(
            "xref\n0 3\n0000000000 65535 f \n{o1:010} 00000 n \n{o2:010} 00000 n \n\
             trailer\n<< /Size 10 /Root 1 0 R /XRefStm {stm} >>\n"
        )
        .as_bytes(),
    );
    let doc = Document::load(file.finish(xref), "").unwrap();

    assert_eq!(
        doc.dereference(ObjectId::new(7, 0)).unwrap(),
        PdfObject::String(b"compressed".to_vec())
    );
    assert_eq!(doc.page_count(), 0);
}

#[test]
fn unreadable_xrefstm_is_ignored() {
    let mut file = PdfBuilder::new("1.5");
    file.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    file.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    let xref = file.xref("/Size 3 /Root 1 0 R /XRefStm 5");
    let doc = Document::load(file.finish(xref), "").unwrap();
    assert_eq!(doc.page_count(), 0);
}

#[test]
fn object_cache_can_be_disabled() {
    let doc = Document::load_with_options(two_page_document(), "", DocumentOptions { cache_capacity: 0 }).unwrap();
    let a = doc.dereference_shared(ObjectId::new(7, 0)).unwrap();
    let b = doc.dereference_shared(ObjectId::new(7, 0)).unwrap();
    assert_eq!(a, b);
    assert!(!std::sync::Arc::ptr_eq(&a, &b));
}

#[test]
fn typed_accessors_resolve_references() {
    let doc = Document::load(two_page_document(), "").unwrap();
    let pages = doc.get_dict(&PdfObject::Ref(ObjectId::new(2, 0))).unwrap();
    assert_eq!(doc.dict_get_as_int(&pages, "Count").unwrap(), Some(2));
    assert_eq!(
        doc.dict_get_as_float_array(&pages, "MediaBox").unwrap(),
        Some(vec![0.0, 0.0, 612.0, 792.0])
    );
    assert_eq!(doc.dict_get_as_name(&pages, "Missing").unwrap(), None);
    assert!(doc.get_int(&PdfObject::name("x")).is_err());
    let decoded = doc.get_decoded_stream(&PdfObject::Ref(ObjectId::new(6, 0)), None).unwrap();
    assert_eq!(&decoded[..], b"0 0 1 rg 10 10 100 100 re f");
}

#[test]
fn compressed_object_equals_uncompressed_copy() {
    let body = "<< /Kind /Sample /Values [1 2.5 (three) /four] /Nested << /A null /B true >> >>";
    let mut b = PdfBuilder::new("1.5");
    let catalog = b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    let pages = b.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    let plain = b.object(3, body);
    let objstm = b.object_stream(5, &[(4, body)]);
    let xref = b.xref_stream(
        6,
        "/Root 1 0 R",
        &[
            (1, 1, catalog as u32, 0),
            (2, 1, pages as u32, 0),
            (3, 1, plain as u32, 0),
            (4, 2, 5, 0),
            (5, 1, objstm as u32, 0),
        ],
    );
    let doc = Document::load(b.finish(xref), "").unwrap();

    let compressed = doc.dereference(ObjectId::new(4, 0)).unwrap();
    assert_eq!(compressed, doc.dereference(ObjectId::new(3, 0)).unwrap());
    assert!(doc.xref_entries().any(|(num, e)| num == 4 && e == XrefEntry::Compressed { container: 5, index: 0 }));
}
