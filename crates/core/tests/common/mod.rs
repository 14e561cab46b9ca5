//! Builder for small synthetic PDF files used by the integration tests.
#![allow(dead_code)]

use std::fmt::Write as _;

/// Appends objects and cross-reference sections to an in-memory file,
/// recording object offsets as it goes.
pub struct PdfBuilder {
    buf: Vec<u8>,
    pending: Vec<(u32, usize)>,
    first_section: bool,
}

impl PdfBuilder {
    pub fn new(version: &str) -> Self {
        let mut buf = format!("%PDF-{version}\n").into_bytes();
        buf.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");
        Self {
            buf,
            pending: Vec::new(),
            first_section: true,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// `num 0 obj body endobj`, returning the object's offset.
    pub fn object(&mut self, num: u32, body: &str) -> usize {
        self.object_bytes(num, body.as_bytes())
    }

    pub fn object_bytes(&mut self, num: u32, body: &[u8]) -> usize {
        let offset = self.buf.len();
        self.buf.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
        self.pending.push((num, offset));
        offset
    }

    /// Stream object; `entries` are extra dictionary entries.
    pub fn stream(&mut self, num: u32, entries: &str, data: &[u8]) -> usize {
        let mut body = format!("<< {entries} /Length {} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object_bytes(num, &body)
    }

    /// Object stream holding `objects`, uncompressed.
    pub fn object_stream(&mut self, num: u32, objects: &[(u32, &str)]) -> usize {
        let mut header = String::new();
        let mut body = String::new();
        for (n, text) in objects {
            let _ = write!(header, "{n} {} ", body.len());
            body.push_str(text);
            body.push(' ');
        }
        let entries = format!("/Type /ObjStm /N {} /First {}", objects.len(), header.len());
        self.stream(num, &entries, format!("{header}{body}").as_bytes())
    }

    /// Classic xref section for every object added since the last section,
    /// followed by `trailer << entries >>`. Returns the section offset.
    pub fn xref(&mut self, trailer: &str) -> usize {
        let offset = self.buf.len();
        let mut out = String::from("xref\n");
        if std::mem::take(&mut self.first_section) {
            out.push_str("0 1\n0000000000 65535 f \n");
        }
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_unstable();
        for (num, off) in pending {
            let _ = write!(out, "{num} 1\n{off:010} 00000 n \n");
        }
        let _ = write!(out, "trailer\n<< {trailer} >>\n");
        self.buf.extend_from_slice(out.as_bytes());
        offset
    }

    /// Cross-reference stream object `num` with `/W [1 4 2]` records.
    ///
    /// `records` are `(object, type, field2, field3)`; the stream's own
    /// entry is added automatically.
    pub fn xref_stream(&mut self, num: u32, entries: &str, records: &[(u32, u8, u32, u16)]) -> usize {
        let offset = self.buf.len();
        let mut all: Vec<(u32, u8, u32, u16)> = records.to_vec();
        all.push((num, 1, offset as u32, 0));
        all.sort_unstable_by_key(|r| r.0);

        let mut index = String::new();
        let mut data = Vec::new();
        for (n, kind, f2, f3) in &all {
            let _ = write!(index, "{n} 1 ");
            data.push(*kind);
            data.extend_from_slice(&f2.to_be_bytes());
            data.extend_from_slice(&f3.to_be_bytes());
        }
        let size = all.iter().map(|r| r.0).max().unwrap_or(0) + 1;
        let dict = format!("/Type /XRef /W [1 4 2] /Index [{index}] /Size {size} {entries}");
        self.stream(num, &dict, &data);
        self.pending.clear();
        offset
    }

    pub fn finish(mut self, startxref: usize) -> Vec<u8> {
        self.buf
            .extend_from_slice(format!("startxref\n{startxref}\n%%EOF\n").as_bytes());
        self.buf
    }
}

/// A two-page document with one content stream per page.
pub fn two_page_document() -> Vec<u8> {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(
        2,
        "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 7 0 R >> >> >>",
    );
    b.object(3, "<< /Type /Page /Parent 2 0 R /Contents 5 0 R >>");
    b.object(4, "<< /Type /Page /Parent 2 0 R /Contents 6 0 R /Rotate -90 >>");
    b.stream(5, "", b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET");
    b.stream(6, "", b"0 0 1 rg 10 10 100 100 re f");
    b.object(7, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    let xref = b.xref("/Size 8 /Root 1 0 R");
    b.finish(xref)
}
