//! Geometry helpers and PDFDocEncoding text conversion.

pub type Point = (f64, f64);

/// `(x0, y0, x1, y1)`.
pub type Rect = (f64, f64, f64, f64);

/// Affine transform `(a, b, c, d, e, f)`, mapping `(x, y)` to
/// `(ax + cy + e, bx + dy + f)`.
pub type Matrix = (f64, f64, f64, f64, f64, f64);

pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// `m1 × m0`: the transform that applies `m1`, then `m0`.
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a1 * a0 + b1 * c0,
        a1 * b0 + b1 * d0,
        c1 * a0 + d1 * c0,
        c1 * b0 + d1 * d0,
        e1 * a0 + f1 * c0 + e0,
        e1 * b0 + f1 * d0 + f0,
    )
}

/// Move the origin of `m` by `(tx, ty)` measured in `m`'s own space.
pub fn translate_matrix(m: Matrix, (tx, ty): Point) -> Matrix {
    mult_matrix((1.0, 0.0, 0.0, 1.0, tx, ty), m)
}

/// Swap corners so that `x0 <= x1` and `y0 <= y1`.
pub fn normalize_rect((x0, y0, x1, y1): Rect) -> Rect {
    (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

/// PDFDocEncoding agrees with Latin-1 except for these two ranges.
const ACCENTS: [char; 8] = ['\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}', '\u{02DC}'];
const PUNCTUATION: [char; 33] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}', '\u{2039}',
    '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '\u{201A}',
    '\u{2122}', '\u{FB01}', '\u{FB02}', '\u{0141}', '\u{0152}', '\u{0160}', '\u{0178}', '\u{017D}', '\u{0131}',
    '\u{0142}', '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}', '\u{20AC}',
];

fn pdfdoc_char(b: u8) -> char {
    match b {
        0x18..=0x1F => ACCENTS[usize::from(b - 0x18)],
        0x80..=0xA0 => PUNCTUATION[usize::from(b - 0x80)],
        0x7F | 0xAD => char::REPLACEMENT_CHARACTER,
        _ => char::from(b),
    }
}

/// Decode a text string: UTF-16BE after an `FE FF` byte order mark,
/// PDFDocEncoding otherwise. Undefined bytes become U+FFFD.
pub fn decode_text(s: &[u8]) -> String {
    match s.strip_prefix(&[0xFE, 0xFF]) {
        Some(body) => {
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => s.iter().map(|&b| pdfdoc_char(b)).collect(),
    }
}

/// The PDFDocEncoding byte for `ch`, if it has one.
pub fn pdfdoc_encode_char(ch: char) -> Option<u8> {
    if ch == char::REPLACEMENT_CHARACTER {
        return None;
    }
    if let Ok(b) = u8::try_from(u32::from(ch))
        && pdfdoc_char(b) == ch
    {
        return Some(b);
    }
    let pos = ACCENTS.iter().position(|&c| c == ch).map(|i| 0x18 + i);
    let pos = pos.or_else(|| PUNCTUATION.iter().position(|&c| c == ch).map(|i| 0x80 + i));
    pos.and_then(|p| u8::try_from(p).ok())
}
