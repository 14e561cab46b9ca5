//! FlateDecode and the PNG/TIFF predictors that usually accompany it.

use std::io::Read;

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{PdfError, Result};

/// Inflate zlib data, falling back to a byte-at-a-time decoder that keeps
/// whatever was produced before the stream went bad.
pub fn flatedecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(err) => {
            tracing::debug!(%err, "zlib stream corrupt, decoding leniently");
            Ok(decompress_corrupted(data))
        }
    }
}

/// Best-effort inflate for corrupted streams (bad checksums, truncated
/// tails). Output stops at the first hard failure.
fn decompress_corrupted(data: &[u8]) -> Vec<u8> {
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        if produced > 0 {
            out.extend_from_slice(&buf[..produced]);
        }
        let consumed = (decoder.total_in() - before_in) as usize;
        i += consumed.max(1);
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}

/// Predictor parameters taken from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

/// Undo the predictor named by `params`. Predictor 1 is a no-op.
pub fn apply_predictor(data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data),
        2 => tiff_predictor(&data, params),
        10..=15 => png_predictor(&data, params),
        other => Err(PdfError::unsupported(format!("predictor {other}"))),
    }
}

fn row_layout(params: &PredictorParams) -> (usize, usize) {
    let bits_per_pixel = params.colors * params.bits_per_component;
    let row_bytes = (params.columns * bits_per_pixel).div_ceil(8);
    let bpp = bits_per_pixel.div_ceil(8).max(1);
    (row_bytes, bpp)
}

/// Reverse PNG row filtering: every row starts with a filter-type byte.
fn png_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let (row_bytes, bpp) = row_layout(params);
    if row_bytes == 0 {
        return Ok(Vec::new());
    }
    let row_size = row_bytes + 1;

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];
    let mut current_row = vec![0u8; row_bytes];

    for row in data.chunks_exact(row_size) {
        let filter_type = row[0];
        let row_data = &row[1..];

        match filter_type {
            0 => current_row.copy_from_slice(row_data),
            1 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                for i in 0..row_bytes {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] as u16 } else { 0 };
                    let above = prev_row[i] as u16;
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(paeth_predictor(left, above, upper_left));
                }
            }
            other => {
                return Err(PdfError::DecodeError(format!(
                    "unknown PNG filter type {other}"
                )));
            }
        }

        result.extend_from_slice(&current_row);
        std::mem::swap(&mut prev_row, &mut current_row);
    }

    Ok(result)
}

/// Reverse TIFF predictor 2 (horizontal differencing). Only 8-bit
/// components are supported.
fn tiff_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(PdfError::unsupported(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let (row_bytes, bpp) = row_layout(params);
    let mut out = data.to_vec();
    if row_bytes == 0 {
        return Ok(out);
    }
    for row in out.chunks_mut(row_bytes) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(out)
}

const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::ZlibEncoder};
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_flate_roundtrip() {
        let packed = deflate(b"BT /F1 12 Tf (hi) Tj ET");
        assert_eq!(flatedecode(&packed).unwrap(), b"BT /F1 12 Tf (hi) Tj ET");
    }

    #[test]
    fn test_flate_truncated_keeps_prefix() {
        let text = vec![b'q'; 4000];
        let mut packed = deflate(&text);
        packed.truncate(packed.len() - 4);
        let out = flatedecode(&packed).unwrap();
        assert!(out.iter().all(|&b| b == b'q'));
    }

    #[test]
    fn test_png_up_predictor() {
        let params = PredictorParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 3,
        };
        let data = vec![2, 1, 2, 3, 2, 1, 1, 1];
        assert_eq!(apply_predictor(data, &params).unwrap(), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_and_paeth() {
        let params = PredictorParams {
            predictor: 15,
            colors: 1,
            bits_per_component: 8,
            columns: 2,
        };
        let data = vec![1, 5, 1, 4, 0, 0];
        assert_eq!(apply_predictor(data, &params).unwrap(), vec![5, 6, 5, 6]);
    }

    #[test]
    fn test_tiff_predictor() {
        let params = PredictorParams {
            predictor: 2,
            colors: 1,
            bits_per_component: 8,
            columns: 3,
        };
        assert_eq!(
            apply_predictor(vec![10, 1, 1, 20, 2, 2], &params).unwrap(),
            vec![10, 11, 12, 20, 22, 24]
        );
    }
}
