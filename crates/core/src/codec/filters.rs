//! The `/Filter` chain applied to stream payloads.

use bytes::Bytes;

use crate::codec::{ascii85, flate, lzw, runlength};
use crate::codec::flate::PredictorParams;
use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, Name, PdfObject, dict_get};

/// Filters at which decoding stops, leaving the remaining encoding in
/// place for an external codec (typically an image decoder).
///
/// Kept sorted and de-duplicated so that equal sets compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterLimits(Vec<Name>);

impl FilterLimits {
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn new<I: IntoIterator<Item = Name>>(names: I) -> Self {
        let mut names: Vec<Name> = names.into_iter().map(canonical_filter_name).collect();
        names.sort();
        names.dedup();
        Self(names)
    }

    /// Image codecs that quire leaves to the rendering backend.
    pub fn image_codecs() -> Self {
        Self::new(
            ["DCTDecode", "JPXDecode", "CCITTFaxDecode", "JBIG2Decode"]
                .into_iter()
                .map(Name::new),
        )
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.0.contains(&canonical_filter_name(name.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One filter of a chain together with its `/DecodeParms` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStep {
    pub name: Name,
    pub parms: Option<Dictionary>,
}

/// Expand the abbreviations allowed in inline images.
pub fn canonical_filter_name(name: Name) -> Name {
    let full = match name.as_str() {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        _ => return name,
    };
    Name::new(full)
}

/// Build the filter chain from already-resolved `/Filter` and
/// `/DecodeParms` values.
pub fn filter_chain(filter: Option<&PdfObject>, parms: Option<&PdfObject>) -> Result<Vec<FilterStep>> {
    let names: Vec<Name> = match filter {
        None | Some(PdfObject::Null) => return Ok(Vec::new()),
        Some(PdfObject::Name(n)) => vec![n.clone()],
        Some(PdfObject::Array(items)) => items
            .iter()
            .map(PdfObject::as_name)
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(PdfError::TypeError {
                expected: "name or array",
                got: other.type_name(),
            });
        }
    };

    let parms: Vec<Option<Dictionary>> = match parms {
        Some(PdfObject::Dict(d)) => vec![Some(d.clone())],
        Some(PdfObject::Array(items)) => items
            .iter()
            .map(|item| match item {
                PdfObject::Dict(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| FilterStep {
            name: canonical_filter_name(name),
            parms: parms.get(i).cloned().flatten(),
        })
        .collect())
}

/// Run `data` through `steps`, stopping before the first filter in
/// `limits`. `Crypt` steps are skipped: decryption happens before the
/// chain runs.
pub fn decode_filters(data: Bytes, steps: &[FilterStep], limits: &FilterLimits) -> Result<Bytes> {
    let mut data = data;
    for step in steps {
        if limits.contains(&step.name) {
            break;
        }
        data = match step.name.as_str() {
            "Crypt" => data,
            "FlateDecode" => {
                let inflated = flate::flatedecode(&data)?;
                Bytes::from(flate::apply_predictor(inflated, &predictor_params(step))?)
            }
            "LZWDecode" => {
                let early = step
                    .parms
                    .as_ref()
                    .and_then(|p| dict_get(p, "EarlyChange"))
                    .and_then(|v| v.as_int().ok())
                    .unwrap_or(1);
                let expanded = lzw::lzwdecode_with_earlychange(&data, early)?;
                Bytes::from(flate::apply_predictor(expanded, &predictor_params(step))?)
            }
            "ASCIIHexDecode" => Bytes::from(ascii85::asciihexdecode(&data)?),
            "ASCII85Decode" => Bytes::from(ascii85::ascii85decode(&data)?),
            "RunLengthDecode" => Bytes::from(runlength::rldecode(&data)?),
            other => {
                return Err(PdfError::unsupported(format!("stream filter {other}")));
            }
        };
    }
    Ok(data)
}

fn predictor_params(step: &FilterStep) -> PredictorParams {
    let mut params = PredictorParams::default();
    let Some(dict) = step.parms.as_ref() else {
        return params;
    };
    let int = |key: &str| dict_get(dict, key).and_then(|v| v.as_int().ok());
    if let Some(p) = int("Predictor") {
        params.predictor = p;
    }
    if let Some(c) = int("Colors") {
        params.colors = c.max(1) as usize;
    }
    if let Some(b) = int("BitsPerComponent") {
        params.bits_per_component = b.max(1) as usize;
    }
    if let Some(c) = int("Columns") {
        params.columns = c.max(1) as usize;
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(names: &[&str]) -> Vec<FilterStep> {
        names
            .iter()
            .map(|n| FilterStep {
                name: Name::new(n),
                parms: None,
            })
            .collect()
    }

    #[test]
    fn test_chain_of_ascii_filters() {
        let out = decode_filters(
            Bytes::from_static(b"3837635552445A7E3E>"),
            &steps(&["AHx", "A85"]),
            &FilterLimits::none(),
        )
        .unwrap();
        assert_eq!(&out[..], b"Hello");
    }

    #[test]
    fn test_limits_stop_chain() {
        let out = decode_filters(
            Bytes::from_static(b"FFD8>"),
            &steps(&["ASCIIHexDecode", "DCTDecode"]),
            &FilterLimits::image_codecs(),
        )
        .unwrap();
        assert_eq!(&out[..], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_unknown_filter_is_unsupported() {
        let err = decode_filters(Bytes::new(), &steps(&["JBIG2Decode"]), &FilterLimits::none())
            .unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_limits_compare_as_sets() {
        let a = FilterLimits::new([Name::new("DCT"), Name::new("JPXDecode")]);
        let b = FilterLimits::new([Name::new("JPXDecode"), Name::new("DCTDecode")]);
        assert_eq!(a, b);
    }
}
