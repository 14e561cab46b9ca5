//! Typed accessors that resolve indirect references first.

use bytes::Bytes;

use super::catalog::Document;
use crate::codec::filters::FilterLimits;
use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, Name, PdfObject, dict_get};
use crate::utils::decode_text;

impl Document {
    pub fn get_int(&self, obj: &PdfObject) -> Result<i64> {
        self.resolve(obj)?.as_int()
    }

    pub fn get_float(&self, obj: &PdfObject) -> Result<f32> {
        Ok(self.get_double(obj)? as f32)
    }

    pub fn get_double(&self, obj: &PdfObject) -> Result<f64> {
        self.resolve(obj)?.as_num()
    }

    pub fn get_bool(&self, obj: &PdfObject) -> Result<bool> {
        self.resolve(obj)?.as_bool()
    }

    pub fn get_name(&self, obj: &PdfObject) -> Result<Name> {
        self.resolve(obj)?.as_name()
    }

    /// Byte string, exactly as stored (after decryption).
    pub fn get_string(&self, obj: &PdfObject) -> Result<Vec<u8>> {
        match self.resolve(obj)? {
            PdfObject::String(bytes) => Ok(bytes),
            other => Err(PdfError::TypeError {
                expected: "string",
                got: other.type_name(),
            }),
        }
    }

    /// Text string: UTF-16BE with a byte order mark, else PDFDocEncoding.
    pub fn get_text(&self, obj: &PdfObject) -> Result<String> {
        Ok(decode_text(&self.get_string(obj)?))
    }

    pub fn get_array(&self, obj: &PdfObject) -> Result<Vec<PdfObject>> {
        match self.resolve(obj)? {
            PdfObject::Array(items) => Ok(items),
            other => Err(PdfError::TypeError {
                expected: "array",
                got: other.type_name(),
            }),
        }
    }

    /// Dictionary value; for a stream, its stream dictionary.
    pub fn get_dict(&self, obj: &PdfObject) -> Result<Dictionary> {
        match self.resolve(obj)? {
            PdfObject::Dict(dict) => Ok(dict),
            PdfObject::Stream(stream) => Ok(stream.dict.clone()),
            other => Err(PdfError::TypeError {
                expected: "dict",
                got: other.type_name(),
            }),
        }
    }

    /// Resolved `key` of the dictionary `obj` resolves to.
    pub fn get_dict_entry(&self, obj: &PdfObject, key: &str) -> Result<Option<PdfObject>> {
        let dict = self.get_dict(obj)?;
        dict_get(&dict, key).map(|v| self.resolve(v)).transpose()
    }

    pub fn get_raw_stream(&self, obj: &PdfObject) -> Result<Bytes> {
        Ok(self.resolve(obj)?.as_stream()?.raw().clone())
    }

    pub fn get_decoded_stream(&self, obj: &PdfObject, limits: Option<&FilterLimits>) -> Result<Bytes> {
        let resolved = self.resolve(obj)?;
        let stream = resolved.as_stream()?;
        match limits {
            Some(limits) => self.decode_stream_with_limits(stream, limits),
            None => self.decode_stream(stream),
        }
    }

    fn dict_value(&self, dict: &Dictionary, key: &str) -> Result<Option<PdfObject>> {
        match dict_get(dict, key) {
            Some(value) => match self.resolve(value)? {
                PdfObject::Null => Ok(None),
                value => Ok(Some(value)),
            },
            None => Ok(None),
        }
    }

    pub fn dict_get_as_int(&self, dict: &Dictionary, key: &str) -> Result<Option<i64>> {
        self.dict_value(dict, key)?.map(|v| v.as_int()).transpose()
    }

    pub fn dict_get_as_float(&self, dict: &Dictionary, key: &str) -> Result<Option<f32>> {
        Ok(self.dict_get_as_double(dict, key)?.map(|v| v as f32))
    }

    pub fn dict_get_as_double(&self, dict: &Dictionary, key: &str) -> Result<Option<f64>> {
        self.dict_value(dict, key)?.map(|v| v.as_num()).transpose()
    }

    pub fn dict_get_as_bool(&self, dict: &Dictionary, key: &str) -> Result<Option<bool>> {
        self.dict_value(dict, key)?.map(|v| v.as_bool()).transpose()
    }

    pub fn dict_get_as_name(&self, dict: &Dictionary, key: &str) -> Result<Option<Name>> {
        self.dict_value(dict, key)?.map(|v| v.as_name()).transpose()
    }

    pub fn dict_get_as_dict(&self, dict: &Dictionary, key: &str) -> Result<Option<Dictionary>> {
        match dict_get(dict, key) {
            Some(value) if !value.is_null() => self.get_dict(value).map(Some),
            _ => Ok(None),
        }
    }

    pub fn dict_get_as_int_array(&self, dict: &Dictionary, key: &str) -> Result<Option<Vec<i64>>> {
        let Some(value) = self.dict_value(dict, key)? else {
            return Ok(None);
        };
        value
            .as_array()?
            .iter()
            .map(|item| self.get_int(item))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn dict_get_as_float_array(&self, dict: &Dictionary, key: &str) -> Result<Option<Vec<f64>>> {
        let Some(value) = self.dict_value(dict, key)? else {
            return Ok(None);
        };
        value
            .as_array()?
            .iter()
            .map(|item| self.get_double(item))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Whether `/Type` of `dict` is `expected`.
    pub fn is_dict_type(&self, dict: &Dictionary, expected: &str) -> bool {
        matches!(self.dict_get_as_name(dict, "Type"), Ok(Some(name)) if name == expected)
    }
}
