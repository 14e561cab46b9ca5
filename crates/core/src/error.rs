//! Error types for quire.

use thiserror::Error;

/// Primary error type for PDF loading and interpretation.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Malformed syntax: bad delimiters, unterminated strings or streams,
    /// non-name dictionary keys, broken rectangles.
    #[error("format error at offset {pos}: {msg}")]
    Format { pos: usize, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A security handler revision, crypt filter method or stream filter
    /// that quire does not implement.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The crypto primitives refused the parameters the document asks for.
    #[error("platform limitation: {0}")]
    PlatformLimitation(String),

    #[error("authentication failed: no owner or user password matched")]
    Authentication,

    /// The object graph is present but semantically broken.
    #[error("runtime data error: {0}")]
    RuntimeData(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

impl PdfError {
    /// Shorthand for a [`PdfError::Format`] at `pos`.
    pub fn format(pos: usize, msg: impl Into<String>) -> Self {
        Self::Format {
            pos,
            msg: msg.into(),
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::RuntimeData(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFeature(msg.into())
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message_carries_offset() {
        let err = PdfError::format(42, "expected '>>'");
        assert_eq!(err.to_string(), "format error at offset 42: expected '>>'");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PdfError = io.into();
        assert!(matches!(err, PdfError::Io(_)));
    }
}
