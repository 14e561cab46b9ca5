//! PDF syntax parsing.
//!
//! - `lexer`: byte classes and the [`Cursor`] shared by both tokenizers
//! - `object_parser`: file-level objects, indirect objects and streams
//! - `content_lexer`: page content stream tokens

pub mod content_lexer;
pub mod lexer;
pub mod object_parser;

pub use content_lexer::{ContentLexer, ContentToken};
pub use lexer::{Cursor, Number};
pub use object_parser::{ObjectParser, Resolve, parse_object};
