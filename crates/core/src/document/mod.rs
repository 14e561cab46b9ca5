//! The document layer: loading, object resolution and pages.
//!
//! This module contains:
//! - `catalog` - file header, xref chain, trailer, security setup and dereferencing (Document)
//! - `xref` - classic xref sections and xref stream records
//! - `objstm` - objects stored in object streams
//! - `cache` - LRU cache of parsed objects
//! - `access` - typed accessors that resolve references
//! - `page` - page tree lookup (Page)

mod access;
pub mod cache;
pub mod catalog;
pub mod objstm;
pub mod page;
pub mod xref;

pub use cache::{DEFAULT_CACHE_CAPACITY, ObjectCache};
pub use catalog::{Document, DocumentOptions, Version, find_startxref};
pub use page::{Page, parse_normalised_rectangle};
pub use xref::{XrefEntry, XrefTable};
