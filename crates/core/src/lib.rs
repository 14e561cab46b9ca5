//! quire - PDF object model, cross-reference loading, decryption and a
//! resumable content-stream interpreter.
//!
//! ```no_run
//! use quire_core::document::Document;
//! use quire_core::interp::{CommandList, StepBudget};
//!
//! let data = std::fs::read("file.pdf")?;
//! let doc = Document::load(data, "")?;
//! let mut interp = doc.page(1)?.interpreter(CommandList::new())?;
//! interp.run(StepBudget::Unbounded)?;
//! println!("{} commands", interp.sink().len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod crypt;
pub mod document;
pub mod error;
pub mod interp;
pub mod model;
pub mod parser;
pub mod utils;

pub use document::{Document, DocumentOptions, Page};
pub use error::{PdfError, Result};
pub use interp::{CancellationToken, CommandList, ContentInterpreter, DrawCommand, DrawingSink, StepBudget};
pub use model::{Dictionary, Name, ObjectId, PdfObject, PdfStream};
