//! PDF object model: values, color spaces and interpreter state.

pub mod color;
pub mod objects;
pub mod state;

pub use color::{ColorSpace, Paint};
pub use objects::{Dictionary, Name, ObjectId, ObjectOrigin, PdfObject, PdfStream, dict_get, dictionary};
pub use state::{GraphicsState, Overprint, TextState};
