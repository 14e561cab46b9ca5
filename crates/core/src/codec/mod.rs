//! Stream filters and the raw ciphers used by the security handler.
//!
//! - `aes`, `arcfour`: block and stream ciphers
//! - `ascii85`, `lzw`, `runlength`, `flate`: stream decoders
//! - `filters`: the `/Filter` chain applied to stream payloads

pub mod aes;
pub mod arcfour;
pub mod ascii85;
pub mod filters;
pub mod flate;
pub mod lzw;
pub mod runlength;

pub use arcfour::{Arcfour, rc4};
pub use ascii85::{ascii85decode, asciihexdecode};
pub use filters::{FilterLimits, FilterStep, decode_filters};
pub use flate::{PredictorParams, flatedecode};
pub use lzw::lzwdecode_with_earlychange;
pub use runlength::rldecode;
