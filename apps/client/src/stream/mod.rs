//! Streamed-response decoding: raw bytes in, ordered text fragments out.

pub mod decoder;
pub mod utf8;

pub use decoder::{decode_fragments, Fragment, FragmentStream};
