//! Building blocks shared by the container reader: errors, character
//! encodings and the XML layer.

pub mod encoding;
pub mod error;
pub mod xml;

pub use error::{Error, Result};
