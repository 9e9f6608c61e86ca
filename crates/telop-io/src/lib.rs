//! # Telop I/O
//!
//! Reader and writer for Adobe Premiere Pro's legacy-title format (PRTL):
//! the UTF-16LE byte framing, the XML dialect, and the cross-referenced
//! TextDescription/Style/Shader/TextChain tables.
//!
//! Both directions are pure transformations over [`telop_core::TextScene`];
//! file and network I/O belong to the caller.

pub mod prtl;
mod xml;

pub use prtl::{deserialize, serialize, DecodeWarning, PrtlError, PrtlReader, PrtlWriter};
