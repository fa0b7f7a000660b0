#![forbid(unsafe_code)]

//! Shared building blocks for the Sigtuna XML-DSig workspace.
//!
//! Holds the error type used by every crate, the XML namespace and element
//! name constants, and the algorithm URI table.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
