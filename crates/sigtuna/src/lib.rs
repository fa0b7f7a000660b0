#![forbid(unsafe_code)]

//! Sigtuna: XML Digital Signature in pure Rust.
//!
//! This crate re-exports the workspace crates under short names and the
//! types most callers need at the top level.

pub use sigtuna_c14n as c14n;
pub use sigtuna_core as core;
pub use sigtuna_crypto as crypto;
pub use sigtuna_dsig as dsig;
pub use sigtuna_keys as keys;
pub use sigtuna_transforms as transforms;
pub use sigtuna_xml as xml;

pub use sigtuna_core::{Error, Result};
pub use sigtuna_dsig::{ReferenceOptions, SignOptions, Signature, SignedXml, VerifyOptions, VerifyResult};
