#![forbid(unsafe_code)]

//! XML Digital Signature (XML-DSig) creation and verification.
//!
//! [`SignedXml`] signs documents (enveloped, enveloping through `<Object>`,
//! or detached) and verifies loaded `<Signature>` elements. The object
//! model in [`signature`] maps each XML-DSig element to a Rust type.

pub mod options;
pub mod reference;
pub mod signature;
pub mod signed_xml;

pub use options::{ReferenceOptions, SignOptions, VerifyOptions, DEFAULT_HMAC_MIN_OUTPUT_BITS};
pub use reference::{ContentHandler, ReferenceSource};
pub use signature::{
    CanonicalizationMethod, DataObject, MaskGenerationFunction, Reference, RsaPssParams, Signature,
    SignatureMethod, SignedInfo,
};
pub use signed_xml::{SignedXml, VerifyResult};
