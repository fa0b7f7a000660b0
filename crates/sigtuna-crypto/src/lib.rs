#![forbid(unsafe_code)]

//! Cryptographic building blocks for the Sigtuna XML-DSig library.
//!
//! Provides the digest and signature algorithm registry, algorithm-bound
//! key handles, and the [`CryptoProvider`] capability through which all
//! signing and verification flows.

pub mod digest;
pub mod key;
pub mod provider;
pub mod registry;

pub use digest::{DigestAlgorithm, HashAlgorithm};
pub use key::{CryptoKey, EcPublicKey, EcSecretKey, KeyAlgorithm, KeyData, NamedCurve};
pub use provider::{CryptoProvider, KeyFormat, RustCryptoProvider};
pub use registry::{PssParams, SignatureAlgorithm, SignatureKind, SigningAlgorithm};
