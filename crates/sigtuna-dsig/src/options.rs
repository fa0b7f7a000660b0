#![forbid(unsafe_code)]

//! Options for signing and verification.

use crate::signature::Reference;
use sigtuna_crypto::{CryptoKey, HashAlgorithm};
use sigtuna_keys::X509Certificate;
use sigtuna_transforms::Transform;
use sigtuna_xml::Element;

/// Smallest `HMACOutputLength` accepted by default, in bits.
pub const DEFAULT_HMAC_MIN_OUTPUT_BITS: usize = 80;

/// Describes one `<Reference>` to create when signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOptions {
    pub id: Option<String>,
    pub uri: Option<String>,
    pub reference_type: Option<String>,
    pub hash: HashAlgorithm,
    pub transforms: Vec<Transform>,
    /// Content digested as-is by detached signing.
    pub digest_source: Option<Vec<u8>>,
    /// A digest computed elsewhere; the reference is not digested again.
    pub digest_value: Option<Vec<u8>>,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            id: None,
            uri: None,
            reference_type: None,
            hash: HashAlgorithm::Sha256,
            transforms: Vec::new(),
            digest_source: None,
            digest_value: None,
        }
    }
}

impl ReferenceOptions {
    pub fn new(uri: impl Into<String>, hash: HashAlgorithm) -> Self {
        Self {
            uri: Some(uri.into()),
            hash,
            ..Self::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }
}

impl From<ReferenceOptions> for Reference {
    fn from(options: ReferenceOptions) -> Self {
        Self {
            id: options.id,
            uri: options.uri,
            reference_type: options.reference_type,
            transforms: options.transforms,
            digest_method: Some(options.hash),
            digest_value: options.digest_value,
            digest_source: options.digest_source,
        }
    }
}

/// What [`SignedXml::sign`](crate::SignedXml::sign) adds to the signature.
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    pub id: Option<String>,
    /// Key whose public half goes into a `<KeyValue>`. Ignored for HMAC.
    pub key_value: Option<CryptoKey>,
    /// One `<X509Data>` per certificate.
    pub x509: Vec<X509Certificate>,
    /// With no references, one reference over the whole document is made.
    pub references: Vec<ReferenceOptions>,
    /// Prefix for the signature elements; empty selects the default
    /// namespace.
    pub prefix: Option<String>,
}

/// Inputs to [`SignedXml::verify`](crate::SignedXml::verify).
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Verify with this key instead of the keys in `<KeyInfo>`.
    pub key: Option<CryptoKey>,
    /// Content the references are resolved against, instead of the
    /// document the signature was loaded from.
    pub content: Option<Element>,
    /// Lower bound for `HMACOutputLength`. Half the hash size is enforced
    /// as well.
    pub hmac_min_output_bits: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            key: None,
            content: None,
            hmac_min_output_bits: DEFAULT_HMAC_MIN_OUTPUT_BITS,
        }
    }
}

impl VerifyOptions {
    pub fn with_key(key: CryptoKey) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_c14n::C14nMode;

    #[test]
    fn test_reference_options_become_reference() {
        let mut options = ReferenceOptions::new("#data", HashAlgorithm::Sha512)
            .with_transform(Transform::c14n(C14nMode::Exclusive));
        options.digest_value = Some(vec![1, 2, 3]);
        let reference = Reference::from(options);
        assert_eq!(reference.uri.as_deref(), Some("#data"));
        assert_eq!(reference.digest_method, Some(HashAlgorithm::Sha512));
        assert_eq!(reference.transforms.len(), 1);
        assert_eq!(reference.digest_value, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ReferenceOptions::default().hash, HashAlgorithm::Sha256);
        assert_eq!(VerifyOptions::default().hmac_min_output_bits, 80);
    }
}
