#![forbid(unsafe_code)]

//! Signature algorithm registry: URI mapping and signing descriptors.

use crate::digest::HashAlgorithm;
use sigtuna_core::{algorithm, Error, Result};

/// A fully resolved SignatureMethod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5.
    RsaPkcs1(HashAlgorithm),
    /// RSASSA-PSS with MGF1 over the same hash.
    ///
    /// `with_params` selects the parametric `xmldsig-more#rsa-pss` URI,
    /// which carries an `RSAPSSParams` block.
    RsaPss {
        hash: HashAlgorithm,
        salt_length: usize,
        with_params: bool,
    },
    /// ECDSA; the curve comes from the key.
    Ecdsa(HashAlgorithm),
    Hmac(HashAlgorithm),
}

/// Parameters read from an `RSAPSSParams` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PssParams {
    pub hash: HashAlgorithm,
    pub salt_length: Option<usize>,
}

impl SignatureAlgorithm {
    /// SignatureMethod algorithm URI.
    pub fn uri(&self) -> &'static str {
        use HashAlgorithm::*;
        match *self {
            Self::RsaPkcs1(h) => match h {
                Sha1 => algorithm::RSA_SHA1,
                Sha256 => algorithm::RSA_SHA256,
                Sha384 => algorithm::RSA_SHA384,
                Sha512 => algorithm::RSA_SHA512,
            },
            Self::RsaPss { with_params: true, .. } => algorithm::RSA_PSS,
            Self::RsaPss { hash, .. } => match hash {
                Sha1 => algorithm::RSA_PSS_SHA1,
                Sha256 => algorithm::RSA_PSS_SHA256,
                Sha384 => algorithm::RSA_PSS_SHA384,
                Sha512 => algorithm::RSA_PSS_SHA512,
            },
            Self::Ecdsa(h) => match h {
                Sha1 => algorithm::ECDSA_SHA1,
                Sha256 => algorithm::ECDSA_SHA256,
                Sha384 => algorithm::ECDSA_SHA384,
                Sha512 => algorithm::ECDSA_SHA512,
            },
            Self::Hmac(h) => match h {
                Sha1 => algorithm::HMAC_SHA1,
                Sha256 => algorithm::HMAC_SHA256,
                Sha384 => algorithm::HMAC_SHA384,
                Sha512 => algorithm::HMAC_SHA512,
            },
        }
    }

    /// Resolve a SignatureMethod URI. The parametric RSA-PSS URI needs the
    /// parsed `RSAPSSParams`; a missing salt length means the hash size.
    pub fn from_uri(uri: &str, pss: Option<PssParams>) -> Result<Self> {
        use HashAlgorithm::*;
        let alg = match uri {
            algorithm::RSA_SHA1 => Self::RsaPkcs1(Sha1),
            algorithm::RSA_SHA256 => Self::RsaPkcs1(Sha256),
            algorithm::RSA_SHA384 => Self::RsaPkcs1(Sha384),
            algorithm::RSA_SHA512 => Self::RsaPkcs1(Sha512),

            algorithm::RSA_PSS_SHA1 => Self::pss_without_params(Sha1),
            algorithm::RSA_PSS_SHA256 => Self::pss_without_params(Sha256),
            algorithm::RSA_PSS_SHA384 => Self::pss_without_params(Sha384),
            algorithm::RSA_PSS_SHA512 => Self::pss_without_params(Sha512),
            algorithm::RSA_PSS => {
                let params = pss.ok_or_else(|| {
                    Error::MalformedInput("cannot get params for RSA-PSS algorithm".into())
                })?;
                Self::RsaPss {
                    hash: params.hash,
                    salt_length: params.salt_length.unwrap_or(params.hash.output_len()),
                    with_params: true,
                }
            }

            algorithm::ECDSA_SHA1 => Self::Ecdsa(Sha1),
            algorithm::ECDSA_SHA256 => Self::Ecdsa(Sha256),
            algorithm::ECDSA_SHA384 => Self::Ecdsa(Sha384),
            algorithm::ECDSA_SHA512 => Self::Ecdsa(Sha512),

            algorithm::HMAC_SHA1 => Self::Hmac(Sha1),
            algorithm::HMAC_SHA256 => Self::Hmac(Sha256),
            algorithm::HMAC_SHA384 => Self::Hmac(Sha384),
            algorithm::HMAC_SHA512 => Self::Hmac(Sha512),

            _ => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "signature algorithm '{uri}' is not supported"
                )))
            }
        };
        Ok(alg)
    }

    fn pss_without_params(hash: HashAlgorithm) -> Self {
        Self::RsaPss {
            hash,
            salt_length: hash.output_len(),
            with_params: false,
        }
    }

    pub fn hash(&self) -> HashAlgorithm {
        match *self {
            Self::RsaPkcs1(h) | Self::Ecdsa(h) | Self::Hmac(h) => h,
            Self::RsaPss { hash, .. } => hash,
        }
    }

    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RsaPkcs1(_) | Self::RsaPss { .. })
    }

    pub fn is_hmac(&self) -> bool {
        matches!(self, Self::Hmac(_))
    }
}

/// Algorithm family of a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    RsaPkcs1,
    /// An explicit salt length selects the parametric RSA-PSS URI.
    RsaPss { salt_length: Option<usize> },
    Ecdsa,
    Hmac,
}

/// What the caller asks for when signing: a family and an optional hash.
///
/// The hash is filled in from the key's own algorithm when the key is bound
/// to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningAlgorithm {
    pub kind: SignatureKind,
    pub hash: Option<HashAlgorithm>,
}

impl SigningAlgorithm {
    pub fn new(kind: SignatureKind, hash: Option<HashAlgorithm>) -> Self {
        Self { kind, hash }
    }

    pub fn rsa_pkcs1(hash: HashAlgorithm) -> Self {
        Self::new(SignatureKind::RsaPkcs1, Some(hash))
    }

    pub fn rsa_pss(hash: HashAlgorithm, salt_length: Option<usize>) -> Self {
        Self::new(SignatureKind::RsaPss { salt_length }, Some(hash))
    }

    pub fn ecdsa(hash: HashAlgorithm) -> Self {
        Self::new(SignatureKind::Ecdsa, Some(hash))
    }

    pub fn hmac(hash: HashAlgorithm) -> Self {
        Self::new(SignatureKind::Hmac, Some(hash))
    }

    /// Resolve to a concrete algorithm. `key_hash`, the hash the key is
    /// bound to, takes precedence over the requested one.
    pub fn resolve(&self, key_hash: Option<HashAlgorithm>) -> Result<SignatureAlgorithm> {
        let hash = key_hash.or(self.hash).ok_or_else(|| {
            Error::MalformedInput("signing algorithm doesn't have a hash".into())
        })?;
        Ok(match self.kind {
            SignatureKind::RsaPkcs1 => SignatureAlgorithm::RsaPkcs1(hash),
            SignatureKind::RsaPss {
                salt_length: Some(salt_length),
            } if salt_length > 0 => SignatureAlgorithm::RsaPss {
                hash,
                salt_length,
                with_params: true,
            },
            SignatureKind::RsaPss { .. } => SignatureAlgorithm::pss_without_params(hash),
            SignatureKind::Ecdsa => SignatureAlgorithm::Ecdsa(hash),
            SignatureKind::Hmac => SignatureAlgorithm::Hmac(hash),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_roundtrip_for_fixed_uris() {
        for hash in HashAlgorithm::ALL {
            for alg in [
                SignatureAlgorithm::RsaPkcs1(hash),
                SignatureAlgorithm::pss_without_params(hash),
                SignatureAlgorithm::Ecdsa(hash),
                SignatureAlgorithm::Hmac(hash),
            ] {
                assert_eq!(SignatureAlgorithm::from_uri(alg.uri(), None).unwrap(), alg);
            }
        }
    }

    #[test]
    fn test_parametric_pss() {
        assert!(matches!(
            SignatureAlgorithm::from_uri(algorithm::RSA_PSS, None),
            Err(Error::MalformedInput(_))
        ));
        let alg = SignatureAlgorithm::from_uri(
            algorithm::RSA_PSS,
            Some(PssParams {
                hash: HashAlgorithm::Sha384,
                salt_length: None,
            }),
        )
        .unwrap();
        assert_eq!(
            alg,
            SignatureAlgorithm::RsaPss {
                hash: HashAlgorithm::Sha384,
                salt_length: 48,
                with_params: true
            }
        );
        assert_eq!(alg.uri(), algorithm::RSA_PSS);
    }

    #[test]
    fn test_resolve_prefers_key_hash() {
        let requested = SigningAlgorithm::rsa_pkcs1(HashAlgorithm::Sha1);
        assert_eq!(
            requested.resolve(Some(HashAlgorithm::Sha512)).unwrap().uri(),
            algorithm::RSA_SHA512
        );
        let pss = SigningAlgorithm::rsa_pss(HashAlgorithm::Sha256, Some(16));
        assert_eq!(pss.resolve(None).unwrap().uri(), algorithm::RSA_PSS);
        let pss = SigningAlgorithm::rsa_pss(HashAlgorithm::Sha256, None);
        assert_eq!(pss.resolve(None).unwrap().uri(), algorithm::RSA_PSS_SHA256);
        let no_hash = SigningAlgorithm::new(SignatureKind::Ecdsa, None);
        assert!(matches!(no_hash.resolve(None), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_unknown_signature_uri() {
        assert!(matches!(
            SignatureAlgorithm::from_uri("http://www.w3.org/2000/09/xmldsig#dsa-sha1", None),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
