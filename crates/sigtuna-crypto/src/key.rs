#![forbid(unsafe_code)]

//! Opaque key handles.
//!
//! A [`CryptoKey`] pairs key material with the algorithm it is bound to, so
//! that an RSA key imported for PKCS#1 v1.5 cannot be used for PSS by
//! accident.

use crate::digest::HashAlgorithm;
use sigtuna_core::{algorithm, Error, Result};
use std::fmt;

/// Named elliptic curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedCurve {
    P256,
    P384,
    P521,
}

impl NamedCurve {
    /// `urn:oid:` URI used by `ECDSAKeyValue/DomainParameters/NamedCurve`.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::P256 => algorithm::CURVE_P256,
            Self::P384 => algorithm::CURVE_P384,
            Self::P521 => algorithm::CURVE_P521,
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self> {
        match uri {
            algorithm::CURVE_P256 => Ok(Self::P256),
            algorithm::CURVE_P384 => Ok(Self::P384),
            algorithm::CURVE_P521 => Ok(Self::P521),
            _ => Err(Error::UnsupportedAlgorithm(format!("EC curve: {uri}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Size of a field element (and of each signature half) in bytes.
    pub fn field_size(&self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

/// EC private key material.
#[derive(Clone)]
pub enum EcSecretKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

impl EcSecretKey {
    pub fn curve(&self) -> NamedCurve {
        match self {
            Self::P256(_) => NamedCurve::P256,
            Self::P384(_) => NamedCurve::P384,
            Self::P521(_) => NamedCurve::P521,
        }
    }

    pub fn public_key(&self) -> EcPublicKey {
        match self {
            Self::P256(k) => EcPublicKey::P256(k.public_key()),
            Self::P384(k) => EcPublicKey::P384(k.public_key()),
            Self::P521(k) => EcPublicKey::P521(k.public_key()),
        }
    }
}

/// EC public key material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EcPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(p521::PublicKey),
}

impl EcPublicKey {
    pub fn curve(&self) -> NamedCurve {
        match self {
            Self::P256(_) => NamedCurve::P256,
            Self::P384(_) => NamedCurve::P384,
            Self::P521(_) => NamedCurve::P521,
        }
    }

    /// Uncompressed SEC1 point `04 || X || Y`.
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        use p256::elliptic_curve::sec1::ToEncodedPoint;
        match self {
            Self::P256(k) => k.to_encoded_point(false).as_bytes().to_vec(),
            Self::P384(k) => k.to_encoded_point(false).as_bytes().to_vec(),
            Self::P521(k) => k.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Parse a SEC1 encoded point on `curve`.
    pub fn from_sec1_bytes(curve: NamedCurve, bytes: &[u8]) -> Result<Self> {
        let err = |e: p256::elliptic_curve::Error| Error::Key(format!("invalid {} point: {e}", curve.name()));
        Ok(match curve {
            NamedCurve::P256 => Self::P256(p256::PublicKey::from_sec1_bytes(bytes).map_err(err)?),
            NamedCurve::P384 => Self::P384(p384::PublicKey::from_sec1_bytes(bytes).map_err(err)?),
            NamedCurve::P521 => Self::P521(p521::PublicKey::from_sec1_bytes(bytes).map_err(err)?),
        })
    }

    /// Affine `(x, y)` coordinates, each `field_size` bytes.
    pub fn coordinates(&self) -> (Vec<u8>, Vec<u8>) {
        let point = self.to_sec1_bytes();
        let size = self.curve().field_size();
        (point[1..1 + size].to_vec(), point[1 + size..].to_vec())
    }

    /// Build a key from affine coordinates. Shorter coordinates are
    /// left-padded to the field size.
    pub fn from_coordinates(curve: NamedCurve, x: &[u8], y: &[u8]) -> Result<Self> {
        let size = curve.field_size();
        if x.len() > size || y.len() > size {
            return Err(Error::Key(format!("{} coordinate too long", curve.name())));
        }
        let mut point = vec![0u8; 1 + 2 * size];
        point[0] = 0x04;
        point[1 + size - x.len()..1 + size].copy_from_slice(x);
        point[1 + 2 * size - y.len()..].copy_from_slice(y);
        Self::from_sec1_bytes(curve, &point)
    }
}

/// Raw key material.
#[derive(Clone)]
pub enum KeyData {
    RsaPrivate(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
    EcPrivate(EcSecretKey),
    EcPublic(EcPublicKey),
    Hmac(Vec<u8>),
}

/// The algorithm a key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    RsaPkcs1 { hash: HashAlgorithm },
    RsaPss { hash: HashAlgorithm },
    Ecdsa { curve: NamedCurve },
    /// `length` is the key length in bits, when known.
    Hmac { hash: HashAlgorithm, length: Option<usize> },
}

impl KeyAlgorithm {
    /// Hash the key is bound to, if the algorithm carries one.
    pub fn hash(&self) -> Option<HashAlgorithm> {
        match *self {
            Self::RsaPkcs1 { hash } | Self::RsaPss { hash } | Self::Hmac { hash, .. } => Some(hash),
            Self::Ecdsa { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RsaPkcs1 { .. } => "RSASSA-PKCS1-v1_5",
            Self::RsaPss { .. } => "RSA-PSS",
            Self::Ecdsa { .. } => "ECDSA",
            Self::Hmac { .. } => "HMAC",
        }
    }
}

/// Key material bound to an algorithm.
#[derive(Clone)]
pub struct CryptoKey {
    data: KeyData,
    algorithm: KeyAlgorithm,
}

impl CryptoKey {
    /// Pair key material with an algorithm, rejecting mismatches such as an
    /// EC key bound to RSA or a curve other than the key's own.
    pub fn new(data: KeyData, algorithm: KeyAlgorithm) -> Result<Self> {
        let compatible = match (&data, &algorithm) {
            (
                KeyData::RsaPrivate(_) | KeyData::RsaPublic(_),
                KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. },
            ) => true,
            (KeyData::EcPrivate(k), KeyAlgorithm::Ecdsa { curve }) => k.curve() == *curve,
            (KeyData::EcPublic(k), KeyAlgorithm::Ecdsa { curve }) => k.curve() == *curve,
            (KeyData::Hmac(_), KeyAlgorithm::Hmac { .. }) => true,
            _ => false,
        };
        if !compatible {
            return Err(Error::Key(format!(
                "key material cannot be bound to {}",
                algorithm.name()
            )));
        }
        Ok(Self { data, algorithm })
    }

    /// RSA private key for PKCS#1 v1.5 signatures.
    pub fn rsa_private(key: rsa::RsaPrivateKey, hash: HashAlgorithm) -> Self {
        Self {
            data: KeyData::RsaPrivate(key),
            algorithm: KeyAlgorithm::RsaPkcs1 { hash },
        }
    }

    /// RSA public key for PKCS#1 v1.5 signatures.
    pub fn rsa_public(key: rsa::RsaPublicKey, hash: HashAlgorithm) -> Self {
        Self {
            data: KeyData::RsaPublic(key),
            algorithm: KeyAlgorithm::RsaPkcs1 { hash },
        }
    }

    pub fn ec_private(key: EcSecretKey) -> Self {
        let curve = key.curve();
        Self {
            data: KeyData::EcPrivate(key),
            algorithm: KeyAlgorithm::Ecdsa { curve },
        }
    }

    pub fn ec_public(key: EcPublicKey) -> Self {
        let curve = key.curve();
        Self {
            data: KeyData::EcPublic(key),
            algorithm: KeyAlgorithm::Ecdsa { curve },
        }
    }

    /// HMAC secret; the key length is recorded in bits.
    pub fn hmac(secret: impl Into<Vec<u8>>, hash: HashAlgorithm) -> Self {
        let secret = secret.into();
        let length = Some(secret.len() * 8);
        Self {
            data: KeyData::Hmac(secret),
            algorithm: KeyAlgorithm::Hmac { hash, length },
        }
    }

    pub fn data(&self) -> &KeyData {
        &self.data
    }

    pub fn algorithm(&self) -> &KeyAlgorithm {
        &self.algorithm
    }

    /// The same material bound to another algorithm.
    pub fn rebind(&self, algorithm: KeyAlgorithm) -> Result<Self> {
        Self::new(self.data.clone(), algorithm)
    }

    pub fn is_private(&self) -> bool {
        matches!(
            self.data,
            KeyData::RsaPrivate(_) | KeyData::EcPrivate(_) | KeyData::Hmac(_)
        )
    }

    pub fn is_symmetric(&self) -> bool {
        matches!(self.data, KeyData::Hmac(_))
    }

    /// The public half of an asymmetric key.
    pub fn public_key(&self) -> Result<Self> {
        let data = match &self.data {
            KeyData::RsaPrivate(k) => KeyData::RsaPublic(k.to_public_key()),
            KeyData::RsaPublic(k) => KeyData::RsaPublic(k.clone()),
            KeyData::EcPrivate(k) => KeyData::EcPublic(k.public_key()),
            KeyData::EcPublic(k) => KeyData::EcPublic(k.clone()),
            KeyData::Hmac(_) => {
                return Err(Error::Key("HMAC keys have no public part".into()));
            }
        };
        Ok(Self {
            data,
            algorithm: self.algorithm,
        })
    }
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.data {
            KeyData::RsaPrivate(_) => "RsaPrivate",
            KeyData::RsaPublic(_) => "RsaPublic",
            KeyData::EcPrivate(_) => "EcPrivate",
            KeyData::EcPublic(_) => "EcPublic",
            KeyData::Hmac(_) => "Hmac",
        };
        f.debug_struct("CryptoKey")
            .field("data", &kind)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_binding_mismatch_rejected() {
        let secret = p256::SecretKey::random(&mut OsRng);
        let data = KeyData::EcPrivate(EcSecretKey::P256(secret));
        assert!(CryptoKey::new(data.clone(), KeyAlgorithm::Ecdsa { curve: NamedCurve::P256 }).is_ok());
        assert!(CryptoKey::new(data.clone(), KeyAlgorithm::Ecdsa { curve: NamedCurve::P384 }).is_err());
        assert!(CryptoKey::new(data, KeyAlgorithm::RsaPkcs1 { hash: HashAlgorithm::Sha256 }).is_err());
    }

    #[test]
    fn test_ec_coordinates() {
        let secret = p384::SecretKey::random(&mut OsRng);
        let public = EcSecretKey::P384(secret).public_key();
        let (x, y) = public.coordinates();
        assert_eq!(x.len(), 48);
        assert_eq!(y.len(), 48);
        let rebuilt = EcPublicKey::from_coordinates(NamedCurve::P384, &x, &y).unwrap();
        assert_eq!(rebuilt, public);
    }

    #[test]
    fn test_hmac_key_has_no_public_part() {
        let key = CryptoKey::hmac(vec![7u8; 32], HashAlgorithm::Sha256);
        assert!(key.is_symmetric());
        assert_eq!(
            *key.algorithm(),
            KeyAlgorithm::Hmac { hash: HashAlgorithm::Sha256, length: Some(256) }
        );
        assert!(key.public_key().is_err());
    }

    #[test]
    fn test_curve_uris() {
        for curve in [NamedCurve::P256, NamedCurve::P384, NamedCurve::P521] {
            assert_eq!(NamedCurve::from_uri(curve.uri()).unwrap(), curve);
        }
    }
}
