#![forbid(unsafe_code)]

//! Key loading from PEM, DER, PKCS#1, PKCS#8, SPKI and raw secrets.
//!
//! Every loader binds the key to an algorithm. RSA keys take the caller's
//! hash and are bound to RSASSA-PKCS1-v1_5; EC keys are bound to ECDSA on
//! the curve named in the key itself.

use crate::x509::X509Certificate;
use der::Decode;
use sigtuna_core::{Error, Result};
use sigtuna_crypto::{CryptoKey, CryptoProvider, HashAlgorithm, KeyAlgorithm, KeyFormat, NamedCurve};
use spki::ObjectIdentifier;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// Work out the key algorithm from an algorithm identifier.
fn key_algorithm(
    oid: ObjectIdentifier,
    curve: Option<ObjectIdentifier>,
    rsa_hash: HashAlgorithm,
) -> Result<KeyAlgorithm> {
    if oid == RSA_ENCRYPTION {
        return Ok(KeyAlgorithm::RsaPkcs1 { hash: rsa_hash });
    }
    if oid == EC_PUBLIC_KEY {
        let curve = match curve {
            Some(c) if c == SECP256R1 => NamedCurve::P256,
            Some(c) if c == SECP384R1 => NamedCurve::P384,
            Some(c) if c == SECP521R1 => NamedCurve::P521,
            Some(c) => return Err(Error::UnsupportedAlgorithm(format!("EC curve {c}"))),
            None => return Err(Error::Key("EC key without named curve".into())),
        };
        return Ok(KeyAlgorithm::Ecdsa { curve });
    }
    Err(Error::UnsupportedAlgorithm(format!("public key algorithm {oid}")))
}

/// Key algorithm of a DER SubjectPublicKeyInfo.
pub fn spki_key_algorithm(spki_der: &[u8], rsa_hash: HashAlgorithm) -> Result<KeyAlgorithm> {
    let info = spki::SubjectPublicKeyInfoRef::from_der(spki_der)
        .map_err(|e| Error::Key(format!("invalid SubjectPublicKeyInfo: {e}")))?;
    key_algorithm(info.algorithm.oid, info.algorithm.parameters_oid().ok(), rsa_hash)
}

/// The algorithm a key of kind `detected` is imported for. Only an RSA
/// binding on an RSA key overrides the detected algorithm.
pub(crate) fn apply_binding(detected: KeyAlgorithm, binding: Option<KeyAlgorithm>) -> KeyAlgorithm {
    match (detected, binding) {
        (
            KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. },
            Some(b @ (KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. })),
        ) => b,
        (detected, _) => detected,
    }
}

/// Load a public key from DER SubjectPublicKeyInfo.
pub fn load_public_key_der(
    provider: &dyn CryptoProvider,
    der: &[u8],
    hash: HashAlgorithm,
) -> Result<CryptoKey> {
    let algorithm = spki_key_algorithm(der, hash)?;
    provider.import_key(KeyFormat::Spki, der, algorithm)
}

/// Load a private key from DER: PKCS#8 first, then PKCS#1 RSA.
pub fn load_private_key_der(
    provider: &dyn CryptoProvider,
    der: &[u8],
    hash: HashAlgorithm,
) -> Result<CryptoKey> {
    if let Ok(info) = pkcs8::PrivateKeyInfo::from_der(der) {
        let algorithm = key_algorithm(info.algorithm.oid, info.algorithm.parameters_oid().ok(), hash)?;
        return provider.import_key(KeyFormat::Pkcs8, der, algorithm);
    }
    use pkcs1::DecodeRsaPrivateKey;
    let key = rsa::RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|e| Error::Key(format!("unrecognized private key encoding: {e}")))?;
    Ok(CryptoKey::rsa_private(key, hash))
}

/// Load an HMAC secret.
pub fn load_hmac_key(
    provider: &dyn CryptoProvider,
    secret: &[u8],
    hash: HashAlgorithm,
) -> Result<CryptoKey> {
    provider.import_key(
        KeyFormat::Raw,
        secret,
        KeyAlgorithm::Hmac {
            hash,
            length: Some(secret.len() * 8),
        },
    )
}

/// Load a certificate from PEM or DER.
pub fn load_certificate(data: &[u8]) -> Result<X509Certificate> {
    if is_pem(data) {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::Certificate(format!("invalid PEM encoding: {e}")))?;
        X509Certificate::from_pem(text)
    } else {
        X509Certificate::from_der(data)
    }
}

/// Load any supported key from PEM or DER, picking the format from the
/// PEM label or by trying private key, public key and certificate DER.
pub fn load_key(provider: &dyn CryptoProvider, data: &[u8], hash: HashAlgorithm) -> Result<CryptoKey> {
    if is_pem(data) {
        let (label, der) = der::pem::decode_vec(data)
            .map_err(|e| Error::Key(format!("invalid PEM: {e}")))?;
        log::debug!("loading PEM block '{label}' ({} bytes)", der.len());
        return match label {
            "PRIVATE KEY" | "RSA PRIVATE KEY" => load_private_key_der(provider, &der, hash),
            "PUBLIC KEY" => load_public_key_der(provider, &der, hash),
            "RSA PUBLIC KEY" => {
                use pkcs1::DecodeRsaPublicKey;
                let key = rsa::RsaPublicKey::from_pkcs1_der(&der)
                    .map_err(|e| Error::Key(format!("failed to parse RSA public key: {e}")))?;
                Ok(CryptoKey::rsa_public(key, hash))
            }
            "CERTIFICATE" => certificate_key(provider, &X509Certificate::from_der(&der)?, hash),
            other => Err(Error::Key(format!("unsupported PEM block '{other}'"))),
        };
    }

    if let Ok(key) = load_private_key_der(provider, data, hash) {
        return Ok(key);
    }
    if let Ok(key) = load_public_key_der(provider, data, hash) {
        return Ok(key);
    }
    if let Ok(cert) = X509Certificate::from_der(data) {
        return certificate_key(provider, &cert, hash);
    }
    Err(Error::Key("unable to detect key format".into()))
}

/// Read a key file; see [`load_key`].
pub fn load_key_file(
    provider: &dyn CryptoProvider,
    path: &std::path::Path,
    hash: HashAlgorithm,
) -> Result<CryptoKey> {
    let data = std::fs::read(path)?;
    load_key(provider, &data, hash).map_err(|e| match e {
        Error::Key(msg) => Error::Key(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// The certified key, with RSA keys bound to the caller's hash.
fn certificate_key(
    provider: &dyn CryptoProvider,
    cert: &X509Certificate,
    hash: HashAlgorithm,
) -> Result<CryptoKey> {
    let key = cert.export_key(provider, None)?;
    match key.algorithm() {
        KeyAlgorithm::RsaPkcs1 { .. } => key.rebind(KeyAlgorithm::RsaPkcs1 { hash }),
        _ => Ok(key),
    }
}

fn is_pem(data: &[u8]) -> bool {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    data[start..].starts_with(b"-----BEGIN ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_crypto::{KeyData, RustCryptoProvider};

    const RSA_KEY: &str = include_str!("../testdata/rsa-key.pem");
    const RSA_KEY_PKCS1: &str = include_str!("../testdata/rsa-key-pkcs1.pem");
    const RSA_PUB: &str = include_str!("../testdata/rsa-pub.pem");
    const RSA_CERT: &str = include_str!("../testdata/rsa-cert.pem");
    const EC_KEY: &str = include_str!("../testdata/ec-p256-key.pem");
    const EC_CERT: &str = include_str!("../testdata/ec-p256-cert.pem");

    #[test]
    fn test_load_rsa_private_pkcs8_and_pkcs1() {
        let provider = RustCryptoProvider;
        let a = load_key(&provider, RSA_KEY.as_bytes(), HashAlgorithm::Sha384).unwrap();
        let b = load_key(&provider, RSA_KEY_PKCS1.as_bytes(), HashAlgorithm::Sha384).unwrap();
        assert!(a.is_private());
        assert_eq!(*a.algorithm(), KeyAlgorithm::RsaPkcs1 { hash: HashAlgorithm::Sha384 });
        match (a.data(), b.data()) {
            (KeyData::RsaPrivate(x), KeyData::RsaPrivate(y)) => {
                assert_eq!(x.to_public_key(), y.to_public_key())
            }
            _ => panic!("expected RSA private keys"),
        }
    }

    #[test]
    fn test_public_key_matches_certificate() {
        let provider = RustCryptoProvider;
        let public = load_key(&provider, RSA_PUB.as_bytes(), HashAlgorithm::Sha256).unwrap();
        let from_cert = load_key(&provider, RSA_CERT.as_bytes(), HashAlgorithm::Sha256).unwrap();
        assert!(!public.is_private());
        match (public.data(), from_cert.data()) {
            (KeyData::RsaPublic(x), KeyData::RsaPublic(y)) => assert_eq!(x, y),
            _ => panic!("expected RSA public keys"),
        }
    }

    #[test]
    fn test_load_ec_key_and_certificate() {
        let provider = RustCryptoProvider;
        let key = load_key(&provider, EC_KEY.as_bytes(), HashAlgorithm::Sha256).unwrap();
        assert_eq!(*key.algorithm(), KeyAlgorithm::Ecdsa { curve: NamedCurve::P256 });
        let cert = load_certificate(EC_CERT.as_bytes()).unwrap();
        let from_cert = cert.export_key(&provider, None).unwrap();
        match (key.public_key().unwrap().data(), from_cert.data()) {
            (KeyData::EcPublic(x), KeyData::EcPublic(y)) => assert_eq!(x, y),
            _ => panic!("expected EC public keys"),
        }
    }

    #[test]
    fn test_der_autodetect() {
        let provider = RustCryptoProvider;
        let (_, der) = der::pem::decode_vec(EC_CERT.as_bytes()).unwrap();
        let key = load_key(&provider, &der, HashAlgorithm::Sha256).unwrap();
        assert_eq!(*key.algorithm(), KeyAlgorithm::Ecdsa { curve: NamedCurve::P256 });
        assert!(matches!(
            load_key(&provider, b"garbage", HashAlgorithm::Sha256),
            Err(Error::Key(_))
        ));
    }

    #[test]
    fn test_hmac_key_length() {
        let key = load_hmac_key(&RustCryptoProvider, b"0123456789abcdef", HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            *key.algorithm(),
            KeyAlgorithm::Hmac { hash: HashAlgorithm::Sha256, length: Some(128) }
        );
    }
}
