#![forbid(unsafe_code)]

//! The crypto provider capability and its RustCrypto implementation.
//!
//! Signature values use the XML-DSig encodings: raw RSA signature bytes,
//! ECDSA as `r || s` with each half padded to the field size, and HMAC as
//! the (possibly truncated) MAC.

use crate::digest::HashAlgorithm;
use crate::key::{CryptoKey, EcPublicKey, EcSecretKey, KeyAlgorithm, KeyData, NamedCurve};
use crate::registry::SignatureAlgorithm;
use sigtuna_core::{Error, Result};
use signature::SignatureEncoding;

/// Key serialization formats accepted by import and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// DER SubjectPublicKeyInfo.
    Spki,
    /// DER PKCS#8 PrivateKeyInfo.
    Pkcs8,
    /// HMAC secret bytes or an EC SEC1 point.
    Raw,
}

/// Digest, signature and key-import operations over opaque key handles.
///
/// One provider is created by the caller and shared by reference; it must
/// be safe to use from several threads at once.
pub trait CryptoProvider: Send + Sync {
    fn digest(&self, hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>>;

    fn sign(&self, algorithm: &SignatureAlgorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>>;

    /// `Ok(false)` for a well-formed but wrong signature.
    fn verify(
        &self,
        algorithm: &SignatureAlgorithm,
        key: &CryptoKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool>;

    fn import_key(&self, format: KeyFormat, data: &[u8], algorithm: KeyAlgorithm) -> Result<CryptoKey>;

    fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> Result<Vec<u8>>;
}

/// [`CryptoProvider`] backed by the RustCrypto crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn digest(&self, hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
        Ok(hash.digest(data))
    }

    fn sign(&self, algorithm: &SignatureAlgorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        check_binding(algorithm, key)?;
        match (*algorithm, key.data()) {
            (SignatureAlgorithm::RsaPkcs1(hash), KeyData::RsaPrivate(k)) => rsa_pkcs1_sign(hash, k, data),
            (SignatureAlgorithm::RsaPss { hash, salt_length, .. }, KeyData::RsaPrivate(k)) => {
                rsa_pss_sign(hash, salt_length, k, data)
            }
            (SignatureAlgorithm::Ecdsa(hash), KeyData::EcPrivate(k)) => ecdsa_sign(hash, k, data),
            (SignatureAlgorithm::Hmac(hash), KeyData::Hmac(secret)) => compute_hmac(hash, secret, data),
            _ => Err(Error::Key(format!(
                "{} private key required for {}",
                key.algorithm().name(),
                algorithm.uri()
            ))),
        }
    }

    fn verify(
        &self,
        algorithm: &SignatureAlgorithm,
        key: &CryptoKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        check_binding(algorithm, key)?;
        match *algorithm {
            SignatureAlgorithm::RsaPkcs1(hash) => rsa_pkcs1_verify(hash, &rsa_public(key)?, data, signature),
            SignatureAlgorithm::RsaPss { hash, salt_length, .. } => {
                rsa_pss_verify(hash, salt_length, &rsa_public(key)?, data, signature)
            }
            SignatureAlgorithm::Ecdsa(hash) => {
                let public = match key.data() {
                    KeyData::EcPrivate(k) => k.public_key(),
                    KeyData::EcPublic(k) => k.clone(),
                    _ => return Err(Error::Key("EC key required".into())),
                };
                ecdsa_verify(hash, &public, data, signature)
            }
            SignatureAlgorithm::Hmac(hash) => {
                let KeyData::Hmac(secret) = key.data() else {
                    return Err(Error::Key("HMAC key required".into()));
                };
                let expected = compute_hmac(hash, secret, data)?;
                Ok(constant_time_eq(&expected, signature))
            }
        }
    }

    fn import_key(&self, format: KeyFormat, data: &[u8], algorithm: KeyAlgorithm) -> Result<CryptoKey> {
        use pkcs8::{DecodePrivateKey, DecodePublicKey};
        let err = |what: &str, e: &dyn std::fmt::Display| Error::Key(format!("cannot import {what}: {e}"));
        let key_data = match (format, algorithm) {
            (KeyFormat::Spki, KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. }) => KeyData::RsaPublic(
                rsa::RsaPublicKey::from_public_key_der(data).map_err(|e| err("RSA public key", &e))?,
            ),
            (KeyFormat::Pkcs8, KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. }) => KeyData::RsaPrivate(
                rsa::RsaPrivateKey::from_pkcs8_der(data).map_err(|e| err("RSA private key", &e))?,
            ),
            (KeyFormat::Spki, KeyAlgorithm::Ecdsa { curve }) => KeyData::EcPublic(match curve {
                NamedCurve::P256 => EcPublicKey::P256(
                    p256::PublicKey::from_public_key_der(data).map_err(|e| err("P-256 public key", &e))?,
                ),
                NamedCurve::P384 => EcPublicKey::P384(
                    p384::PublicKey::from_public_key_der(data).map_err(|e| err("P-384 public key", &e))?,
                ),
                NamedCurve::P521 => EcPublicKey::P521(
                    p521::PublicKey::from_public_key_der(data).map_err(|e| err("P-521 public key", &e))?,
                ),
            }),
            (KeyFormat::Pkcs8, KeyAlgorithm::Ecdsa { curve }) => KeyData::EcPrivate(match curve {
                NamedCurve::P256 => EcSecretKey::P256(
                    p256::SecretKey::from_pkcs8_der(data).map_err(|e| err("P-256 private key", &e))?,
                ),
                NamedCurve::P384 => EcSecretKey::P384(
                    p384::SecretKey::from_pkcs8_der(data).map_err(|e| err("P-384 private key", &e))?,
                ),
                NamedCurve::P521 => EcSecretKey::P521(
                    p521::SecretKey::from_pkcs8_der(data).map_err(|e| err("P-521 private key", &e))?,
                ),
            }),
            (KeyFormat::Raw, KeyAlgorithm::Ecdsa { curve }) => {
                KeyData::EcPublic(EcPublicKey::from_sec1_bytes(curve, data)?)
            }
            (KeyFormat::Raw, KeyAlgorithm::Hmac { .. }) => {
                if data.is_empty() {
                    return Err(Error::Key("empty HMAC key".into()));
                }
                KeyData::Hmac(data.to_vec())
            }
            (format, algorithm) => {
                return Err(Error::Key(format!(
                    "{format:?} import is not supported for {}",
                    algorithm.name()
                )))
            }
        };
        CryptoKey::new(key_data, algorithm)
    }

    fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> Result<Vec<u8>> {
        use pkcs8::{EncodePrivateKey, EncodePublicKey};
        let err = |e: &dyn std::fmt::Display| Error::Key(format!("cannot export key: {e}"));
        match (format, key.data()) {
            (KeyFormat::Spki, KeyData::RsaPrivate(k)) => Ok(k
                .to_public_key()
                .to_public_key_der()
                .map_err(|e| err(&e))?
                .as_bytes()
                .to_vec()),
            (KeyFormat::Spki, KeyData::RsaPublic(k)) => {
                Ok(k.to_public_key_der().map_err(|e| err(&e))?.as_bytes().to_vec())
            }
            (KeyFormat::Spki, KeyData::EcPrivate(k)) => ec_public_der(&k.public_key()),
            (KeyFormat::Spki, KeyData::EcPublic(k)) => ec_public_der(k),
            (KeyFormat::Pkcs8, KeyData::RsaPrivate(k)) => {
                Ok(k.to_pkcs8_der().map_err(|e| err(&e))?.as_bytes().to_vec())
            }
            (KeyFormat::Pkcs8, KeyData::EcPrivate(k)) => {
                let doc = match k {
                    EcSecretKey::P256(s) => s.to_pkcs8_der(),
                    EcSecretKey::P384(s) => s.to_pkcs8_der(),
                    EcSecretKey::P521(s) => s.to_pkcs8_der(),
                }
                .map_err(|e| err(&e))?;
                Ok(doc.as_bytes().to_vec())
            }
            (KeyFormat::Raw, KeyData::Hmac(secret)) => Ok(secret.clone()),
            (KeyFormat::Raw, KeyData::EcPublic(k)) => Ok(k.to_sec1_bytes()),
            (KeyFormat::Raw, KeyData::EcPrivate(k)) => Ok(k.public_key().to_sec1_bytes()),
            (format, _) => Err(Error::Key(format!(
                "{format:?} export is not supported for {} keys",
                key.algorithm().name()
            ))),
        }
    }
}

fn ec_public_der(key: &EcPublicKey) -> Result<Vec<u8>> {
    use pkcs8::EncodePublicKey;
    let doc = match key {
        EcPublicKey::P256(k) => k.to_public_key_der(),
        EcPublicKey::P384(k) => k.to_public_key_der(),
        EcPublicKey::P521(k) => k.to_public_key_der(),
    }
    .map_err(|e| Error::Key(format!("cannot export EC key: {e}")))?;
    Ok(doc.as_bytes().to_vec())
}

/// Refuse keys bound to a different algorithm family (PKCS#1 vs PSS
/// included).
fn check_binding(algorithm: &SignatureAlgorithm, key: &CryptoKey) -> Result<()> {
    let ok = matches!(
        (algorithm, key.algorithm()),
        (SignatureAlgorithm::RsaPkcs1(_), KeyAlgorithm::RsaPkcs1 { .. })
            | (SignatureAlgorithm::RsaPss { .. }, KeyAlgorithm::RsaPss { .. })
            | (SignatureAlgorithm::Ecdsa(_), KeyAlgorithm::Ecdsa { .. })
            | (SignatureAlgorithm::Hmac(_), KeyAlgorithm::Hmac { .. })
    );
    if ok {
        Ok(())
    } else {
        Err(Error::Key(format!(
            "key bound to {} cannot be used with {}",
            key.algorithm().name(),
            algorithm.uri()
        )))
    }
}

fn rsa_public(key: &CryptoKey) -> Result<rsa::RsaPublicKey> {
    match key.data() {
        KeyData::RsaPrivate(k) => Ok(k.to_public_key()),
        KeyData::RsaPublic(k) => Ok(k.clone()),
        _ => Err(Error::Key("RSA key required".into())),
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

fn rsa_pkcs1_sign(hash: HashAlgorithm, private_key: &rsa::RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
    use signature::Signer;
    macro_rules! do_sign {
        ($hasher:ty) => {{
            let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
            let sig = sk
                .try_sign(data)
                .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))?;
            Ok(sig.to_vec())
        }};
    }
    match hash {
        HashAlgorithm::Sha1 => do_sign!(sha1::Sha1),
        HashAlgorithm::Sha256 => do_sign!(sha2::Sha256),
        HashAlgorithm::Sha384 => do_sign!(sha2::Sha384),
        HashAlgorithm::Sha512 => do_sign!(sha2::Sha512),
    }
}

fn rsa_pkcs1_verify(
    hash: HashAlgorithm,
    public_key: &rsa::RsaPublicKey,
    data: &[u8],
    sig_bytes: &[u8],
) -> Result<bool> {
    use signature::Verifier;
    let Ok(sig) = rsa::pkcs1v15::Signature::try_from(sig_bytes) else {
        return Ok(false);
    };
    macro_rules! do_verify {
        ($hasher:ty) => {{
            let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
            Ok(vk.verify(data, &sig).is_ok())
        }};
    }
    match hash {
        HashAlgorithm::Sha1 => do_verify!(sha1::Sha1),
        HashAlgorithm::Sha256 => do_verify!(sha2::Sha256),
        HashAlgorithm::Sha384 => do_verify!(sha2::Sha384),
        HashAlgorithm::Sha512 => do_verify!(sha2::Sha512),
    }
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

fn rsa_pss_sign(
    hash: HashAlgorithm,
    salt_length: usize,
    private_key: &rsa::RsaPrivateKey,
    data: &[u8],
) -> Result<Vec<u8>> {
    use signature::RandomizedSigner;
    let mut rng = rand::thread_rng();
    macro_rules! do_sign {
        ($hasher:ty) => {{
            let sk = rsa::pss::SigningKey::<$hasher>::new_with_salt_len(private_key.clone(), salt_length);
            let sig = sk
                .try_sign_with_rng(&mut rng, data)
                .map_err(|e| Error::Crypto(format!("RSA-PSS signing failed: {e}")))?;
            Ok(sig.to_vec())
        }};
    }
    match hash {
        HashAlgorithm::Sha1 => do_sign!(sha1::Sha1),
        HashAlgorithm::Sha256 => do_sign!(sha2::Sha256),
        HashAlgorithm::Sha384 => do_sign!(sha2::Sha384),
        HashAlgorithm::Sha512 => do_sign!(sha2::Sha512),
    }
}

fn rsa_pss_verify(
    hash: HashAlgorithm,
    salt_length: usize,
    public_key: &rsa::RsaPublicKey,
    data: &[u8],
    sig_bytes: &[u8],
) -> Result<bool> {
    use signature::Verifier;
    let Ok(sig) = rsa::pss::Signature::try_from(sig_bytes) else {
        return Ok(false);
    };
    macro_rules! do_verify {
        ($hasher:ty) => {{
            let vk = rsa::pss::VerifyingKey::<$hasher>::new_with_salt_len(public_key.clone(), salt_length);
            Ok(vk.verify(data, &sig).is_ok())
        }};
    }
    match hash {
        HashAlgorithm::Sha1 => do_verify!(sha1::Sha1),
        HashAlgorithm::Sha256 => do_verify!(sha2::Sha256),
        HashAlgorithm::Sha384 => do_verify!(sha2::Sha384),
        HashAlgorithm::Sha512 => do_verify!(sha2::Sha512),
    }
}

// ── ECDSA ────────────────────────────────────────────────────────────

/// Hash `data` and left-pad the result to the field size, so that short
/// hashes (SHA-1 on P-521) keep their integer value.
fn ecdsa_prehash(hash: HashAlgorithm, curve: NamedCurve, data: &[u8]) -> Vec<u8> {
    let digest = hash.digest(data);
    let size = curve.field_size();
    if digest.len() >= size {
        return digest;
    }
    let mut padded = vec![0u8; size - digest.len()];
    padded.extend_from_slice(&digest);
    padded
}

fn ecdsa_sign(hash: HashAlgorithm, key: &EcSecretKey, data: &[u8]) -> Result<Vec<u8>> {
    use signature::hazmat::PrehashSigner;
    let prehash = ecdsa_prehash(hash, key.curve(), data);
    let err = |e: signature::Error| Error::Crypto(format!("ECDSA signing failed: {e}"));
    let bytes = match key {
        EcSecretKey::P256(secret) => {
            let sk = p256::ecdsa::SigningKey::from(secret);
            let sig: p256::ecdsa::Signature = sk.sign_prehash(&prehash).map_err(err)?;
            sig.to_bytes().to_vec()
        }
        EcSecretKey::P384(secret) => {
            let sk = p384::ecdsa::SigningKey::from(secret);
            let sig: p384::ecdsa::Signature = sk.sign_prehash(&prehash).map_err(err)?;
            sig.to_bytes().to_vec()
        }
        EcSecretKey::P521(secret) => {
            let sk = p521::ecdsa::SigningKey::from(ecdsa::SigningKey::from(secret.clone()));
            let sig: p521::ecdsa::Signature = sk.sign_prehash(&prehash).map_err(err)?;
            sig.to_bytes().to_vec()
        }
    };
    Ok(bytes)
}

fn ecdsa_verify(hash: HashAlgorithm, key: &EcPublicKey, data: &[u8], rs: &[u8]) -> Result<bool> {
    use signature::hazmat::PrehashVerifier;
    let curve = key.curve();
    if rs.len() != 2 * curve.field_size() {
        log::debug!(
            "{} signature must be {} bytes, got {}",
            curve.name(),
            2 * curve.field_size(),
            rs.len()
        );
        return Ok(false);
    }
    let prehash = ecdsa_prehash(hash, curve, data);
    let valid = match key {
        EcPublicKey::P256(pk) => {
            let Ok(sig) = p256::ecdsa::Signature::from_slice(rs) else {
                return Ok(false);
            };
            p256::ecdsa::VerifyingKey::from(pk).verify_prehash(&prehash, &sig).is_ok()
        }
        EcPublicKey::P384(pk) => {
            let Ok(sig) = p384::ecdsa::Signature::from_slice(rs) else {
                return Ok(false);
            };
            p384::ecdsa::VerifyingKey::from(pk).verify_prehash(&prehash, &sig).is_ok()
        }
        EcPublicKey::P521(pk) => {
            let Ok(sig) = p521::ecdsa::Signature::from_slice(rs) else {
                return Ok(false);
            };
            let vk = p521::ecdsa::VerifyingKey::from(ecdsa::VerifyingKey::from(pk));
            vk.verify_prehash(&prehash, &sig).is_ok()
        }
    };
    Ok(valid)
}

// ── HMAC ─────────────────────────────────────────────────────────────

fn compute_hmac(hash: HashAlgorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use hmac::{Hmac, Mac};
    macro_rules! hmac_compute {
        ($hasher:ty) => {{
            let mut mac = <Hmac<$hasher>>::new_from_slice(key)
                .map_err(|e| Error::Key(format!("invalid HMAC key: {e}")))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }
    match hash {
        HashAlgorithm::Sha1 => hmac_compute!(sha1::Sha1),
        HashAlgorithm::Sha256 => hmac_compute!(sha2::Sha256),
        HashAlgorithm::Sha384 => hmac_compute!(sha2::Sha384),
        HashAlgorithm::Sha512 => hmac_compute!(sha2::Sha512),
    }
}

/// Compare a computed MAC with a supplied one. A shorter supplied value is
/// compared against the leading bytes of the computed MAC.
fn constant_time_eq(computed: &[u8], supplied: &[u8]) -> bool {
    if supplied.is_empty() || supplied.len() > computed.len() {
        return false;
    }
    computed[..supplied.len()]
        .iter()
        .zip(supplied.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use std::sync::OnceLock;

    fn rsa_key() -> &'static rsa::RsaPrivateKey {
        static KEY: OnceLock<rsa::RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
    }

    fn ec_keys() -> Vec<CryptoKey> {
        vec![
            CryptoKey::ec_private(EcSecretKey::P256(p256::SecretKey::random(&mut OsRng))),
            CryptoKey::ec_private(EcSecretKey::P384(p384::SecretKey::random(&mut OsRng))),
            CryptoKey::ec_private(EcSecretKey::P521(p521::SecretKey::random(&mut OsRng))),
        ]
    }

    #[test]
    fn test_rsa_pkcs1_sign_verify() {
        let provider = RustCryptoProvider;
        for hash in HashAlgorithm::ALL {
            let key = CryptoKey::rsa_private(rsa_key().clone(), hash);
            let alg = SignatureAlgorithm::RsaPkcs1(hash);
            let sig = provider.sign(&alg, &key, b"data").unwrap();
            assert_eq!(sig.len(), 256);
            let public = key.public_key().unwrap();
            assert!(provider.verify(&alg, &public, b"data", &sig).unwrap());
            assert!(!provider.verify(&alg, &public, b"datA", &sig).unwrap());
        }
    }

    #[test]
    fn test_rsa_pss_requires_pss_binding() {
        let provider = RustCryptoProvider;
        let hash = HashAlgorithm::Sha256;
        let pkcs1 = CryptoKey::rsa_private(rsa_key().clone(), hash);
        let alg = SignatureAlgorithm::RsaPss {
            hash,
            salt_length: 32,
            with_params: false,
        };
        assert!(matches!(provider.sign(&alg, &pkcs1, b"data"), Err(Error::Key(_))));

        let pss = pkcs1.rebind(KeyAlgorithm::RsaPss { hash }).unwrap();
        let sig = provider.sign(&alg, &pss, b"data").unwrap();
        assert!(provider.verify(&alg, &pss, b"data", &sig).unwrap());

        // The SPKI round trip rebinds a public key to PKCS#1, which then
        // refuses the PSS algorithm.
        let spki = provider.export_key(KeyFormat::Spki, &pss).unwrap();
        let reimported = provider
            .import_key(KeyFormat::Spki, &spki, KeyAlgorithm::RsaPkcs1 { hash })
            .unwrap();
        assert!(provider.verify(&alg, &reimported, b"data", &sig).is_err());
    }

    #[test]
    fn test_ecdsa_every_curve_and_hash() {
        let provider = RustCryptoProvider;
        for key in ec_keys() {
            for hash in HashAlgorithm::ALL {
                let alg = SignatureAlgorithm::Ecdsa(hash);
                let sig = provider.sign(&alg, &key, b"payload").unwrap();
                let public = key.public_key().unwrap();
                assert!(provider.verify(&alg, &public, b"payload", &sig).unwrap());
                let mut bad = sig.clone();
                bad[5] ^= 1;
                assert!(!provider.verify(&alg, &public, b"payload", &bad).unwrap());
            }
        }
    }

    #[test]
    fn test_ec_spki_round_trip() {
        let provider = RustCryptoProvider;
        for key in ec_keys() {
            let spki = provider.export_key(KeyFormat::Spki, &key).unwrap();
            let imported = provider.import_key(KeyFormat::Spki, &spki, *key.algorithm()).unwrap();
            let alg = SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha256);
            let sig = provider.sign(&alg, &key, b"x").unwrap();
            assert!(provider.verify(&alg, &imported, b"x", &sig).unwrap());
        }
    }

    #[test]
    fn test_hmac_truncation() {
        let provider = RustCryptoProvider;
        let key = CryptoKey::hmac(b"secret".to_vec(), HashAlgorithm::Sha256);
        let alg = SignatureAlgorithm::Hmac(HashAlgorithm::Sha256);
        let mac = provider.sign(&alg, &key, b"data").unwrap();
        assert_eq!(mac.len(), 32);
        assert!(provider.verify(&alg, &key, b"data", &mac).unwrap());
        assert!(provider.verify(&alg, &key, b"data", &mac[..16]).unwrap());
        assert!(!provider.verify(&alg, &key, b"data", &[]).unwrap());
        assert!(!provider.verify(&alg, &key, b"other", &mac).unwrap());
    }

    #[test]
    fn test_import_rejects_unsupported_format() {
        let provider = RustCryptoProvider;
        let result = provider.import_key(
            KeyFormat::Raw,
            b"\x01\x02",
            KeyAlgorithm::RsaPkcs1 {
                hash: HashAlgorithm::Sha256,
            },
        );
        assert!(matches!(result, Err(Error::Key(_))));
    }
}
