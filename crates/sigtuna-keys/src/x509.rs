#![forbid(unsafe_code)]

//! X.509 certificates as carried by `<X509Data>`.
//!
//! A certificate keeps its raw DER next to the decoded structure, so that
//! it can be re-embedded byte for byte.

use der::{Decode, Encode};
use sigtuna_core::{Error, Result};
use sigtuna_crypto::{CryptoKey, CryptoProvider, HashAlgorithm, KeyAlgorithm, KeyFormat};
use std::fmt;
use x509_cert::name::Name;
use x509_cert::Certificate;

/// Short names used when rendering distinguished names.
const SHORT_NAMES: &[(&str, &str)] = &[
    ("2.5.4.3", "CN"),
    ("2.5.4.6", "C"),
    ("0.9.2342.19200300.100.1.25", "DC"),
    ("1.2.840.113549.1.9.1", "E"),
    ("2.5.4.42", "G"),
    ("2.5.4.43", "I"),
    ("2.5.4.7", "L"),
    ("2.5.4.10", "O"),
    ("2.5.4.11", "OU"),
    ("2.5.4.8", "ST"),
    ("2.5.4.9", "Street"),
    ("2.5.4.4", "SN"),
    ("2.5.4.12", "T"),
];

/// An X.509 certificate.
#[derive(Clone)]
pub struct X509Certificate {
    raw: Vec<u8>,
    cert: Certificate,
}

impl X509Certificate {
    pub fn from_der(data: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(data)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        Ok(Self {
            raw: data.to_vec(),
            cert,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let (label, der) = der::pem::decode_vec(pem.as_bytes())
            .map_err(|e| Error::Certificate(format!("invalid PEM: {e}")))?;
        if label != "CERTIFICATE" {
            return Err(Error::Certificate(format!(
                "expected a CERTIFICATE PEM block, found '{label}'"
            )));
        }
        Self::from_der(&der)
    }

    /// Decode the base64 text of an `<X509Certificate>` element.
    pub fn from_base64(text: &str) -> Result<Self> {
        let der = crate::decode_base64(text)?;
        Self::from_der(&der)
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.raw)
    }

    /// Serial number in decimal.
    pub fn serial_number(&self) -> String {
        let bytes = self.cert.tbs_certificate.serial_number.as_bytes();
        rsa::BigUint::from_bytes_be(bytes).to_string()
    }

    /// Issuer distinguished name, e.g. `C=SE, O=Example, CN=Example CA`.
    pub fn issuer(&self) -> String {
        name_to_string(&self.cert.tbs_certificate.issuer)
    }

    pub fn subject(&self) -> String {
        name_to_string(&self.cert.tbs_certificate.subject)
    }

    /// SHA-1 digest of the DER encoding.
    pub fn thumbprint(&self) -> Vec<u8> {
        self.thumbprint_with(HashAlgorithm::Sha1)
    }

    pub fn thumbprint_with(&self, hash: HashAlgorithm) -> Vec<u8> {
        hash.digest(&self.raw)
    }

    /// DER SubjectPublicKeyInfo of the certified key.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        self.cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))
    }

    /// Import the certified public key.
    ///
    /// Without a binding, RSA keys are bound to RSASSA-PKCS1-v1_5 with
    /// SHA-256. A binding for another key family is ignored, and ECDSA
    /// always takes the certificate's curve.
    pub fn export_key(
        &self,
        provider: &dyn CryptoProvider,
        binding: Option<KeyAlgorithm>,
    ) -> Result<CryptoKey> {
        let der = self.public_key_der()?;
        let detected = crate::loader::spki_key_algorithm(&der, HashAlgorithm::Sha256)?;
        let algorithm = crate::loader::apply_binding(detected, binding);
        provider.import_key(KeyFormat::Spki, &der, algorithm)
    }
}

impl PartialEq for X509Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for X509Certificate {}

impl fmt::Debug for X509Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X509Certificate")
            .field("subject", &self.subject())
            .field("serial_number", &self.serial_number())
            .finish()
    }
}

fn name_to_string(name: &Name) -> String {
    let mut parts = Vec::new();
    for rdn in name.0.iter() {
        for atv in rdn.0.iter() {
            let oid = atv.oid.to_string();
            let label = SHORT_NAMES
                .iter()
                .find(|(dotted, _)| *dotted == oid)
                .map(|(_, short)| (*short).to_owned())
                .unwrap_or(oid);
            let value = match std::str::from_utf8(atv.value.value()) {
                Ok(s) => s.to_owned(),
                Err(_) => {
                    let hex: String = atv.value.value().iter().map(|b| format!("{b:02x}")).collect();
                    format!("#{hex}")
                }
            };
            parts.push(format!("{label}={value}"));
        }
    }
    parts.join(", ")
}

/// How many certificates of a chain go into `X509Data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum X509IncludeOption {
    #[default]
    None,
    EndCertOnly,
    ExcludeRoot,
    WholeChain,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_crypto::{NamedCurve, RustCryptoProvider};

    const EC_CERT: &str = include_str!("../testdata/ec-p256-cert.pem");
    const RSA_CERT: &str = include_str!("../testdata/rsa-cert.pem");

    #[test]
    fn test_names_and_serial() {
        let cert = X509Certificate::from_pem(EC_CERT).unwrap();
        assert_eq!(cert.serial_number(), "1234567890123456789");
        assert_eq!(cert.subject(), "C=SE, O=Sigtuna Test, OU=Signing, CN=sigtuna.test");
        assert_eq!(cert.issuer(), cert.subject());

        let rsa = X509Certificate::from_pem(RSA_CERT).unwrap();
        assert_eq!(rsa.serial_number(), "4242");
        assert_eq!(
            rsa.subject(),
            "C=SE, ST=Uppland, L=Sigtuna, O=Sigtuna Test, CN=rsa.sigtuna.test"
        );
    }

    #[test]
    fn test_thumbprint() {
        let cert = X509Certificate::from_pem(EC_CERT).unwrap();
        let hex: String = cert.thumbprint().iter().map(|b| format!("{b:02X}")).collect();
        assert_eq!(hex, "F8A6C07E04A130DD9DF6CE9E0DC8DF0E3152789F");
        assert_eq!(cert.thumbprint_with(HashAlgorithm::Sha256).len(), 32);
    }

    #[test]
    fn test_export_key_bindings() {
        let provider = RustCryptoProvider;
        let ec = X509Certificate::from_pem(EC_CERT).unwrap();
        let key = ec.export_key(&provider, None).unwrap();
        assert_eq!(*key.algorithm(), KeyAlgorithm::Ecdsa { curve: NamedCurve::P256 });
        let key = ec
            .export_key(&provider, Some(KeyAlgorithm::Ecdsa { curve: NamedCurve::P521 }))
            .unwrap();
        assert_eq!(*key.algorithm(), KeyAlgorithm::Ecdsa { curve: NamedCurve::P256 });

        let rsa = X509Certificate::from_pem(RSA_CERT).unwrap();
        let key = rsa.export_key(&provider, None).unwrap();
        assert_eq!(*key.algorithm(), KeyAlgorithm::RsaPkcs1 { hash: HashAlgorithm::Sha256 });
        let pss = KeyAlgorithm::RsaPss { hash: HashAlgorithm::Sha384 };
        assert_eq!(*rsa.export_key(&provider, Some(pss)).unwrap().algorithm(), pss);
    }

    #[test]
    fn test_base64_and_label_checks() {
        let cert = X509Certificate::from_pem(EC_CERT).unwrap();
        let again = X509Certificate::from_base64(&cert.to_base64()).unwrap();
        assert_eq!(cert, again);
        let key_pem = include_str!("../testdata/ec-p256-key.pem");
        assert!(matches!(X509Certificate::from_pem(key_pem), Err(Error::Certificate(_))));
        assert!(X509Certificate::from_der(b"not a certificate").is_err());
    }
}
