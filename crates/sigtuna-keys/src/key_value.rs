#![forbid(unsafe_code)]

//! `<KeyValue>` with its RSA and ECDSA payloads.

use crate::{decode_base64, dsig_element, encode_base64, required_child};
use sigtuna_core::{ns, ns::attr, ns::node, Error, Result};
use sigtuna_crypto::{
    CryptoKey, CryptoProvider, EcPublicKey, HashAlgorithm, KeyAlgorithm, KeyFormat, NamedCurve,
};
use sigtuna_xml::Element;

/// `<RSAKeyValue>`: modulus and public exponent, big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyValue {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

impl RsaKeyValue {
    pub fn import_key(provider: &dyn CryptoProvider, key: &CryptoKey) -> Result<Self> {
        use pkcs8::DecodePublicKey;
        use rsa::traits::PublicKeyParts;
        if !matches!(
            key.algorithm(),
            KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. }
        ) {
            return Err(Error::Key(format!(
                "RSAKeyValue cannot hold a {} key",
                key.algorithm().name()
            )));
        }
        let spki = provider.export_key(KeyFormat::Spki, key)?;
        let public = rsa::RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| Error::Key(format!("invalid RSA public key: {e}")))?;
        Ok(Self {
            modulus: public.n().to_bytes_be(),
            exponent: public.e().to_bytes_be(),
        })
    }

    /// Import the key, bound to RSASSA-PKCS1-v1_5 with SHA-256 unless a
    /// binding is given.
    pub fn export_key(
        &self,
        provider: &dyn CryptoProvider,
        binding: Option<KeyAlgorithm>,
    ) -> Result<CryptoKey> {
        use pkcs8::EncodePublicKey;
        let algorithm = binding.unwrap_or(KeyAlgorithm::RsaPkcs1 {
            hash: HashAlgorithm::Sha256,
        });
        if !matches!(
            algorithm,
            KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. }
        ) {
            return Err(Error::UnsupportedAlgorithm(format!(
                "RSAKeyValue cannot be used with {}",
                algorithm.name()
            )));
        }
        if self.modulus.is_empty() {
            return Err(Error::Key("RSAKeyValue has no Modulus".into()));
        }
        if self.exponent.is_empty() {
            return Err(Error::Key("RSAKeyValue has no Exponent".into()));
        }
        let public = rsa::RsaPublicKey::new(
            rsa::BigUint::from_bytes_be(&self.modulus),
            rsa::BigUint::from_bytes_be(&self.exponent),
        )
        .map_err(|e| Error::Key(format!("invalid RSA public key: {e}")))?;
        let spki = public
            .to_public_key_der()
            .map_err(|e| Error::Key(format!("cannot encode RSA public key: {e}")))?;
        provider.import_key(KeyFormat::Spki, spki.as_bytes(), algorithm)
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let text = |name: &str| -> Result<Vec<u8>> {
            decode_base64(&required_child(element, ns::DSIG, name)?.text_content())
        };
        Ok(Self {
            modulus: text(node::RSA_MODULUS)?,
            exponent: text(node::RSA_EXPONENT)?,
        })
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        dsig_element(prefix, node::RSA_KEY_VALUE)
            .with_child(dsig_element(prefix, node::RSA_MODULUS).with_text(encode_base64(&self.modulus)))
            .with_child(dsig_element(prefix, node::RSA_EXPONENT).with_text(encode_base64(&self.exponent)))
    }
}

/// `<ecdsa:ECDSAKeyValue>`: named curve and affine public point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaKeyValue {
    pub curve: NamedCurve,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
}

impl EcdsaKeyValue {
    pub fn import_key(provider: &dyn CryptoProvider, key: &CryptoKey) -> Result<Self> {
        let KeyAlgorithm::Ecdsa { curve } = *key.algorithm() else {
            return Err(Error::Key(format!(
                "ECDSAKeyValue cannot hold a {} key",
                key.algorithm().name()
            )));
        };
        let point = provider.export_key(KeyFormat::Raw, key)?;
        let (x, y) = EcPublicKey::from_sec1_bytes(curve, &point)?.coordinates();
        Ok(Self { curve, x, y })
    }

    pub fn export_key(&self, provider: &dyn CryptoProvider) -> Result<CryptoKey> {
        let point = EcPublicKey::from_coordinates(self.curve, &self.x, &self.y)?.to_sec1_bytes();
        provider.import_key(KeyFormat::Raw, &point, KeyAlgorithm::Ecdsa { curve: self.curve })
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let named_curve = required_child(
            required_child(element, ns::DSIG_MORE, node::DOMAIN_PARAMETERS)?,
            ns::DSIG_MORE,
            node::NAMED_CURVE,
        )?;
        let uri = named_curve
            .attribute(attr::URI)
            .ok_or_else(|| Error::MissingAttribute("URI on NamedCurve".into()))?;
        let public_key = required_child(element, ns::DSIG_MORE, node::PUBLIC_KEY)?;
        let coordinate = |name: &str| -> Result<Vec<u8>> {
            decode_base64(&required_child(public_key, ns::DSIG_MORE, name)?.text_content())
        };
        Ok(Self {
            curve: NamedCurve::from_uri(uri)?,
            x: coordinate(node::X)?,
            y: coordinate(node::Y)?,
        })
    }

    pub fn to_element(&self) -> Element {
        let ec = |local: &str| Element::new_ns(Some(ns::ECDSA_PREFIX), local, Some(ns::DSIG_MORE));
        let mut element = ec(node::ECDSA_KEY_VALUE)
            .with_child(
                ec(node::DOMAIN_PARAMETERS)
                    .with_child(ec(node::NAMED_CURVE).with_attribute(attr::URI, self.curve.uri())),
            )
            .with_child(
                ec(node::PUBLIC_KEY)
                    .with_child(ec(node::X).with_text(encode_base64(&self.x)))
                    .with_child(ec(node::Y).with_text(encode_base64(&self.y))),
            );
        element.set_namespace_declaration(ns::ECDSA_PREFIX, ns::DSIG_MORE);
        element
    }
}

/// `<KeyValue>` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    Rsa(RsaKeyValue),
    Ecdsa(EcdsaKeyValue),
}

impl KeyValue {
    /// Describe the public half of `key`. Symmetric keys are refused.
    pub fn import_key(provider: &dyn CryptoProvider, key: &CryptoKey) -> Result<Self> {
        match key.algorithm() {
            KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. } => {
                Ok(Self::Rsa(RsaKeyValue::import_key(provider, key)?))
            }
            KeyAlgorithm::Ecdsa { .. } => Ok(Self::Ecdsa(EcdsaKeyValue::import_key(provider, key)?)),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "{} keys cannot be placed in a KeyValue",
                other.name()
            ))),
        }
    }

    pub fn export_key(
        &self,
        provider: &dyn CryptoProvider,
        binding: Option<KeyAlgorithm>,
    ) -> Result<CryptoKey> {
        match self {
            Self::Rsa(v) => v.export_key(
                provider,
                binding.filter(|b| {
                    matches!(b, KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. })
                }),
            ),
            Self::Ecdsa(v) => v.export_key(provider),
        }
    }

    /// Parse a `<KeyValue>`; the payload kind comes from the child's name.
    pub fn from_element(element: &Element) -> Result<Self> {
        let payload = element
            .child_elements()
            .next()
            .ok_or_else(|| Error::MissingElement("KeyValue payload".into()))?;
        if payload.is(ns::DSIG, node::RSA_KEY_VALUE) {
            Ok(Self::Rsa(RsaKeyValue::from_element(payload)?))
        } else if payload.is(ns::DSIG_MORE, node::ECDSA_KEY_VALUE) {
            Ok(Self::Ecdsa(EcdsaKeyValue::from_element(payload)?))
        } else {
            Err(Error::UnsupportedAlgorithm(format!(
                "unsupported KeyValue <{}>",
                payload.qualified_name()
            )))
        }
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let payload = match self {
            Self::Rsa(v) => v.to_element(prefix),
            Self::Ecdsa(v) => v.to_element(),
        };
        dsig_element(prefix, node::KEY_VALUE).with_child(payload)
    }
}
