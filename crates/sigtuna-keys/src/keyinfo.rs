#![forbid(unsafe_code)]

//! `<KeyInfo>`: an ordered list of key clauses.
//!
//! Reading keeps the document order of the clauses. Children this library
//! does not understand are skipped; a known clause that is malformed is an
//! error.

use crate::key_value::KeyValue;
use crate::x509_data::X509Data;
use crate::{decode_base64, dsig_element, encode_base64, required_child};
use sigtuna_core::{ns, ns::attr, ns::node, Error, Result};
use sigtuna_crypto::{CryptoKey, CryptoProvider, HashAlgorithm, KeyAlgorithm, KeyFormat};
use sigtuna_xml::Element;

/// `<SPKIData>` holding a DER SubjectPublicKeyInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpkiData {
    pub spki: Vec<u8>,
}

impl SpkiData {
    pub fn import_key(provider: &dyn CryptoProvider, key: &CryptoKey) -> Result<Self> {
        Ok(Self {
            spki: provider.export_key(KeyFormat::Spki, key)?,
        })
    }

    /// Import the key. The algorithm is read from the SubjectPublicKeyInfo,
    /// with RSA bound to PKCS#1 v1.5 and SHA-256 unless an RSA binding is
    /// given.
    pub fn export_key(
        &self,
        provider: &dyn CryptoProvider,
        binding: Option<KeyAlgorithm>,
    ) -> Result<CryptoKey> {
        let detected = crate::loader::spki_key_algorithm(&self.spki, HashAlgorithm::Sha256)?;
        let algorithm = crate::loader::apply_binding(detected, binding);
        provider.import_key(KeyFormat::Spki, &self.spki, algorithm)
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        Ok(Self {
            spki: decode_base64(&required_child(element, ns::DSIG, node::SPKI_EXP)?.text_content())?,
        })
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        dsig_element(prefix, node::SPKI_DATA)
            .with_child(dsig_element(prefix, node::SPKI_EXP).with_text(encode_base64(&self.spki)))
    }
}

/// One child of `<KeyInfo>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInfoClause {
    KeyName(String),
    KeyValue(KeyValue),
    X509Data(X509Data),
    SpkiData(SpkiData),
}

impl KeyInfoClause {
    fn to_element(&self, prefix: Option<&str>) -> Element {
        match self {
            Self::KeyName(name) => dsig_element(prefix, node::KEY_NAME).with_text(name),
            Self::KeyValue(v) => v.to_element(prefix),
            Self::X509Data(v) => v.to_element(prefix),
            Self::SpkiData(v) => v.to_element(prefix),
        }
    }

    /// Public keys this clause yields. `KeyName` yields none; `X509Data`
    /// yields one key per certificate.
    fn export_keys(
        &self,
        provider: &dyn CryptoProvider,
        binding: Option<KeyAlgorithm>,
    ) -> Result<Vec<CryptoKey>> {
        match self {
            Self::KeyName(_) => Ok(Vec::new()),
            Self::KeyValue(v) => Ok(vec![v.export_key(provider, binding)?]),
            Self::X509Data(v) => v
                .certificates()
                .iter()
                .map(|cert| cert.export_key(provider, binding))
                .collect(),
            Self::SpkiData(v) => Ok(vec![v.export_key(provider, binding)?]),
        }
    }
}

/// `<KeyInfo>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInfo {
    pub id: Option<String>,
    clauses: Vec<KeyInfoClause>,
}

impl KeyInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: KeyInfoClause) {
        self.clauses.push(clause);
    }

    /// Keep only the first `len` clauses.
    pub fn truncate(&mut self, len: usize) {
        self.clauses.truncate(len);
    }

    pub fn clauses(&self) -> &[KeyInfoClause] {
        &self.clauses
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyInfoClause> {
        self.clauses.iter()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        if !element.is(ns::DSIG, node::KEY_INFO) {
            return Err(Error::MalformedInput(format!(
                "expected KeyInfo, found <{}>",
                element.qualified_name()
            )));
        }
        let mut key_info = Self {
            id: element.attribute(attr::ID).map(str::to_owned),
            clauses: Vec::new(),
        };
        for child in element.child_elements() {
            let clause = match (child.namespace_str(), child.local_name.as_str()) {
                (ns::DSIG, node::KEY_NAME) => {
                    KeyInfoClause::KeyName(child.text_content().trim().to_owned())
                }
                (ns::DSIG, node::KEY_VALUE) => KeyInfoClause::KeyValue(KeyValue::from_element(child)?),
                (ns::DSIG, node::X509_DATA) => KeyInfoClause::X509Data(X509Data::from_element(child)?),
                (ns::DSIG, node::SPKI_DATA) => KeyInfoClause::SpkiData(SpkiData::from_element(child)?),
                _ => {
                    log::debug!("skipping unsupported KeyInfo child <{}>", child.qualified_name());
                    continue;
                }
            };
            key_info.clauses.push(clause);
        }
        Ok(key_info)
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut element = dsig_element(prefix, node::KEY_INFO);
        if let Some(id) = &self.id {
            element.set_attribute(attr::ID, id.as_str());
        }
        for clause in &self.clauses {
            element.append_element(clause.to_element(prefix));
        }
        element
    }

    /// Every public key the clauses yield, in clause order. `binding`
    /// selects the algorithm RSA keys are imported for.
    pub fn public_keys(
        &self,
        provider: &dyn CryptoProvider,
        binding: Option<KeyAlgorithm>,
    ) -> Result<Vec<CryptoKey>> {
        let mut keys = Vec::new();
        for clause in &self.clauses {
            keys.extend(clause.export_keys(provider, binding)?);
        }
        log::debug!("KeyInfo yielded {} public key(s)", keys.len());
        Ok(keys)
    }
}

impl<'a> IntoIterator for &'a KeyInfo {
    type Item = &'a KeyInfoClause;
    type IntoIter = std::slice::Iter<'a, KeyInfoClause>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.iter()
    }
}
