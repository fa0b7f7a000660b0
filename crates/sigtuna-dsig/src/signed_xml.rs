#![forbid(unsafe_code)]

//! Creating and verifying `<Signature>` elements.
//!
//! Signing order:
//! 1. Resolve the signature algorithm, preferring the key's own hash
//! 2. Apply [`SignOptions`]: Id, `KeyValue`, `X509Data`, references
//! 3. Digest every reference that has no digest yet
//! 4. Fill in `SignatureMethod` (PSS parameters, HMAC output length)
//! 5. Canonicalize `<SignedInfo>` and sign it
//!
//! Verification recomputes every reference digest, then checks the
//! signature value against the explicit key or each key in `<KeyInfo>`.

use crate::options::{SignOptions, VerifyOptions};
use crate::reference::{ContentHandler, ReferenceDigester, ReferenceSource};
use crate::signature::{Reference, RsaPssParams, Signature};
use sigtuna_core::{ns, ns::node, Error, Result};
use sigtuna_crypto::{
    CryptoKey, CryptoProvider, HashAlgorithm, KeyAlgorithm, RustCryptoProvider, SignatureAlgorithm,
    SigningAlgorithm,
};
use sigtuna_keys::{encode_base64, KeyInfoClause, KeyValue, X509Data, X509IncludeOption};
use sigtuna_transforms::{BuiltinXPathEvaluator, XPathEvaluator};
use sigtuna_xml::{
    inject_namespaces, select_namespaces, select_root_namespaces, Document, Element, NamespaceMap,
};
use std::fmt;
use std::sync::Arc;

/// Outcome of [`SignedXml::verify_detailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid,
    Invalid { reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid)
    }
}

/// A signature together with the document it signs.
pub struct SignedXml {
    provider: Arc<dyn CryptoProvider>,
    signature: Signature,
    document: Option<Document>,
    /// The signature was read from inside `document`.
    embedded: bool,
    /// Bindings in scope at the embedded signature's position.
    scope: NamespaceMap,
    /// References and KeyInfo clauses appended by the last sign call.
    added: (usize, usize),
    parent: Option<Element>,
    content_handler: Option<ContentHandler>,
    xpath: Box<dyn XPathEvaluator>,
    verify_options: VerifyOptions,
}

impl Default for SignedXml {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SignedXml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedXml")
            .field("signature", &self.signature)
            .field("has_document", &self.document.is_some())
            .field("embedded", &self.embedded)
            .finish_non_exhaustive()
    }
}

impl SignedXml {
    /// An empty signature using the RustCrypto provider.
    pub fn new() -> Self {
        Self::with_provider(Arc::new(RustCryptoProvider))
    }

    pub fn with_provider(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            provider,
            signature: Signature::new(),
            document: None,
            embedded: false,
            scope: NamespaceMap::new(),
            added: (0, 0),
            parent: None,
            content_handler: None,
            xpath: Box::new(BuiltinXPathEvaluator),
            verify_options: VerifyOptions::default(),
        }
    }

    /// Load the first `<ds:Signature>` of `document` and keep the document
    /// as the content to verify against.
    pub fn from_document(document: Document) -> Result<Self> {
        let mut signed = Self::new();
        let path = document
            .find_path(|e| e.is(ns::DSIG, node::SIGNATURE))
            .ok_or_else(|| Error::MissingElement("Signature".into()))?;
        let element = path
            .last()
            .copied()
            .ok_or_else(|| Error::MissingElement("Signature".into()))?;
        signed.signature = Signature::from_element(element)?;
        signed.scope = select_root_namespaces(&path[..path.len() - 1]);
        signed.embedded = true;
        signed.document = Some(document);
        Ok(signed)
    }

    /// Replace the signature with one read from `element`.
    pub fn load_xml(&mut self, element: &Element) -> Result<()> {
        self.signature = Signature::from_element(element)?;
        self.embedded = false;
        self.scope.clear();
        self.added = (0, 0);
        Ok(())
    }

    /// The `<Signature>` element.
    pub fn get_xml(&self) -> Element {
        self.signature.to_element()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn signature_mut(&mut self) -> &mut Signature {
        &mut self.signature
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn provider(&self) -> &dyn CryptoProvider {
        self.provider.as_ref()
    }

    /// Element whose namespace bindings apply to the signature when it is
    /// placed inside another document.
    pub fn set_parent(&mut self, parent: Option<Element>) {
        self.parent = parent;
    }

    pub fn set_content_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Reference) -> Result<Option<ReferenceSource>> + Send + Sync + 'static,
    {
        self.content_handler = Some(Box::new(handler));
    }

    pub fn set_xpath_evaluator(&mut self, evaluator: Box<dyn XPathEvaluator>) {
        self.xpath = evaluator;
    }

    pub fn verify_options(&self) -> &VerifyOptions {
        &self.verify_options
    }

    pub fn set_verify_options(&mut self, options: VerifyOptions) {
        self.verify_options = options;
    }

    // ── Signing ──────────────────────────────────────────────────────

    /// Sign `data`. References resolve against its document element; the
    /// document is kept for [`to_string`](ToString::to_string).
    ///
    /// Signing again replaces the references and KeyInfo clauses added by
    /// the previous call.
    pub fn sign(
        &mut self,
        algorithm: &SigningAlgorithm,
        key: &CryptoKey,
        data: &Document,
        options: &SignOptions,
    ) -> Result<&Signature> {
        let root = data
            .root()
            .ok_or_else(|| Error::MalformedInput("document has no root element".into()))?;
        let alg = algorithm.resolve(key.algorithm().hash())?;
        self.apply_options(&alg, options)?;
        self.digest_references(Some(root))?;
        self.set_signature_method(&alg, key);

        let signed_info = self.canonical_signed_info(Some(root))?;
        self.sign_signed_info(&alg, key, &signed_info)?;
        self.document = Some(data.clone());
        self.embedded = false;
        Ok(&self.signature)
    }

    /// Sign content that is not part of any document: every reference
    /// either carries a `digest_source` or is resolved by the content
    /// handler.
    pub fn sign_detached(
        &mut self,
        algorithm: &SigningAlgorithm,
        key: &CryptoKey,
        options: &SignOptions,
    ) -> Result<&Signature> {
        let alg = algorithm.resolve(key.algorithm().hash())?;
        self.apply_options(&alg, options)?;
        self.digest_detached_references()?;
        self.set_signature_method(&alg, key);

        let signed_info = self.canonical_signed_info(None)?;
        self.sign_signed_info(&alg, key, &signed_info)?;
        Ok(&self.signature)
    }

    fn apply_options(&mut self, alg: &SignatureAlgorithm, options: &SignOptions) -> Result<()> {
        self.scope.clear();
        let (references, clauses) = std::mem::take(&mut self.added);
        let signed_info = self.signature.signed_info_mut();
        let kept_references = signed_info.references.len().saturating_sub(references);
        signed_info.references.truncate(kept_references);
        let key_info = self.signature.key_info_mut();
        let kept_clauses = key_info.len().saturating_sub(clauses);
        key_info.truncate(kept_clauses);

        if let Some(prefix) = &options.prefix {
            self.signature.set_prefix(Some(prefix.clone()));
        }
        if let Some(id) = &options.id {
            self.signature.set_id(Some(id.clone()));
        }
        if let Some(key) = &options.key_value {
            if alg.is_hmac() {
                log::debug!("HMAC keys are never placed in KeyInfo");
            } else {
                let value = KeyValue::import_key(self.provider.as_ref(), key)?;
                self.signature.key_info_mut().push(KeyInfoClause::KeyValue(value));
            }
        }
        for cert in &options.x509 {
            let data = X509Data::from_certificate(cert.clone(), X509IncludeOption::EndCertOnly)?;
            self.signature.key_info_mut().push(KeyInfoClause::X509Data(data));
        }

        let signed_info = self.signature.signed_info_mut();
        signed_info
            .references
            .extend(options.references.iter().cloned().map(Reference::from));
        if signed_info.references.is_empty() {
            signed_info.references.push(Reference {
                digest_method: Some(HashAlgorithm::Sha256),
                ..Reference::default()
            });
        }
        self.added = (
            self.signature.signed_info().references.len() - kept_references,
            self.signature.key_info().len() - kept_clauses,
        );
        Ok(())
    }

    fn digest_references(&mut self, root: Option<&Element>) -> Result<()> {
        let signature_element = self.signature.to_element();
        let mut digests = Vec::new();
        {
            let digester = self.digester(&signature_element);
            for (index, reference) in self.signature.signed_info().references.iter().enumerate() {
                if reference.digest_value.is_some() {
                    continue;
                }
                let mut reference = reference.clone();
                let hash = *reference.digest_method.get_or_insert(HashAlgorithm::Sha256);
                let source = root.map(|r| ReferenceSource::Node(r.clone()));
                digests.push((index, hash, digester.digest(source, &reference)?));
            }
        }
        self.store_digests(digests);
        Ok(())
    }

    fn digest_detached_references(&mut self) -> Result<()> {
        let signature_element = self.signature.to_element();
        let mut digests = Vec::new();
        {
            let digester = self.digester(&signature_element);
            for (index, reference) in self.signature.signed_info().references.iter().enumerate() {
                if reference.digest_value.is_some() {
                    continue;
                }
                let mut reference = reference.clone();
                let hash = *reference.digest_method.get_or_insert(HashAlgorithm::Sha256);
                digests.push((index, hash, digester.digest_detached(&reference)?));
            }
        }
        self.store_digests(digests);
        Ok(())
    }

    fn store_digests(&mut self, digests: Vec<(usize, HashAlgorithm, Vec<u8>)>) {
        let references = &mut self.signature.signed_info_mut().references;
        for (index, hash, digest) in digests {
            if let Some(reference) = references.get_mut(index) {
                reference.digest_method = Some(hash);
                reference.digest_value = Some(digest);
            }
        }
    }

    fn set_signature_method(&mut self, alg: &SignatureAlgorithm, key: &CryptoKey) {
        let method = &mut self.signature.signed_info_mut().signature_method;
        method.algorithm = alg.uri().to_owned();
        method.pss_params = match *alg {
            SignatureAlgorithm::RsaPss {
                hash,
                salt_length,
                with_params: true,
            } => Some(RsaPssParams::new(hash, Some(salt_length))),
            _ => None,
        };
        method.hmac_output_length = match (*alg, key.algorithm()) {
            (SignatureAlgorithm::Hmac(hash), KeyAlgorithm::Hmac { length, .. }) => {
                let hash_bits = hash.output_len() * 8;
                let floor = hmac_floor(self.verify_options.hmac_min_output_bits, hash);
                Some(match *length {
                    Some(bits) if (floor..=hash_bits).contains(&bits) => bits,
                    _ => hash_bits,
                })
            }
            _ => None,
        };
    }

    fn sign_signed_info(&mut self, alg: &SignatureAlgorithm, key: &CryptoKey, signed_info: &[u8]) -> Result<()> {
        log::debug!("signing {} byte(s) of SignedInfo with {}", signed_info.len(), alg.uri());
        let value = self.provider.sign(alg, key, signed_info)?;
        self.signature.set_signature_value(value);
        Ok(())
    }

    // ── Verification ─────────────────────────────────────────────────

    /// Verify with the stored [`VerifyOptions`].
    ///
    /// A reference whose digest does not match is an
    /// `Err(DigestMismatch)`; a signature value that no candidate key
    /// accepts is `Ok(false)`.
    pub fn verify(&self) -> Result<bool> {
        self.verify_with(&self.verify_options)
    }

    pub fn verify_with(&self, options: &VerifyOptions) -> Result<bool> {
        let alg = self.signature.signed_info().signature_method.resolve()?;
        let signature_value = self
            .signature
            .signature_value()
            .ok_or_else(|| Error::MissingElement("SignatureValue".into()))?;
        if alg.is_hmac() && !self.hmac_length_acceptable(alg.hash(), signature_value, options)? {
            return Ok(false);
        }

        let content = options
            .content
            .as_ref()
            .or_else(|| self.document.as_ref().and_then(Document::root));
        self.validate_references(content)?;

        let keys = self.candidate_keys(&alg, options)?;
        if keys.is_empty() {
            log::warn!("no key available to verify the signature");
            return Ok(false);
        }

        let document_root = self.document.as_ref().and_then(Document::root);
        let signed_info = self.canonical_signed_info(document_root)?;
        log::debug!("verifying {} byte(s) of SignedInfo with {}", signed_info.len(), alg.uri());
        for key in &keys {
            match self.provider.verify(&alg, key, &signed_info, signature_value) {
                Ok(true) => return Ok(true),
                Ok(false) => log::warn!("{} key did not verify the signature", key.algorithm().name()),
                Err(e) => log::warn!("discarding {} key: {e}", key.algorithm().name()),
            }
        }
        Ok(false)
    }

    /// Like [`verify`](Self::verify), folding every failure into
    /// [`VerifyResult::Invalid`].
    pub fn verify_detailed(&self) -> VerifyResult {
        match self.verify() {
            Ok(true) => VerifyResult::Valid,
            Ok(false) => VerifyResult::Invalid {
                reason: Error::SignatureInvalid("no key accepted the signature value".into()).to_string(),
            },
            Err(e) => VerifyResult::Invalid { reason: e.to_string() },
        }
    }

    /// Keys from `<KeyInfo>`, with RSA keys bound to the signature's own
    /// algorithm.
    pub fn public_keys(&self) -> Result<Vec<CryptoKey>> {
        let alg = self.signature.signed_info().signature_method.resolve()?;
        self.signature
            .key_info()
            .public_keys(self.provider.as_ref(), rsa_binding(&alg))
    }

    fn hmac_length_acceptable(&self, hash: HashAlgorithm, value: &[u8], options: &VerifyOptions) -> Result<bool> {
        let hash_bits = hash.output_len() * 8;
        let declared = self.signature.signed_info().signature_method.hmac_output_length;
        if let Some(bits) = declared {
            let floor = hmac_floor(options.hmac_min_output_bits, hash);
            if bits < floor {
                return Err(Error::MalformedInput(format!(
                    "HMACOutputLength {bits} is below the minimum of {floor} bits"
                )));
            }
        }
        let expected = declared.unwrap_or(hash_bits).min(hash_bits);
        if value.len() * 8 < expected {
            log::warn!("HMAC value has {} bits, {expected} expected", value.len() * 8);
            return Ok(false);
        }
        Ok(true)
    }

    fn validate_references(&self, content: Option<&Element>) -> Result<()> {
        let signature_element = self.signature.to_element();
        let digester = self.digester(&signature_element);
        for reference in &self.signature.signed_info().references {
            let uri = reference.uri.as_deref().unwrap_or("");
            let expected = reference
                .digest_value
                .as_deref()
                .ok_or_else(|| Error::MalformedInput(format!("reference '{uri}' has no DigestValue")))?;
            let computed = match content {
                Some(c) => digester.digest(Some(ReferenceSource::Node(c.clone())), reference)?,
                None => digester.digest_detached(reference)?,
            };
            if computed != expected {
                return Err(Error::DigestMismatch {
                    uri: uri.to_owned(),
                    expected: encode_base64(expected),
                    computed: encode_base64(&computed),
                });
            }
            log::debug!("reference '{uri}' digest matches");
        }
        Ok(())
    }

    fn candidate_keys(&self, alg: &SignatureAlgorithm, options: &VerifyOptions) -> Result<Vec<CryptoKey>> {
        let keys = match &options.key {
            Some(key) => vec![key.clone()],
            None => self.public_keys()?,
        };
        let Some(binding) = rsa_binding(alg) else {
            return Ok(keys);
        };
        let mut bound = Vec::with_capacity(keys.len());
        for key in keys {
            match key.algorithm() {
                KeyAlgorithm::RsaPkcs1 { .. } | KeyAlgorithm::RsaPss { .. } => match key.rebind(binding) {
                    Ok(key) => bound.push(key),
                    Err(e) => log::warn!("discarding RSA key: {e}"),
                },
                _ => bound.push(key),
            }
        }
        Ok(bound)
    }

    // ── SignedInfo ───────────────────────────────────────────────────

    /// Canonical `<SignedInfo>`, detached from the signature with the
    /// namespace bindings of the signature, `data` and the parent.
    fn canonical_signed_info(&self, data: Option<&Element>) -> Result<Vec<u8>> {
        let signature_element = self.signature.to_element();
        let original = signature_element
            .find_child(ns::DSIG, node::SIGNED_INFO)
            .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;
        let mut signed_info = original.clone();

        let own = select_root_namespaces(&[&signature_element, original]);
        inject_namespaces(&own, &mut signed_info, false);
        if let Some(data) = data {
            inject_namespaces(&select_root_namespaces(&[data]), &mut signed_info, false);
        }
        if let Some(parent) = &self.parent {
            inject_namespaces(&select_root_namespaces(&[parent]), &mut signed_info, false);
        }
        if !self.scope.is_empty() {
            let mut in_scope = self.scope.clone();
            in_scope.extend(own);
            inject_namespaces(&in_scope, &mut signed_info, false);
        }
        let own_prefix = original.prefix_str().to_owned();
        let used: NamespaceMap = select_namespaces(original)
            .into_iter()
            .filter(|(prefix, _)| *prefix != own_prefix)
            .collect();
        inject_namespaces(&used, &mut signed_info, false);

        let method = &self.signature.signed_info().canonicalization_method;
        let prefixes = if method.mode.is_exclusive() {
            method.inclusive_prefixes.join(" ")
        } else {
            String::new()
        };
        sigtuna_c14n::canonicalize_element(&signed_info, method.mode, &prefixes)
    }

    fn digester<'a>(&'a self, signature_element: &'a Element) -> ReferenceDigester<'a> {
        ReferenceDigester {
            provider: self.provider.as_ref(),
            evaluator: self.xpath.as_ref(),
            content_handler: self.content_handler.as_ref(),
            signature: signature_element,
            parent: self.parent.as_ref(),
        }
    }
}

/// Serializes the signature. When a reference uses the enveloped-signature
/// transform the signature is shown inside the signed document's root.
impl fmt::Display for SignedXml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enveloped = self
            .signature
            .signed_info()
            .references
            .iter()
            .any(Reference::has_enveloped_transform);
        let root = self.document.as_ref().and_then(Document::root);
        match root {
            Some(root) if enveloped && self.embedded => f.write_str(&sigtuna_xml::serialize_element(root)),
            Some(root) if enveloped => {
                let mut root = root.clone();
                root.append_element(self.signature.to_element());
                f.write_str(&sigtuna_xml::serialize_element(&root))
            }
            _ => f.write_str(&sigtuna_xml::serialize_element(&self.signature.to_element())),
        }
    }
}

/// Smallest acceptable `HMACOutputLength`: the configured minimum, and at
/// least half the hash size.
fn hmac_floor(min_bits: usize, hash: HashAlgorithm) -> usize {
    min_bits.max(hash.output_len() * 4)
}

fn rsa_binding(alg: &SignatureAlgorithm) -> Option<KeyAlgorithm> {
    match *alg {
        SignatureAlgorithm::RsaPkcs1(hash) => Some(KeyAlgorithm::RsaPkcs1 { hash }),
        SignatureAlgorithm::RsaPss { hash, .. } => Some(KeyAlgorithm::RsaPss { hash }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ReferenceOptions;
    use crate::signature::DataObject;
    use rand::rngs::OsRng;
    use sigtuna_c14n::C14nMode;
    use sigtuna_crypto::EcSecretKey;
    use sigtuna_transforms::Transform;
    use std::sync::OnceLock;

    fn rsa_key() -> &'static rsa::RsaPrivateKey {
        static KEY: OnceLock<rsa::RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
    }

    fn parse(xml: &str) -> Document {
        sigtuna_xml::parse(xml).unwrap()
    }

    fn enveloped_options(key: &CryptoKey, hash: HashAlgorithm) -> SignOptions {
        SignOptions {
            key_value: Some(key.clone()),
            references: vec![ReferenceOptions::new("", hash).with_transform(Transform::Enveloped)],
            ..SignOptions::default()
        }
    }

    /// Sign enveloped, serialize, reload from text and verify.
    fn sign_and_reverify(alg: SigningAlgorithm, key: &CryptoKey, verify_key: Option<CryptoKey>) -> bool {
        let hash = alg.hash.unwrap_or(HashAlgorithm::Sha256);
        let data = parse(r#"<doc xmlns:x="urn:x"><x:item n="1">payload</x:item></doc>"#);
        let mut signed = SignedXml::new();
        signed.sign(&alg, key, &data, &enveloped_options(key, hash)).unwrap();
        let text = signed.to_string();

        let mut reloaded = SignedXml::from_document(parse(&text)).unwrap();
        if let Some(k) = verify_key {
            reloaded.set_verify_options(VerifyOptions::with_key(k));
        }
        reloaded.verify().unwrap()
    }

    #[test]
    fn test_round_trip_rsa() {
        for hash in HashAlgorithm::ALL {
            let pkcs1 = CryptoKey::rsa_private(rsa_key().clone(), hash);
            assert!(sign_and_reverify(SigningAlgorithm::rsa_pkcs1(hash), &pkcs1, None), "{hash:?}");

            let pss = pkcs1.rebind(KeyAlgorithm::RsaPss { hash }).unwrap();
            assert!(sign_and_reverify(SigningAlgorithm::rsa_pss(hash, None), &pss, None), "{hash:?}");
            assert!(sign_and_reverify(SigningAlgorithm::rsa_pss(hash, Some(20)), &pss, None), "{hash:?}");
        }
    }

    #[test]
    fn test_round_trip_ecdsa() {
        let keys = [
            CryptoKey::ec_private(EcSecretKey::P256(p256::SecretKey::random(&mut OsRng))),
            CryptoKey::ec_private(EcSecretKey::P384(p384::SecretKey::random(&mut OsRng))),
            CryptoKey::ec_private(EcSecretKey::P521(p521::SecretKey::random(&mut OsRng))),
        ];
        for key in &keys {
            for hash in HashAlgorithm::ALL {
                assert!(sign_and_reverify(SigningAlgorithm::ecdsa(hash), key, None), "{hash:?}");
            }
        }
    }

    #[test]
    fn test_round_trip_hmac() {
        for hash in HashAlgorithm::ALL {
            let key = CryptoKey::hmac(vec![0x5a; 32], hash);
            assert!(sign_and_reverify(SigningAlgorithm::hmac(hash), &key, Some(key.clone())), "{hash:?}");
        }
    }

    #[test]
    fn test_end_to_end_id_reference() {
        let key = CryptoKey::rsa_private(rsa_key().clone(), HashAlgorithm::Sha256);
        let data = parse(r#"<root><a Id="x">hello</a></root>"#);
        let options = SignOptions {
            key_value: Some(key.clone()),
            references: vec![ReferenceOptions::new("#x", HashAlgorithm::Sha256)],
            ..SignOptions::default()
        };
        let mut signed = SignedXml::new();
        signed
            .sign(&SigningAlgorithm::rsa_pkcs1(HashAlgorithm::Sha256), &key, &data, &options)
            .unwrap();

        let references = &signed.signature().signed_info().references;
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].uri.as_deref(), Some("#x"));
        assert_eq!(references[0].digest_value.as_ref().map(Vec::len), Some(32));
        let xml = signed.get_xml();
        let method = xml
            .find_child(ns::DSIG, node::SIGNED_INFO)
            .and_then(|si| si.find_child(ns::DSIG, node::REFERENCE))
            .and_then(|r| r.find_child(ns::DSIG, node::DIGEST_METHOD))
            .and_then(|m| m.attribute("Algorithm"))
            .unwrap();
        assert!(method.ends_with("#sha256"));

        assert!(signed.verify().unwrap());
        assert!(signed.verify_detailed().is_valid());

        let tampered = parse(r#"<root><a Id="x">hellp</a></root>"#);
        signed.set_verify_options(VerifyOptions {
            content: tampered.root().cloned(),
            ..VerifyOptions::default()
        });
        match signed.verify() {
            Err(Error::DigestMismatch { uri, expected, computed }) => {
                assert_eq!(uri, "#x");
                assert_ne!(expected, computed);
            }
            other => panic!("expected a digest mismatch, got {other:?}"),
        }
        assert!(!signed.verify_detailed().is_valid());
    }

    #[test]
    fn test_tampered_document_is_a_digest_mismatch() {
        let key = CryptoKey::ec_private(EcSecretKey::P256(p256::SecretKey::random(&mut OsRng)));
        let data = parse("<doc><amount>100</amount></doc>");
        let mut signed = SignedXml::new();
        signed
            .sign(
                &SigningAlgorithm::ecdsa(HashAlgorithm::Sha256),
                &key,
                &data,
                &enveloped_options(&key, HashAlgorithm::Sha256),
            )
            .unwrap();
        let text = signed.to_string().replace(">100<", ">900<");
        let reloaded = SignedXml::from_document(parse(&text)).unwrap();
        assert!(matches!(reloaded.verify(), Err(Error::DigestMismatch { .. })));
    }

    #[test]
    fn test_tampered_signature_value_is_false() {
        let key = CryptoKey::rsa_private(rsa_key().clone(), HashAlgorithm::Sha256);
        let data = parse("<doc>text</doc>");
        let mut signed = SignedXml::new();
        signed
            .sign(
                &SigningAlgorithm::rsa_pkcs1(HashAlgorithm::Sha256),
                &key,
                &data,
                &enveloped_options(&key, HashAlgorithm::Sha256),
            )
            .unwrap();
        let mut reloaded = SignedXml::from_document(parse(&signed.to_string())).unwrap();
        let mut value = reloaded.signature().signature_value().unwrap().to_vec();
        value[10] ^= 0x01;
        reloaded.signature_mut().set_signature_value(value);
        assert!(!reloaded.verify().unwrap());
        assert_eq!(
            reloaded.verify_detailed(),
            VerifyResult::Invalid {
                reason: "signature verification failed: no key accepted the signature value".into()
            }
        );
    }

    #[test]
    fn test_enveloped_to_string_places_signature_in_root() {
        let key = CryptoKey::ec_private(EcSecretKey::P256(p256::SecretKey::random(&mut OsRng)));
        let data = parse(r#"<doc id="d"><a/></doc>"#);
        let mut signed = SignedXml::new();
        signed
            .sign(
                &SigningAlgorithm::ecdsa(HashAlgorithm::Sha256),
                &key,
                &data,
                &enveloped_options(&key, HashAlgorithm::Sha256),
            )
            .unwrap();
        let text = signed.to_string();
        assert!(text.starts_with(r#"<doc id="d"><a/><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">"#));
        assert!(text.ends_with("</ds:Signature></doc>"));

        // Reloaded signatures serialize their document unchanged.
        let reloaded = SignedXml::from_document(parse(&text)).unwrap();
        assert_eq!(reloaded.to_string(), text);
    }

    #[test]
    fn test_default_namespace_prefix() {
        let key = CryptoKey::rsa_private(rsa_key().clone(), HashAlgorithm::Sha384);
        let data = parse("<doc>text</doc>");
        let mut options = enveloped_options(&key, HashAlgorithm::Sha384);
        options.prefix = Some(String::new());
        options.id = Some("sig-1".into());
        let mut signed = SignedXml::new();
        signed
            .sign(&SigningAlgorithm::rsa_pkcs1(HashAlgorithm::Sha384), &key, &data, &options)
            .unwrap();
        let text = signed.to_string();
        assert!(text.contains(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#" Id="sig-1">"#));
        let reloaded = SignedXml::from_document(parse(&text)).unwrap();
        assert_eq!(reloaded.signature().id(), Some("sig-1"));
        assert!(reloaded.verify().unwrap());
    }

    #[test]
    fn test_object_reference_and_bare_serialization() {
        let key = CryptoKey::rsa_private(rsa_key().clone(), HashAlgorithm::Sha256);
        let mut signed = SignedXml::new();
        signed
            .signature_mut()
            .add_object(DataObject::new("obj").with_element(Element::new("note").with_text("signed note")));
        let options = SignOptions {
            key_value: Some(key.clone()),
            references: vec![ReferenceOptions::new("#obj", HashAlgorithm::Sha256)],
            ..SignOptions::default()
        };
        signed
            .sign(
                &SigningAlgorithm::rsa_pkcs1(HashAlgorithm::Sha256),
                &key,
                &parse("<unrelated/>"),
                &options,
            )
            .unwrap();
        let text = signed.to_string();
        assert!(text.starts_with("<ds:Signature"));

        let reloaded = SignedXml::from_document(parse(&text)).unwrap();
        assert!(reloaded.verify().unwrap());
        assert_eq!(reloaded.public_keys().unwrap().len(), 1);
    }

    #[test]
    fn test_default_reference_covers_whole_document() {
        let key = CryptoKey::hmac(vec![1; 32], HashAlgorithm::Sha256);
        let data = parse("<doc><v>1</v></doc>");
        let mut signed = SignedXml::new();
        signed
            .sign(&SigningAlgorithm::hmac(HashAlgorithm::Sha256), &key, &data, &SignOptions::default())
            .unwrap();
        let references = &signed.signature().signed_info().references;
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].uri, None);
        assert_eq!(references[0].digest_method, Some(HashAlgorithm::Sha256));
        assert!(signed.signature().key_info().is_empty());
        assert!(signed.verify_with(&VerifyOptions::with_key(key)).unwrap());
    }

    #[test]
    fn test_hmac_output_length_floor() {
        let key = CryptoKey::hmac(vec![9; 32], HashAlgorithm::Sha256);
        let data = parse("<doc>x</doc>");
        let mut signed = SignedXml::new();
        signed
            .sign(
                &SigningAlgorithm::hmac(HashAlgorithm::Sha256),
                &key,
                &data,
                &enveloped_options(&key, HashAlgorithm::Sha256),
            )
            .unwrap();
        assert_eq!(
            signed.signature().signed_info().signature_method.hmac_output_length,
            Some(256)
        );
        assert!(signed.to_string().contains("<ds:HMACOutputLength>256</ds:HMACOutputLength>"));
        let options = VerifyOptions::with_key(key);
        assert!(signed.verify_with(&options).unwrap());

        let mut truncated = SignedXml::from_document(parse(&signed.to_string())).unwrap();
        let value = truncated.signature().signature_value().unwrap()[..4].to_vec();
        truncated.signature_mut().set_signature_value(value);
        assert!(!truncated.verify_with(&options).unwrap());

        signed
            .signature_mut()
            .signed_info_mut()
            .signature_method
            .hmac_output_length = Some(40);
        assert!(matches!(signed.verify_with(&options), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_signature_below_root_keeps_ancestor_namespaces() {
        let key = CryptoKey::hmac(vec![3; 32], HashAlgorithm::Sha256);
        let options = SignOptions {
            references: vec![ReferenceOptions::new("#x", HashAlgorithm::Sha256)
                .with_transform(Transform::c14n(C14nMode::Exclusive))],
            ..SignOptions::default()
        };
        let mut signed = SignedXml::new();
        signed
            .sign(
                &SigningAlgorithm::hmac(HashAlgorithm::Sha256),
                &key,
                &parse(r#"<root xmlns:w="urn:w"><a Id="x">hi</a></root>"#),
                &options,
            )
            .unwrap();
        let signature = signed.to_string();

        let verify_inside = |wrapper: &str| {
            let text = format!(r#"<root><a Id="x">hi</a>{wrapper}{signature}</wrap></root>"#);
            let mut reloaded = SignedXml::from_document(parse(&text)).unwrap();
            reloaded.set_verify_options(VerifyOptions::with_key(key.clone()));
            reloaded.verify().unwrap()
        };
        assert!(verify_inside(r#"<wrap xmlns:w="urn:w">"#));
        assert!(!verify_inside("<wrap>"));
    }

    #[test]
    fn test_parent_namespaces_reach_object_references() {
        let key = CryptoKey::hmac(vec![4; 32], HashAlgorithm::Sha256);
        let parent = parse(r#"<env xmlns="urn:def" xmlns:p="urn:p"/>"#).root().cloned();
        let mut signed = SignedXml::new();
        signed.set_parent(parent);
        signed.signature_mut().add_object(DataObject::new("obj").with_text("hello"));
        let options = SignOptions {
            references: vec![ReferenceOptions::new("#obj", HashAlgorithm::Sha256)],
            ..SignOptions::default()
        };
        signed
            .sign(&SigningAlgorithm::hmac(HashAlgorithm::Sha256), &key, &parse("<doc/>"), &options)
            .unwrap();

        // The parent's default namespace is not carried onto the object.
        let expected = HashAlgorithm::Sha256.digest(
            br#"<ds:Object xmlns:ds="http://www.w3.org/2000/09/xmldsig#" xmlns:p="urn:p" Id="obj">hello</ds:Object>"#,
        );
        assert_eq!(
            signed.signature().signed_info().references[0].digest_value.as_deref(),
            Some(&expected[..])
        );

        signed.set_verify_options(VerifyOptions::with_key(key));
        assert!(signed.verify().unwrap());
        signed.set_parent(None);
        assert!(matches!(signed.verify(), Err(Error::DigestMismatch { .. })));
    }

    #[test]
    fn test_default_namespace_document_with_exclusive_signed_info() {
        let key = CryptoKey::rsa_private(rsa_key().clone(), HashAlgorithm::Sha256);
        let data = parse(r#"<doc xmlns="urn:d"><item Id="i">v</item></doc>"#);
        let mut signed = SignedXml::new();
        signed.signature_mut().signed_info_mut().canonicalization_method.mode = C14nMode::Exclusive;
        let options = SignOptions {
            key_value: Some(key.clone()),
            references: vec![ReferenceOptions::new("", HashAlgorithm::Sha256)
                .with_transform(Transform::Enveloped)
                .with_transform(Transform::c14n(C14nMode::Exclusive))],
            ..SignOptions::default()
        };
        signed
            .sign(&SigningAlgorithm::rsa_pkcs1(HashAlgorithm::Sha256), &key, &data, &options)
            .unwrap();

        let canonical = String::from_utf8(signed.canonical_signed_info(data.root()).unwrap()).unwrap();
        assert!(canonical.starts_with(r#"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">"#));
        assert!(!canonical.contains("urn:d"));

        let text = signed.to_string();
        assert!(text.starts_with(r#"<doc xmlns="urn:d"><item Id="i">v</item><ds:Signature"#));
        let reloaded = SignedXml::from_document(parse(&text)).unwrap();
        assert!(reloaded.verify().unwrap());
    }

    #[test]
    fn test_signing_again_replaces_added_references() {
        let key = CryptoKey::rsa_private(rsa_key().clone(), HashAlgorithm::Sha256);
        let data = parse("<doc><v>1</v></doc>");
        let options = enveloped_options(&key, HashAlgorithm::Sha256);
        let alg = SigningAlgorithm::rsa_pkcs1(HashAlgorithm::Sha256);
        let mut signed = SignedXml::new();
        signed.sign(&alg, &key, &data, &options).unwrap();
        signed.sign(&alg, &key, &data, &options).unwrap();

        assert_eq!(signed.signature().signed_info().references.len(), 1);
        assert_eq!(signed.signature().key_info().len(), 1);
        let reloaded = SignedXml::from_document(parse(&signed.to_string())).unwrap();
        assert!(reloaded.verify().unwrap());
    }

    #[test]
    fn test_short_hmac_keys_still_verify() {
        let data = parse("<doc>x</doc>");
        for (secret_len, written) in [(10, 256), (20, 160)] {
            let key = CryptoKey::hmac(vec![7; secret_len], HashAlgorithm::Sha256);
            let mut signed = SignedXml::new();
            signed
                .sign(
                    &SigningAlgorithm::hmac(HashAlgorithm::Sha256),
                    &key,
                    &data,
                    &SignOptions::default(),
                )
                .unwrap();
            let method = &signed.signature().signed_info().signature_method;
            assert_eq!(method.hmac_output_length, Some(written));
            assert_eq!(signed.signature().signature_value().map(<[u8]>::len), Some(32));

            signed.set_verify_options(VerifyOptions::with_key(key));
            assert!(signed.verify().unwrap(), "{secret_len}-byte key");
        }
    }

    #[test]
    fn test_detached_signature() {
        let key = CryptoKey::ec_private(EcSecretKey::P384(p384::SecretKey::random(&mut OsRng)));
        let options = SignOptions {
            key_value: Some(key.clone()),
            references: vec![ReferenceOptions {
                digest_source: Some(b"attachment body".to_vec()),
                ..ReferenceOptions::new("attachment.txt", HashAlgorithm::Sha384)
            }],
            ..SignOptions::default()
        };
        let mut signed = SignedXml::new();
        signed
            .sign_detached(&SigningAlgorithm::ecdsa(HashAlgorithm::Sha384), &key, &options)
            .unwrap();
        assert_eq!(
            signed.signature().signed_info().references[0].digest_value,
            Some(HashAlgorithm::Sha384.digest(b"attachment body"))
        );
        assert!(signed.verify().unwrap());

        let mut reloaded = SignedXml::new();
        reloaded.load_xml(&signed.get_xml()).unwrap();
        reloaded.set_content_handler(|_| Ok(Some(ReferenceSource::Bytes(b"attachment body".to_vec()))));
        assert!(reloaded.verify().unwrap());
        reloaded.set_content_handler(|_| Ok(Some(ReferenceSource::Bytes(b"altered body".to_vec()))));
        assert!(matches!(reloaded.verify(), Err(Error::DigestMismatch { .. })));
    }

    #[test]
    fn test_keys_from_key_info_and_explicit_keys() {
        let key = CryptoKey::ec_private(EcSecretKey::P256(p256::SecretKey::random(&mut OsRng)));
        let other = CryptoKey::ec_private(EcSecretKey::P256(p256::SecretKey::random(&mut OsRng)));
        let data = parse("<doc/>");
        let mut options = enveloped_options(&key, HashAlgorithm::Sha256);
        options.key_value = None;
        let mut signed = SignedXml::new();
        signed
            .sign(&SigningAlgorithm::ecdsa(HashAlgorithm::Sha256), &key, &data, &options)
            .unwrap();

        assert!(signed.public_keys().unwrap().is_empty());
        assert!(!signed.verify().unwrap());
        assert!(!signed.verify_with(&VerifyOptions::with_key(other.public_key().unwrap())).unwrap());
        assert!(signed.verify_with(&VerifyOptions::with_key(key.public_key().unwrap())).unwrap());
    }

    #[test]
    fn test_pss_parameters_are_written() {
        let hash = HashAlgorithm::Sha512;
        let key = CryptoKey::rsa_private(rsa_key().clone(), hash)
            .rebind(KeyAlgorithm::RsaPss { hash })
            .unwrap();
        let mut signed = SignedXml::new();
        signed
            .sign(
                &SigningAlgorithm::rsa_pss(hash, Some(32)),
                &key,
                &parse("<doc/>"),
                &enveloped_options(&key, hash),
            )
            .unwrap();
        let text = signed.to_string();
        assert!(text.contains(r#"Algorithm="http://www.w3.org/2007/05/xmldsig-more#rsa-pss""#));
        assert!(text.contains("<pss:SaltLength>32</pss:SaltLength>"));

        // A PKCS#1 signing key is refused for PSS.
        let pkcs1 = CryptoKey::rsa_private(rsa_key().clone(), hash);
        let mut other = SignedXml::new();
        assert!(other
            .sign(&SigningAlgorithm::rsa_pss(hash, None), &pkcs1, &parse("<doc/>"), &SignOptions::default())
            .is_err());
    }

    #[test]
    fn test_from_document_without_signature() {
        assert!(matches!(
            SignedXml::from_document(parse("<doc/>")),
            Err(Error::MissingElement(_))
        ));
    }
}
