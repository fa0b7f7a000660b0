#![forbid(unsafe_code)]

//! The `<Signature>` object model.
//!
//! Each type reads itself from an [`Element`] and writes itself back with
//! a chosen prefix for the XML-DSig namespace. A [`Signature`] read from a
//! document keeps the element it came from and serializes to it unchanged
//! until it is modified, so that the exact signed bytes survive.

use sigtuna_c14n::C14nMode;
use sigtuna_core::{algorithm, ns, ns::attr, ns::node, Error, Result};
use sigtuna_crypto::{HashAlgorithm, PssParams, SignatureAlgorithm};
use sigtuna_keys::{decode_base64, encode_base64, KeyInfo};
use sigtuna_transforms::Transform;
use sigtuna_xml::{Element, Node};

fn dsig(prefix: Option<&str>, local_name: &str) -> Element {
    Element::new_ns(prefix, local_name, Some(ns::DSIG))
}

fn pss(local_name: &str) -> Element {
    Element::new_ns(Some(ns::PSS_PREFIX), local_name, Some(ns::DSIG_MORE_2007))
}

fn required_child<'a>(element: &'a Element, namespace_uri: &str, local_name: &str) -> Result<&'a Element> {
    element
        .find_child(namespace_uri, local_name)
        .ok_or_else(|| Error::MissingElement(format!("{local_name} in {}", element.local_name)))
}

fn required_algorithm<'a>(element: &'a Element) -> Result<&'a str> {
    element.attribute(attr::ALGORITHM).ok_or_else(|| {
        Error::MissingAttribute(format!("Algorithm on {}", element.local_name))
    })
}

fn parse_number(element: &Element) -> Result<usize> {
    let text = element.text_content();
    text.trim().parse().map_err(|_| {
        Error::MalformedInput(format!("{} is not a number: '{}'", element.local_name, text.trim()))
    })
}

fn digest_method_element(prefix: Option<&str>, hash: HashAlgorithm) -> Element {
    dsig(prefix, node::DIGEST_METHOD).with_attribute(attr::ALGORITHM, hash.uri())
}

/// `<CanonicalizationMethod>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalizationMethod {
    pub mode: C14nMode,
    /// `InclusiveNamespaces/@PrefixList` for the exclusive modes.
    pub inclusive_prefixes: Vec<String>,
}

impl Default for CanonicalizationMethod {
    fn default() -> Self {
        Self::new(C14nMode::Inclusive)
    }
}

impl CanonicalizationMethod {
    pub fn new(mode: C14nMode) -> Self {
        Self {
            mode,
            inclusive_prefixes: Vec::new(),
        }
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let mode = sigtuna_c14n::mode_from_uri(required_algorithm(element)?)?;
        let inclusive_prefixes = element
            .find_child_local(node::INCLUSIVE_NAMESPACES)
            .and_then(|e| e.attribute(attr::PREFIX_LIST))
            .map(|list| list.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        Ok(Self {
            mode,
            inclusive_prefixes,
        })
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        // Same shape as a transform with this algorithm.
        let mut element = Transform::C14n {
            mode: self.mode,
            inclusive_prefixes: self.inclusive_prefixes.clone(),
        }
        .to_element(prefix);
        element.local_name = node::CANONICALIZATION_METHOD.to_owned();
        element
    }
}

/// `<pss:MaskGenerationFunction>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskGenerationFunction {
    pub algorithm: String,
    pub digest_method: Option<HashAlgorithm>,
}

impl Default for MaskGenerationFunction {
    fn default() -> Self {
        Self {
            algorithm: algorithm::MGF1.to_owned(),
            digest_method: None,
        }
    }
}

/// `<pss:RSAPSSParams>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPssParams {
    pub digest_method: HashAlgorithm,
    pub mask_generation_function: Option<MaskGenerationFunction>,
    pub salt_length: Option<usize>,
    pub trailer_field: Option<usize>,
}

impl RsaPssParams {
    pub fn new(digest_method: HashAlgorithm, salt_length: Option<usize>) -> Self {
        Self {
            digest_method,
            mask_generation_function: None,
            salt_length,
            trailer_field: None,
        }
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let digest_method =
            HashAlgorithm::from_uri(required_algorithm(required_child(element, ns::DSIG, node::DIGEST_METHOD)?)?)?;
        let mask_generation_function = match element.find_child(ns::DSIG_MORE_2007, node::MASK_GENERATION_FUNCTION) {
            Some(mgf) => Some(MaskGenerationFunction {
                algorithm: mgf.attribute(attr::ALGORITHM).unwrap_or(algorithm::MGF1).to_owned(),
                digest_method: mgf
                    .find_child(ns::DSIG, node::DIGEST_METHOD)
                    .map(|d| required_algorithm(d).and_then(HashAlgorithm::from_uri))
                    .transpose()?,
            }),
            None => None,
        };
        let salt_length = element
            .find_child(ns::DSIG_MORE_2007, node::SALT_LENGTH)
            .map(parse_number)
            .transpose()?;
        let trailer_field = element
            .find_child(ns::DSIG_MORE_2007, node::TRAILER_FIELD)
            .map(parse_number)
            .transpose()?;
        Ok(Self {
            digest_method,
            mask_generation_function,
            salt_length,
            trailer_field,
        })
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut element = pss(node::RSA_PSS_PARAMS);
        element.set_namespace_declaration(ns::PSS_PREFIX, ns::DSIG_MORE_2007);
        element.append_element(digest_method_element(prefix, self.digest_method));
        if let Some(mgf) = &self.mask_generation_function {
            let mut mgf_element =
                pss(node::MASK_GENERATION_FUNCTION).with_attribute(attr::ALGORITHM, mgf.algorithm.as_str());
            if let Some(hash) = mgf.digest_method {
                mgf_element.append_element(digest_method_element(prefix, hash));
            }
            element.append_element(mgf_element);
        }
        if let Some(salt) = self.salt_length {
            element.append_element(pss(node::SALT_LENGTH).with_text(salt.to_string()));
        }
        if let Some(trailer) = self.trailer_field {
            element.append_element(pss(node::TRAILER_FIELD).with_text(trailer.to_string()));
        }
        element
    }
}

/// `<SignatureMethod>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureMethod {
    /// Empty until the signature is computed.
    pub algorithm: String,
    pub hmac_output_length: Option<usize>,
    pub pss_params: Option<RsaPssParams>,
}

impl SignatureMethod {
    /// The algorithm this method names, with RSA-PSS parameters applied.
    pub fn resolve(&self) -> Result<SignatureAlgorithm> {
        let pss = self.pss_params.as_ref().map(|p| PssParams {
            hash: p.digest_method,
            salt_length: p.salt_length,
        });
        SignatureAlgorithm::from_uri(&self.algorithm, pss)
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let hmac_output_length = element
            .find_child(ns::DSIG, node::HMAC_OUTPUT_LENGTH)
            .map(parse_number)
            .transpose()?;
        let pss_params = element
            .find_child(ns::DSIG_MORE_2007, node::RSA_PSS_PARAMS)
            .map(RsaPssParams::from_element)
            .transpose()?;
        Ok(Self {
            algorithm: required_algorithm(element)?.to_owned(),
            hmac_output_length,
            pss_params,
        })
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut element =
            dsig(prefix, node::SIGNATURE_METHOD).with_attribute(attr::ALGORITHM, self.algorithm.as_str());
        if let Some(bits) = self.hmac_output_length {
            element.append_element(dsig(prefix, node::HMAC_OUTPUT_LENGTH).with_text(bits.to_string()));
        }
        if let Some(params) = &self.pss_params {
            element.append_element(params.to_element(prefix));
        }
        element
    }
}

/// `<Reference>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reference {
    pub id: Option<String>,
    pub uri: Option<String>,
    pub reference_type: Option<String>,
    pub transforms: Vec<Transform>,
    /// Required by the time the reference is digested.
    pub digest_method: Option<HashAlgorithm>,
    /// Once set, the digest is never recomputed.
    pub digest_value: Option<Vec<u8>>,
    /// Content digested as-is by detached signing; never serialized.
    pub digest_source: Option<Vec<u8>>,
}

impl Reference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    pub fn has_enveloped_transform(&self) -> bool {
        self.transforms.iter().any(|t| matches!(t, Transform::Enveloped))
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let transforms = match element.find_child(ns::DSIG, node::TRANSFORMS) {
            Some(list) => list
                .find_children(ns::DSIG, node::TRANSFORM)
                .map(Transform::from_element)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let digest_method = HashAlgorithm::from_uri(required_algorithm(required_child(
            element,
            ns::DSIG,
            node::DIGEST_METHOD,
        )?)?)?;
        let digest_value = decode_base64(&required_child(element, ns::DSIG, node::DIGEST_VALUE)?.text_content())?;
        Ok(Self {
            id: element.attribute(attr::ID).map(str::to_owned),
            uri: element.attribute(attr::URI).map(str::to_owned),
            reference_type: element.attribute(attr::TYPE).map(str::to_owned),
            transforms,
            digest_method: Some(digest_method),
            digest_value: Some(digest_value),
            digest_source: None,
        })
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut element = dsig(prefix, node::REFERENCE);
        if let Some(id) = &self.id {
            element.set_attribute(attr::ID, id.as_str());
        }
        if let Some(uri) = &self.uri {
            element.set_attribute(attr::URI, uri.as_str());
        }
        if let Some(t) = &self.reference_type {
            element.set_attribute(attr::TYPE, t.as_str());
        }
        if !self.transforms.is_empty() {
            let mut list = dsig(prefix, node::TRANSFORMS);
            for transform in &self.transforms {
                list.append_element(transform.to_element(prefix));
            }
            element.append_element(list);
        }
        let mut method = dsig(prefix, node::DIGEST_METHOD);
        if let Some(hash) = self.digest_method {
            method.set_attribute(attr::ALGORITHM, hash.uri());
        }
        element.append_element(method);
        let value = self.digest_value.as_deref().map(encode_base64).unwrap_or_default();
        element.append_element(dsig(prefix, node::DIGEST_VALUE).with_text(value));
        element
    }
}

/// `<SignedInfo>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedInfo {
    pub id: Option<String>,
    pub canonicalization_method: CanonicalizationMethod,
    pub signature_method: SignatureMethod,
    pub references: Vec<Reference>,
}

impl SignedInfo {
    pub fn from_element(element: &Element) -> Result<Self> {
        let references = element
            .find_children(ns::DSIG, node::REFERENCE)
            .map(Reference::from_element)
            .collect::<Result<Vec<_>>>()?;
        if references.is_empty() {
            return Err(Error::MissingElement("Reference in SignedInfo".into()));
        }
        Ok(Self {
            id: element.attribute(attr::ID).map(str::to_owned),
            canonicalization_method: CanonicalizationMethod::from_element(required_child(
                element,
                ns::DSIG,
                node::CANONICALIZATION_METHOD,
            )?)?,
            signature_method: SignatureMethod::from_element(required_child(
                element,
                ns::DSIG,
                node::SIGNATURE_METHOD,
            )?)?,
            references,
        })
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut element = dsig(prefix, node::SIGNED_INFO);
        if let Some(id) = &self.id {
            element.set_attribute(attr::ID, id.as_str());
        }
        element.append_element(self.canonicalization_method.to_element(prefix));
        element.append_element(self.signature_method.to_element(prefix));
        for reference in &self.references {
            element.append_element(reference.to_element(prefix));
        }
        element
    }
}

/// `<Object>`: arbitrary content carried inside the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataObject {
    pub id: Option<String>,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub content: Vec<Node>,
}

impl DataObject {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.content.push(Node::Element(element));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(Node::Text(text.into()));
        self
    }

    pub fn from_element(element: &Element) -> Self {
        Self {
            id: element.attribute(attr::ID).map(str::to_owned),
            mime_type: element.attribute(attr::MIME_TYPE).map(str::to_owned),
            encoding: element.attribute(attr::ENCODING).map(str::to_owned),
            content: element.children.clone(),
        }
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut element = dsig(prefix, node::OBJECT);
        for (name, value) in [
            (attr::ID, &self.id),
            (attr::MIME_TYPE, &self.mime_type),
            (attr::ENCODING, &self.encoding),
        ] {
            if let Some(value) = value {
                element.set_attribute(name, value.as_str());
            }
        }
        element.children = self.content.clone();
        element
    }
}

/// `<Signature>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    id: Option<String>,
    prefix: Option<String>,
    signed_info: SignedInfo,
    signature_value: Option<Vec<u8>>,
    key_info: KeyInfo,
    objects: Vec<DataObject>,
    loaded: Option<Element>,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            id: None,
            prefix: Some(ns::DSIG_PREFIX.to_owned()),
            signed_info: SignedInfo::default(),
            signature_value: None,
            key_info: KeyInfo::new(),
            objects: Vec::new(),
            loaded: None,
        }
    }
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.loaded = None;
        self.id = id;
    }

    /// Prefix of the XML-DSig elements, `ds` unless changed.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Set the element prefix; `None` or an empty prefix uses the default
    /// namespace.
    pub fn set_prefix(&mut self, prefix: Option<String>) {
        self.loaded = None;
        self.prefix = prefix.filter(|p| !p.is_empty());
    }

    pub fn signed_info(&self) -> &SignedInfo {
        &self.signed_info
    }

    pub fn signed_info_mut(&mut self) -> &mut SignedInfo {
        self.loaded = None;
        &mut self.signed_info
    }

    pub fn signature_value(&self) -> Option<&[u8]> {
        self.signature_value.as_deref()
    }

    pub fn set_signature_value(&mut self, value: Vec<u8>) {
        self.loaded = None;
        self.signature_value = Some(value);
    }

    pub fn key_info(&self) -> &KeyInfo {
        &self.key_info
    }

    pub fn key_info_mut(&mut self) -> &mut KeyInfo {
        self.loaded = None;
        &mut self.key_info
    }

    pub fn objects(&self) -> &[DataObject] {
        &self.objects
    }

    pub fn add_object(&mut self, object: DataObject) {
        self.loaded = None;
        self.objects.push(object);
    }

    /// Element this signature was read from, if it is unmodified.
    pub fn loaded_element(&self) -> Option<&Element> {
        self.loaded.as_ref()
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        if !element.is(ns::DSIG, node::SIGNATURE) {
            return Err(Error::MalformedInput(format!(
                "expected Signature, found <{}>",
                element.qualified_name()
            )));
        }
        let signed_info = SignedInfo::from_element(required_child(element, ns::DSIG, node::SIGNED_INFO)?)?;
        let signature_value =
            decode_base64(&required_child(element, ns::DSIG, node::SIGNATURE_VALUE)?.text_content())?;
        let key_info = match element.find_child(ns::DSIG, node::KEY_INFO) {
            Some(ki) => KeyInfo::from_element(ki)?,
            None => KeyInfo::new(),
        };
        let objects = element
            .find_children(ns::DSIG, node::OBJECT)
            .map(DataObject::from_element)
            .collect();
        Ok(Self {
            id: element.attribute(attr::ID).map(str::to_owned),
            prefix: element.prefix.clone(),
            signed_info,
            signature_value: Some(signature_value),
            key_info,
            objects,
            loaded: Some(element.clone()),
        })
    }

    /// The `<Signature>` element. The root declares the XML-DSig namespace.
    pub fn to_element(&self) -> Element {
        if let Some(loaded) = &self.loaded {
            return loaded.clone();
        }
        let prefix = self.prefix();
        let mut element = dsig(prefix, node::SIGNATURE);
        element.set_namespace_declaration(prefix.unwrap_or(""), ns::DSIG);
        if let Some(id) = &self.id {
            element.set_attribute(attr::ID, id.as_str());
        }
        element.append_element(self.signed_info.to_element(prefix));
        let value = self.signature_value.as_deref().map(encode_base64).unwrap_or_default();
        element.append_element(dsig(prefix, node::SIGNATURE_VALUE).with_text(value));
        if !self.key_info.is_empty() {
            element.append_element(self.key_info.to_element(prefix));
        }
        for object in &self.objects {
            element.append_element(object.to_element(prefix));
        }
        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="sig">
  <ds:SignedInfo>
    <ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
    <ds:SignatureMethod Algorithm="http://www.w3.org/2007/05/xmldsig-more#rsa-pss">
      <pss:RSAPSSParams xmlns:pss="http://www.w3.org/2007/05/xmldsig-more#">
        <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#sha384"/>
        <pss:MaskGenerationFunction Algorithm="http://www.w3.org/2007/05/xmldsig-more#MGF1">
          <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#sha384"/>
        </pss:MaskGenerationFunction>
        <pss:SaltLength>20</pss:SaltLength>
        <pss:TrailerField>1</pss:TrailerField>
      </pss:RSAPSSParams>
    </ds:SignatureMethod>
    <ds:Reference URI="#obj" Type="http://www.w3.org/2000/09/xmldsig#Object">
      <ds:Transforms>
        <ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#base64"/>
      </ds:Transforms>
      <ds:DigestMethod Algorithm="http://www.w3.org/2000/09/xmldsig#sha1"/>
      <ds:DigestValue>AAEC</ds:DigestValue>
    </ds:Reference>
  </ds:SignedInfo>
  <ds:SignatureValue>
    AQID
  </ds:SignatureValue>
  <ds:KeyInfo><ds:KeyName>k</ds:KeyName></ds:KeyInfo>
  <ds:Object Id="obj" MimeType="text/plain">aGVsbG8=</ds:Object>
</ds:Signature>"##;

    fn load() -> Signature {
        let doc = sigtuna_xml::parse(SIGNED).unwrap();
        Signature::from_element(doc.root().unwrap()).unwrap()
    }

    #[test]
    fn test_load_signature() {
        let sig = load();
        assert_eq!(sig.id(), Some("sig"));
        assert_eq!(sig.prefix(), Some("ds"));
        assert_eq!(sig.signature_value(), Some(&[1u8, 2, 3][..]));
        assert_eq!(sig.key_info().len(), 1);
        assert_eq!(sig.objects()[0].mime_type.as_deref(), Some("text/plain"));

        let si = sig.signed_info();
        assert_eq!(si.canonicalization_method.mode, C14nMode::Exclusive);
        let reference = &si.references[0];
        assert_eq!(reference.uri.as_deref(), Some("#obj"));
        assert_eq!(reference.transforms, vec![Transform::Base64]);
        assert_eq!(reference.digest_method, Some(HashAlgorithm::Sha1));
        assert_eq!(reference.digest_value.as_deref(), Some(&[0u8, 1, 2][..]));

        let params = si.signature_method.pss_params.as_ref().unwrap();
        assert_eq!(params.salt_length, Some(20));
        assert_eq!(params.trailer_field, Some(1));
        assert_eq!(
            si.signature_method.resolve().unwrap(),
            SignatureAlgorithm::RsaPss {
                hash: HashAlgorithm::Sha384,
                salt_length: 20,
                with_params: true
            }
        );
    }

    #[test]
    fn test_loaded_element_is_kept_until_modified() {
        let mut sig = load();
        let original = sigtuna_xml::parse(SIGNED).unwrap().root().unwrap().clone();
        assert_eq!(sig.to_element(), original);

        sig.set_signature_value(vec![9, 9]);
        let rebuilt = sig.to_element();
        assert_ne!(rebuilt, original);
        let reparsed = Signature::from_element(&rebuilt).unwrap();
        assert_eq!(reparsed.signature_value(), Some(&[9u8, 9][..]));
        assert_eq!(reparsed.signed_info(), sig.signed_info());
    }

    #[test]
    fn test_pss_without_params_block_is_malformed() {
        let method = SignatureMethod {
            algorithm: algorithm::RSA_PSS.to_owned(),
            ..SignatureMethod::default()
        };
        assert!(matches!(method.resolve(), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_built_signature_declares_namespaces() {
        let mut sig = Signature::new();
        let si = sig.signed_info_mut();
        si.signature_method = SignatureMethod {
            algorithm: algorithm::RSA_PSS.to_owned(),
            hmac_output_length: None,
            pss_params: Some(RsaPssParams::new(HashAlgorithm::Sha256, Some(32))),
        };
        si.references.push(Reference {
            digest_method: Some(HashAlgorithm::Sha256),
            digest_value: Some(vec![0; 32]),
            ..Reference::default()
        });
        sig.set_signature_value(vec![1]);
        let xml = sigtuna_xml::serialize_element(&sig.to_element());
        assert!(xml.starts_with(r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">"#));
        assert!(xml.contains(r#"<pss:RSAPSSParams xmlns:pss="http://www.w3.org/2007/05/xmldsig-more#"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><pss:SaltLength>32</pss:SaltLength></pss:RSAPSSParams>"#));
        assert!(!xml.contains("KeyInfo"));

        let reparsed = Signature::from_element(&sigtuna_xml::parse(&xml).unwrap().root().unwrap().clone()).unwrap();
        assert_eq!(reparsed.signed_info(), sig.signed_info());
    }

    #[test]
    fn test_missing_reference_is_rejected() {
        let xml = r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo><CanonicalizationMethod Algorithm="http://www.w3.org/TR/2001/REC-xml-c14n-20010315"/><SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/></SignedInfo><SignatureValue/></Signature>"#;
        let doc = sigtuna_xml::parse(xml).unwrap();
        assert!(matches!(
            Signature::from_element(doc.root().unwrap()),
            Err(Error::MissingElement(_))
        ));
    }
}
