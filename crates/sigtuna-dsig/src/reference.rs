#![forbid(unsafe_code)]

//! Reference processing: resolve a `Reference/@URI` to content, run its
//! transforms and digest the result.
//!
//! Same-document references are looked up first in the signature's own
//! `<KeyInfo>` and `<Object>` children (by `Id`), then in the source
//! content (by `Id`, `ID` or `id`). The match is cloned and receives the
//! namespace bindings that were in scope for it, so it canonicalizes the
//! same way once detached.

use crate::signature::Reference;
use sigtuna_c14n::C14nMode;
use sigtuna_core::{ns, ns::attr, ns::node, Error, Result};
use sigtuna_crypto::CryptoProvider;
use sigtuna_transforms::{apply_transforms, XPathEvaluator};
use sigtuna_xml::{
    inject_namespaces, select_root_namespaces, Element, NamespaceMap, ReferenceTarget, DEFAULT_ID_ATTRS,
};

/// Content a reference is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSource {
    Node(Element),
    Bytes(Vec<u8>),
}

/// Supplies content for a reference, replacing the default source when it
/// returns `Some`.
pub type ContentHandler = Box<dyn Fn(&Reference) -> Result<Option<ReferenceSource>> + Send + Sync>;

/// Everything needed to digest references of one signature.
pub(crate) struct ReferenceDigester<'a> {
    pub provider: &'a dyn CryptoProvider,
    pub evaluator: &'a dyn XPathEvaluator,
    pub content_handler: Option<&'a ContentHandler>,
    /// The `<Signature>` element the references belong to.
    pub signature: &'a Element,
    pub parent: Option<&'a Element>,
}

impl ReferenceDigester<'_> {
    /// Digest of `reference` resolved against `source`.
    pub fn digest(&self, mut source: Option<ReferenceSource>, reference: &Reference) -> Result<Vec<u8>> {
        let uri = reference.uri.as_deref().unwrap_or("");
        if let Some(handler) = self.content_handler {
            if let Some(content) = handler(reference)? {
                log::debug!("content handler supplied the content of reference '{uri}'");
                source = Some(content);
            }
        }

        let target = ReferenceTarget::parse(reference.uri.as_deref());
        if let ReferenceTarget::Id(id) = target {
            source = Some(ReferenceSource::Node(self.resolve_id(id, source.as_ref())?));
        }

        let bytes = if !reference.transforms.is_empty() {
            match source {
                Some(ReferenceSource::Node(mut element)) => {
                    apply_transforms(&reference.transforms, &mut element, self.evaluator)?.into_bytes()
                }
                Some(ReferenceSource::Bytes(_)) => {
                    return Err(Error::Transform(format!(
                        "reference '{uri}': transforms cannot be applied to binary content"
                    )))
                }
                None => return Err(no_content(uri)),
            }
        } else if let ReferenceTarget::External(_) = target {
            match source {
                Some(ReferenceSource::Node(element)) => sigtuna_xml::serialize_element(&element).into_bytes(),
                Some(ReferenceSource::Bytes(bytes)) => bytes,
                None => return Err(no_content(uri)),
            }
        } else {
            let element = match source {
                Some(ReferenceSource::Node(element)) => element,
                Some(ReferenceSource::Bytes(bytes)) => sigtuna_xml::parse_bytes(&bytes)?
                    .root()
                    .cloned()
                    .ok_or_else(|| Error::MalformedInput(format!("reference '{uri}': no document element")))?,
                None => return Err(no_content(uri)),
            };
            sigtuna_c14n::canonicalize_element(&element, C14nMode::Inclusive, "")?
        };

        let hash = reference
            .digest_method
            .ok_or_else(|| Error::MalformedInput(format!("reference '{uri}' has no DigestMethod")))?;
        log::debug!("digesting {} byte(s) for reference '{uri}' with {}", bytes.len(), hash.name());
        self.provider.digest(hash, &bytes)
    }

    /// Digest of a reference whose content lives outside any document.
    pub fn digest_detached(&self, reference: &Reference) -> Result<Vec<u8>> {
        match (&reference.digest_source, reference.digest_method) {
            (Some(content), Some(hash)) => {
                log::debug!("digesting {} detached byte(s)", content.len());
                self.provider.digest(hash, content)
            }
            _ => self.digest(None, reference),
        }
    }

    fn resolve_id(&self, id: &str, source: Option<&ReferenceSource>) -> Result<Element> {
        let source_root = match source {
            Some(ReferenceSource::Node(element)) => Some(element),
            _ => None,
        };

        let containers = self
            .signature
            .child_elements()
            .filter(|e| e.is(ns::DSIG, node::KEY_INFO) || e.is(ns::DSIG, node::OBJECT));
        for container in containers {
            let Some(mut path) = container.find_path_by_id(id, &[attr::ID]) else {
                continue;
            };
            let Some(found) = path.last().copied() else {
                continue;
            };
            let mut element = found.clone();
            if let Some(root) = source_root {
                inject_namespaces(&select_root_namespaces(&[root]), &mut element, false);
            }
            if let Some(parent) = self.parent {
                inject_namespaces(&select_root_namespaces(&[parent]), &mut element, true);
            }
            path.insert(0, self.signature);
            inject_namespaces(&select_root_namespaces(&path), &mut element, false);
            if let Some(prefix) = self.signature.prefix.as_deref() {
                let own = NamespaceMap::from([(prefix.to_owned(), ns::DSIG.to_owned())]);
                inject_namespaces(&own, &mut element, true);
            }
            log::debug!("reference '#{id}' resolved inside the signature");
            return Ok(element);
        }

        if let Some(root) = source_root {
            if let Some(path) = root.find_path_by_id(id, &DEFAULT_ID_ATTRS) {
                if let Some(found) = path.last() {
                    let mut element = (*found).clone();
                    inject_namespaces(&select_root_namespaces(&[root]), &mut element, false);
                    inject_namespaces(&select_root_namespaces(&path), &mut element, false);
                    log::debug!("reference '#{id}' resolved to <{}>", element.qualified_name());
                    return Ok(element);
                }
            }
        }

        Err(Error::ReferenceResolution(format!("cannot find element with Id '{id}'")))
    }
}

fn no_content(uri: &str) -> Error {
    Error::ReferenceResolution(format!("no content to digest for reference '{uri}'"))
}
