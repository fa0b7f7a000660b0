#![forbid(unsafe_code)]

//! Namespace collection and injection helpers.
//!
//! When a subtree is detached from its document (to be signed, verified or
//! canonicalized on its own) it loses the declarations of its ancestors.
//! These helpers gather those bindings and re-declare them on the detached
//! copy.

use crate::tree::Element;
use sigtuna_core::ns;
use std::collections::BTreeMap;

/// Prefix to namespace URI bindings.
pub type NamespaceMap = BTreeMap<String, String>;

/// Bindings visible at the last element of `path` (a root-to-node path),
/// taken from the element prefixes and `xmlns:p` declarations along it.
///
/// The innermost binding of a prefix wins. Default namespace declarations
/// are not collected.
pub fn select_root_namespaces(path: &[&Element]) -> NamespaceMap {
    let mut map = NamespaceMap::new();
    for element in path.iter().rev() {
        if let Some(uri) = element.namespace_uri.as_deref() {
            if uri != ns::XML {
                map.entry(element.prefix_str().to_owned())
                    .or_insert_with(|| uri.to_owned());
            }
        }
        for (prefix, uri) in element.namespace_declarations() {
            if !prefix.is_empty() {
                map.entry(prefix.to_owned())
                    .or_insert_with(|| uri.to_owned());
            }
        }
    }
    map
}

/// Namespaces used by element names within `element`'s subtree, in
/// document order; the first occurrence of a prefix wins.
pub fn select_namespaces(element: &Element) -> NamespaceMap {
    let mut map = NamespaceMap::new();
    for e in element.descendants() {
        if let Some(uri) = e.namespace_uri.as_deref() {
            map.entry(e.prefix_str().to_owned())
                .or_insert_with(|| uri.to_owned());
        }
    }
    map
}

/// Declare every binding of `namespaces` on `target`, replacing existing
/// declarations of the same prefix. With `ignore_default` the empty prefix
/// is skipped.
pub fn inject_namespaces(namespaces: &NamespaceMap, target: &mut Element, ignore_default: bool) {
    for (prefix, uri) in namespaces {
        if prefix.is_empty() && ignore_default {
            continue;
        }
        if prefix == "xml" || prefix == "xmlns" {
            continue;
        }
        target.set_namespace_declaration(prefix, uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse;

    const SAMPLE: &str = r#"<a:root xmlns:a="urn:a" xmlns:b="urn:b" xmlns="urn:d"><b:mid xmlns:a="urn:a2"><leaf/></b:mid></a:root>"#;

    #[test]
    fn test_select_root_namespaces_innermost_wins() {
        let doc = parse(SAMPLE).unwrap();
        let path = doc.find_path(|e| e.local_name == "leaf").unwrap();
        let map = select_root_namespaces(&path);
        assert_eq!(map.get("a").map(String::as_str), Some("urn:a2"));
        assert_eq!(map.get("b").map(String::as_str), Some("urn:b"));
        // The leaf's own default namespace comes from its element name.
        assert_eq!(map.get("").map(String::as_str), Some("urn:d"));
    }

    #[test]
    fn test_select_namespaces_document_order() {
        let doc = parse(SAMPLE).unwrap();
        let map = select_namespaces(doc.root().unwrap());
        assert_eq!(map.len(), 3);
        assert_eq!(map["a"], "urn:a");
        assert_eq!(map["b"], "urn:b");
        assert_eq!(map[""], "urn:d");
    }

    #[test]
    fn test_inject_namespaces() {
        let mut target = Element::new("t").with_attribute("xmlns:a", "urn:old");
        let mut map = NamespaceMap::new();
        map.insert("a".into(), "urn:a".into());
        map.insert("".into(), "urn:d".into());
        inject_namespaces(&map, &mut target, true);
        assert_eq!(target.attribute("xmlns:a"), Some("urn:a"));
        assert!(!target.has_attribute("xmlns"));
        inject_namespaces(&map, &mut target, false);
        assert_eq!(target.attribute("xmlns"), Some("urn:d"));
    }
}
