#![forbid(unsafe_code)]

//! Applying a reference's transforms.
//!
//! Every transform reads the same input node. Base64 and canonicalization
//! produce bytes; the enveloped-signature and XPath transforms edit the
//! input in place, so a canonicalization placed after them sees the
//! edited tree.

use crate::transform::Transform;
use crate::xpath::{self, XPathEvaluator};
use sigtuna_c14n::C14nMode;
use sigtuna_core::{ns, ns::node, Error, Result};
use sigtuna_xml::Element;

/// Result of a transform chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutput {
    Bytes(Vec<u8>),
    Node(Element),
}

impl TransformOutput {
    /// Bytes to digest. A node is serialized as it stands.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Node(element) => sigtuna_xml::serialize_element(&element).into_bytes(),
        }
    }
}

enum Stage {
    Unset,
    Input,
    Bytes(Vec<u8>),
}

/// Apply `transforms` to `input`.
///
/// Canonicalization transforms are moved after all others, keeping the
/// declared order within each group. A chain made of a single
/// enveloped-signature transform ends with an implicit inclusive
/// canonicalization.
pub fn apply_transforms(
    transforms: &[Transform],
    input: &mut Element,
    evaluator: &dyn XPathEvaluator,
) -> Result<TransformOutput> {
    let mut ordered: Vec<&Transform> = transforms.iter().collect();
    ordered.sort_by_key(|t| t.is_canonicalization());

    let mut stage = Stage::Unset;
    for transform in ordered {
        log::debug!("applying transform {}", transform.uri());
        match transform {
            Transform::Base64 => {
                stage = Stage::Bytes(crate::decode_base64_text(&input.text_content())?);
            }
            Transform::C14n {
                mode,
                inclusive_prefixes,
            } => {
                let prefixes = inclusive_prefixes.join(" ");
                stage = Stage::Bytes(sigtuna_c14n::canonicalize_element(input, *mode, &prefixes)?);
            }
            Transform::Enveloped => {
                let removed = input.remove_child_elements(|e| e.is(ns::DSIG, node::SIGNATURE));
                log::debug!("enveloped-signature transform removed {removed} element(s)");
                stage = Stage::Input;
            }
            Transform::XPath {
                expression,
                namespaces,
            } => {
                if xpath::filter(input, expression, namespaces, evaluator)?.is_none() {
                    return Ok(TransformOutput::Bytes(Vec::new()));
                }
            }
        }
    }

    if let [Transform::Enveloped] = transforms {
        stage = Stage::Bytes(sigtuna_c14n::canonicalize_element(input, C14nMode::Inclusive, "")?);
    }

    match stage {
        Stage::Bytes(bytes) => Ok(TransformOutput::Bytes(bytes)),
        Stage::Input => Ok(TransformOutput::Node(input.clone())),
        Stage::Unset => Err(Error::Transform(
            "transform chain produced no output".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::BuiltinXPathEvaluator;
    use sigtuna_xml::NamespaceMap;

    const ENVELOPED: &str = r#"<root xmlns="urn:example"><data b="2" a="1">text</data><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature></root>"#;

    fn root(xml: &str) -> Element {
        sigtuna_xml::parse(xml).unwrap().root().unwrap().clone()
    }

    #[test]
    fn test_lone_enveloped_is_canonicalized() {
        let mut input = root(ENVELOPED);
        let out = apply_transforms(&[Transform::Enveloped], &mut input, &BuiltinXPathEvaluator)
            .unwrap();
        assert_eq!(
            out,
            TransformOutput::Bytes(
                br#"<root xmlns="urn:example"><data a="1" b="2">text</data></root>"#.to_vec()
            )
        );
    }

    #[test]
    fn test_canonicalization_runs_last() {
        let mut input = root(ENVELOPED);
        let transforms = [Transform::c14n(C14nMode::Exclusive), Transform::Enveloped];
        let out = apply_transforms(&transforms, &mut input, &BuiltinXPathEvaluator).unwrap();
        assert_eq!(
            out.into_bytes(),
            br#"<root xmlns="urn:example"><data a="1" b="2">text</data></root>"#.to_vec()
        );
    }

    #[test]
    fn test_xpath_then_canonicalize() {
        let mut input = root(ENVELOPED);
        let namespaces = NamespaceMap::from([("dsig".to_owned(), ns::DSIG.to_owned())]);
        let transforms = [
            Transform::xpath("not(ancestor-or-self::dsig:Signature)", namespaces),
            Transform::c14n(C14nMode::Inclusive),
        ];
        let out = apply_transforms(&transforms, &mut input, &BuiltinXPathEvaluator).unwrap();
        assert_eq!(
            out.into_bytes(),
            br#"<root xmlns="urn:example"><data a="1" b="2">text</data></root>"#.to_vec()
        );
    }

    #[test]
    fn test_base64_decodes_text_content() {
        let mut input = root("<data>aGVs\nbG8=</data>");
        let out = apply_transforms(&[Transform::Base64], &mut input, &BuiltinXPathEvaluator).unwrap();
        assert_eq!(out, TransformOutput::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn test_enveloped_with_xpath_yields_node() {
        let mut input = root(ENVELOPED);
        let namespaces = NamespaceMap::from([("dsig".to_owned(), ns::DSIG.to_owned())]);
        let transforms = [
            Transform::Enveloped,
            Transform::xpath("not(ancestor-or-self::dsig:Signature)", namespaces),
        ];
        let out = apply_transforms(&transforms, &mut input, &BuiltinXPathEvaluator).unwrap();
        let TransformOutput::Node(element) = out else {
            panic!("expected a node");
        };
        assert_eq!(element.child_elements().count(), 1);
    }

    #[test]
    fn test_xpath_alone_has_no_output() {
        let mut input = root("<a/>");
        let transforms = [Transform::xpath("not(ancestor-or-self::x:y)", NamespaceMap::from([
            ("x".to_owned(), "urn:x".to_owned()),
        ]))];
        assert!(matches!(
            apply_transforms(&transforms, &mut input, &BuiltinXPathEvaluator),
            Err(Error::Transform(_))
        ));
    }

    #[test]
    fn test_xpath_excluding_the_root_yields_nothing() {
        let mut input = root(r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature>"#);
        let namespaces = NamespaceMap::from([("dsig".to_owned(), ns::DSIG.to_owned())]);
        let transforms = [
            Transform::xpath("not(ancestor-or-self::dsig:Signature)", namespaces),
            Transform::c14n(C14nMode::Inclusive),
        ];
        let out = apply_transforms(&transforms, &mut input, &BuiltinXPathEvaluator).unwrap();
        assert_eq!(out, TransformOutput::Bytes(Vec::new()));
    }
}
