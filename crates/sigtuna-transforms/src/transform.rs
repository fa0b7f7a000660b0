#![forbid(unsafe_code)]

//! The `<Transform>` variants and their XML form.

use sigtuna_c14n::C14nMode;
use sigtuna_core::{algorithm, ns, ns::attr, ns::node, Error, Result};
use sigtuna_xml::{select_root_namespaces, Element, NamespaceMap};
use std::fmt;
use std::str::FromStr;

/// Prefix for `<InclusiveNamespaces>`.
const EXC_C14N_PREFIX: &str = "ec";

/// One step of a reference's transform chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Decode the text content of the input as base64.
    Base64,
    /// Canonicalize the input. `inclusive_prefixes` is only meaningful for
    /// the exclusive modes.
    C14n {
        mode: C14nMode,
        inclusive_prefixes: Vec<String>,
    },
    /// Remove `<Signature>` children of the input.
    Enveloped,
    /// Prune nodes for which the expression is false.
    XPath {
        expression: String,
        namespaces: NamespaceMap,
    },
}

impl Transform {
    pub fn c14n(mode: C14nMode) -> Self {
        Self::C14n {
            mode,
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Exclusive canonicalization with an `InclusiveNamespaces` prefix list.
    pub fn exc_c14n_with_prefixes<I, S>(with_comments: bool, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mode = if with_comments {
            C14nMode::ExclusiveWithComments
        } else {
            C14nMode::Exclusive
        };
        Self::C14n {
            mode,
            inclusive_prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn xpath(expression: impl Into<String>, namespaces: NamespaceMap) -> Self {
        Self::XPath {
            expression: expression.into(),
            namespaces,
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Self::Base64 => algorithm::BASE64,
            Self::C14n { mode, .. } => mode.uri(),
            Self::Enveloped => algorithm::ENVELOPED_SIGNATURE,
            Self::XPath { .. } => algorithm::XPATH,
        }
    }

    /// Canonicalization transforms always run after the others.
    pub fn is_canonicalization(&self) -> bool {
        matches!(self, Self::C14n { .. })
    }

    /// Parse a `<Transform>` element.
    pub fn from_element(element: &Element) -> Result<Self> {
        let uri = element
            .attribute(attr::ALGORITHM)
            .ok_or_else(|| Error::MissingAttribute("Algorithm on Transform".into()))?;
        if let Some(mode) = C14nMode::from_uri(uri) {
            let mut inclusive_prefixes = Vec::new();
            if mode.is_exclusive() {
                if let Some(list) = element
                    .find_child_local(node::INCLUSIVE_NAMESPACES)
                    .and_then(|e| e.attribute(attr::PREFIX_LIST))
                {
                    inclusive_prefixes = list.split_whitespace().map(str::to_owned).collect();
                }
            }
            return Ok(Self::C14n {
                mode,
                inclusive_prefixes,
            });
        }
        match uri {
            algorithm::BASE64 => Ok(Self::Base64),
            algorithm::ENVELOPED_SIGNATURE => Ok(Self::Enveloped),
            algorithm::XPATH => {
                let xpath = element
                    .find_child(ns::DSIG, node::XPATH)
                    .ok_or_else(|| Error::MissingElement("XPath in XPath transform".into()))?;
                Ok(Self::XPath {
                    expression: xpath.text_content().trim().to_owned(),
                    namespaces: select_root_namespaces(&[element, xpath]),
                })
            }
            other => Err(Error::UnsupportedAlgorithm(format!("transform {other}"))),
        }
    }

    /// Build the `<Transform>` element.
    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let dsig = |local: &str| Element::new_ns(prefix, local, Some(ns::DSIG));
        let mut element = dsig(node::TRANSFORM).with_attribute(attr::ALGORITHM, self.uri());
        match self {
            Self::C14n {
                mode,
                inclusive_prefixes,
            } if mode.is_exclusive() && !inclusive_prefixes.is_empty() => {
                let mut inclusive = Element::new_ns(
                    Some(EXC_C14N_PREFIX),
                    node::INCLUSIVE_NAMESPACES,
                    Some(ns::EXC_C14N),
                );
                inclusive.set_namespace_declaration(EXC_C14N_PREFIX, ns::EXC_C14N);
                inclusive.set_attribute(attr::PREFIX_LIST, inclusive_prefixes.join(" "));
                element.append_element(inclusive);
            }
            Self::XPath {
                expression,
                namespaces,
            } => {
                let mut xpath = dsig(node::XPATH).with_text(expression.as_str());
                let own = prefix.unwrap_or("");
                for (p, uri) in namespaces {
                    if !p.is_empty() && !(p == own && uri == ns::DSIG) {
                        xpath.set_namespace_declaration(p, uri);
                    }
                }
                element.append_element(xpath);
            }
            _ => {}
        }
        element
    }
}

/// Transform names accepted in signing options: `enveloped`, `c14n`,
/// `c14n-com`, `exc-c14n`, `exc-c14n-com` and `base64`.
impl FromStr for Transform {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Ok(match name {
            "enveloped" => Self::Enveloped,
            "c14n" => Self::c14n(C14nMode::Inclusive),
            "c14n-com" => Self::c14n(C14nMode::InclusiveWithComments),
            "exc-c14n" => Self::c14n(C14nMode::Exclusive),
            "exc-c14n-com" => Self::c14n(C14nMode::ExclusiveWithComments),
            "base64" => Self::Base64,
            other => {
                return Err(Error::Configuration(format!("unknown transform name '{other}'")))
            }
        })
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enveloped => "enveloped",
            Self::Base64 => "base64",
            Self::XPath { .. } => "xpath",
            Self::C14n { mode, .. } => match mode {
                C14nMode::Inclusive => "c14n",
                C14nMode::InclusiveWithComments => "c14n-com",
                C14nMode::Exclusive => "exc-c14n",
                C14nMode::ExclusiveWithComments => "exc-c14n-com",
            },
        };
        f.write_str(name)
    }
}
