#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for the Sigtuna XML-DSig library.
//!
//! Implements the four canonicalization variants XML-DSig relies on:
//! - Canonical XML 1.0 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)

pub mod canonicalizer;
pub mod escape;
pub mod render;

pub use canonicalizer::{Canonicalizer, NamespaceScope, ScopeGuard};

use sigtuna_core::{algorithm, Error, Result};
use sigtuna_xml::{Document, Element};

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments | Self::ExclusiveWithComments)
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// Canonicalize XML text.
///
/// - `xml`: the raw XML text
/// - `mode`: which C14N variant to use
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces PrefixList
pub fn canonicalize(xml: &str, mode: C14nMode, inclusive_prefixes: &str) -> Result<Vec<u8>> {
    let doc = sigtuna_xml::parse(xml)?;
    canonicalize_doc(&doc, mode, inclusive_prefixes)
}

/// Convenience: canonicalize a pre-parsed document.
pub fn canonicalize_doc(doc: &Document, mode: C14nMode, inclusive_prefixes: &str) -> Result<Vec<u8>> {
    let out = Canonicalizer::new(mode)
        .with_inclusive_prefix_list(inclusive_prefixes)
        .canonicalize_document(doc)?;
    log::trace!("canonicalized document with {}: {} bytes", mode.uri(), out.len());
    Ok(out.into_bytes())
}

/// Convenience: canonicalize an element subtree.
pub fn canonicalize_element(element: &Element, mode: C14nMode, inclusive_prefixes: &str) -> Result<Vec<u8>> {
    let out = Canonicalizer::new(mode)
        .with_inclusive_prefix_list(inclusive_prefixes)
        .canonicalize_element(element)?;
    log::trace!("canonicalized <{}> with {}: {} bytes", element.qualified_name(), mode.uri(), out.len());
    Ok(out.into_bytes())
}

/// Resolve a canonicalization algorithm URI, failing for anything else.
pub fn mode_from_uri(uri: &str) -> Result<C14nMode> {
    C14nMode::from_uri(uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("canonicalization method {uri}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_uris() {
        for mode in [
            C14nMode::Inclusive,
            C14nMode::InclusiveWithComments,
            C14nMode::Exclusive,
            C14nMode::ExclusiveWithComments,
        ] {
            assert_eq!(C14nMode::from_uri(mode.uri()), Some(mode));
            assert_eq!(Canonicalizer::new(mode).mode(), mode);
        }
        assert!(matches!(
            mode_from_uri("http://www.w3.org/2006/12/xml-c14n11"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_canonicalize_text() {
        let out = canonicalize("<a  z='1'   y=\"2\"/>", C14nMode::Inclusive, "").unwrap();
        assert_eq!(out, b"<a y=\"2\" z=\"1\"></a>");
    }
}
