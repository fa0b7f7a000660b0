#![forbid(unsafe_code)]

//! Namespace and attribute records as they appear on a canonical start tag.

use crate::escape;
use sigtuna_xml::Attribute;
use std::cmp::Ordering;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for default namespace).
    pub prefix: String,
    /// The namespace URI ("" undeclares the default namespace).
    pub uri: String,
}

impl NsDecl {
    pub fn new(prefix: &str, uri: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            uri: uri.to_owned(),
        }
    }

    /// Append ` xmlns[:prefix]="uri"` to `out`.
    pub fn render(&self, out: &mut String) {
        out.push_str(" xmlns");
        if !self.prefix.is_empty() {
            out.push(':');
            out.push_str(&self.prefix);
        }
        out.push_str("=\"");
        out.push_str(&escape::escape_attr(&self.uri));
        out.push('"');
    }
}

impl Ord for NsDecl {
    // Default namespace first, then by prefix; equal prefixes compare equal
    // so a stable sort keeps the first occurrence in front.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort attributes for the attribute axis: attributes without a namespace
/// first, then by the concatenation of namespace URI and local name.
pub fn compare_attributes(a: &Attribute, b: &Attribute) -> Ordering {
    match (&a.namespace_uri, &b.namespace_uri) {
        (None, None) => a.local_name.cmp(&b.local_name),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => {
            let left = x.chars().chain(a.local_name.chars());
            let right = y.chars().chain(b.local_name.chars());
            left.cmp(right)
        }
    }
}

/// Append ` name="escaped-value"` to `out`.
pub fn render_attribute(attr: &Attribute, out: &mut String) {
    out.push(' ');
    out.push_str(&attr.qualified_name());
    out.push_str("=\"");
    out.push_str(&escape::escape_attr(&attr.value));
    out.push('"');
}
