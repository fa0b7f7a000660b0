#![forbid(unsafe_code)]

//! Reference URI classification.
//!
//! Supports the same-document forms XML-DSig uses:
//! - empty or absent URI: the whole document
//! - `#id-value`: the element carrying that identifier
//! - `#xpointer(/)` and `#xpointer(id('id-value'))`

/// What a `Reference/@URI` points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget<'a> {
    /// The whole containing document.
    WholeDocument,
    /// An element with this identifier.
    Id(&'a str),
    /// Anything that is not a same-document reference.
    External(&'a str),
}

impl<'a> ReferenceTarget<'a> {
    pub fn parse(uri: Option<&'a str>) -> Self {
        let Some(uri) = uri.filter(|u| !u.is_empty()) else {
            return Self::WholeDocument;
        };
        let Some(fragment) = parse_same_document_ref(uri) else {
            return Self::External(uri);
        };
        if fragment.is_empty() {
            return Self::WholeDocument;
        }
        if fragment.starts_with("xpointer") {
            return match parse_xpointer_id(fragment) {
                Some(id) => Self::Id(id),
                None => Self::WholeDocument,
            };
        }
        Self::Id(fragment)
    }
}

/// Parse a same-document reference (e.g., `#foo` -> `foo`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    uri.strip_prefix('#')
}

/// Parse an `xpointer(id('...'))` expression and return the ID value.
///
/// Whitespace around the parentheses is tolerated, and either quote style
/// is accepted.
pub fn parse_xpointer_id(expr: &str) -> Option<&str> {
    let inner = expr.strip_prefix("xpointer")?.trim();
    let inner = inner.strip_prefix('(')?.strip_suffix(')')?.trim();
    let args = inner.strip_prefix("id")?.trim();
    let args = args.strip_prefix('(')?.strip_suffix(')')?.trim();
    let id = args
        .strip_prefix('\'')
        .and_then(|a| a.strip_suffix('\''))
        .or_else(|| args.strip_prefix('"').and_then(|a| a.strip_suffix('"')))?;
    Some(id)
}
