#![forbid(unsafe_code)]

//! Owned, mutable, namespace-aware XML tree.
//!
//! Elements keep their lexical prefix, their resolved namespace URI and
//! every attribute in document order, including `xmlns` declarations. That
//! is the information the canonicalizer's namespace axis needs and which
//! read-only DOM crates tend to hide.

use sigtuna_core::ns;
use std::borrow::Cow;

/// A child node of a document or element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(ProcessingInstruction),
    /// `<!DOCTYPE ...>` content; only valid at document level.
    DocumentType(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// A processing instruction `<?target data?>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingInstruction {
    pub target: String,
    pub data: String,
}

/// An attribute, namespace declarations included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace_uri: Option<String>,
    pub value: String,
}

impl Attribute {
    /// Build an attribute from a qualified name, resolving only the
    /// reserved `xml`/`xmlns` prefixes.
    pub fn new(qualified_name: &str, value: impl Into<String>) -> Self {
        let (prefix, local_name) = split_qname(qualified_name);
        let namespace_uri = match prefix {
            Some("xmlns") => Some(ns::XMLNS.to_owned()),
            Some("xml") => Some(ns::XML.to_owned()),
            None if local_name == "xmlns" => Some(ns::XMLNS.to_owned()),
            _ => None,
        };
        Self {
            prefix: prefix.map(str::to_owned),
            local_name: local_name.to_owned(),
            namespace_uri,
            value: value.into(),
        }
    }

    pub fn qualified_name(&self) -> Cow<'_, str> {
        match &self.prefix {
            Some(p) => Cow::Owned(format!("{p}:{}", self.local_name)),
            None => Cow::Borrowed(&self.local_name),
        }
    }

    /// `xmlns="..."` or `xmlns:p="..."`.
    pub fn is_namespace_declaration(&self) -> bool {
        match &self.prefix {
            Some(p) => p == "xmlns",
            None => self.local_name == "xmlns",
        }
    }

    /// Prefix bound by this declaration (`""` for the default namespace).
    pub fn declared_prefix(&self) -> Option<&str> {
        match &self.prefix {
            Some(p) if p == "xmlns" => Some(&self.local_name),
            None if self.local_name == "xmlns" => Some(""),
            _ => None,
        }
    }
}

/// An element node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace_uri: Option<String>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    /// Create an element in a namespace. No declaration attribute is added.
    pub fn new_ns(prefix: Option<&str>, local_name: &str, namespace_uri: Option<&str>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_owned),
            local_name: local_name.to_owned(),
            namespace_uri: namespace_uri.filter(|u| !u.is_empty()).map(str::to_owned),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element with no namespace.
    pub fn new(local_name: &str) -> Self {
        Self::new_ns(None, local_name, None)
    }

    pub fn qualified_name(&self) -> Cow<'_, str> {
        match &self.prefix {
            Some(p) => Cow::Owned(format!("{p}:{}", self.local_name)),
            None => Cow::Borrowed(&self.local_name),
        }
    }

    pub fn prefix_str(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    pub fn namespace_str(&self) -> &str {
        self.namespace_uri.as_deref().unwrap_or("")
    }

    /// True when the element has this local name in this namespace.
    pub fn is(&self, namespace_uri: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace_str() == namespace_uri
    }

    // ── Attributes ───────────────────────────────────────────────────

    /// Look up an attribute by qualified name.
    pub fn attribute(&self, qualified_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.qualified_name() == qualified_name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, qualified_name: &str) -> bool {
        self.attribute(qualified_name).is_some()
    }

    /// Set an attribute by qualified name, replacing an existing value in
    /// place or appending a new attribute.
    pub fn set_attribute(&mut self, qualified_name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.qualified_name() == qualified_name)
        {
            existing.value = value;
        } else {
            self.attributes.push(Attribute::new(qualified_name, value));
        }
    }

    pub fn remove_attribute(&mut self, qualified_name: &str) {
        self.attributes.retain(|a| a.qualified_name() != qualified_name);
    }

    /// Set `xmlns` (empty prefix) or `xmlns:prefix` on this element.
    pub fn set_namespace_declaration(&mut self, prefix: &str, uri: &str) {
        if prefix.is_empty() {
            self.set_attribute("xmlns", uri);
        } else {
            self.set_attribute(&format!("xmlns:{prefix}"), uri);
        }
    }

    /// Namespace declarations on this element as `(prefix, uri)`.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter_map(|a| a.declared_prefix().map(|p| (p, a.value.as_str())))
    }

    // ── Children ─────────────────────────────────────────────────────

    pub fn append(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn append_element(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    pub fn append_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Builder-style child append.
    pub fn with_child(mut self, element: Element) -> Self {
        self.append_element(element);
        self
    }

    /// Builder-style text append.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.append_text(text);
        self
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, qualified_name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(qualified_name, value);
        self
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// First child element with the given namespace and local name.
    pub fn find_child(&self, namespace_uri: &str, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(namespace_uri, local_name))
    }

    /// All child elements with the given namespace and local name.
    pub fn find_children<'a>(
        &'a self,
        namespace_uri: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements()
            .filter(move |e| e.is(namespace_uri, local_name))
    }

    /// First child element with the given local name, any namespace.
    pub fn find_child_local(&self, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.local_name == local_name)
    }

    /// Remove the direct child elements matching `pred`; returns how many
    /// were removed.
    pub fn remove_child_elements<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&Element) -> bool,
    {
        let before = self.children.len();
        self.children.retain(|n| match n {
            Node::Element(e) => !pred(e),
            _ => true,
        });
        before - self.children.len()
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    // ── Search ───────────────────────────────────────────────────────

    /// Depth-first search (self first) for an element carrying `id` in one
    /// of `id_attrs`. Returns the path from `self` down to the match,
    /// both ends inclusive.
    pub fn find_path_by_id<'a>(&'a self, id: &str, id_attrs: &[&str]) -> Option<Vec<&'a Element>> {
        let mut path = Vec::new();
        if search_path(self, &mut path, &|e: &Element| {
            id_attrs.iter().any(|name| e.attribute(name) == Some(id))
        }) {
            Some(path)
        } else {
            None
        }
    }

    /// Depth-first search (self first) returning the path to the first
    /// element matching `pred`.
    pub fn find_path<'a, F>(&'a self, pred: F) -> Option<Vec<&'a Element>>
    where
        F: Fn(&Element) -> bool,
    {
        let mut path = Vec::new();
        if search_path(self, &mut path, &pred) {
            Some(path)
        } else {
            None
        }
    }

    /// All descendant elements in document order, self included.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) | Node::CData(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
            _ => {}
        }
    }
}

fn collect_descendants<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    out.push(element);
    for child in element.child_elements() {
        collect_descendants(child, out);
    }
}

fn search_path<'a, F>(element: &'a Element, path: &mut Vec<&'a Element>, pred: &F) -> bool
where
    F: Fn(&Element) -> bool,
{
    path.push(element);
    if pred(element) {
        return true;
    }
    for child in element.child_elements() {
        if search_path(child, path, pred) {
            return true;
        }
    }
    path.pop();
    false
}

/// Split `p:local` into `(Some("p"), "local")`.
pub fn split_qname(qualified_name: &str) -> (Option<&str>, &str) {
    match qualified_name.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, qualified_name),
    }
}

/// A parsed document: prolog, one document element, epilog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    /// A document wrapping a single root element.
    pub fn from_root(root: Element) -> Self {
        Self {
            children: vec![Node::Element(root)],
        }
    }

    /// The document element.
    pub fn root(&self) -> Option<&Element> {
        self.children.iter().find_map(Node::as_element)
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.children.iter_mut().find_map(Node::as_element_mut)
    }

    /// Path from the document element to the first element matching `pred`.
    pub fn find_path<F>(&self, pred: F) -> Option<Vec<&Element>>
    where
        F: Fn(&Element) -> bool,
    {
        self.root().and_then(|r| r.find_path(pred))
    }
}
