#![forbid(unsafe_code)]

//! The canonicalization walk.
//!
//! A single depth-first pass writes the canonical form of a document or
//! element. Namespace declarations already emitted by an output ancestor
//! live on a [`NamespaceScope`]; each element opens a scope guard that
//! drops its own entries when the element is closed.

use crate::escape;
use crate::render::{compare_attributes, render_attribute, NsDecl};
use crate::C14nMode;
use sigtuna_core::{ns, Error, Result};
use sigtuna_xml::{Document, Element, Node, ProcessingInstruction};
use std::ops::{Deref, DerefMut};

/// Position of the walk relative to the document element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeDocElement,
    InsideDocElement,
    AfterDocElement,
}

/// Namespace declarations rendered by output ancestors, innermost last.
#[derive(Debug, Default)]
pub struct NamespaceScope {
    entries: Vec<NsDecl>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a nested scope. Entries pushed through the guard are removed
    /// when it is dropped.
    pub fn enter(&mut self) -> ScopeGuard<'_> {
        let mark = self.entries.len();
        ScopeGuard { scope: self, mark }
    }

    pub fn push(&mut self, decl: NsDecl) {
        self.entries.push(decl);
    }

    /// The innermost URI rendered for `prefix`.
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|d| d.prefix == prefix)
            .map(|d| d.uri.as_str())
    }

    /// True if `prefix` is already bound to `uri` in the output.
    pub fn is_rendered(&self, prefix: &str, uri: &str) -> bool {
        if prefix.is_empty() && uri.is_empty() {
            return true;
        }
        if prefix == "xml" && uri == ns::XML {
            return true;
        }
        self.lookup(prefix) == Some(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// RAII guard returned by [`NamespaceScope::enter`].
pub struct ScopeGuard<'s> {
    scope: &'s mut NamespaceScope,
    mark: usize,
}

impl Deref for ScopeGuard<'_> {
    type Target = NamespaceScope;

    fn deref(&self) -> &NamespaceScope {
        self.scope
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut NamespaceScope {
        self.scope
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.scope.entries.truncate(self.mark);
    }
}

/// Canonical XML / Exclusive Canonical XML serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonicalizer {
    with_comments: bool,
    exclusive: bool,
    inclusive_prefixes: Vec<String>,
}

impl Canonicalizer {
    pub fn new(mode: C14nMode) -> Self {
        Self {
            with_comments: mode.with_comments(),
            exclusive: mode.is_exclusive(),
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Builder form of [`set_inclusive_prefix_list`](Self::set_inclusive_prefix_list).
    pub fn with_inclusive_prefix_list(mut self, list: &str) -> Self {
        self.set_inclusive_prefix_list(list);
        self
    }

    /// Set the whitespace-separated InclusiveNamespaces PrefixList.
    /// `#default` names the default namespace.
    pub fn set_inclusive_prefix_list(&mut self, list: &str) {
        self.inclusive_prefixes = list
            .split_whitespace()
            .map(|p| if p == "#default" { String::new() } else { p.to_owned() })
            .collect();
    }

    pub fn inclusive_prefix_list(&self) -> String {
        self.inclusive_prefixes
            .iter()
            .map(|p| if p.is_empty() { "#default" } else { p.as_str() })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn mode(&self) -> C14nMode {
        match (self.exclusive, self.with_comments) {
            (false, false) => C14nMode::Inclusive,
            (false, true) => C14nMode::InclusiveWithComments,
            (true, false) => C14nMode::Exclusive,
            (true, true) => C14nMode::ExclusiveWithComments,
        }
    }

    /// Canonicalize a whole document.
    pub fn canonicalize_document(&self, doc: &Document) -> Result<String> {
        let mut walk = Walk::new(self);
        walk.write_document(&doc.children, &mut NamespaceScope::new())?;
        Ok(walk.out)
    }

    /// Canonicalize an element subtree as if it were a document element.
    pub fn canonicalize_element(&self, element: &Element) -> Result<String> {
        let mut walk = Walk::new(self);
        walk.write_element(element, &mut NamespaceScope::new())?;
        Ok(walk.out)
    }

    /// Canonicalize a single detached node.
    pub fn canonicalize_node(&self, node: &Node) -> Result<String> {
        let mut walk = Walk::new(self);
        walk.write_node(node, false, &mut NamespaceScope::new())?;
        Ok(walk.out)
    }

    fn is_inclusive(&self, element: &Element, prefix: &str) -> bool {
        element.prefix_str() == prefix || self.inclusive_prefixes.iter().any(|p| p == prefix)
    }
}

struct Walk<'c> {
    config: &'c Canonicalizer,
    out: String,
    state: State,
}

impl<'c> Walk<'c> {
    fn new(config: &'c Canonicalizer) -> Self {
        Self {
            config,
            out: String::new(),
            state: State::BeforeDocElement,
        }
    }

    fn write_document(&mut self, children: &[Node], scope: &mut NamespaceScope) -> Result<()> {
        self.state = State::BeforeDocElement;
        for child in children {
            self.write_node(child, true, scope)?;
        }
        Ok(())
    }

    fn write_node(
        &mut self,
        node: &Node,
        document_level: bool,
        scope: &mut NamespaceScope,
    ) -> Result<()> {
        match node {
            Node::Element(e) => self.write_element(e, scope)?,
            Node::Text(text) | Node::CData(text) => {
                if !document_level {
                    self.out.push_str(&escape::escape_text(text));
                }
            }
            Node::Comment(text) => self.write_comment(text),
            Node::ProcessingInstruction(pi) => self.write_processing_instruction(pi),
            Node::DocumentType(_) => {
                if !document_level {
                    return Err(Error::StructuralImpossibility(
                        "document type declaration inside an element".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn write_comment(&mut self, text: &str) {
        if !self.config.with_comments {
            return;
        }
        if self.state == State::AfterDocElement {
            self.out.push('\n');
        }
        self.out.push_str("<!--");
        self.out.push_str(&escape::escape_markup(text));
        self.out.push_str("-->");
        if self.state == State::BeforeDocElement {
            self.out.push('\n');
        }
    }

    fn write_processing_instruction(&mut self, pi: &ProcessingInstruction) {
        if pi.target == "xml" {
            return;
        }
        if self.state == State::AfterDocElement {
            self.out.push('\n');
        }
        self.out.push_str("<?");
        self.out.push_str(&pi.target);
        if !pi.data.is_empty() {
            self.out.push(' ');
            self.out.push_str(&escape::escape_markup(&pi.data));
        }
        self.out.push_str("?>");
        if self.state == State::BeforeDocElement {
            self.out.push('\n');
        }
    }

    fn write_element(&mut self, element: &Element, scope: &mut NamespaceScope) -> Result<()> {
        let entered = self.state == State::BeforeDocElement;
        if entered {
            self.state = State::InsideDocElement;
        }

        let name = element.qualified_name();
        let mut scope = scope.enter();
        self.out.push('<');
        self.out.push_str(&name);
        self.write_namespace_axis(element, &mut scope);
        self.write_attribute_axis(element);
        self.out.push('>');

        for child in &element.children {
            self.write_node(child, false, &mut scope)?;
        }

        self.out.push_str("</");
        self.out.push_str(&name);
        self.out.push('>');

        if entered {
            self.state = State::AfterDocElement;
        }
        Ok(())
    }

    fn write_namespace_axis(&mut self, element: &Element, scope: &mut NamespaceScope) {
        let mut list: Vec<NsDecl> = Vec::new();
        let mut add = |scope: &mut NamespaceScope, decl: NsDecl| {
            scope.push(decl.clone());
            list.push(decl);
        };

        for attr in &element.attributes {
            let Some(prefix) = attr.declared_prefix() else {
                // A prefixed attribute needs its namespace in scope.
                if let Some(prefix) = attr.prefix.as_deref() {
                    let uri = attr.namespace_uri.as_deref().unwrap_or("");
                    if !scope.is_rendered(prefix, uri) {
                        add(scope, NsDecl::new(prefix, uri));
                    }
                }
                continue;
            };
            let uri = attr.value.as_str();

            if prefix.is_empty() && uri.is_empty() {
                // xmlns="" only matters when an output ancestor set a default.
                if !self.config.exclusive && default_in_scope(scope) {
                    add(scope, NsDecl::new("", ""));
                }
                continue;
            }

            let mut printable = true;
            if self.config.exclusive && !self.config.is_inclusive(element, prefix) {
                match namespace_usage(element, prefix) {
                    0 => continue,
                    1 => {}
                    _ => printable = false,
                }
            }
            if scope.is_rendered(prefix, uri) {
                continue;
            }
            if printable {
                add(scope, NsDecl::new(prefix, uri));
            }
        }

        let own_prefix = element.prefix_str();
        let own_uri = element.namespace_str();
        if own_uri != ns::XMLNS {
            if own_prefix.is_empty() && own_uri.is_empty() {
                if default_in_scope(scope) {
                    add(scope, NsDecl::new("", ""));
                }
            } else if !scope.is_rendered(own_prefix, own_uri) {
                add(scope, NsDecl::new(own_prefix, own_uri));
            }
        }

        list.sort();
        list.dedup_by(|later, earlier| later.prefix == earlier.prefix);
        for decl in &list {
            decl.render(&mut self.out);
        }
    }

    fn write_attribute_axis(&mut self, element: &Element) {
        let mut attrs: Vec<_> = element
            .attributes
            .iter()
            .filter(|a| !a.is_namespace_declaration())
            .collect();
        attrs.sort_by(|a, b| compare_attributes(a, b));
        for attr in attrs {
            render_attribute(attr, &mut self.out);
        }
    }
}

fn default_in_scope(scope: &NamespaceScope) -> bool {
    scope.lookup("").is_some_and(|uri| !uri.is_empty())
}

/// How deep `prefix` is used below `element`: 1 when the element itself
/// (its name or one of its attributes) uses the prefix, one more than the
/// first using child subtree otherwise, 0 when nothing uses it.
fn namespace_usage(element: &Element, prefix: &str) -> usize {
    let uses_prefix = element.prefix_str() == prefix
        || (!prefix.is_empty()
            && element
                .attributes
                .iter()
                .any(|a| !a.is_namespace_declaration() && a.prefix.as_deref() == Some(prefix)));
    if uses_prefix {
        return 1;
    }
    element
        .child_elements()
        .map(|child| namespace_usage(child, prefix))
        .find(|&n| n > 0)
        .map_or(0, |n| n + 1)
}
