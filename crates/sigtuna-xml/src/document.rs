#![forbid(unsafe_code)]

//! Parsing XML text into an owned [`Document`] using `quick-xml`.
//!
//! Line endings are normalized (CRLF and lone CR become LF) before entity
//! expansion, and attribute values get the XML attribute-value
//! normalization, so character references such as `&#xD;` survive intact.

use crate::tree::{split_qname, Attribute, Document, Element, Node, ProcessingInstruction};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sigtuna_core::{ns, Error, Result};

/// Attribute names treated as element identifiers.
pub const DEFAULT_ID_ATTRS: [&str; 3] = ["Id", "ID", "id"];

/// Parse an XML document from text.
pub fn parse(text: &str) -> Result<Document> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut doc = Document::default();
    let mut stack: Vec<Element> = Vec::new();
    let mut scopes = NamespaceScopes::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::XmlParse(format!("at byte {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(start) => {
                let element = open_element(&start, &mut scopes)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, &mut scopes)?;
                scopes.pop();
                attach(&mut doc, &mut stack, Node::Element(element))?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::XmlParse("unexpected end tag".into()))?;
                scopes.pop();
                attach(&mut doc, &mut stack, Node::Element(element))?;
            }
            Event::Text(text) => {
                let raw = utf8(&text)?;
                let value = unescape(&normalize_newlines(raw))?;
                attach(&mut doc, &mut stack, Node::Text(value))?;
            }
            Event::CData(cdata) => {
                let raw = utf8(&cdata)?;
                attach(&mut doc, &mut stack, Node::CData(normalize_newlines(raw)))?;
            }
            Event::Comment(comment) => {
                let raw = utf8(&comment)?;
                attach(&mut doc, &mut stack, Node::Comment(normalize_newlines(raw)))?;
            }
            Event::PI(pi) => {
                let target = utf8(pi.target())?.to_owned();
                let data = normalize_newlines(utf8(pi.content())?.trim_start());
                attach(
                    &mut doc,
                    &mut stack,
                    Node::ProcessingInstruction(ProcessingInstruction { target, data }),
                )?;
            }
            Event::DocType(doctype) => {
                if !stack.is_empty() {
                    return Err(Error::XmlParse("DOCTYPE inside element".into()));
                }
                doc.children
                    .push(Node::DocumentType(utf8(&doctype)?.trim().to_owned()));
            }
            Event::Decl(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(Error::XmlParse("unclosed element at end of input".into()));
    }
    if doc.root().is_none() {
        return Err(Error::XmlParse("document has no root element".into()));
    }
    log::trace!("parsed {} byte(s) of XML", text.len());
    Ok(doc)
}

/// Parse an XML document from UTF-8 bytes.
pub fn parse_bytes(data: &[u8]) -> Result<Document> {
    let text = std::str::from_utf8(data)
        .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?;
    parse(text)
}

fn attach(doc: &mut Document, stack: &mut [Element], node: Node) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if matches!(node, Node::Element(_)) && doc.root().is_some() {
                return Err(Error::XmlParse("more than one document element".into()));
            }
            doc.children.push(node);
        }
    }
    Ok(())
}

fn open_element(start: &BytesStart<'_>, scopes: &mut NamespaceScopes) -> Result<Element> {
    let qname = utf8(start.name().as_ref())?.to_owned();
    let (prefix, local_name) = split_qname(&qname);

    let mut attributes = Vec::new();
    let mut declared = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::XmlParse(format!("attribute of <{qname}>: {e}")))?;
        let name = utf8(attr.key.as_ref())?;
        let value = unescape(&normalize_attribute(utf8(&attr.value)?))?;
        let attribute = Attribute::new(name, value);
        if let Some(p) = attribute.declared_prefix() {
            declared.push((p.to_owned(), attribute.value.clone()));
        }
        attributes.push(attribute);
    }
    scopes.push(declared);

    for attribute in &mut attributes {
        if attribute.namespace_uri.is_none() {
            if let Some(p) = &attribute.prefix {
                let uri = scopes.lookup(p).ok_or_else(|| {
                    Error::XmlParse(format!("unbound namespace prefix '{p}' on attribute"))
                })?;
                attribute.namespace_uri = Some(uri.to_owned());
            }
        }
    }

    let namespace_uri = match prefix {
        Some(p) => Some(
            scopes
                .lookup(p)
                .ok_or_else(|| Error::XmlParse(format!("unbound namespace prefix '{p}'")))?
                .to_owned(),
        ),
        None => scopes.lookup("").map(str::to_owned),
    };

    Ok(Element {
        prefix: prefix.map(str::to_owned),
        local_name: local_name.to_owned(),
        namespace_uri,
        attributes,
        children: Vec::new(),
    })
}

/// Stack of in-scope namespace bindings, one frame per open element.
#[derive(Default)]
struct NamespaceScopes {
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceScopes {
    fn push(&mut self, frame: Vec<(String, String)>) {
        self.frames.push(frame);
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    /// Resolve a prefix; an empty binding (`xmlns=""`) resolves to `None`.
    fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(ns::XML);
        }
        if prefix == "xmlns" {
            return Some(ns::XMLNS);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))
}

fn unescape(raw: &str) -> Result<String> {
    quick_xml::escape::unescape(raw)
        .map(|v| v.into_owned())
        .map_err(|e| Error::XmlParse(format!("bad entity reference: {e}")))
}

/// XML end-of-line handling: CRLF and lone CR become LF.
fn normalize_newlines(raw: &str) -> String {
    if !raw.contains('\r') {
        return raw.to_owned();
    }
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Attribute-value normalization for CDATA attributes: each literal
/// whitespace character becomes a space.
fn normalize_attribute(raw: &str) -> String {
    raw.replace("\r\n", " ")
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}
