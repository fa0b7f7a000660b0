#![forbid(unsafe_code)]

//! Serializing the owned tree back to XML text.
//!
//! This is plain serialization, not canonicalization: attributes keep
//! their document order and empty elements are written self-closed.

use crate::tree::{Attribute, Document, Element, Node};
use quick_xml::escape::{escape, partial_escape};
use std::borrow::Cow;

/// Incremental XML text writer.
#[derive(Debug, Default)]
pub struct XmlWriter {
    out: String,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `<?xml version="1.0" encoding="UTF-8"?>`.
    pub fn write_declaration(&mut self) {
        self.out
            .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    }

    fn open_tag(&mut self, name: &str, attrs: &[Attribute]) {
        self.out.push('<');
        self.out.push_str(name);
        for attr in attrs {
            self.out.push(' ');
            self.out.push_str(&attr.qualified_name());
            self.out.push_str("=\"");
            self.out.push_str(&escape_attribute(&attr.value));
            self.out.push('"');
        }
    }

    pub fn start_element(&mut self, name: &str, attrs: &[Attribute]) {
        self.open_tag(name, attrs);
        self.out.push('>');
    }

    pub fn empty_element(&mut self, name: &str, attrs: &[Attribute]) {
        self.open_tag(name, attrs);
        self.out.push_str("/>");
    }

    pub fn end_element(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    pub fn write_text(&mut self, text: &str) {
        self.out.push_str(&escape_text(text));
    }

    pub fn write_cdata(&mut self, text: &str) {
        self.out.push_str("<![CDATA[");
        self.out.push_str(text);
        self.out.push_str("]]>");
    }

    pub fn write_comment(&mut self, text: &str) {
        self.out.push_str("<!--");
        self.out.push_str(text);
        self.out.push_str("-->");
    }

    pub fn write_processing_instruction(&mut self, target: &str, data: &str) {
        self.out.push_str("<?");
        self.out.push_str(target);
        if !data.is_empty() {
            self.out.push(' ');
            self.out.push_str(data);
        }
        self.out.push_str("?>");
    }

    /// Write an element and its subtree.
    pub fn write_element(&mut self, element: &Element) {
        let name = element.qualified_name();
        if element.children.is_empty() {
            self.empty_element(&name, &element.attributes);
            return;
        }
        self.start_element(&name, &element.attributes);
        for child in &element.children {
            self.write_node(child);
        }
        self.end_element(&name);
    }

    pub fn write_node(&mut self, node: &Node) {
        match node {
            Node::Element(e) => self.write_element(e),
            Node::Text(t) => self.write_text(t),
            Node::CData(t) => self.write_cdata(t),
            Node::Comment(t) => self.write_comment(t),
            Node::ProcessingInstruction(pi) => {
                self.write_processing_instruction(&pi.target, &pi.data)
            }
            Node::DocumentType(d) => {
                self.out.push_str("<!DOCTYPE ");
                self.out.push_str(d);
                self.out.push('>');
            }
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out.into_bytes()
    }
}

/// Serialize an element subtree.
pub fn serialize_element(element: &Element) -> String {
    let mut writer = XmlWriter::new();
    writer.write_element(element);
    writer.into_string()
}

/// Serialize a whole document (no XML declaration is added).
pub fn serialize_document(doc: &Document) -> String {
    let mut writer = XmlWriter::new();
    for node in &doc.children {
        writer.write_node(node);
    }
    writer.into_string()
}

fn escape_text(text: &str) -> Cow<'_, str> {
    let escaped = partial_escape(text);
    if escaped.contains('\r') {
        Cow::Owned(escaped.replace('\r', "&#xD;"))
    } else {
        escaped
    }
}

fn escape_attribute(value: &str) -> Cow<'_, str> {
    let escaped = escape(value);
    if escaped.contains(['\t', '\n', '\r']) {
        Cow::Owned(
            escaped
                .replace('\t', "&#x9;")
                .replace('\n', "&#xA;")
                .replace('\r', "&#xD;"),
        )
    } else {
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse;

    #[test]
    fn test_serialize_reparses() {
        let src = "<?pi x?><r xmlns=\"urn:r\" a=\"1 &amp; 2\"><e/>t &lt; u<!--c--><![CDATA[<raw>]]></r>";
        let doc = parse(src).unwrap();
        let text = serialize_document(&doc);
        assert_eq!(
            text,
            "<?pi x?><r xmlns=\"urn:r\" a=\"1 &amp; 2\"><e/>t &lt; u<!--c--><![CDATA[<raw>]]></r>"
        );
        assert_eq!(parse(&text).unwrap(), doc);
    }

    #[test]
    fn test_serialize_escapes_whitespace_refs() {
        let e = Element::new("e").with_attribute("v", "a\tb\nc").with_text("x\ry");
        assert_eq!(
            serialize_element(&e),
            "<e v=\"a&#x9;b&#xA;c\">x&#xD;y</e>"
        );
    }
}
