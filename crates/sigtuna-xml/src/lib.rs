#![forbid(unsafe_code)]

//! XML document model for the Sigtuna XML-DSig library.
//!
//! Provides an owned, mutable, namespace-aware tree parsed with
//! `quick-xml`, a serializer, the namespace helpers signature processing
//! needs, and reference URI parsing.

pub mod document;
pub mod namespaces;
pub mod tree;
pub mod uri;
pub mod writer;

pub use document::{parse, parse_bytes, DEFAULT_ID_ATTRS};
pub use namespaces::{inject_namespaces, select_namespaces, select_root_namespaces, NamespaceMap};
pub use tree::{Attribute, Document, Element, Node, ProcessingInstruction};
pub use uri::ReferenceTarget;
pub use writer::{serialize_document, serialize_element, XmlWriter};
