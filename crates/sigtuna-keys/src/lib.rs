#![forbid(unsafe_code)]

//! Key material for the Sigtuna XML-DSig library.
//!
//! Loads keys from PEM, DER, PKCS#1, PKCS#8 and raw secrets, and maps keys
//! to and from the `<KeyInfo>` clauses: `KeyName`, `KeyValue` (RSA and
//! ECDSA), `X509Data` and `SPKIData`.

pub mod key_value;
pub mod keyinfo;
pub mod loader;
pub mod x509;
pub mod x509_data;

pub use key_value::{EcdsaKeyValue, KeyValue, RsaKeyValue};
pub use keyinfo::{KeyInfo, KeyInfoClause, SpkiData};
pub use loader::{load_certificate, load_hmac_key, load_key, load_key_file};
pub use x509::{X509Certificate, X509IncludeOption};
pub use x509_data::{X509Data, X509IssuerSerial};

use base64::Engine;
use sigtuna_core::{ns, Error, Result};
use sigtuna_xml::Element;

/// Decode base64 element content, ignoring embedded whitespace.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let clean: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(e.to_string()))
}

pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// A new element in the XML-DSig namespace.
pub(crate) fn dsig_element(prefix: Option<&str>, local_name: &str) -> Element {
    Element::new_ns(prefix, local_name, Some(ns::DSIG))
}

pub(crate) fn required_child<'a>(
    element: &'a Element,
    namespace_uri: &str,
    local_name: &str,
) -> Result<&'a Element> {
    element.find_child(namespace_uri, local_name).ok_or_else(|| {
        Error::MissingElement(format!("{local_name} in {}", element.local_name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_with_line_breaks() {
        assert_eq!(decode_base64("aGVs\n  bG8=\r\n").unwrap(), b"hello");
        assert!(matches!(decode_base64("not*base64"), Err(Error::Base64(_))));
    }
}
