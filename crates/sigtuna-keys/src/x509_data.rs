#![forbid(unsafe_code)]

//! `<X509Data>` clause.

use crate::x509::{X509Certificate, X509IncludeOption};
use crate::{decode_base64, dsig_element, encode_base64, required_child};
use sigtuna_core::{ns, ns::node, Error, Result};
use sigtuna_crypto::{CryptoKey, CryptoProvider, KeyAlgorithm};
use sigtuna_xml::Element;

/// Issuer distinguished name and decimal serial number of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509IssuerSerial {
    pub issuer_name: String,
    pub serial_number: String,
}

/// Certificates and certificate identifiers carried in `<X509Data>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct X509Data {
    issuer_serials: Vec<X509IssuerSerial>,
    subject_key_ids: Vec<Vec<u8>>,
    subject_names: Vec<String>,
    certificates: Vec<X509Certificate>,
    crl: Option<Vec<u8>>,
}

impl X509Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe `cert`. Only [`X509IncludeOption::None`] and
    /// [`X509IncludeOption::EndCertOnly`] are available; chain building is
    /// not implemented.
    pub fn from_certificate(cert: X509Certificate, include: X509IncludeOption) -> Result<Self> {
        match include {
            X509IncludeOption::None | X509IncludeOption::EndCertOnly => {
                let mut data = Self::new();
                data.add_certificate(cert);
                Ok(data)
            }
            other => Err(Error::UnsupportedAlgorithm(format!(
                "X509IncludeOption::{other:?} is not implemented"
            ))),
        }
    }

    pub fn add_certificate(&mut self, cert: X509Certificate) {
        self.certificates.push(cert);
    }

    pub fn add_issuer_serial(&mut self, issuer_name: impl Into<String>, serial_number: impl Into<String>) {
        self.issuer_serials.push(X509IssuerSerial {
            issuer_name: issuer_name.into(),
            serial_number: serial_number.into(),
        });
    }

    pub fn add_subject_key_id(&mut self, ski: impl Into<Vec<u8>>) {
        self.subject_key_ids.push(ski.into());
    }

    pub fn add_subject_name(&mut self, name: impl Into<String>) {
        self.subject_names.push(name.into());
    }

    pub fn set_crl(&mut self, crl: Option<Vec<u8>>) {
        self.crl = crl;
    }

    pub fn certificates(&self) -> &[X509Certificate] {
        &self.certificates
    }

    pub fn issuer_serials(&self) -> &[X509IssuerSerial] {
        &self.issuer_serials
    }

    pub fn subject_key_ids(&self) -> &[Vec<u8>] {
        &self.subject_key_ids
    }

    pub fn subject_names(&self) -> &[String] {
        &self.subject_names
    }

    pub fn crl(&self) -> Option<&[u8]> {
        self.crl.as_deref()
    }

    /// Key of the first certificate.
    pub fn export_key(
        &self,
        provider: &dyn CryptoProvider,
        binding: Option<KeyAlgorithm>,
    ) -> Result<CryptoKey> {
        self.certificates
            .first()
            .ok_or_else(|| Error::MissingElement("X509Certificate in X509Data".into()))?
            .export_key(provider, binding)
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let mut data = Self::new();
        for child in element.child_elements() {
            if child.namespace_str() != ns::DSIG {
                log::debug!("skipping <{}> in X509Data", child.qualified_name());
                continue;
            }
            match child.local_name.as_str() {
                node::X509_ISSUER_SERIAL => data.issuer_serials.push(X509IssuerSerial {
                    issuer_name: required_child(child, ns::DSIG, node::X509_ISSUER_NAME)?
                        .text_content()
                        .trim()
                        .to_owned(),
                    serial_number: required_child(child, ns::DSIG, node::X509_SERIAL_NUMBER)?
                        .text_content()
                        .trim()
                        .to_owned(),
                }),
                node::X509_SKI => data.subject_key_ids.push(decode_base64(&child.text_content())?),
                node::X509_SUBJECT_NAME => {
                    data.subject_names.push(child.text_content().trim().to_owned())
                }
                node::X509_CERTIFICATE => data
                    .certificates
                    .push(X509Certificate::from_base64(&child.text_content())?),
                node::X509_CRL => data.crl = Some(decode_base64(&child.text_content())?),
                other => log::debug!("skipping <{other}> in X509Data"),
            }
        }
        Ok(data)
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut element = dsig_element(prefix, node::X509_DATA);
        for is in &self.issuer_serials {
            element.append_element(
                dsig_element(prefix, node::X509_ISSUER_SERIAL)
                    .with_child(dsig_element(prefix, node::X509_ISSUER_NAME).with_text(&is.issuer_name))
                    .with_child(
                        dsig_element(prefix, node::X509_SERIAL_NUMBER).with_text(&is.serial_number),
                    ),
            );
        }
        for ski in &self.subject_key_ids {
            element.append_element(dsig_element(prefix, node::X509_SKI).with_text(encode_base64(ski)));
        }
        for name in &self.subject_names {
            element.append_element(dsig_element(prefix, node::X509_SUBJECT_NAME).with_text(name));
        }
        for cert in &self.certificates {
            element.append_element(dsig_element(prefix, node::X509_CERTIFICATE).with_text(cert.to_base64()));
        }
        if let Some(crl) = &self.crl {
            element.append_element(dsig_element(prefix, node::X509_CRL).with_text(encode_base64(crl)));
        }
        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_crypto::{NamedCurve, RustCryptoProvider};

    const EC_CERT: &str = include_str!("../testdata/ec-p256-cert.pem");
    const RSA_CERT: &str = include_str!("../testdata/rsa-cert.pem");

    #[test]
    fn test_element_order_and_parse() {
        let cert = X509Certificate::from_pem(EC_CERT).unwrap();
        let mut data = X509Data::new();
        data.add_certificate(cert.clone());
        data.add_subject_name(cert.subject());
        data.add_subject_key_id(vec![1, 2, 3]);
        data.add_issuer_serial(cert.issuer(), cert.serial_number());

        let mut element = data.to_element(Some("ds"));
        element.set_namespace_declaration("ds", ns::DSIG);
        let names: Vec<_> = element.child_elements().map(|e| e.local_name.clone()).collect();
        assert_eq!(
            names,
            ["X509IssuerSerial", "X509SKI", "X509SubjectName", "X509Certificate"]
        );

        let doc = sigtuna_xml::parse(&sigtuna_xml::serialize_element(&element)).unwrap();
        let parsed = X509Data::from_element(doc.root().unwrap()).unwrap();
        assert_eq!(parsed, data);
        assert_eq!(parsed.issuer_serials()[0].serial_number, "1234567890123456789");
    }

    #[test]
    fn test_export_first_certificate() {
        let provider = RustCryptoProvider;
        let mut data = X509Data::from_certificate(
            X509Certificate::from_pem(EC_CERT).unwrap(),
            X509IncludeOption::EndCertOnly,
        )
        .unwrap();
        data.add_certificate(X509Certificate::from_pem(RSA_CERT).unwrap());
        let key = data.export_key(&provider, None).unwrap();
        assert_eq!(*key.algorithm(), KeyAlgorithm::Ecdsa { curve: NamedCurve::P256 });

        assert!(matches!(
            X509Data::new().export_key(&provider, None),
            Err(Error::MissingElement(_))
        ));
    }

    #[test]
    fn test_chain_options_are_refused() {
        let cert = X509Certificate::from_pem(EC_CERT).unwrap();
        assert!(matches!(
            X509Data::from_certificate(cert, X509IncludeOption::WholeChain),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
