#![forbid(unsafe_code)]

//! XML namespace constants used across the library.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Prefix used for newly created XML-DSig elements
pub const DSIG_PREFIX: &str = "ds";

/// xmldsig-more namespace of 2001 (ECDSAKeyValue lives here)
pub const DSIG_MORE: &str = "http://www.w3.org/2001/04/xmldsig-more#";

/// Prefix used for ECDSAKeyValue elements
pub const ECDSA_PREFIX: &str = "ecdsa";

/// xmldsig-more namespace of 2007 (RSAPSSParams lives here)
pub const DSIG_MORE_2007: &str = "http://www.w3.org/2007/05/xmldsig-more#";

/// Prefix used for RSAPSSParams elements
pub const PSS_PREFIX: &str = "pss";

/// Exclusive C14N namespace
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const OBJECT: &str = "Object";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const HMAC_OUTPUT_LENGTH: &str = "HMACOutputLength";

    // RSA-PSS parameters
    pub const RSA_PSS_PARAMS: &str = "RSAPSSParams";
    pub const MASK_GENERATION_FUNCTION: &str = "MaskGenerationFunction";
    pub const SALT_LENGTH: &str = "SaltLength";
    pub const TRAILER_FIELD: &str = "TrailerField";

    // KeyInfo elements
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_NAME: &str = "KeyName";
    pub const KEY_VALUE: &str = "KeyValue";

    // RSA elements
    pub const RSA_KEY_VALUE: &str = "RSAKeyValue";
    pub const RSA_MODULUS: &str = "Modulus";
    pub const RSA_EXPONENT: &str = "Exponent";

    // ECDSA elements
    pub const ECDSA_KEY_VALUE: &str = "ECDSAKeyValue";
    pub const DOMAIN_PARAMETERS: &str = "DomainParameters";
    pub const NAMED_CURVE: &str = "NamedCurve";
    pub const PUBLIC_KEY: &str = "PublicKey";
    pub const X: &str = "X";
    pub const Y: &str = "Y";

    // X509 elements
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
    pub const X509_CRL: &str = "X509CRL";
    pub const X509_SUBJECT_NAME: &str = "X509SubjectName";
    pub const X509_ISSUER_SERIAL: &str = "X509IssuerSerial";
    pub const X509_ISSUER_NAME: &str = "X509IssuerName";
    pub const X509_SERIAL_NUMBER: &str = "X509SerialNumber";
    pub const X509_SKI: &str = "X509SKI";

    // SPKI
    pub const SPKI_DATA: &str = "SPKIData";
    pub const SPKI_EXP: &str = "SPKIexp";

    // XPath / Exc C14N
    pub const XPATH: &str = "XPath";
    pub const INCLUSIVE_NAMESPACES: &str = "InclusiveNamespaces";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const URI: &str = "URI";
    pub const TYPE: &str = "Type";
    pub const MIME_TYPE: &str = "MimeType";
    pub const ENCODING: &str = "Encoding";
    pub const ALGORITHM: &str = "Algorithm";
    pub const PREFIX_LIST: &str = "PrefixList";
}
