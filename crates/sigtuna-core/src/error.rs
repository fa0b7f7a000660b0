#![forbid(unsafe_code)]

/// Errors produced by the Sigtuna XML-DSig library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cannot resolve reference: {0}")]
    ReferenceResolution(String),

    #[error(
        "invalid digest for uri '{uri}': calculated digest is {computed} \
         but the xml to validate supplies digest {expected}"
    )]
    DigestMismatch {
        uri: String,
        expected: String,
        computed: String,
    },

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("internal invariant violated: {0}")]
    StructuralImpossibility(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_mismatch_message_names_both_values() {
        let err = Error::DigestMismatch {
            uri: "#x".into(),
            expected: "AAAA".into(),
            computed: "BBBB".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'#x'"));
        assert!(msg.contains("AAAA"));
        assert!(msg.contains("BBBB"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
