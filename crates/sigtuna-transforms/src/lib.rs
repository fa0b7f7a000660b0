#![forbid(unsafe_code)]

//! Transform chain for the Sigtuna XML-DSig library.
//!
//! Each reference lists a sequence of transforms: base64 decoding, the
//! four canonicalization modes, enveloped-signature removal and XPath
//! filtering. XPath evaluation is delegated to an [`XPathEvaluator`].

pub mod chain;
pub mod transform;
pub mod xpath;

pub use chain::{apply_transforms, TransformOutput};
pub use transform::Transform;
pub use xpath::{BuiltinXPathEvaluator, XPathContext, XPathEvaluator};

use base64::Engine;
use sigtuna_core::{Error, Result};

fn decode_base64_text(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| Error::Base64(format!("base64 transform: {e}")))
}
