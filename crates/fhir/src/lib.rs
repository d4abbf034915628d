//! FHIR wire/boundary support for electronic product information (ePI) documents.
//!
//! This crate provides **wire models** and **translation helpers** for the documents the
//! preprocessing service receives:
//! - the document `Bundle` envelope and its entries
//! - `Composition` resources with their narrative and nested sections
//! - `HtmlElementLink` extensions annotating narrative classes with clinical concepts
//!
//! This crate focuses on:
//! - FHIR semantic alignment for the fields the preprocessor touches
//! - lossless serialisation/deserialisation (unknown fields are carried through untouched)
//! - the annotation store operations over a resource's extension list
//!
//! It does not validate terminology or coding systems.

pub mod bundle;
pub mod composition;
pub mod html_element_link;
pub mod repeated;

// Re-export facades
pub use bundle::{BundleEntry, EpiBundle};
pub use composition::{Composition, Narrative, Section};
pub use html_element_link::{
    CodeableReference, Coding, HtmlElementLink, HtmlElementLinkStore, HTML_ELEMENT_LINK_URL,
};
pub use repeated::Repeated;

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Deserialize a JSON value into a wire type, reporting the failing path on mismatch.
///
/// `what` names the structure for the error message (e.g. `"Bundle"`).
pub(crate) fn from_value_with_path<T>(value: serde_json::Value, what: &str) -> FhirResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        FhirError::Translation(format!("{what} schema mismatch at {path}: {source}"))
    })
}
