//! FHIR-aligned Composition wire models.
//!
//! A Composition carries the human-readable content of an ePI: a top-level narrative
//! (`text.div`) and an ordered tree of sections, each with its own optional narrative and
//! nested sub-sections.
//!
//! Responsibilities:
//! - Type the fields the preprocessor reads or rewrites (`extension`, `text`, `section`)
//! - Carry every other field through untouched via flattened maps
//!
//! Notes:
//! - Sections form a strict tree by construction of the input format; cycles are not
//!   representable in JSON and are therefore not checked here.

use crate::{from_value_with_path, FhirResult, Repeated};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Resource type discriminator for Composition resources.
pub const COMPOSITION_RESOURCE_TYPE: &str = "Composition";

/// Narrative block holding one markup fragment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    /// The XHTML fragment. Absent in narratives that only carry a status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub div: Option<String>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Narrative {
    /// Create a narrative wrapping `div`, with the `extensions` status used by ePIs.
    pub fn new(div: impl Into<String>) -> Self {
        let mut other = Map::new();
        other.insert("status".into(), Value::String("extensions".into()));
        Self {
            div: Some(div.into()),
            other,
        }
    }
}

/// One (possibly nested) Composition section.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    #[serde(default, skip_serializing_if = "Repeated::is_omitted")]
    pub section: Repeated<Section>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Section {
    pub fn new(title: Option<&str>, div: Option<&str>) -> Self {
        Self {
            title: title.map(str::to_owned),
            text: div.map(Narrative::new),
            section: Repeated::default(),
            other: Map::new(),
        }
    }

    /// Append a nested section, returning `self` for chaining.
    pub fn with_subsection(mut self, child: Section) -> Self {
        self.section.push(child);
        self
    }
}

/// Wire representation of a Composition resource.
///
/// `extension` is kept as raw JSON so that extensions other than `HtmlElementLink` are
/// preserved exactly as received.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    #[serde(default, skip_serializing_if = "Repeated::is_omitted")]
    pub extension: Repeated<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    #[serde(default, skip_serializing_if = "Repeated::is_omitted")]
    pub section: Repeated<Section>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Composition {
    /// Create an empty Composition with its `resourceType` set.
    pub fn new() -> Self {
        let mut other = Map::new();
        other.insert(
            "resourceType".into(),
            Value::String(COMPOSITION_RESOURCE_TYPE.into()),
        );
        Self {
            other,
            ..Default::default()
        }
    }

    /// Deserialize a Composition from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError::Translation`] naming the failing path if a typed field has
    /// the wrong shape (e.g. `section` is not an array).
    pub fn from_value(value: Value) -> FhirResult<Self> {
        from_value_with_path(value, COMPOSITION_RESOURCE_TYPE)
    }

    /// Serialize back into a JSON value.
    pub fn to_value(&self) -> FhirResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// The resource `id`, if present.
    pub fn id(&self) -> Option<&str> {
        self.other.get("id").and_then(Value::as_str)
    }

    /// Set the top-level narrative fragment.
    pub fn with_text(mut self, div: &str) -> Self {
        self.text = Some(Narrative::new(div));
        self
    }

    /// Append a top-level section.
    pub fn with_section(mut self, section: Section) -> Self {
        self.section.push(section);
        self
    }
}
