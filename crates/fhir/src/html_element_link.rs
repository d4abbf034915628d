//! `HtmlElementLink` extension wire model and annotation store.
//!
//! An `HtmlElementLink` annotates every narrative element carrying a given CSS class with a
//! clinical concept. The links live in the `extension` list of the resource whose narrative
//! they annotate:
//!
//! ```json
//! {
//!   "extension": [
//!     {"url": "elementClass", "valueString": "pregnancyCategory"},
//!     {"url": "concept", "valueCodeableReference": {"concept": {"coding": [{"code": "77386006"}]}}}
//!   ],
//!   "url": "http://hl7.eu/fhir/ig/gravitate-health/StructureDefinition/HtmlElementLink"
//! }
//! ```
//!
//! Parsing is lenient (missing parts become `None`/empty) because real ePIs are produced by
//! many tools. Rendering is canonical.

use crate::{FhirError, FhirResult};
use serde_json::{json, Map, Value};
use std::fmt;

/// Structure definition URL identifying `HtmlElementLink` extensions.
pub const HTML_ELEMENT_LINK_URL: &str =
    "http://hl7.eu/fhir/ig/gravitate-health/StructureDefinition/HtmlElementLink";

const ELEMENT_CLASS_URL: &str = "elementClass";
const CONCEPT_URL: &str = "concept";

// ============================================================================
// Public domain-level types
// ============================================================================

/// FHIR Coding triple. All parts are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coding {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: Option<&str>, code: Option<&str>, display: Option<&str>) -> Self {
        Self {
            system: system.map(str::to_owned),
            code: code.map(str::to_owned),
            display: display.map(str::to_owned),
        }
    }

    fn from_wire(value: &Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_owned)
        };
        Self {
            system: field("system"),
            code: field("code"),
            display: field("display"),
        }
    }

    fn to_wire(&self) -> Value {
        let mut object = Map::new();
        for (name, part) in [
            ("system", &self.system),
            ("code", &self.code),
            ("display", &self.display),
        ] {
            if let Some(text) = part.as_deref().filter(|t| !t.is_empty()) {
                object.insert(name.into(), Value::String(text.into()));
            }
        }
        Value::Object(object)
    }
}

/// FHIR CodeableReference restricted to its `concept.coding` list.
///
/// Order of codings is preserved; duplicates are allowed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeableReference {
    pub codings: Vec<Coding>,
}

impl CodeableReference {
    pub fn new(codings: Vec<Coding>) -> Self {
        Self { codings }
    }

    /// Validate and convert a raw JSON value into a `CodeableReference`.
    ///
    /// Accepted shape: an object with an optional `concept` object, whose optional `coding` is
    /// an array of objects with optional string `system`, `code` and `display`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] naming the offending part if the value does not have
    /// that shape.
    pub fn from_value(value: &Value) -> FhirResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(FhirError::InvalidInput(
                "concept must be a CodeableReference object".into(),
            ));
        };

        let Some(concept) = object.get("concept") else {
            return Ok(Self::default());
        };
        let Some(concept) = concept.as_object() else {
            return Err(FhirError::InvalidInput(
                "concept.concept must be an object".into(),
            ));
        };

        let Some(coding) = concept.get("coding") else {
            return Ok(Self::default());
        };
        let Some(coding) = coding.as_array() else {
            return Err(FhirError::InvalidInput(
                "concept.concept.coding must be an array".into(),
            ));
        };

        let mut codings = Vec::with_capacity(coding.len());
        for (index, entry) in coding.iter().enumerate() {
            let Some(entry_object) = entry.as_object() else {
                return Err(FhirError::InvalidInput(format!(
                    "concept.concept.coding.{index} must be an object"
                )));
            };
            for name in ["system", "code", "display"] {
                if entry_object.get(name).is_some_and(|v| !v.is_string()) {
                    return Err(FhirError::InvalidInput(format!(
                        "concept.concept.coding.{index}.{name} must be a string"
                    )));
                }
            }
            codings.push(Coding::from_wire(entry));
        }

        Ok(Self { codings })
    }

    fn from_wire(value: &Value) -> Self {
        let codings = value
            .get("concept")
            .and_then(|c| c.get("coding"))
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter(|c| c.is_object())
                    .map(Coding::from_wire)
                    .collect()
            })
            .unwrap_or_default();
        Self { codings }
    }

    /// Render as a CodeableReference JSON value (`{"concept": {"coding": [...]}}`).
    pub fn to_value(&self) -> Value {
        let coding: Vec<Value> = self.codings.iter().map(Coding::to_wire).collect();
        json!({ "concept": { "coding": coding } })
    }
}

/// One `HtmlElementLink` annotation: a narrative class linked to a clinical concept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HtmlElementLink {
    /// The CSS class the annotation applies to (the store's key).
    pub element_class: Option<String>,
    /// The clinical concept referenced.
    pub concept: CodeableReference,
}

impl HtmlElementLink {
    pub fn new(element_class: impl Into<String>, concept: CodeableReference) -> Self {
        Self {
            element_class: Some(element_class.into()),
            concept,
        }
    }

    /// Parse an annotation from one entry of a resource's extension list.
    ///
    /// Returns `None` when the entry is not an `HtmlElementLink` extension.
    pub fn from_extension(extension: &Value) -> Option<Self> {
        if extension.get("url").and_then(Value::as_str) != Some(HTML_ELEMENT_LINK_URL) {
            return None;
        }

        let mut link = Self::default();
        let parts = extension
            .get("extension")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for part in parts {
            match part.get("url").and_then(Value::as_str) {
                Some(ELEMENT_CLASS_URL) => {
                    link.element_class = part
                        .get("valueString")
                        .and_then(Value::as_str)
                        .map(str::to_owned);
                }
                Some(CONCEPT_URL) => {
                    link.concept = part
                        .get("valueCodeableReference")
                        .map(CodeableReference::from_wire)
                        .unwrap_or_default();
                }
                _ => {}
            }
        }

        Some(link)
    }

    /// Render as an extension entry.
    pub fn to_extension(&self) -> Value {
        let mut parts = Vec::with_capacity(2);
        if let Some(element_class) = self.element_class.as_deref().filter(|c| !c.is_empty()) {
            parts.push(json!({ "url": ELEMENT_CLASS_URL, "valueString": element_class }));
        }
        parts.push(json!({
            "url": CONCEPT_URL,
            "valueCodeableReference": self.concept.to_value(),
        }));

        json!({ "extension": parts, "url": HTML_ELEMENT_LINK_URL })
    }
}

impl fmt::Display for HtmlElementLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.element_class.as_deref().unwrap_or("<none>"))?;
        let labels: Vec<&str> = self
            .concept
            .codings
            .iter()
            .filter_map(|c| c.display.as_deref().or(c.code.as_deref()))
            .collect();
        if !labels.is_empty() {
            write!(f, " → {}", labels.join(", "))?;
        }
        Ok(())
    }
}

// ============================================================================
// Annotation store
// ============================================================================

/// Keyed access to the `HtmlElementLink` annotations held in a resource's extension list.
///
/// Implementors only expose their extension list; every operation is provided. Extensions
/// that are not `HtmlElementLink`s are never touched.
///
/// Duplicate keys are tolerated: [`get_link`](Self::get_link) and
/// [`add_link`](Self::add_link) look at the first match, while
/// [`remove_link`](Self::remove_link) removes every match.
pub trait HtmlElementLinkStore {
    fn extensions(&self) -> &[Value];

    fn extensions_mut(&mut self) -> &mut Vec<Value>;

    /// All annotations, in source order.
    fn list_links(&self) -> Vec<HtmlElementLink> {
        self.extensions()
            .iter()
            .filter_map(HtmlElementLink::from_extension)
            .collect()
    }

    /// The first annotation whose key equals `element_class`.
    fn get_link(&self, element_class: &str) -> Option<HtmlElementLink> {
        self.extensions()
            .iter()
            .filter_map(HtmlElementLink::from_extension)
            .find(|link| link.element_class.as_deref() == Some(element_class))
    }

    /// Append a new annotation.
    ///
    /// Returns `Ok(false)` without mutating anything when the key already exists and
    /// `replace_if_exists` is false. Otherwise any existing entries with the key are removed
    /// and the new one is appended.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if `element_class` is empty or whitespace.
    fn add_link(
        &mut self,
        element_class: &str,
        concept: CodeableReference,
        replace_if_exists: bool,
    ) -> FhirResult<bool> {
        ensure_element_class(element_class)?;

        if self.get_link(element_class).is_some() {
            if !replace_if_exists {
                return Ok(false);
            }
            self.remove_link(element_class)?;
        }

        let link = HtmlElementLink::new(element_class, concept);
        self.extensions_mut().push(link.to_extension());
        Ok(true)
    }

    /// [`add_link`](Self::add_link) with a concept given as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if `element_class` is empty or `concept` is not
    /// CodeableReference-shaped. Nothing is mutated in either case.
    fn add_link_from_value(
        &mut self,
        element_class: &str,
        concept: &Value,
        replace_if_exists: bool,
    ) -> FhirResult<bool> {
        ensure_element_class(element_class)?;
        let concept = CodeableReference::from_value(concept)?;
        self.add_link(element_class, concept, replace_if_exists)
    }

    /// Remove every annotation whose key equals `element_class`.
    ///
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if `element_class` is empty. Whitespace-only keys
    /// can still be removed, since they may already be present in received documents.
    fn remove_link(&mut self, element_class: &str) -> FhirResult<bool> {
        if element_class.is_empty() {
            return Err(FhirError::InvalidInput(
                "element_class must be a non-empty string".into(),
            ));
        }

        let extensions = self.extensions_mut();
        let before = extensions.len();
        extensions.retain(|ext| !extension_has_element_class(ext, element_class));
        Ok(extensions.len() < before)
    }

    /// Remove every annotation, returning how many there were.
    fn remove_all_links(&mut self) -> usize {
        let count = self.list_links().len();
        self.extensions_mut().retain(|ext| !is_html_element_link(ext));
        count
    }

    /// Annotations matching `predicate`, or all of them when `predicate` is `None`.
    fn filter_links(
        &self,
        predicate: Option<&dyn Fn(&HtmlElementLink) -> bool>,
    ) -> Vec<HtmlElementLink> {
        let links = self.list_links();
        match predicate {
            None => links,
            Some(predicate) => links.into_iter().filter(|l| predicate(l)).collect(),
        }
    }

    /// Keys of all annotations that have one, in source order, duplicates included.
    fn element_classes(&self) -> Vec<String> {
        self.list_links()
            .into_iter()
            .filter_map(|link| link.element_class)
            .filter(|class| !class.is_empty())
            .collect()
    }

    /// Codings of the first annotation keyed by `element_class`.
    fn concepts_for(&self, element_class: &str) -> Vec<Coding> {
        self.get_link(element_class)
            .map(|link| link.concept.codings)
            .unwrap_or_default()
    }
}

impl HtmlElementLinkStore for crate::Composition {
    fn extensions(&self) -> &[Value] {
        &self.extension
    }

    fn extensions_mut(&mut self) -> &mut Vec<Value> {
        &mut self.extension
    }
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn ensure_element_class(element_class: &str) -> FhirResult<()> {
    if element_class.trim().is_empty() {
        return Err(FhirError::InvalidInput(
            "element_class must be a non-empty string".into(),
        ));
    }
    Ok(())
}

fn is_html_element_link(extension: &Value) -> bool {
    extension.get("url").and_then(Value::as_str) == Some(HTML_ELEMENT_LINK_URL)
}

fn extension_has_element_class(extension: &Value, element_class: &str) -> bool {
    is_html_element_link(extension)
        && extension
            .get("extension")
            .and_then(Value::as_array)
            .is_some_and(|parts| {
                parts.iter().any(|part| {
                    part.get("url").and_then(Value::as_str) == Some(ELEMENT_CLASS_URL)
                        && part.get("valueString").and_then(Value::as_str) == Some(element_class)
                })
            })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Composition;

    fn concept(code: &str, display: &str) -> CodeableReference {
        CodeableReference::new(vec![Coding::new(
            Some("http://snomed.info/sct"),
            Some(code),
            Some(display),
        )])
    }

    fn composition_with(classes: &[&str]) -> Composition {
        let mut composition = Composition::new();
        for class in classes {
            composition
                .add_link(class, concept("1", class), false)
                .expect("add link");
        }
        composition
    }

    #[test]
    fn add_then_get_returns_equal_link() {
        let mut composition = Composition::new();
        let codings = CodeableReference::new(vec![
            Coding::new(Some("http://snomed.info/sct"), Some("77386006"), Some("Pregnancy")),
            Coding::new(None, Some("local-1"), None),
        ]);

        let added = composition
            .add_link("pregnancyCategory", codings.clone(), false)
            .expect("add link");
        assert!(added);

        let link = composition
            .get_link("pregnancyCategory")
            .expect("link should exist");
        assert_eq!(link, HtmlElementLink::new("pregnancyCategory", codings));
    }

    #[test]
    fn add_existing_without_replace_is_soft_failure() {
        let mut composition = composition_with(&["liver"]);
        let before = composition.extension.clone();

        let added = composition
            .add_link("liver", concept("2", "Other"), false)
            .expect("add link");

        assert!(!added);
        assert_eq!(composition.extension, before);
    }

    #[test]
    fn add_existing_with_replace_swaps_entry() {
        let mut composition = composition_with(&["liver", "kidney"]);

        let added = composition
            .add_link("liver", concept("2", "Replaced"), true)
            .expect("add link");

        assert!(added);
        assert_eq!(composition.element_classes(), vec!["kidney", "liver"]);
        assert_eq!(
            composition.concepts_for("liver")[0].display.as_deref(),
            Some("Replaced")
        );
    }

    #[test]
    fn add_rejects_empty_element_class() {
        let mut composition = Composition::new();

        let err = composition
            .add_link("  ", CodeableReference::default(), false)
            .expect_err("should reject empty class");
        match err {
            FhirError::InvalidInput(msg) => assert!(msg.contains("element_class")),
            other => panic!("expected InvalidInput error, got {other:?}"),
        }
        assert!(composition.extension.is_empty());
    }

    #[test]
    fn add_from_value_rejects_malformed_concept() {
        let mut composition = Composition::new();

        let err = composition
            .add_link_from_value("liver", &json!({"concept": {"coding": "x"}}), false)
            .expect_err("should reject malformed concept");
        assert!(matches!(err, FhirError::InvalidInput(_)));
        assert!(composition.extension.is_empty());

        let added = composition
            .add_link_from_value(
                "liver",
                &json!({"concept": {"coding": [{"code": "197321007"}]}}),
                false,
            )
            .expect("valid concept");
        assert!(added);
        assert_eq!(composition.concepts_for("liver")[0].code.as_deref(), Some("197321007"));
    }

    #[test]
    fn remove_then_get_is_absent() {
        let mut composition = composition_with(&["a", "b"]);

        assert!(composition.remove_link("a").expect("remove link"));
        assert!(composition.get_link("a").is_none());
        assert!(!composition.remove_link("a").expect("remove link"));
        assert_eq!(composition.element_classes(), vec!["b"]);
    }

    #[test]
    fn remove_accepts_whitespace_key_but_not_empty() {
        let mut composition = Composition::new();
        composition
            .extension
            .push(HtmlElementLink::new(" ", CodeableReference::default()).to_extension());

        assert!(matches!(
            composition.remove_link(""),
            Err(FhirError::InvalidInput(_))
        ));
        assert!(composition.remove_link(" ").expect("remove link"));
        assert!(composition.list_links().is_empty());
    }

    #[test]
    fn remove_takes_all_duplicates_while_get_sees_first() {
        let mut composition = Composition::new();
        composition
            .extension
            .push(HtmlElementLink::new("dup", concept("1", "First")).to_extension());
        composition
            .extension
            .push(HtmlElementLink::new("dup", concept("2", "Second")).to_extension());

        assert_eq!(composition.element_classes(), vec!["dup", "dup"]);
        assert_eq!(
            composition.concepts_for("dup")[0].display.as_deref(),
            Some("First")
        );

        assert!(composition.remove_link("dup").expect("remove link"));
        assert!(composition.list_links().is_empty());
    }

    #[test]
    fn remove_all_keeps_foreign_extensions() {
        let mut composition = composition_with(&["a", "b", "c"]);
        composition
            .extension
            .insert(0, json!({"url": "http://example.com/other", "valueString": "keep"}));

        assert_eq!(composition.remove_all_links(), 3);
        assert_eq!(composition.extension.len(), 1);
        assert_eq!(composition.extension[0]["valueString"], "keep");
        assert_eq!(composition.remove_all_links(), 0);
    }

    #[test]
    fn filter_with_and_without_predicate() {
        let composition = composition_with(&["pregnancyCategory", "liver", "pregnancyWarning"]);

        assert_eq!(composition.filter_links(None).len(), 3);

        let pregnancy = composition
            .filter_links(Some(&|l: &HtmlElementLink| {
                l.element_class
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains("pregnancy"))
            }));
        assert_eq!(pregnancy.len(), 2);
    }

    #[test]
    fn parses_wire_shape_leniently() {
        let extension = json!({
            "extension": [
                {"url": "elementClass", "valueString": "lactose"},
                "not-an-object",
                {"url": "concept", "valueCodeableReference": {"concept": {"coding": [
                    {"system": "http://snomed.info/sct", "code": "47703008", "display": "Lactose"},
                    {"code": "x"}
                ]}}}
            ],
            "url": HTML_ELEMENT_LINK_URL
        });

        let link = HtmlElementLink::from_extension(&extension).expect("is a link");
        assert_eq!(link.element_class.as_deref(), Some("lactose"));
        assert_eq!(link.concept.codings.len(), 2);
        assert_eq!(link.concept.codings[1], Coding::new(None, Some("x"), None));

        let missing_concept = json!({"url": HTML_ELEMENT_LINK_URL});
        let link = HtmlElementLink::from_extension(&missing_concept).expect("is a link");
        assert_eq!(link.element_class, None);
        assert!(link.concept.codings.is_empty());

        assert!(HtmlElementLink::from_extension(&json!({"url": "other"})).is_none());
    }

    #[test]
    fn renders_canonical_wire_shape() {
        let link = HtmlElementLink::new(
            "liver",
            CodeableReference::new(vec![Coding::new(None, Some("197321007"), Some(""))]),
        );

        assert_eq!(
            link.to_extension(),
            json!({
                "extension": [
                    {"url": "elementClass", "valueString": "liver"},
                    {"url": "concept", "valueCodeableReference": {"concept": {"coding": [
                        {"code": "197321007"}
                    ]}}}
                ],
                "url": HTML_ELEMENT_LINK_URL
            })
        );

        let empty = HtmlElementLink::default().to_extension();
        assert_eq!(
            empty["extension"],
            json!([{"url": "concept", "valueCodeableReference": {"concept": {"coding": []}}}])
        );
    }

    #[test]
    fn codeable_reference_from_value_validates_shape() {
        let ok = CodeableReference::from_value(&json!({"concept": {"coding": [{"code": "a"}]}}))
            .expect("valid shape");
        assert_eq!(ok.codings, vec![Coding::new(None, Some("a"), None)]);

        assert_eq!(
            CodeableReference::from_value(&json!({})).expect("empty object is valid"),
            CodeableReference::default()
        );

        for bad in [
            json!("text"),
            json!({"concept": []}),
            json!({"concept": {"coding": {}}}),
            json!({"concept": {"coding": [1]}}),
            json!({"concept": {"coding": [{"code": 7}]}}),
        ] {
            assert!(
                matches!(
                    CodeableReference::from_value(&bad),
                    Err(FhirError::InvalidInput(_))
                ),
                "expected rejection of {bad}"
            );
        }
    }

    #[test]
    fn display_lists_concept_labels() {
        let link = HtmlElementLink::new(
            "liver",
            CodeableReference::new(vec![
                Coding::new(None, Some("1"), Some("Hepatic impairment")),
                Coding::new(None, Some("2"), None),
            ]),
        );
        assert_eq!(link.to_string(), "liver → Hepatic impairment, 2");
        assert_eq!(
            HtmlElementLink::new("bare", CodeableReference::default()).to_string(),
            "bare"
        );
    }
}
