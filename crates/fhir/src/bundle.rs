//! FHIR-aligned document Bundle envelope for ePIs.
//!
//! The preprocessor accepts a `Bundle` of type `document` and returns the same bundle with its
//! Composition narratives cleaned. Only the envelope is validated here; entry resources are
//! carried as raw JSON and typed on demand.

use crate::composition::{Composition, COMPOSITION_RESOURCE_TYPE};
use crate::{from_value_with_path, FhirError, FhirResult, Repeated};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const BUNDLE_RESOURCE_TYPE: &str = "Bundle";
const DOCUMENT_BUNDLE_TYPE: &str = "document";

/// One entry of a Bundle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl BundleEntry {
    pub fn new(resource: Value) -> Self {
        Self {
            resource: Some(resource),
            other: Map::new(),
        }
    }

    /// The `resourceType` of the wrapped resource, if any.
    pub fn resource_type(&self) -> Option<&str> {
        self.resource
            .as_ref()
            .and_then(|r| r.get("resourceType"))
            .and_then(Value::as_str)
    }
}

/// Wire representation of an ePI document bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpiBundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    #[serde(rename = "type")]
    pub bundle_type: String,

    #[serde(default, skip_serializing_if = "Repeated::is_omitted")]
    pub entry: Repeated<BundleEntry>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Default for EpiBundle {
    fn default() -> Self {
        Self {
            resource_type: BUNDLE_RESOURCE_TYPE.into(),
            bundle_type: DOCUMENT_BUNDLE_TYPE.into(),
            entry: Repeated::default(),
            other: Map::new(),
        }
    }
}

impl EpiBundle {
    /// Parse an ePI bundle from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the text is not valid JSON,
    /// - the top-level value is not an object,
    /// - `resourceType` is not `"Bundle"`,
    /// - `type` is not `"document"`,
    /// - a typed field (e.g. `entry`) has the wrong shape.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let value: Value = serde_json::from_str(json_text)?;
        Self::from_value(value)
    }

    /// Build an ePI bundle from an already-parsed JSON value.
    ///
    /// The envelope discriminators are checked before the full deserialization so that callers
    /// get a targeted message instead of a schema mismatch.
    pub fn from_value(value: Value) -> FhirResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(FhirError::InvalidInput(
                "request body must be a JSON object".into(),
            ));
        };

        let resource_type = object.get("resourceType").and_then(Value::as_str);
        if resource_type != Some(BUNDLE_RESOURCE_TYPE) {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Bundle', got '{}'",
                resource_type.unwrap_or("<missing>")
            )));
        }

        let bundle_type = object.get("type").and_then(Value::as_str);
        if bundle_type != Some(DOCUMENT_BUNDLE_TYPE) {
            return Err(FhirError::InvalidInput(format!(
                "Expected Bundle type 'document', got '{}'",
                bundle_type.unwrap_or("<missing>")
            )));
        }

        from_value_with_path(value, BUNDLE_RESOURCE_TYPE)
    }

    /// Render the bundle as JSON text.
    pub fn render(&self) -> FhirResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Convert the bundle into a JSON value.
    pub fn to_value(&self) -> FhirResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// All entries whose resource has the given `resourceType`.
    pub fn entries_by_resource_type(&self, resource_type: &str) -> Vec<&BundleEntry> {
        self.entry
            .iter()
            .filter(|e| e.resource_type() == Some(resource_type))
            .collect()
    }

    /// The first Composition in the bundle, typed.
    pub fn composition(&self) -> FhirResult<Option<Composition>> {
        self.entry
            .iter()
            .find(|e| e.resource_type() == Some(COMPOSITION_RESOURCE_TYPE))
            .and_then(|e| e.resource.clone())
            .map(Composition::from_value)
            .transpose()
    }

    /// Apply `f` to every Composition entry and write the result back in place.
    ///
    /// Entries whose resource is not a Composition are left untouched. Returns the values `f`
    /// produced, in entry order.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if a Composition entry cannot be typed or re-serialized. In that
    /// case the offending entry is left as it was.
    pub fn update_compositions<T, F>(&mut self, mut f: F) -> FhirResult<Vec<T>>
    where
        F: FnMut(&mut Composition) -> T,
    {
        let mut results = Vec::new();
        for entry in &mut self.entry {
            if entry.resource_type() != Some(COMPOSITION_RESOURCE_TYPE) {
                continue;
            }
            let Some(resource) = entry.resource.as_ref() else {
                continue;
            };

            let mut composition = Composition::from_value(resource.clone())?;
            results.push(f(&mut composition));
            entry.resource = Some(composition.to_value()?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "document",
            "timestamp": "2024-01-15T10:30:00Z",
            "identifier": {"system": "http://example.com/epi", "value": "epi-001"},
            "entry": [
                {
                    "fullUrl": "urn:uuid:comp-001",
                    "resource": {
                        "resourceType": "Composition",
                        "id": "comp-001",
                        "status": "final"
                    }
                },
                {
                    "resource": {
                        "resourceType": "Medication",
                        "id": "med-001",
                        "code": {"coding": [{"system": "http://www.whocc.no/atc", "code": "N02BA01"}]}
                    }
                }
            ]
        })
    }

    #[test]
    fn parses_and_round_trips_document_bundle() {
        let input = sample_bundle();
        let bundle = EpiBundle::parse(&input.to_string()).expect("parse bundle");

        assert_eq!(bundle.resource_type, "Bundle");
        assert_eq!(bundle.bundle_type, "document");
        assert_eq!(bundle.entry.len(), 2);
        assert_eq!(bundle.to_value().expect("render bundle"), input);
    }

    #[test]
    fn finds_composition_and_filters_by_type() {
        let bundle = EpiBundle::from_value(sample_bundle()).expect("parse bundle");

        let composition = bundle
            .composition()
            .expect("type composition")
            .expect("bundle has a composition");
        assert_eq!(composition.id(), Some("comp-001"));

        let medications = bundle.entries_by_resource_type("Medication");
        assert_eq!(medications.len(), 1);
        assert_eq!(medications[0].resource_type(), Some("Medication"));
    }

    #[test]
    fn rejects_non_bundle_resource() {
        let mut input = sample_bundle();
        input["resourceType"] = json!("Patient");

        let err = EpiBundle::from_value(input).expect_err("should reject Patient");
        match err {
            FhirError::InvalidInput(msg) => assert!(msg.contains("Bundle")),
            other => panic!("expected InvalidInput error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_document_bundle() {
        let mut input = sample_bundle();
        input["type"] = json!("collection");

        let err = EpiBundle::from_value(input).expect_err("should reject collection");
        match err {
            FhirError::InvalidInput(msg) => assert!(msg.contains("document")),
            other => panic!("expected InvalidInput error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_json_and_non_objects() {
        assert!(matches!(
            EpiBundle::parse("{not json"),
            Err(FhirError::InvalidJson(_))
        ));
        assert!(matches!(
            EpiBundle::parse("null"),
            Err(FhirError::InvalidInput(_))
        ));
    }

    #[test]
    fn omits_empty_entry_list() {
        let bundle = EpiBundle::default();
        let value = bundle.to_value().expect("render bundle");

        assert_eq!(value["resourceType"], "Bundle");
        assert_eq!(value["type"], "document");
        assert!(value.get("entry").is_none());
    }

    #[test]
    fn update_compositions_writes_back_and_skips_other_resources() {
        let mut bundle = EpiBundle::from_value(sample_bundle()).expect("parse bundle");

        let ids = bundle
            .update_compositions(|composition| {
                *composition = composition.clone().with_text("<div>added</div>");
                composition.id().map(str::to_owned)
            })
            .expect("update compositions");

        assert_eq!(ids, vec![Some("comp-001".to_string())]);
        let value = bundle.to_value().expect("render bundle");
        assert_eq!(value["entry"][0]["resource"]["text"]["div"], "<div>added</div>");
        assert_eq!(value["entry"][0]["fullUrl"], "urn:uuid:comp-001");
        assert!(value["entry"][1]["resource"].get("text").is_none());
    }
}
