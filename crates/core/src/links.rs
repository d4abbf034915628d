//! Reconciling `HtmlElementLink` annotations with the classes used in the narrative.

use fhir::HtmlElementLinkStore;
use serde::Serialize;
use std::collections::BTreeSet;

/// Counts reported by [`cleanup_unused_links`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LinkCleanupStats {
    pub total: usize,
    pub removed: usize,
    pub kept: usize,
}

/// Remove every annotation whose class does not appear in `used_classes`.
///
/// Removal is best effort: a failure for one class is logged and the remaining classes are
/// still processed. The counts reflect what was actually removed. Annotations without a
/// class are never removed.
pub fn cleanup_unused_links<S>(store: &mut S, used_classes: &BTreeSet<String>) -> LinkCleanupStats
where
    S: HtmlElementLinkStore + ?Sized,
{
    let total = store.list_links().len();
    let unused: BTreeSet<String> = store
        .element_classes()
        .into_iter()
        .filter(|class| !used_classes.contains(class))
        .collect();

    for class in &unused {
        match store.remove_link(class) {
            Ok(true) => tracing::debug!(element_class = %class, "removed unused HtmlElementLink"),
            Ok(false) => {}
            Err(err) => tracing::warn!(
                element_class = %class,
                error = %err,
                "failed to remove unused HtmlElementLink"
            ),
        }
    }

    let kept = store.list_links().len();
    LinkCleanupStats {
        total,
        removed: total.saturating_sub(kept),
        kept,
    }
}

/// How a resource's annotations line up with the classes its narrative uses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LinkUsageAnalysis {
    /// Classes found in the narrative.
    pub html_classes: BTreeSet<String>,
    /// Classes that carry an annotation.
    pub extension_classes: BTreeSet<String>,
    /// Annotated classes that appear in the narrative.
    pub used_classes: BTreeSet<String>,
    /// Annotated classes missing from the narrative; these are what cleanup removes.
    pub unused_extension_classes: BTreeSet<String>,
    /// Narrative classes with no annotation.
    pub unlinked_html_classes: BTreeSet<String>,
}

impl LinkUsageAnalysis {
    pub fn new<S>(store: &S, html_classes: BTreeSet<String>) -> Self
    where
        S: HtmlElementLinkStore + ?Sized,
    {
        let extension_classes: BTreeSet<String> = store.element_classes().into_iter().collect();
        Self {
            used_classes: extension_classes
                .intersection(&html_classes)
                .cloned()
                .collect(),
            unused_extension_classes: extension_classes
                .difference(&html_classes)
                .cloned()
                .collect(),
            unlinked_html_classes: html_classes
                .difference(&extension_classes)
                .cloned()
                .collect(),
            html_classes,
            extension_classes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::{CodeableReference, Coding, Composition, FhirError, FhirResult};
    use serde_json::Value;

    fn concept(code: &str) -> CodeableReference {
        CodeableReference::new(vec![Coding::new(
            Some("http://snomed.info/sct"),
            Some(code),
            None,
        )])
    }

    fn composition_with(classes: &[&str]) -> Composition {
        let mut composition = Composition::new();
        for (i, class) in classes.iter().enumerate() {
            composition
                .add_link(class, concept(&i.to_string()), false)
                .expect("valid link");
        }
        composition
    }

    fn used(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn removes_links_whose_class_is_unused() {
        let mut composition = composition_with(&["a", "b"]);

        let stats = cleanup_unused_links(&mut composition, &used(&["a"]));

        assert_eq!(
            stats,
            LinkCleanupStats {
                total: 2,
                removed: 1,
                kept: 1
            }
        );
        assert!(composition.get_link("a").is_some());
        assert!(composition.get_link("b").is_none());
    }

    #[test]
    fn remaining_links_are_all_in_use() {
        let mut composition = composition_with(&["pregnancy", "liver", "kidney", "driving"]);
        let in_use = used(&["liver", "driving", "unannotated"]);

        cleanup_unused_links(&mut composition, &in_use);

        let remaining: BTreeSet<String> = composition.element_classes().into_iter().collect();
        assert!(remaining.is_subset(&in_use));
        assert_eq!(remaining, used(&["driving", "liver"]));
    }

    #[test]
    fn nothing_to_remove_is_not_an_error() {
        let mut composition = composition_with(&["a"]);
        let stats = cleanup_unused_links(&mut composition, &used(&["a", "b"]));
        assert_eq!(stats.removed, 0);
        assert_eq!(stats.kept, 1);

        let mut empty = Composition::new();
        assert_eq!(
            cleanup_unused_links(&mut empty, &used(&[])),
            LinkCleanupStats::default()
        );
    }

    #[test]
    fn duplicate_keys_are_counted_per_link() {
        let mut composition = composition_with(&["a", "b"]);
        let duplicate = fhir::HtmlElementLink::new("b", concept("9")).to_extension();
        composition.extension.push(duplicate);

        let stats = cleanup_unused_links(&mut composition, &used(&["a"]));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.removed, 2);
        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn removes_unused_whitespace_key() {
        let mut composition = composition_with(&["a"]);
        composition
            .extension
            .push(fhir::HtmlElementLink::new(" ", concept("1")).to_extension());

        let stats = cleanup_unused_links(&mut composition, &used(&["a"]));

        assert_eq!(stats.removed, 1);
        assert_eq!(composition.element_classes(), vec!["a"]);
        assert!(composition.get_link(" ").is_none());
    }

    #[test]
    fn leaves_other_extensions_alone() {
        let mut composition = composition_with(&["a"]);
        composition
            .extension
            .push(serde_json::json!({"url": "http://example.org/other", "valueString": "x"}));

        cleanup_unused_links(&mut composition, &used(&[]));

        assert_eq!(composition.extension.len(), 1);
        assert_eq!(composition.extension[0]["url"], "http://example.org/other");
    }

    struct FlakyStore {
        extension: Vec<Value>,
        failing_class: &'static str,
    }

    impl HtmlElementLinkStore for FlakyStore {
        fn extensions(&self) -> &[Value] {
            &self.extension
        }

        fn extensions_mut(&mut self) -> &mut Vec<Value> {
            &mut self.extension
        }

        fn remove_link(&mut self, element_class: &str) -> FhirResult<bool> {
            if element_class == self.failing_class {
                return Err(FhirError::Translation("store unavailable".into()));
            }
            let before = self.extension.len();
            self.extension.retain(|ext| {
                fhir::HtmlElementLink::from_extension(ext)
                    .map_or(true, |link| link.element_class.as_deref() != Some(element_class))
            });
            Ok(self.extension.len() < before)
        }
    }

    #[test]
    fn a_failed_removal_does_not_stop_the_others() {
        let mut store = FlakyStore {
            extension: Vec::new(),
            failing_class: "b",
        };
        for class in ["a", "b", "c"] {
            store.add_link(class, concept(class), false).expect("valid link");
        }

        let stats = cleanup_unused_links(&mut store, &used(&["a"]));

        assert_eq!(
            stats,
            LinkCleanupStats {
                total: 3,
                removed: 1,
                kept: 2
            }
        );
        assert!(store.get_link("b").is_some());
        assert!(store.get_link("c").is_none());
    }

    #[test]
    fn analysis_partitions_classes() {
        let composition = composition_with(&["a", "b"]);
        let analysis = LinkUsageAnalysis::new(&composition, used(&["a", "c"]));

        assert_eq!(analysis.extension_classes, used(&["a", "b"]));
        assert_eq!(analysis.used_classes, used(&["a"]));
        assert_eq!(analysis.unused_extension_classes, used(&["b"]));
        assert_eq!(analysis.unlinked_html_classes, used(&["c"]));
    }
}
