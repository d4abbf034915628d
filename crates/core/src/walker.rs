//! Per-document preprocessing.
//!
//! Every Composition in a bundle is processed in three feature-gated steps:
//! 1. each narrative fragment is optimized, keeping the original when the integrity check
//!    fails;
//! 2. annotations whose class no longer appears anywhere in the narrative are removed;
//! 3. inline styles and classes without an annotation are stripped from every fragment.
//!
//! Fragment-level failures are local: the fragment keeps its previous content and the
//! document is still returned.

use crate::classes::extract_classes_from_all;
use crate::config::PreprocessConfig;
use crate::links::{cleanup_unused_links, LinkCleanupStats, LinkUsageAnalysis};
use crate::optimizer::optimize_fragment_checked;
use crate::style_cleanup::cleanup_fragment;
use crate::{PreprocessError, PreprocessResult};
use fhir::{Composition, EpiBundle, HtmlElementLinkStore, Section};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

// ============================================================================
// Fragment traversal
// ============================================================================

/// A narrative fragment of a Composition, borrowed for in-place rewriting.
#[derive(Debug)]
pub struct FragmentSlot<'a> {
    /// Where the fragment lives, e.g. `text` or `section[0].section[2].text`.
    pub location: String,
    pub div: &'a mut String,
}

/// Every narrative fragment of `composition`, depth-first and pre-order: the Composition's
/// own text first, then each section's text before its sub-sections.
pub fn composition_fragments_mut(composition: &mut Composition) -> Vec<FragmentSlot<'_>> {
    let mut slots = Vec::new();
    if let Some(div) = composition.text.as_mut().and_then(|text| text.div.as_mut()) {
        slots.push(FragmentSlot {
            location: "text".into(),
            div,
        });
    }
    collect_section_slots(&mut composition.section, "", &mut slots);
    slots
}

fn collect_section_slots<'a>(
    sections: &'a mut [Section],
    prefix: &str,
    slots: &mut Vec<FragmentSlot<'a>>,
) {
    for (index, section) in sections.iter_mut().enumerate() {
        let path = format!("{prefix}section[{index}]");
        let Section {
            text,
            section: children,
            ..
        } = section;
        if let Some(div) = text.as_mut().and_then(|text| text.div.as_mut()) {
            slots.push(FragmentSlot {
                location: format!("{path}.text"),
                div,
            });
        }
        collect_section_slots(children, &format!("{path}."), slots);
    }
}

/// Read-only view of [`composition_fragments_mut`]: `(location, markup)` pairs.
pub fn composition_fragments(composition: &Composition) -> Vec<(String, &str)> {
    let mut fragments = Vec::new();
    if let Some(div) = composition.text.as_ref().and_then(|text| text.div.as_deref()) {
        fragments.push(("text".to_owned(), div));
    }
    collect_section_fragments(&composition.section, "", &mut fragments);
    fragments
}

fn collect_section_fragments<'a>(
    sections: &'a [Section],
    prefix: &str,
    fragments: &mut Vec<(String, &'a str)>,
) {
    for (index, section) in sections.iter().enumerate() {
        let path = format!("{prefix}section[{index}]");
        if let Some(div) = section.text.as_ref().and_then(|text| text.div.as_deref()) {
            fragments.push((format!("{path}.text"), div));
        }
        collect_section_fragments(&section.section, &format!("{path}."), fragments);
    }
}

/// Class tokens used anywhere in the Composition's narrative.
pub fn composition_class_usage(composition: &Composition) -> BTreeSet<String> {
    extract_classes_from_all(
        composition_fragments(composition)
            .into_iter()
            .map(|(_, div)| div),
    )
}

/// Compare the Composition's annotations with the classes its narrative uses.
pub fn analyze_link_usage(composition: &Composition) -> LinkUsageAnalysis {
    LinkUsageAnalysis::new(composition, composition_class_usage(composition))
}

// ============================================================================
// Reports
// ============================================================================

/// What preprocessing did to one Composition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompositionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Narrative fragments visited.
    pub fragments: usize,
    /// Fragments replaced by their optimized form.
    pub optimized: usize,
    /// Fragments whose optimized form was rejected by the integrity check.
    pub validation_failures: usize,
    /// Narrative size before any step ran.
    pub bytes_before: usize,
    /// Narrative size after every enabled step ran.
    pub bytes_after: usize,
    /// Classes in use after optimization; the input of link cleanup.
    pub classes_in_use: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_cleanup: Option<LinkCleanupStats>,
    /// Fragments rewritten by style cleanup.
    pub style_cleaned: usize,
}

/// What preprocessing did to a whole bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessReport {
    pub compositions: Vec<CompositionReport>,
}

impl PreprocessReport {
    pub fn total_fragments(&self) -> usize {
        self.compositions.iter().map(|c| c.fragments).sum()
    }

    pub fn total_optimized(&self) -> usize {
        self.compositions.iter().map(|c| c.optimized).sum()
    }

    pub fn total_validation_failures(&self) -> usize {
        self.compositions.iter().map(|c| c.validation_failures).sum()
    }

    pub fn total_links_removed(&self) -> usize {
        self.compositions
            .iter()
            .filter_map(|c| c.link_cleanup)
            .map(|stats| stats.removed)
            .sum()
    }

    pub fn bytes_saved(&self) -> usize {
        self.compositions
            .iter()
            .map(|c| c.bytes_before.saturating_sub(c.bytes_after))
            .sum()
    }

    /// Pretty-printed JSON for reporting tools.
    pub fn to_json(&self) -> PreprocessResult<String> {
        serde_json::to_string_pretty(self).map_err(PreprocessError::Serialization)
    }
}

// ============================================================================
// Processing
// ============================================================================

/// Run every enabled step over one Composition, in place.
pub fn preprocess_composition(
    composition: &mut Composition,
    config: &PreprocessConfig,
) -> CompositionReport {
    let mut report = CompositionReport {
        id: composition.id().map(str::to_owned),
        ..Default::default()
    };

    {
        let slots = composition_fragments_mut(composition);
        report.fragments = slots.len();
        report.bytes_before = slots.iter().map(|slot| slot.div.len()).sum();

        if config.html_optimization {
            for slot in slots {
                let outcome = optimize_fragment_checked(slot.div, &config.optimizer);
                if !outcome.accepted {
                    report.validation_failures += 1;
                    tracing::warn!(
                        location = %slot.location,
                        "optimized fragment failed integrity validation; original kept"
                    );
                } else if outcome.changed() {
                    tracing::debug!(
                        location = %slot.location,
                        bytes_before = outcome.bytes_before,
                        bytes_after = outcome.bytes_after,
                        "fragment optimized"
                    );
                    *slot.div = outcome.html;
                    report.optimized += 1;
                }
            }
        }
    }

    report.classes_in_use = composition_class_usage(composition);

    if config.link_cleanup {
        report.link_cleanup = Some(cleanup_unused_links(composition, &report.classes_in_use));
    }

    if config.style_cleanup {
        let allowed: BTreeSet<String> = composition.element_classes().into_iter().collect();
        for slot in composition_fragments_mut(composition) {
            if let Some(cleaned) = cleanup_fragment(slot.div, &allowed) {
                tracing::debug!(location = %slot.location, "styles and classes cleaned");
                *slot.div = cleaned;
                report.style_cleaned += 1;
            }
        }
    }

    report.bytes_after = composition_fragments(composition)
        .iter()
        .map(|(_, div)| div.len())
        .sum();

    tracing::info!(
        composition = report.id.as_deref().unwrap_or("<no id>"),
        fragments = report.fragments,
        optimized = report.optimized,
        validation_failures = report.validation_failures,
        links_removed = report.link_cleanup.map_or(0, |stats| stats.removed),
        style_cleaned = report.style_cleaned,
        bytes_before = report.bytes_before,
        bytes_after = report.bytes_after,
        "composition preprocessed"
    );

    report
}

/// Preprocess every Composition of an ePI bundle, in place.
///
/// # Errors
///
/// Returns [`PreprocessError::Fhir`] if a Composition entry does not have the expected shape.
pub fn preprocess_bundle(
    bundle: &mut EpiBundle,
    config: &PreprocessConfig,
) -> PreprocessResult<PreprocessReport> {
    let compositions =
        bundle.update_compositions(|composition| preprocess_composition(composition, config))?;
    if compositions.is_empty() {
        tracing::debug!("bundle has no Composition entries; returned unchanged");
    }
    Ok(PreprocessReport { compositions })
}

/// Validate and preprocess a bundle given as a JSON value.
///
/// # Errors
///
/// Returns [`PreprocessError::Fhir`] if the value is not a document Bundle or a Composition
/// has the wrong shape.
pub fn preprocess_bundle_value(
    value: Value,
    config: &PreprocessConfig,
) -> PreprocessResult<(Value, PreprocessReport)> {
    let mut bundle = EpiBundle::from_value(value)?;
    let report = preprocess_bundle(&mut bundle, config)?;
    Ok((bundle.to_value()?, report))
}

/// Validate and preprocess a bundle given as JSON text, returning the rendered bundle.
///
/// # Errors
///
/// See [`preprocess_bundle_value`]; invalid JSON is reported as [`PreprocessError::Fhir`].
pub fn preprocess_bundle_json(
    json_text: &str,
    config: &PreprocessConfig,
) -> PreprocessResult<(String, PreprocessReport)> {
    let mut bundle = EpiBundle::parse(json_text)?;
    let report = preprocess_bundle(&mut bundle, config)?;
    Ok((bundle.render()?, report))
}
