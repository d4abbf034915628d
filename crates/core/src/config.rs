//! Preprocessing settings.
//!
//! [`OptimizerConfig`] holds the tag lists and collapse pass cap used by the markup
//! optimizer. [`PreprocessConfig`] adds the per-step switches. The binaries build them from
//! environment values and pass them into every call.

use crate::constants::{MAX_COLLAPSE_ITERATIONS, MERGEABLE_TAGS, STRUCTURAL_TAGS};
use crate::{PreprocessError, PreprocessResult};
use std::collections::BTreeSet;

/// Tag lists and bounds used by the tree optimizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizerConfig {
    structural_tags: BTreeSet<String>,
    mergeable_tags: BTreeSet<String>,
    max_collapse_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            structural_tags: STRUCTURAL_TAGS.iter().map(|t| t.to_string()).collect(),
            mergeable_tags: MERGEABLE_TAGS.iter().map(|t| t.to_string()).collect(),
            max_collapse_iterations: MAX_COLLAPSE_ITERATIONS,
        }
    }
}

impl OptimizerConfig {
    /// Create a new `OptimizerConfig`.
    ///
    /// Tag names are matched case-insensitively, so they are stored lower-cased.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessError::InvalidInput` if a tag name is empty or
    /// `max_collapse_iterations` is zero.
    pub fn new<S: AsRef<str>>(
        structural_tags: &[S],
        mergeable_tags: &[S],
        max_collapse_iterations: usize,
    ) -> PreprocessResult<Self> {
        if max_collapse_iterations == 0 {
            return Err(PreprocessError::InvalidInput(
                "max_collapse_iterations must be at least 1".into(),
            ));
        }

        Ok(Self {
            structural_tags: normalise_tags(structural_tags)?,
            mergeable_tags: normalise_tags(mergeable_tags)?,
            max_collapse_iterations,
        })
    }

    pub fn is_structural(&self, tag: &str) -> bool {
        self.structural_tags.contains(tag)
    }

    pub fn is_mergeable(&self, tag: &str) -> bool {
        self.mergeable_tags.contains(tag)
    }

    pub fn structural_tags(&self) -> &BTreeSet<String> {
        &self.structural_tags
    }

    pub fn mergeable_tags(&self) -> &BTreeSet<String> {
        &self.mergeable_tags
    }

    pub fn max_collapse_iterations(&self) -> usize {
        self.max_collapse_iterations
    }
}

fn normalise_tags<S: AsRef<str>>(tags: &[S]) -> PreprocessResult<BTreeSet<String>> {
    tags.iter()
        .map(|tag| {
            let tag = tag.as_ref().trim();
            if tag.is_empty() {
                return Err(PreprocessError::InvalidInput(
                    "tag names cannot be empty".into(),
                ));
            }
            Ok(tag.to_ascii_lowercase())
        })
        .collect()
}

/// Which preprocessing passes run, plus the optimizer settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreprocessConfig {
    /// Prune and collapse narrative markup (gated by the integrity check).
    pub html_optimization: bool,
    /// Remove `HtmlElementLink`s whose class no longer appears in the narrative.
    pub link_cleanup: bool,
    /// Strip inline styles and classes not referenced by any `HtmlElementLink`.
    pub style_cleanup: bool,
    pub optimizer: OptimizerConfig,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            html_optimization: true,
            link_cleanup: true,
            style_cleanup: true,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl PreprocessConfig {
    /// A configuration with every pass disabled; documents pass through unchanged.
    pub fn passthrough() -> Self {
        Self {
            html_optimization: false,
            link_cleanup: false,
            style_cleanup: false,
            optimizer: OptimizerConfig::default(),
        }
    }

    /// Build the configuration from raw (optional) environment values.
    ///
    /// Each pass defaults to enabled when its value is absent.
    pub fn from_env_values(
        html_optimization: Option<String>,
        link_cleanup: Option<String>,
        style_cleanup: Option<String>,
    ) -> Self {
        Self {
            html_optimization: feature_flag_from_env_value(html_optimization, true),
            link_cleanup: feature_flag_from_env_value(link_cleanup, true),
            style_cleanup: feature_flag_from_env_value(style_cleanup, true),
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// Parse a feature flag from an optional string value.
///
/// If `value` is `None`, returns `default`. Otherwise the flag is enabled only for `true`,
/// `1`, `yes` or `on` (case-insensitive, surrounding whitespace ignored); any other value,
/// including the empty string, disables it.
pub fn feature_flag_from_env_value(value: Option<String>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
    }
}
