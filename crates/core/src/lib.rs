//! # ePI Core
//!
//! Core preprocessing logic for electronic product information (ePI) documents.
//!
//! This crate contains pure, synchronous document operations:
//! - narrative markup optimization (empty-tag pruning and same-tag nesting collapse), gated
//!   by a visible-text integrity check
//! - class usage extraction across a Composition's narrative
//! - reconciliation of `HtmlElementLink` annotations with the classes still in use
//! - removal of inline styles and of classes that carry no annotation
//!
//! **No API concerns**: HTTP servers, environment loading and CLI handling belong in
//! `api-rest`, the `epi-run` binary and `epi-cli`. Configuration arrives here as an explicit
//! [`PreprocessConfig`] value.

pub mod classes;
pub mod config;
pub mod constants;
mod error;
pub mod html;
pub mod integrity;
pub mod links;
pub mod optimizer;
pub mod style_cleanup;
pub mod walker;

pub use classes::{extract_classes_from_all, extract_html_classes};
pub use config::{feature_flag_from_env_value, OptimizerConfig, PreprocessConfig};
pub use error::{PreprocessError, PreprocessResult};
pub use integrity::{extract_text_content, validate_content_integrity};
pub use links::{cleanup_unused_links, LinkCleanupStats, LinkUsageAnalysis};
pub use optimizer::{
    collapse_nested_tags, optimize_fragment_checked, optimize_html, prune_empty_tags,
    OptimizationOutcome,
};
pub use style_cleanup::{cleanup_fragment, cleanup_html_styles_and_classes};
pub use walker::{
    analyze_link_usage, composition_class_usage, composition_fragments,
    composition_fragments_mut, preprocess_bundle, preprocess_bundle_json,
    preprocess_bundle_value, preprocess_composition, CompositionReport, FragmentSlot,
    PreprocessReport,
};
