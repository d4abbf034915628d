//! Constants used throughout the ePI core crate.
//!
//! Tag lists are configuration data: they seed [`crate::config::OptimizerConfig::default`] and
//! are not inferred from the markup.

/// Tags eligible for removal when they carry no attributes, no text and no element children.
pub const STRUCTURAL_TAGS: &[&str] = &["span", "div", "p", "em", "strong", "i", "b", "u"];

/// Tags eligible for same-tag nesting collapse.
pub const MERGEABLE_TAGS: &[&str] = &["p", "div", "span", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Upper bound on collapse passes over one fragment.
pub const MAX_COLLAPSE_ITERATIONS: usize = 10;

/// Attribute holding the class token list.
pub const CLASS_ATTRIBUTE: &str = "class";

/// Inline style attribute stripped by the allow-list cleaner.
pub const STYLE_ATTRIBUTE: &str = "style";

/// Environment variable toggling the tree-optimization pass.
pub const ENABLE_HTML_OPTIMIZATION_ENV: &str = "ENABLE_HTML_OPTIMIZATION";

/// Environment variable toggling the annotation-reconciliation pass.
pub const ENABLE_LINK_CLEANUP_ENV: &str = "ENABLE_LINK_CLEANUP";

/// Environment variable toggling the style/class allow-list pass.
pub const ENABLE_STYLE_CLEANUP_ENV: &str = "ENABLE_STYLE_CLEANUP";

/// Default listen address of the REST service.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:8080";
