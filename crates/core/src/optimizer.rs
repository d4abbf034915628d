//! Narrative markup optimization.
//!
//! Two in-place rewrites, each run to a fixed point:
//! - **pruning** removes structural elements that carry nothing: no attributes, no element
//!   children and no non-whitespace text;
//! - **collapsing** merges redundant same-tag structure: an element whose only
//!   non-whitespace child is an element of the same tag, and an empty element immediately
//!   followed by a same-tag sibling. Attributes are unioned; the surviving (inner or
//!   following) element's values win on conflict.
//!
//! The optimized markup is only accepted when its visible text is identical to the
//! original's (see [`crate::integrity`]).

use crate::config::OptimizerConfig;
use crate::html::{Element, Fragment, Node};
use crate::integrity::validate_content_integrity;

/// Result of optimizing one fragment behind the integrity gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizationOutcome {
    /// Markup to store: the optimized fragment when accepted, otherwise the original.
    pub html: String,
    /// False when the optimized markup failed the integrity check and was discarded.
    pub accepted: bool,
    pub pruned: usize,
    pub merged: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
}

impl OptimizationOutcome {
    /// True if the stored markup was rewritten.
    pub fn changed(&self) -> bool {
        self.accepted && self.pruned + self.merged > 0
    }
}

/// Remove empty structural elements until a pass removes nothing.
///
/// Returns the number of elements removed.
pub fn prune_empty_tags(fragment: &mut Fragment, config: &OptimizerConfig) -> usize {
    let mut total = 0;
    loop {
        let removed = prune_children(&mut fragment.children, config);
        if removed == 0 {
            return total;
        }
        total += removed;
    }
}

/// Collapse same-tag nesting until a pass merges nothing or the pass cap is reached.
///
/// Returns the number of merges performed.
pub fn collapse_nested_tags(fragment: &mut Fragment, config: &OptimizerConfig) -> usize {
    collapse_with_passes(fragment, config).0
}

/// Returns `(merges, passes run)`.
fn collapse_with_passes(fragment: &mut Fragment, config: &OptimizerConfig) -> (usize, usize) {
    let mut total = 0;
    for pass in 1..=config.max_collapse_iterations() {
        let merged = collapse_children(&mut fragment.children, config);
        total += merged;
        if merged == 0 {
            return (total, pass);
        }
        if pass == config.max_collapse_iterations() {
            tracing::debug!(
                passes = pass,
                merges = total,
                "collapse pass cap reached before a fixed point"
            );
        }
    }
    (total, config.max_collapse_iterations())
}

/// Prune then collapse a markup string and serialize the result.
///
/// Empty or whitespace-only input is returned unchanged.
pub fn optimize_html(html: &str, config: &OptimizerConfig) -> String {
    if html.trim().is_empty() {
        return html.to_owned();
    }
    let (fragment, _, _) = optimize_tree(html, config);
    fragment.to_html()
}

/// Optimize a markup string and gate the result on the integrity check.
///
/// When nothing was pruned or merged the original markup is kept verbatim, so unchanged
/// fragments are never rewritten by serialization alone.
pub fn optimize_fragment_checked(html: &str, config: &OptimizerConfig) -> OptimizationOutcome {
    let unchanged = |accepted: bool, pruned: usize, merged: usize| OptimizationOutcome {
        html: html.to_owned(),
        accepted,
        pruned,
        merged,
        bytes_before: html.len(),
        bytes_after: html.len(),
    };

    if html.trim().is_empty() {
        return unchanged(true, 0, 0);
    }

    let (fragment, pruned, merged) = optimize_tree(html, config);
    if pruned + merged == 0 {
        return unchanged(true, 0, 0);
    }

    let optimized = fragment.to_html();
    if !validate_content_integrity(html, &optimized) {
        tracing::warn!(
            pruned,
            merged,
            "optimized markup changed the visible text; keeping the original"
        );
        return unchanged(false, pruned, merged);
    }

    OptimizationOutcome {
        bytes_after: optimized.len(),
        html: optimized,
        accepted: true,
        pruned,
        merged,
        bytes_before: html.len(),
    }
}

fn optimize_tree(html: &str, config: &OptimizerConfig) -> (Fragment, usize, usize) {
    let mut fragment = Fragment::parse(html);
    let pruned = prune_empty_tags(&mut fragment, config);
    let merged = collapse_nested_tags(&mut fragment, config);
    (fragment, pruned, merged)
}

// ============================================================================
// Pruning
// ============================================================================

fn prune_children(children: &mut Vec<Node>, config: &OptimizerConfig) -> usize {
    let mut removed = 0;
    for child in children.iter_mut() {
        if let Node::Element(element) = child {
            removed += prune_children(&mut element.children, config);
        }
    }

    let before = children.len();
    children.retain(|child| !is_prunable(child, config));
    removed + (before - children.len())
}

fn is_prunable(node: &Node, config: &OptimizerConfig) -> bool {
    match node {
        Node::Element(element) => {
            config.is_structural(&element.name)
                && !element.has_attributes()
                && element.is_effectively_empty()
        }
        _ => false,
    }
}

// ============================================================================
// Collapsing
// ============================================================================

/// One collapse pass over a sibling list, children first.
fn collapse_children(children: &mut Vec<Node>, config: &OptimizerConfig) -> usize {
    let mut merged = 0;
    for child in children.iter_mut() {
        if let Node::Element(element) = child {
            merged += collapse_children(&mut element.children, config);
        }
    }

    for child in children.iter_mut() {
        if collapse_into_sole_child(child, config) {
            merged += 1;
        }
    }

    let mut index = 0;
    while index < children.len() {
        match same_tag_following_sibling(children, index, config) {
            Some(target) => {
                let empty = children.remove(index);
                if let (Node::Element(empty), Node::Element(sibling)) =
                    (&empty, &mut children[target - 1])
                {
                    sibling.merge_attributes_from(empty);
                }
                merged += 1;
            }
            None => index += 1,
        }
    }

    merged
}

/// Replace `node` by its only non-whitespace child when that child has the same tag.
fn collapse_into_sole_child(node: &mut Node, config: &OptimizerConfig) -> bool {
    let Node::Element(outer) = node else {
        return false;
    };
    if !config.is_mergeable(&outer.name) {
        return false;
    }
    let Some(index) = sole_same_tag_child(outer) else {
        return false;
    };

    match outer.children.remove(index) {
        Node::Element(mut inner) => {
            inner.merge_attributes_from(outer);
            *node = Node::Element(inner);
            true
        }
        other => {
            outer.children.insert(index, other);
            false
        }
    }
}

fn sole_same_tag_child(outer: &Element) -> Option<usize> {
    let mut significant = outer
        .children
        .iter()
        .enumerate()
        .filter(|(_, child)| !child.is_whitespace_text());

    let (index, only) = significant.next()?;
    if significant.next().is_some() {
        return None;
    }
    match only {
        Node::Element(inner) if inner.name == outer.name => Some(index),
        _ => None,
    }
}

/// Index of the same-tag sibling an effectively empty element at `index` merges into.
fn same_tag_following_sibling(
    children: &[Node],
    index: usize,
    config: &OptimizerConfig,
) -> Option<usize> {
    let Node::Element(element) = &children[index] else {
        return None;
    };
    if !config.is_mergeable(&element.name) || !element.is_effectively_empty() {
        return None;
    }

    let offset = children[index + 1..]
        .iter()
        .position(|child| !child.is_whitespace_text())?;
    let target = index + 1 + offset;
    match &children[target] {
        Node::Element(sibling) if sibling.name == element.name => Some(target),
        _ => None,
    }
}
