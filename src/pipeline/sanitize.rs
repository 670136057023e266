//! Sanitization: strip presentation, scripting, and binary payloads.
//!
//! The sanitizer is an ordered list of [`SanitizeRule`]s walked over the
//! fragment tree. Each rule looks at one element and returns a [`Verdict`];
//! the first rule that asks for removal wins and the element goes with its
//! whole subtree, so a `<script>` inside a diagram container is gone whichever
//! rule claims it first.
//!
//! Rules are structural predicates over the parsed tree, never regex surgery
//! on markup, so they cannot be fooled by attribute order, quoting, or case.

use crate::pipeline::dom;
use crate::pipeline::extract::Fragment;
use markup5ever_rcdom::{Handle, NodeData};
use std::collections::BTreeMap;
use tracing::debug;

/// What a rule wants done with an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Leave the element alone.
    Keep,
    /// The rule mutated the element in place (e.g. dropped an attribute).
    Scrubbed,
    /// Remove the element and its subtree.
    Remove,
}

/// One independent sanitization rule.
pub trait SanitizeRule: Send + Sync {
    /// Short stable name, used in the [`SanitizeReport`].
    fn name(&self) -> &'static str;

    /// Inspect (and optionally mutate) a single element.
    fn visit(&self, node: &Handle) -> Verdict;
}

/// Per-rule counts of what a sanitizer run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub removed: BTreeMap<&'static str, usize>,
    pub scrubbed: BTreeMap<&'static str, usize>,
}

impl SanitizeReport {
    /// Total number of subtrees removed.
    pub fn nodes_removed(&self) -> usize {
        self.removed.values().sum()
    }

    /// Total number of in-place scrubs (attributes dropped).
    pub fn attributes_scrubbed(&self) -> usize {
        self.scrubbed.values().sum()
    }
}

/// An ordered set of rules applied in a single tree walk.
pub struct Sanitizer {
    rules: Vec<Box<dyn SanitizeRule>>,
}

impl Default for Sanitizer {
    /// The standard rule set: stylesheets, inline styles, scripts, diagrams,
    /// and `data:` images.
    fn default() -> Self {
        Self::new()
            .with_rule(Stylesheets)
            .with_rule(InlineStyle)
            .with_rule(Scripts)
            .with_rule(Diagrams)
            .with_rule(DataUriImages)
    }
}

impl Sanitizer {
    /// A sanitizer with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; rules run in insertion order.
    pub fn with_rule(mut self, rule: impl SanitizeRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Names of the configured rules, in order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Sanitize the fragment in place. The fragment root itself is never
    /// removed, only its descendants.
    pub fn sanitize(&self, fragment: &Fragment) -> SanitizeReport {
        let mut report = SanitizeReport::default();
        let root = fragment.root();
        if matches!(root.data, NodeData::Element { .. }) {
            // Scrubs apply to the root; removal verdicts do not.
            let _ = self.judge(root, &mut report);
        }
        self.walk(root, &mut report);
        debug!(
            "Sanitizer removed {} node(s), scrubbed {} attribute(s): {:?}",
            report.nodes_removed(),
            report.attributes_scrubbed(),
            report.removed
        );
        report
    }

    /// Judge every descendant of `root` in document order, pruning removed
    /// subtrees before they are visited.
    fn walk(&self, root: &Handle, report: &mut SanitizeReport) {
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            let mut kept = Vec::new();
            let mut descend = Vec::new();
            let mut changed = false;
            for child in dom::children(&node) {
                if matches!(child.data, NodeData::Element { .. }) {
                    if let Some(rule) = self.judge(&child, report) {
                        *report.removed.entry(rule).or_default() += 1;
                        child.parent.set(None);
                        changed = true;
                        continue;
                    }
                    descend.push(child.clone());
                }
                kept.push(child);
            }
            if changed {
                *node.children.borrow_mut() = kept;
            }
            stack.extend(descend.into_iter().rev());
        }
    }

    /// Run every rule on `node`; returns the name of the first rule that
    /// wants it removed.
    fn judge(&self, node: &Handle, report: &mut SanitizeReport) -> Option<&'static str> {
        for rule in &self.rules {
            match rule.visit(node) {
                Verdict::Keep => {}
                Verdict::Scrubbed => *report.scrubbed.entry(rule.name()).or_default() += 1,
                Verdict::Remove => return Some(rule.name()),
            }
        }
        None
    }
}

// ── Rule: stylesheets ────────────────────────────────────────────────────────

/// `<style>` blocks and `<link rel="stylesheet">`.
pub struct Stylesheets;

impl SanitizeRule for Stylesheets {
    fn name(&self) -> &'static str {
        "stylesheets"
    }

    fn visit(&self, node: &Handle) -> Verdict {
        match dom::tag_name(node) {
            Some("style") => Verdict::Remove,
            Some("link") => {
                let is_sheet = dom::attr(node, "rel").is_some_and(|rel| {
                    rel.split_whitespace()
                        .any(|t| t.eq_ignore_ascii_case("stylesheet"))
                });
                if is_sheet {
                    Verdict::Remove
                } else {
                    Verdict::Keep
                }
            }
            _ => Verdict::Keep,
        }
    }
}

// ── Rule: inline-style ───────────────────────────────────────────────────────

/// Drops the `style` attribute from every element.
pub struct InlineStyle;

impl SanitizeRule for InlineStyle {
    fn name(&self) -> &'static str {
        "inline-style"
    }

    fn visit(&self, node: &Handle) -> Verdict {
        if dom::remove_attr(node, "style") {
            Verdict::Scrubbed
        } else {
            Verdict::Keep
        }
    }
}

// ── Rule: scripts ────────────────────────────────────────────────────────────

pub struct Scripts;

impl SanitizeRule for Scripts {
    fn name(&self) -> &'static str {
        "scripts"
    }

    fn visit(&self, node: &Handle) -> Verdict {
        if dom::is_element(node, "script") {
            Verdict::Remove
        } else {
            Verdict::Keep
        }
    }
}

// ── Rule: diagrams ───────────────────────────────────────────────────────────

const DRAWIO_ID_PREFIX: &str = "drawio-macro-content";
const DIAGRAM_CLASS_MARKER: &str = "geDiagramContainer";
const DRAWIO_WATERMARK: &str = "draw.io evaluation version";

/// draw.io macro containers, raw vector/bitmap drawing surfaces, and the
/// evaluation-licence watermark draw.io injects into exported pages.
pub struct Diagrams;

impl SanitizeRule for Diagrams {
    fn name(&self) -> &'static str {
        "diagrams"
    }

    fn visit(&self, node: &Handle) -> Verdict {
        let remove = match dom::tag_name(node) {
            Some("svg") | Some("canvas") => true,
            Some(tag) => {
                dom::attr(node, "id").is_some_and(|id| id.starts_with(DRAWIO_ID_PREFIX))
                    || dom::classes(node)
                        .iter()
                        .any(|c| c.contains(DIAGRAM_CLASS_MARKER))
                    || (tag == "span"
                        && dom::child_elements(node).is_empty()
                        && dom::text_content(node)
                            .trim()
                            .eq_ignore_ascii_case(DRAWIO_WATERMARK))
            }
            None => false,
        };
        if remove {
            Verdict::Remove
        } else {
            Verdict::Keep
        }
    }
}

// ── Rule: data-uri-images ────────────────────────────────────────────────────

/// `<img>` elements embedding their payload as a `data:` URI.
pub struct DataUriImages;

impl SanitizeRule for DataUriImages {
    fn name(&self) -> &'static str {
        "data-uri-images"
    }

    fn visit(&self, node: &Handle) -> Verdict {
        if !dom::is_element(node, "img") {
            return Verdict::Keep;
        }
        let inline = dom::attr(node, "src").is_some_and(|src| {
            src.trim_start()
                .get(..5)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
        });
        if inline {
            Verdict::Remove
        } else {
            Verdict::Keep
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::pipeline::extract::extract;

    fn sanitized(body: &str) -> (String, SanitizeReport) {
        let html = format!(r#"<html><body><div id="content">{body}</div></body></html>"#);
        let fragment = extract(&html, &ConversionConfig::default()).unwrap();
        let report = Sanitizer::default().sanitize(&fragment);
        (fragment.to_html(), report)
    }

    #[test]
    fn removes_styles_and_stylesheets() {
        let (html, report) = sanitized(
            r#"<style>p{}</style><link rel="Stylesheet" href="a.css"><link rel="canonical" href="x">
               <p style="color:red">kept</p>"#,
        );
        assert!(!html.contains("<style"));
        assert!(!html.contains("a.css"));
        assert!(html.contains("canonical"));
        assert!(!html.contains("style="));
        assert!(html.contains("kept"));
        assert_eq!(report.removed.get("stylesheets"), Some(&2));
        assert_eq!(report.attributes_scrubbed(), 1);
    }

    #[test]
    fn removes_scripts_everywhere() {
        let (html, _) = sanitized(r#"<p>a<script>alert(1)</script></p><div><div><script>x()</script></div></div>"#);
        assert!(!html.contains("script"));
        assert!(!html.contains("alert"));
    }

    #[test]
    fn removes_diagram_containers_and_drawings() {
        let (html, report) = sanitized(
            r#"<div id="drawio-macro-content-1f2e"><p>diagram label</p><script>init()</script></div>
               <div class="wrapper geDiagramContainer"><span>also diagram</span></div>
               <svg><text>vector</text></svg><canvas></canvas>
               <span>draw.io evaluation version</span>
               <p>real text</p>"#,
        );
        assert!(!html.contains("diagram label"));
        assert!(!html.contains("also diagram"));
        assert!(!html.contains("vector"));
        assert!(!html.contains("canvas"));
        assert!(!html.contains("evaluation"));
        assert!(html.contains("real text"));
        assert_eq!(report.removed.get("diagrams"), Some(&5));
        assert_eq!(report.removed.get("scripts"), None);
    }

    #[test]
    fn removes_only_data_uri_images() {
        let (html, _) = sanitized(
            r#"<img src="  DATA:image/png;base64,AAAA" alt="inline"><img src="https://x.test/a.png" alt="remote">"#,
        );
        assert!(!html.contains("inline"));
        assert!(html.contains("remote"));
    }

    #[test]
    fn custom_rule_set() {
        let sanitizer = Sanitizer::new().with_rule(Scripts);
        assert_eq!(sanitizer.rule_names(), vec!["scripts"]);
        let html = r#"<div id="content"><style>p{}</style><script></script></div>"#;
        let fragment = extract(html, &ConversionConfig::default()).unwrap();
        sanitizer.sanitize(&fragment);
        let out = fragment.to_html();
        assert!(out.contains("<style>"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn deep_nesting_is_sanitized_without_recursion() {
        let depth = 100_000;
        let body = format!(
            "{}<script>x()</script><b style=\"c\">deep</b>{}",
            "<span>".repeat(depth),
            "</span>".repeat(depth)
        );
        let html = format!(r#"<div id="content">{body}</div>"#);
        let fragment = extract(&html, &ConversionConfig::default()).unwrap();
        let report = Sanitizer::default().sanitize(&fragment);
        assert_eq!(report.removed.get("scripts"), Some(&1));
        assert_eq!(report.scrubbed.get("inline-style"), Some(&1));
        assert_eq!(dom::text_content(fragment.root()), "deep");
    }

    #[test]
    fn root_is_never_removed() {
        let html = r#"<div id="content" style="x" class="geDiagramContainer"><p>t</p></div>"#;
        let fragment = extract(html, &ConversionConfig::default()).unwrap();
        let report = Sanitizer::default().sanitize(&fragment);
        let out = fragment.to_html();
        assert!(out.contains("<p>t</p>"));
        assert!(!out.contains("style="));
        assert_eq!(report.nodes_removed(), 0);
    }
}
