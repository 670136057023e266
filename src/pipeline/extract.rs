//! Content extraction: isolate the main-content subtree of a page.
//!
//! Exported wiki pages wrap the article in navigation, breadcrumbs, and a
//! trailer of likes, labels, and comments. The extractor keeps only the
//! content container and cuts it at the first trailer element, so none of
//! that chrome reaches the Markdown.
//!
//! Truncation is structural: the trailer and everything after it *in
//! document order* inside the container is removed, including later siblings
//! of each of the trailer's ancestors up to the container.

use crate::config::{ConversionConfig, FallbackPolicy, IdPattern};
use crate::error::Html2MdError;
use crate::pipeline::dom;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::rc::Rc;
use tracing::{debug, warn};

/// The subtree that the rest of the pipeline converts.
pub struct Fragment {
    // Owns the parsed tree. Dropping an `RcDom` empties every node in it,
    // so it must live as long as `root`.
    _dom: RcDom,
    root: Handle,
    /// Text of the document's `<title>` element, whitespace-collapsed.
    pub document_title: Option<String>,
    /// The container was missing and the whole `<body>` was used instead.
    pub used_fallback: bool,
    /// A trailer element was found and the content cut before it.
    pub truncated: bool,
}

impl Fragment {
    /// Root node of the fragment (the container, or `<body>` on fallback).
    pub fn root(&self) -> &Handle {
        &self.root
    }

    /// Serialize the fragment back to HTML.
    pub fn to_html(&self) -> String {
        dom::to_html(&self.root)
    }
}

/// Parse `html` and extract the content fragment.
///
/// # Errors
/// [`Html2MdError::NoContentFound`] when no element matches the content
/// pattern and the fallback policy is [`FallbackPolicy::Fail`].
pub fn extract(html: &str, config: &ConversionConfig) -> Result<Fragment, Html2MdError> {
    let dom = dom::parse(html);

    let document_title = dom::find_descendant(&dom.document, &|n| dom::is_element(n, "title"))
        .map(|t| collapse_whitespace(&dom::text_content(&t)))
        .filter(|t| !t.is_empty());

    // The container is searched in <body> only: <head> carries ids such as
    // `content-language` that would match a prefix pattern.
    let body = dom::find_descendant(&dom.document, &|n| dom::is_element(n, "body"))
        .unwrap_or_else(|| dom.document.clone());
    let container = Some(body.clone())
        .filter(|b| has_id(b, &config.content_container))
        .or_else(|| find_by_id(&body, &config.content_container));
    let (root, used_fallback) = match container {
        Some(node) => {
            debug!("Content container {} found", config.content_container);
            (node, false)
        }
        None => match config.fallback {
            FallbackPolicy::Fail => {
                return Err(Html2MdError::NoContentFound {
                    pattern: config.content_container.to_string(),
                })
            }
            FallbackPolicy::WholeBody => {
                warn!(
                    "No content container {} found; converting the whole <body>",
                    config.content_container
                );
                (body, true)
            }
        },
    };

    let truncated = match config.trailer {
        Some(ref trailer) => truncate_at(&root, trailer),
        None => false,
    };
    if truncated {
        debug!("Content truncated at trailer {:?}", config.trailer);
    }

    Ok(Fragment {
        _dom: dom,
        root,
        document_title,
        used_fallback,
        truncated,
    })
}

/// First element below `root` whose `id` matches `pattern`.
fn find_by_id(root: &Handle, pattern: &IdPattern) -> Option<Handle> {
    dom::find_descendant(root, &|n| has_id(n, pattern))
}

fn has_id(node: &Handle, pattern: &IdPattern) -> bool {
    matches!(node.data, NodeData::Element { .. })
        && dom::attr(node, "id").is_some_and(|id| pattern.matches(&id))
}

/// Cut `root` at the first descendant matching `trailer`.
///
/// Returns whether a trailer was found.
fn truncate_at(root: &Handle, trailer: &IdPattern) -> bool {
    let Some(mark) = find_by_id(root, trailer) else {
        return false;
    };
    let Some(mut parent) = dom::detach_from(&mark) else {
        return true;
    };
    // Each ancestor keeps what precedes the trailer but loses its later siblings.
    while !Rc::ptr_eq(&parent, root) {
        remove_following_siblings(&parent);
        match dom::parent(&parent) {
            Some(p) => parent = p,
            None => break,
        }
    }
    true
}

fn remove_following_siblings(node: &Handle) {
    let Some(parent) = dom::parent(node) else {
        return;
    };
    let removed: Vec<Handle> = {
        let mut siblings = parent.children.borrow_mut();
        match siblings.iter().position(|c| Rc::ptr_eq(c, node)) {
            Some(idx) => siblings.drain(idx + 1..).collect(),
            None => return,
        }
    };
    for r in removed {
        r.parent.set(None);
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
