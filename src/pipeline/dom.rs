//! Thin helpers over the `markup5ever_rcdom` tree.
//!
//! `html5ever` is a standards-compliant HTML5 tree builder: unclosed tags,
//! misnested inline elements, and stray end tags are repaired the way a
//! browser repairs them, so every later stage works on a well-formed tree no
//! matter how the exporting wiki or CMS mangled its markup.
//!
//! Walks in this module use an explicit stack: document depth is bounded
//! only by the input size ceiling, never by the thread's stack.

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::TreeBuilderOpts;
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::Rc;

/// Parse a full HTML document with the tolerant tree builder.
pub fn parse(html: &str) -> RcDom {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };
    parse_document(RcDom::default(), opts).one(html)
}

/// Lower-case local name of an element, `None` for text/comments/etc.
pub fn tag_name(node: &Handle) -> Option<&str> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(&*name.local),
        _ => None,
    }
}

pub fn is_element(node: &Handle, tag: &str) -> bool {
    tag_name(node) == Some(tag)
}

/// Value of attribute `name`, if present.
pub fn attr(node: &Handle, name: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Remove attribute `name`. Returns whether anything was removed.
pub fn remove_attr(node: &Handle, name: &str) -> bool {
    match node.data {
        NodeData::Element { ref attrs, .. } => {
            let mut attrs = attrs.borrow_mut();
            let before = attrs.len();
            attrs.retain(|a| &*a.name.local != name);
            attrs.len() != before
        }
        _ => false,
    }
}

/// Whitespace-separated tokens of the `class` attribute.
pub fn classes(node: &Handle) -> Vec<String> {
    attr(node, "class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

/// Snapshot of the child list, safe to iterate while the tree is mutated.
pub fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().clone()
}

/// Element children only.
pub fn child_elements(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

/// Concatenated text of every descendant text node, in document order.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    let mut stack = vec![node.clone()];
    while let Some(n) = stack.pop() {
        if let NodeData::Text { ref contents } = n.data {
            out.push_str(&contents.borrow());
        }
        stack.extend(n.children.borrow().iter().rev().cloned());
    }
    out
}

/// First descendant of `root` (document order, `root` excluded) matching `pred`.
pub fn find_descendant(root: &Handle, pred: &dyn Fn(&Handle) -> bool) -> Option<Handle> {
    let mut stack: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();
    while let Some(n) = stack.pop() {
        if pred(&n) {
            return Some(n);
        }
        stack.extend(n.children.borrow().iter().rev().cloned());
    }
    None
}

/// Replace the content of every node `max_depth` levels below `root` that
/// still has element children with a single text node holding its text.
///
/// Returns the number of subtrees flattened.
pub fn flatten_below(root: &Handle, max_depth: usize) -> usize {
    let mut flattened = 0;
    let mut stack = vec![(root.clone(), 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if depth < max_depth {
            for child in node.children.borrow().iter() {
                stack.push((child.clone(), depth + 1));
            }
            continue;
        }
        let has_elements = node
            .children
            .borrow()
            .iter()
            .any(|c| matches!(c.data, NodeData::Element { .. }));
        if !has_elements {
            continue;
        }
        let leaf = Node::new(NodeData::Text {
            contents: RefCell::new(StrTendril::from_slice(&text_content(&node))),
        });
        leaf.parent.set(Some(Rc::downgrade(&node)));
        let old = std::mem::replace(&mut *node.children.borrow_mut(), vec![leaf]);
        for child in &old {
            child.parent.set(None);
        }
        flattened += 1;
    }
    flattened
}

/// Remove `node` and every sibling after it from their parent.
///
/// Returns the parent, or `None` when `node` was already detached.
pub fn detach_from(node: &Handle) -> Option<Handle> {
    let parent = parent(node)?;
    let removed: Vec<Handle> = {
        let mut siblings = parent.children.borrow_mut();
        let idx = siblings.iter().position(|c| Rc::ptr_eq(c, node))?;
        siblings.drain(idx..).collect()
    };
    for r in removed {
        r.parent.set(None);
    }
    Some(parent)
}

/// Serialize `node` (including its own tag) back to HTML.
pub fn to_html(node: &Handle) -> String {
    let scope = match node.data {
        NodeData::Document => TraversalScope::ChildrenOnly(None),
        _ => TraversalScope::IncludeNode,
    };
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    let mut buf = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    if serialize(&mut buf, &handle, opts).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}
