//! Arena-backed element tree handle.
//!
//! The host owns a live element tree; this module models the slice of it the
//! pipeline is allowed to touch:
//! - read tags, attributes and visible text of descendants
//! - flip a per-element visibility flag
//! - reorder direct children of one container
//!
//! Nodes are identified by `NodeId`, a key into an arena that is never
//! reused within a session, so detached nodes cannot be confused with live
//! ones. `parse_document` builds a tree from an HTML snapshot for the CLI
//! and tests; a live host would drive the same API incrementally.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

pub const TEST_ID_ATTR: &str = "data-testid";

/// Marker attribute value identifying one feed item
pub const ITEM_TEST_ID: &str = "tweet";

/// Subtree holding the author display name
pub const USERNAME_TEST_ID: &str = "UserName";

/// Subtree holding the item body text
pub const BODY_TEXT_TEST_ID: &str = "tweetText";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Stable identity of one tree node. Never reused within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

enum NodeKind {
    Element {
        tag: String,
        attrs: HashMap<String, String>,
    },
    Text(String),
}

struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Presentation-level visibility, the only presentation state the
    /// pipeline writes ("display: none" analogue)
    hidden: bool,
    detached: bool,
}

pub struct FeedTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl FeedTree {
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Element {
                tag: "html".to_string(),
                attrs: HashMap::new(),
            },
            parent: None,
            children: Vec::new(),
            hidden: false,
            detached: false,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            hidden: false,
            detached: false,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.push(
            parent,
            NodeKind::Element {
                tag: tag.to_string(),
                attrs,
            },
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeKind::Text(text.to_string()))
    }

    /// External removal of a subtree. The arena slot is tombstoned, never
    /// reused, so stale `NodeId`s held elsewhere stay inert.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
        self.nodes[id.0].parent = None;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.nodes[current.0].detached = true;
            stack.extend(self.nodes[current.0].children.iter().copied());
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        !self.nodes[id.0].detached
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    pub fn test_id(&self, id: NodeId) -> Option<&str> {
        self.attr(id, TEST_ID_ATTR)
    }

    pub fn is_item(&self, id: NodeId) -> bool {
        self.test_id(id) == Some(ITEM_TEST_ID)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Preorder descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    /// All attached feed items in document order.
    pub fn items(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.is_item(*id))
            .collect()
    }

    /// Feed items within a subtree, including `id` itself.
    pub fn items_within(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.is_item(id) {
            out.push(id);
        }
        out.extend(self.descendants(id).into_iter().filter(|d| self.is_item(*d)));
        out
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        self.nodes[id.0].hidden = hidden;
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.nodes[id.0].hidden
    }

    /// Visible means neither the node nor any ancestor carries the hidden
    /// flag, and the node is still attached.
    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        if self.nodes[id.0].detached {
            return false;
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if self.nodes[node.0].hidden {
                return false;
            }
            current = self.nodes[node.0].parent;
        }
        true
    }

    /// Normalized visible text of a subtree.
    ///
    /// Text nodes contribute their content; childless elements fall back to
    /// `alt`/`aria-label` (emoji and inline images carry their meaning
    /// there). Hidden subtrees contribute nothing. Whitespace is collapsed.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        WHITESPACE.replace_all(out.trim(), " ").to_string()
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        if node.hidden {
            return;
        }
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { attrs, .. } => {
                if node.children.is_empty() {
                    if let Some(alt) = attrs.get("alt").or_else(|| attrs.get("aria-label")) {
                        out.push_str(alt);
                    }
                } else {
                    for child in &node.children {
                        self.collect_text(*child, out);
                    }
                }
            }
        }
    }

    /// First element (preorder) whose `attr` value contains `needle`.
    pub fn find_attr_contains(&self, attr: &str, needle: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| matches!(self.attr(*id, attr), Some(v) if v.contains(needle)))
    }

    /// First element (preorder) with the given `data-testid` within a subtree.
    pub fn find_test_id_within(&self, id: NodeId, test_id: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|d| self.test_id(*d) == Some(test_id))
    }

    /// Move `ordered` (a subset of `parent`'s children) to the end of the
    /// child list, in the given order. Children outside the subset keep
    /// their relative positions. Mirrors a fragment re-append.
    pub fn reorder_children(&mut self, parent: NodeId, ordered: &[NodeId]) {
        // ignore ids that are not actually children of this parent
        let moving: Vec<NodeId> = ordered
            .iter()
            .copied()
            .filter(|c| self.nodes[c.0].parent == Some(parent))
            .collect();
        let moving_set: std::collections::HashSet<NodeId> = moving.iter().copied().collect();
        let children = &mut self.nodes[parent.0].children;
        children.retain(|c| !moving_set.contains(c));
        children.extend(moving);
    }
}

impl Default for FeedTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `FeedTree` from an HTML snapshot.
pub fn parse_document(html: &str) -> FeedTree {
    let document = scraper::Html::parse_document(html);
    let mut tree = FeedTree::new();
    let root = tree.root();
    copy_children(&mut tree, root, document.tree.root());
    tree
}

fn copy_children(
    tree: &mut FeedTree,
    parent: NodeId,
    source: ego_tree::NodeRef<'_, scraper::Node>,
) {
    for child in source.children() {
        match child.value() {
            scraper::Node::Element(element) => {
                let attrs: Vec<(&str, &str)> = element.attrs().collect();
                let id = tree.append_element(parent, element.name(), &attrs);
                copy_children(tree, id, child);
            }
            scraper::Node::Text(text) => {
                tree.append_text(parent, &text.text);
            }
            _ => {}
        }
    }
}
