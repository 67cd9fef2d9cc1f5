//! The document seam.

use tokio::sync::broadcast;

use crate::error::DomResult;
use crate::node::{ElementSpec, Mutation, NodeId};

/// A live page document, as seen by the loader.
///
/// Methods take `&self`: hosts are single-threaded and use interior
/// mutability, and several loader tasks hold the same document.
/// Lookups return `Option` and never fail; structural edits return
/// `DomResult` so the caller can decide to ignore a lost race.
pub trait Document {
    /// The root (`html`) element. Always present.
    fn root(&self) -> NodeId;

    /// The `head` element, once parsed.
    fn head(&self) -> Option<NodeId>;

    /// The `body` element, once parsed.
    fn body(&self) -> Option<NodeId>;

    /// First connected element with this id, in document order.
    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    /// Create a detached element subtree.
    fn create_element(&self, spec: &ElementSpec) -> NodeId;

    /// Append `child` as the last child of `parent`, moving it if attached.
    fn append_child(&self, parent: NodeId, child: NodeId) -> DomResult<()>;

    /// Insert `child` as the first child of `parent`, moving it if attached.
    fn prepend_child(&self, parent: NodeId, child: NodeId) -> DomResult<()>;

    /// Detach `node` from its parent.
    fn remove(&self, node: NodeId) -> DomResult<()>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child nodes, elements and text.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lower-case tag name; `None` for text nodes.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> DomResult<()>;

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Add a class; no-op if already present.
    fn add_class(&self, node: NodeId, class: &str) -> DomResult<()> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let value = match self.attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &value)
    }

    /// Inline style value for `property`.
    fn style(&self, node: NodeId, property: &str) -> Option<String>;

    /// Set an inline style. Returns whether anything changed.
    fn set_style(&self, node: NodeId, property: &str, value: &str, important: bool) -> DomResult<bool>;

    /// Connected text nodes in document order.
    fn text_nodes(&self) -> Vec<NodeId>;

    /// Data of a text node. Fails when the host cannot read it.
    fn text(&self, node: NodeId) -> DomResult<String>;

    fn is_connected(&self, node: NodeId) -> bool;

    /// Subscribe to mutations of the connected tree.
    ///
    /// `None` when the host has no mutation observation; callers fall back
    /// to polling. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Option<broadcast::Receiver<Mutation>>;

    /// Whether a connected element carries this id.
    fn contains_id(&self, id: &str) -> bool {
        self.element_by_id(id).is_some()
    }

    /// Remove the element with this id. Returns whether one was removed.
    fn remove_by_id(&self, id: &str) -> bool {
        match self.element_by_id(id) {
            Some(node) => self.remove(node).is_ok(),
            None => false,
        }
    }
}
