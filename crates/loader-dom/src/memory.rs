//! In-memory document host.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use tokio::sync::broadcast;

use crate::document::Document;
use crate::error::{DomError, DomResult};
use crate::node::{ElementSpec, Mutation, NodeId};

const MUTATION_CAPACITY: usize = 256;

const VOID_ELEMENTS: [&str; 5] = ["link", "img", "meta", "br", "input"];

#[derive(Debug)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    /// property -> (value, important)
    style: BTreeMap<String, (String, bool)>,
}

#[derive(Debug)]
enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    root: NodeId,
}

impl Tree {
    fn new() -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            next_id: 0,
            root: NodeId(0),
        };
        tree.root = tree.alloc_element("html");
        tree
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                parent: None,
                children: Vec::new(),
                data,
            },
        );
        id
    }

    fn alloc_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(Element {
            tag: tag.to_lowercase(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
        }))
    }

    fn build(&mut self, spec: &ElementSpec) -> NodeId {
        let id = self.alloc_element(&spec.tag);

        if let Some(NodeData::Element(el)) = self.nodes.get_mut(&id).map(|n| &mut n.data) {
            if let Some(ref elem_id) = spec.id {
                el.attributes.insert("id".to_string(), elem_id.clone());
            }
            if !spec.classes.is_empty() {
                el.attributes.insert("class".to_string(), spec.classes.join(" "));
            }
            for (name, value) in &spec.attributes {
                el.attributes.insert(name.clone(), value.clone());
            }
        }

        if let Some(ref text) = spec.text {
            let text_id = self.alloc(NodeData::Text(text.clone()));
            self.link(id, text_id, false);
        }
        for child in &spec.children {
            let child_id = self.build(child);
            self.link(id, child_id, false);
        }

        id
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.nodes.get(&id).ok_or(DomError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> DomResult<&Element> {
        match &self.node(id)?.data {
            NodeData::Element(el) => Ok(el),
            NodeData::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> DomResult<&mut Element> {
        match self.nodes.get_mut(&id).map(|n| &mut n.data) {
            Some(NodeData::Element(el)) => Ok(el),
            Some(NodeData::Text(_)) => Err(DomError::NotAnElement(id)),
            None => Err(DomError::UnknownNode(id)),
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.nodes.get(&node).and_then(|n| n.parent);
        }
        false
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes.get(&n).and_then(|n| n.parent);
        }
        false
    }

    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get_mut(&id)?.parent.take()?;
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
        Some(parent)
    }

    fn link(&mut self, parent: NodeId, child: NodeId, front: bool) {
        if let Some(p) = self.nodes.get_mut(&parent) {
            if front {
                p.children.insert(0, child);
            } else {
                p.children.push(child);
            }
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn walk(&self, from: NodeId, out: &mut Vec<NodeId>) {
        out.push(from);
        if let Some(node) = self.nodes.get(&from) {
            for child in &node.children {
                self.walk(*child, out);
            }
        }
    }

    fn connected(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(self.root, &mut out);
        out
    }

    fn child_element(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.nodes.get(&parent)?.children.iter().copied().find(|c| {
            matches!(self.nodes.get(c).map(|n| &n.data), Some(NodeData::Element(el)) if el.tag == tag)
        })
    }

    fn style_attr(el: &Element) -> Option<String> {
        if el.style.is_empty() {
            return None;
        }
        let decls: Vec<String> = el
            .style
            .iter()
            .map(|(prop, (value, important))| {
                if *important {
                    format!("{}:{} !important", prop, value)
                } else {
                    format!("{}:{}", prop, value)
                }
            })
            .collect();
        Some(decls.join(";"))
    }

    fn serialize(&self, id: NodeId, raw_text: bool, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };

        match &node.data {
            NodeData::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attributes {
                    out.push_str(&format!(r#" {}="{}""#, name, escape_attr(value)));
                }
                if let Some(style) = Self::style_attr(el) {
                    out.push_str(&format!(r#" style="{}""#, escape_attr(&style)));
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }

                let raw = matches!(el.tag.as_str(), "style" | "script");
                for child in &node.children {
                    self.serialize(*child, raw, out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }
}

/// A document held entirely in memory.
///
/// Starts as `<html><head></head></html>`, like a page whose body the
/// parser has not reached yet. Use [`MemoryDocument::ensure_body`] to
/// simulate the parser catching up.
#[derive(Debug)]
pub struct MemoryDocument {
    tree: RefCell<Tree>,
    mutations: broadcast::Sender<Mutation>,
    observable: bool,
    unreadable: RefCell<HashSet<NodeId>>,
}

impl MemoryDocument {
    /// A document with a head and no body.
    pub fn new() -> Self {
        let doc = Self::bare(true);
        doc.ensure_head();
        doc
    }

    /// A document with a head and a body.
    pub fn with_body() -> Self {
        let doc = Self::new();
        doc.ensure_body();
        doc
    }

    /// Only the root element; no head or body yet.
    pub fn without_head() -> Self {
        Self::bare(true)
    }

    /// Same as [`MemoryDocument::new`] but `subscribe` returns `None`.
    pub fn unobservable() -> Self {
        let doc = Self::bare(false);
        doc.ensure_head();
        doc
    }

    fn bare(observable: bool) -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_CAPACITY);
        Self {
            tree: RefCell::new(Tree::new()),
            mutations,
            observable,
            unreadable: RefCell::new(HashSet::new()),
        }
    }

    fn notify(&self, mutation: Mutation) {
        // No subscribers is fine.
        let _ = self.mutations.send(mutation);
    }

    fn ensure_root_child(&self, tag: &str) -> NodeId {
        let created = {
            let mut tree = self.tree.borrow_mut();
            let root = tree.root;
            if let Some(existing) = tree.child_element(root, tag) {
                return existing;
            }
            let id = tree.alloc_element(tag);
            tree.link(root, id, tag == "head");
            (root, id)
        };
        self.notify(Mutation::ChildList { target: created.0 });
        created.1
    }

    /// Parse the head if it does not exist yet.
    pub fn ensure_head(&self) -> NodeId {
        self.ensure_root_child("head")
    }

    /// Parse the body if it does not exist yet.
    pub fn ensure_body(&self) -> NodeId {
        self.ensure_root_child("body")
    }

    /// Create and append an element in one step.
    pub fn append_element(&self, parent: NodeId, spec: &ElementSpec) -> DomResult<NodeId> {
        let node = self.create_element(spec);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Replace the data of a text node.
    pub fn set_text(&self, node: NodeId, data: &str) -> DomResult<()> {
        let connected = {
            let mut tree = self.tree.borrow_mut();
            match tree.nodes.get_mut(&node).map(|n| &mut n.data) {
                Some(NodeData::Text(text)) => *text = data.to_string(),
                Some(NodeData::Element(_)) => return Err(DomError::NotAnElement(node)),
                None => return Err(DomError::UnknownNode(node)),
            }
            tree.is_connected(node)
        };
        if connected {
            self.notify(Mutation::CharacterData { target: node });
        }
        Ok(())
    }

    /// Make reads of this text node fail, as a host does for nodes torn
    /// out from under it.
    pub fn fail_text_reads(&self, node: NodeId) {
        self.unreadable.borrow_mut().insert(node);
    }

    /// Connected elements carrying this id.
    pub fn count_by_id(&self, id: &str) -> usize {
        let tree = self.tree.borrow();
        tree.connected()
            .into_iter()
            .filter(|n| {
                tree.element(*n)
                    .map(|el| el.attributes.get("id").map(String::as_str) == Some(id))
                    .unwrap_or(false)
            })
            .count()
    }

    /// Connected elements with this tag.
    pub fn count_by_tag(&self, tag: &str) -> usize {
        let tree = self.tree.borrow();
        tree.connected()
            .into_iter()
            .filter(|n| tree.element(*n).map(|el| el.tag == tag).unwrap_or(false))
            .count()
    }

    /// Whether an element is hidden by an inline `display:none`.
    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.style(node, "display").as_deref() == Some("none")
    }

    /// Serialize the connected tree.
    pub fn to_html(&self) -> String {
        let tree = self.tree.borrow();
        let mut out = String::from("<!DOCTYPE html>");
        tree.serialize(tree.root, false, &mut out);
        out
    }

    fn insert(&self, parent: NodeId, child: NodeId, front: bool) -> DomResult<()> {
        let (old_parent, connected) = {
            let mut tree = self.tree.borrow_mut();
            tree.element(parent)?;
            tree.node(child)?;
            if tree.is_ancestor_or_self(child, parent) {
                return Err(DomError::Hierarchy { parent, child });
            }
            let old_parent = tree.detach(child).filter(|p| tree.is_connected(*p));
            tree.link(parent, child, front);
            (old_parent, tree.is_connected(parent))
        };

        if let Some(old) = old_parent {
            self.notify(Mutation::ChildList { target: old });
        }
        if connected {
            self.notify(Mutation::ChildList { target: parent });
        }
        Ok(())
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        self.tree.borrow().root
    }

    fn head(&self) -> Option<NodeId> {
        let tree = self.tree.borrow();
        tree.child_element(tree.root, "head")
    }

    fn body(&self) -> Option<NodeId> {
        let tree = self.tree.borrow();
        tree.child_element(tree.root, "body")
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let tree = self.tree.borrow();
        tree.connected().into_iter().find(|n| {
            tree.element(*n)
                .map(|el| el.attributes.get("id").map(String::as_str) == Some(id))
                .unwrap_or(false)
        })
    }

    fn create_element(&self, spec: &ElementSpec) -> NodeId {
        self.tree.borrow_mut().build(spec)
    }

    fn append_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert(parent, child, false)
    }

    fn prepend_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert(parent, child, true)
    }

    fn remove(&self, node: NodeId) -> DomResult<()> {
        let parent = {
            let mut tree = self.tree.borrow_mut();
            tree.node(node)?;
            if node == tree.root {
                return Err(DomError::Hierarchy { parent: node, child: node });
            }
            let was_connected = tree.is_connected(node);
            let parent = tree.detach(node).ok_or(DomError::Detached(node))?;
            was_connected.then_some(parent)
        };

        if let Some(parent) = parent {
            self.notify(Mutation::ChildList { target: parent });
        }
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.borrow().nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.tree.borrow().element(node).ok().map(|el| el.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let tree = self.tree.borrow();
        let el = tree.element(node).ok()?;
        if name == "style" {
            return Tree::style_attr(el);
        }
        el.attributes.get(name).cloned()
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> DomResult<()> {
        let connected = {
            let mut tree = self.tree.borrow_mut();
            let el = tree.element_mut(node)?;
            let name = name.to_lowercase();
            if el.attributes.get(&name).map(String::as_str) == Some(value) {
                return Ok(());
            }
            el.attributes.insert(name, value.to_string());
            tree.is_connected(node)
        };

        if connected {
            self.notify(Mutation::Attributes {
                target: node,
                name: name.to_lowercase(),
            });
        }
        Ok(())
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        let tree = self.tree.borrow();
        let el = tree.element(node).ok()?;
        el.style.get(property).map(|(value, _)| value.clone())
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str, important: bool) -> DomResult<bool> {
        let connected = {
            let mut tree = self.tree.borrow_mut();
            let el = tree.element_mut(node)?;
            let next = (value.to_string(), important);
            if el.style.get(property) == Some(&next) {
                return Ok(false);
            }
            el.style.insert(property.to_string(), next);
            tree.is_connected(node)
        };

        if connected {
            self.notify(Mutation::Attributes {
                target: node,
                name: "style".to_string(),
            });
        }
        Ok(true)
    }

    fn text_nodes(&self) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        tree.connected()
            .into_iter()
            .filter(|n| matches!(tree.nodes.get(n).map(|n| &n.data), Some(NodeData::Text(_))))
            .collect()
    }

    fn text(&self, node: NodeId) -> DomResult<String> {
        if self.unreadable.borrow().contains(&node) {
            return Err(DomError::Detached(node));
        }
        let tree = self.tree.borrow();
        match &tree.node(node)?.data {
            NodeData::Text(text) => Ok(text.clone()),
            NodeData::Element(_) => {
                let mut all = Vec::new();
                tree.walk(node, &mut all);
                Ok(all
                    .into_iter()
                    .filter_map(|n| match tree.nodes.get(&n).map(|n| &n.data) {
                        Some(NodeData::Text(t)) => Some(t.as_str()),
                        _ => None,
                    })
                    .collect())
            }
        }
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.tree.borrow().is_connected(node)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<Mutation>> {
        self.observable.then(|| self.mutations.subscribe())
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_without_body() {
        let doc = MemoryDocument::new();
        assert!(doc.head().is_some());
        assert!(doc.body().is_none());

        let body = doc.ensure_body();
        assert_eq!(doc.body(), Some(body));
        assert_eq!(doc.ensure_body(), body);
    }

    #[test]
    fn test_head_is_first_child() {
        let doc = MemoryDocument::without_head();
        doc.ensure_body();
        let head = doc.ensure_head();
        assert_eq!(doc.children(doc.root())[0], head);
    }

    #[test]
    fn test_element_by_id_requires_connection() {
        let doc = MemoryDocument::with_body();
        let node = doc.create_element(&ElementSpec::new("div").with_id("x"));
        assert!(doc.element_by_id("x").is_none());

        doc.append_child(doc.body().unwrap(), node).unwrap();
        assert_eq!(doc.element_by_id("x"), Some(node));

        assert!(doc.remove_by_id("x"));
        assert!(!doc.contains_id("x"));
        assert!(!doc.remove_by_id("x"));
    }

    #[test]
    fn test_prepend_and_move() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let a = doc.append_element(body, &ElementSpec::new("p").with_id("a")).unwrap();
        let b = doc.create_element(&ElementSpec::new("p").with_id("b"));
        doc.prepend_child(body, b).unwrap();
        assert_eq!(doc.children(body), vec![b, a]);

        doc.append_child(body, b).unwrap();
        assert_eq!(doc.children(body), vec![a, b]);
    }

    #[test]
    fn test_hierarchy_rejected() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let outer = doc.append_element(body, &ElementSpec::new("div")).unwrap();
        let inner = doc.append_element(outer, &ElementSpec::new("div")).unwrap();

        assert!(matches!(
            doc.append_child(inner, outer),
            Err(DomError::Hierarchy { .. })
        ));
        assert!(doc.remove(doc.root()).is_err());
    }

    #[test]
    fn test_mutations_only_for_connected_changes() {
        let doc = MemoryDocument::with_body();
        let mut rx = doc.subscribe().unwrap();

        let detached = doc.create_element(&ElementSpec::new("div"));
        doc.set_attribute(detached, "data-x", "1").unwrap();
        assert!(rx.try_recv().is_err());

        let body = doc.body().unwrap();
        doc.append_child(body, detached).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Mutation::ChildList { target: body });

        doc.add_class(doc.root(), "app-ready").unwrap();
        assert_eq!(rx.try_recv().unwrap().target(), doc.root());
    }

    #[test]
    fn test_unchanged_style_is_silent() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let span = doc.append_element(body, &ElementSpec::new("span")).unwrap();
        let mut rx = doc.subscribe().unwrap();

        assert!(doc.set_style(span, "display", "none", true).unwrap());
        assert!(rx.try_recv().is_ok());
        assert!(!doc.set_style(span, "display", "none", true).unwrap());
        assert!(rx.try_recv().is_err());
        assert!(doc.is_hidden(span));
    }

    #[test]
    fn test_unobservable() {
        assert!(MemoryDocument::unobservable().subscribe().is_none());
    }

    #[test]
    fn test_classes() {
        let doc = MemoryDocument::new();
        let root = doc.root();
        doc.add_class(root, "a").unwrap();
        doc.add_class(root, "b").unwrap();
        doc.add_class(root, "a").unwrap();
        assert_eq!(doc.attribute(root, "class").as_deref(), Some("a b"));
        assert!(doc.has_class(root, "b"));
        assert!(!doc.has_class(root, "c"));
    }

    #[test]
    fn test_text_nodes_and_failures() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let p = doc
            .append_element(body, &ElementSpec::new("p").with_text("hello"))
            .unwrap();
        let texts = doc.text_nodes();
        assert_eq!(texts.len(), 1);
        assert_eq!(doc.text(texts[0]).unwrap(), "hello");
        assert_eq!(doc.text(p).unwrap(), "hello");

        doc.fail_text_reads(texts[0]);
        assert!(matches!(doc.text(texts[0]), Err(DomError::Detached(_))));
    }

    #[test]
    fn test_to_html() {
        let doc = MemoryDocument::with_body();
        let head = doc.head().unwrap();
        doc.append_element(head, &ElementSpec::new("style").with_text("a>b{}"))
            .unwrap();
        doc.append_element(
            head,
            &ElementSpec::new("link").with_attr("rel", "stylesheet").with_attr("href", "/a?x=1&y=2"),
        )
        .unwrap();
        let body = doc.body().unwrap();
        let span = doc
            .append_element(body, &ElementSpec::new("span").with_text("1 < 2"))
            .unwrap();
        doc.set_style(span, "display", "none", true).unwrap();

        assert_eq!(
            doc.to_html(),
            "<!DOCTYPE html><html><head><style>a>b{}</style>\
             <link href=\"/a?x=1&amp;y=2\" rel=\"stylesheet\"></head>\
             <body><span style=\"display:none !important\">1 &lt; 2</span></body></html>"
        );
    }
}
