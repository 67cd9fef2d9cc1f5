//! Node handles, element specs and mutation records.

use std::fmt;

/// Opaque handle to a node owned by a `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Description of an element subtree to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    /// Text content, inserted as the first child.
    pub text: Option<String>,
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            id: None,
            classes: Vec::new(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into().to_lowercase(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// A change to the connected document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Children were added to or removed from `target`.
    ChildList { target: NodeId },
    /// An attribute of `target` changed.
    Attributes { target: NodeId, name: String },
    /// The data of text node `target` changed.
    CharacterData { target: NodeId },
}

impl Mutation {
    pub fn target(&self) -> NodeId {
        match self {
            Mutation::ChildList { target }
            | Mutation::Attributes { target, .. }
            | Mutation::CharacterData { target } => *target,
        }
    }
}
