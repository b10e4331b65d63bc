use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{ContentType, Param};

/// A node of a per-context view of the tree.
///
/// Common subtrees resolve identically for every client, so a view points at
/// the canonical node for them ([ContextNode::Shared]). Everything else is a
/// private copy ([ContextNode::Owned]) that can be rewritten for one context
/// without touching the canonical tree or other views.
#[derive(Debug, Clone)]
pub enum ContextNode {
    Shared(Arc<Param>),
    Owned(OwnedParam),
}

/// A copy of a non-common [Param]. Children are themselves [ContextNode]s.
#[derive(Debug, Clone)]
pub struct OwnedParam {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub mtime: String,
    pub version: i64,
    pub content_type: ContentType,
    pub value: Option<String>,
    pub children: BTreeMap<String, ContextNode>,
}

/// Builds a context view of the tree rooted at `param`.
/// Memory is proportional to the number of non-common nodes.
pub fn clone_for_context(param: &Arc<Param>) -> ContextNode {
    if param.deep_resolved {
        return ContextNode::Shared(param.clone());
    }

    ContextNode::Owned(OwnedParam {
        id: param.id,
        name: param.name.clone(),
        path: param.path.clone(),
        mtime: param.mtime.clone(),
        version: param.version,
        content_type: param.content_type.clone(),
        value: param.value.clone(),
        children: param
            .children
            .iter()
            .map(|(name, child)| (name.clone(), clone_for_context(child)))
            .collect(),
    })
}

impl ContextNode {
    pub fn is_shared(&self) -> bool {
        matches!(self, ContextNode::Shared(_))
    }

    pub fn name(&self) -> &str {
        match self {
            ContextNode::Shared(p) => p.name(),
            ContextNode::Owned(o) => &o.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ContextNode::Shared(p) => p.path(),
            ContextNode::Owned(o) => &o.path,
        }
    }

    pub fn content_type(&self) -> &ContentType {
        match self {
            ContextNode::Shared(p) => p.content_type(),
            ContextNode::Owned(o) => &o.content_type,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            ContextNode::Shared(p) => p.value(),
            ContextNode::Owned(o) => o.value.as_deref(),
        }
    }

    /// Returns the child with the given name. Children of a shared node are
    /// shared as well, so they are handed out as views of their own.
    pub fn child(&self, name: &str) -> Option<ContextRef<'_>> {
        match self {
            ContextNode::Shared(p) => p.child(name).map(ContextRef::Shared),
            ContextNode::Owned(o) => o.children.get(name).map(ContextRef::Node),
        }
    }

    /// Iterates over the children ordered by name.
    pub fn children(&self) -> Box<dyn Iterator<Item = ContextRef<'_>> + '_> {
        match self {
            ContextNode::Shared(p) => Box::new(p.children().map(ContextRef::Shared)),
            ContextNode::Owned(o) => Box::new(o.children.values().map(ContextRef::Node)),
        }
    }

    /// Walks down along a slash-separated path relative to this node.
    pub fn descend(&self, path: &str) -> Option<ContextRef<'_>> {
        ContextRef::Node(self).descend(path)
    }

    /// Gives mutable access to an owned node. Shared nodes are common and
    /// therefore never rewritten.
    pub fn as_owned_mut(&mut self) -> Option<&mut OwnedParam> {
        match self {
            ContextNode::Shared(_) => None,
            ContextNode::Owned(o) => Some(o),
        }
    }
}

/// A borrowed position inside a context view: either a node of the view
/// itself, or a node below a shared subtree.
#[derive(Debug, Clone, Copy)]
pub enum ContextRef<'a> {
    Node(&'a ContextNode),
    Shared(&'a Arc<Param>),
}

impl<'a> ContextRef<'a> {
    pub fn path(&self) -> &'a str {
        match *self {
            ContextRef::Node(n) => n.path(),
            ContextRef::Shared(p) => p.path(),
        }
    }

    pub fn name(&self) -> &'a str {
        match *self {
            ContextRef::Node(n) => n.name(),
            ContextRef::Shared(p) => p.name(),
        }
    }

    pub fn content_type(&self) -> &'a ContentType {
        match *self {
            ContextRef::Node(n) => n.content_type(),
            ContextRef::Shared(p) => p.content_type(),
        }
    }

    pub fn value(&self) -> Option<&'a str> {
        match *self {
            ContextRef::Node(n) => n.value(),
            ContextRef::Shared(p) => p.value(),
        }
    }

    pub fn child(&self, name: &str) -> Option<ContextRef<'a>> {
        match *self {
            ContextRef::Node(n) => n.child(name),
            ContextRef::Shared(p) => p.child(name).map(ContextRef::Shared),
        }
    }

    pub fn children(&self) -> Box<dyn Iterator<Item = ContextRef<'a>> + 'a> {
        match *self {
            ContextRef::Node(n) => n.children(),
            ContextRef::Shared(p) => Box::new(p.children().map(ContextRef::Shared)),
        }
    }

    pub fn descend(&self, path: &str) -> Option<ContextRef<'a>> {
        let mut node = *self;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            node = node.child(component)?;
        }
        Some(node)
    }
}
