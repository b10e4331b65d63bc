use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The resolution kind of a [Param], as stored in the `ContentType` column.
///
/// Only [ContentType::Symlink], [ContentType::Case] and
/// [ContentType::Template] depend on the requesting client's context, every
/// other kind resolves to its stored value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Null,
    Text,
    Json,
    Yaml,
    List,
    Server,
    Symlink,
    Case,
    Template,
    /// An unknown tag, kept verbatim.
    Other(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Null => "application/x-null",
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
            ContentType::Yaml => "application/x-yaml",
            ContentType::List => "application/x-list",
            ContentType::Server => "application/x-server",
            ContentType::Symlink => "application/x-symlink",
            ContentType::Case => "application/x-case",
            ContentType::Template => "application/x-template",
            ContentType::Other(s) => s,
        }
    }

    /// Whether the resolved value of a node of this type may differ between
    /// clients.
    pub fn is_context_dependent(&self) -> bool {
        matches!(
            self,
            ContentType::Symlink | ContentType::Case | ContentType::Template
        )
    }
}

impl From<&str> for ContentType {
    fn from(value: &str) -> Self {
        match value {
            "application/x-null" => ContentType::Null,
            "text/plain" => ContentType::Text,
            "application/json" => ContentType::Json,
            "application/x-yaml" => ContentType::Yaml,
            "application/x-list" => ContentType::List,
            "application/x-server" => ContentType::Server,
            "application/x-symlink" => ContentType::Symlink,
            "application/x-case" => ContentType::Case,
            "application/x-template" => ContentType::Template,
            other => ContentType::Other(other.to_string()),
        }
    }
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        ContentType::from(value.as_str())
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single non-deleted row of the parameter table, as returned by
/// [crate::store::TreeStore::select_tree].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRow {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub mtime: String,
    pub version: i64,
    pub content_type: ContentType,
    pub value: Option<String>,
    /// None for the root row.
    pub parent_id: Option<i64>,
}

/// One node of the configuration tree.
///
/// A Param is created by the loader, classified once, and then never mutated
/// again: children are reference counted so that common subtrees can be
/// shared between the canonical tree and every context view built from it.
#[derive(Debug, Clone)]
pub struct Param {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) mtime: String,
    pub(crate) version: i64,
    pub(crate) content_type: ContentType,
    pub(crate) value: Option<String>,
    pub(crate) children: BTreeMap<String, Arc<Param>>,
    pub(crate) common: bool,
    pub(crate) deep_resolved: bool,
    pub(crate) serialized: Option<Bytes>,
}

impl From<ParamRow> for Param {
    fn from(row: ParamRow) -> Self {
        Param {
            id: row.id,
            name: row.name,
            path: row.path,
            mtime: row.mtime,
            version: row.version,
            content_type: row.content_type,
            value: row.value,
            children: BTreeMap::new(),
            common: false,
            deep_resolved: false,
            serialized: None,
        }
    }
}

impl Param {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mtime(&self) -> &str {
        &self.mtime
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// The stored value. None (SQL NULL) is distinct from an empty string.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Iterates over the children, ordered by name.
    pub fn children(&self) -> impl Iterator<Item = &Arc<Param>> + '_ {
        self.children.values()
    }

    pub fn child(&self, name: &str) -> Option<&Arc<Param>> {
        self.children.get(name)
    }

    /// Whether this node resolves to the same value for every client.
    pub fn is_common(&self) -> bool {
        self.common
    }

    /// Whether this subtree has been fully classified and, being common,
    /// will never change per context.
    pub fn is_deep_resolved(&self) -> bool {
        self.deep_resolved
    }

    /// The cached serialized form. Only common nodes carry one, and even those
    /// may not if serialization failed during classification.
    pub fn serialized(&self) -> Option<&Bytes> {
        self.serialized.as_ref()
    }

    /// Walks down from this node along a slash-separated path relative to it.
    /// Empty components are skipped, so "/a//b/" is the same as "a/b".
    pub fn descend(&self, path: &str) -> Option<&Param> {
        let mut node = self;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            node = node.children.get(component)?;
        }
        Some(node)
    }
}
