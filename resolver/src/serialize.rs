//! Deterministic JSON encoding of a [Param] and its subtree.
//!
//! Children are emitted ordered by name. When a child already carries a cached
//! encoding (it is common), those bytes are embedded verbatim instead of
//! walking the child again.
//!
//! The service directory is encoded without its children, so credential
//! hashes never end up in an encoding.

use bytes::Bytes;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;

use crate::index::SERVICE_PATH;
use crate::{ContentType, Param};

struct ParamView<'a>(&'a Param);

struct ChildrenView<'a>(&'a Param);

impl Serialize for ParamView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let param = self.0;
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry("id", &param.id())?;
        map.serialize_entry("path", &param.path)?;
        map.serialize_entry("mtime", &param.mtime)?;
        map.serialize_entry("version", &param.version())?;
        map.serialize_entry("content_type", param.content_type.as_str())?;
        map.serialize_entry("value", &param.value)?;
        map.serialize_entry("children", &ChildrenView(param))?;
        map.end()
    }
}

impl Serialize for ChildrenView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.path == SERVICE_PATH {
            return serializer.serialize_map(Some(0))?.end();
        }

        let mut map = serializer.serialize_map(Some(self.0.children.len()))?;
        for (name, child) in &self.0.children {
            let cached = child
                .serialized
                .as_deref()
                .and_then(|b| serde_json::from_slice::<&RawValue>(b).ok());
            match cached {
                Some(raw) => map.serialize_entry(name, raw)?,
                None => map.serialize_entry(name, &ParamView(child))?,
            }
        }
        map.end()
    }
}

/// Encodes the param and its whole subtree, ignoring any cache entry on the
/// param itself.
pub fn encode(param: &Param) -> Result<Bytes, serde_json::Error> {
    Ok(serde_json::to_vec(&ParamView(param))?.into())
}

/// Parses bytes produced by [encode].
pub fn decode(data: &[u8]) -> Result<ParamRecord, serde_json::Error> {
    serde_json::from_slice(data)
}

impl Param {
    /// Returns the cached encoding if there is one, and encodes on demand
    /// otherwise.
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        match &self.serialized {
            Some(b) => Ok(b.clone()),
            None => encode(self),
        }
    }
}

/// Owned, decoded form of an encoded [Param].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamRecord {
    pub id: i64,
    pub path: String,
    pub mtime: String,
    pub version: i64,
    pub content_type: ContentType,
    pub value: Option<String>,
    pub children: BTreeMap<String, ParamRecord>,
}

impl From<&Param> for ParamRecord {
    fn from(param: &Param) -> Self {
        ParamRecord {
            id: param.id(),
            path: param.path.clone(),
            mtime: param.mtime.clone(),
            version: param.version(),
            content_type: param.content_type.clone(),
            value: param.value.clone(),
            children: param
                .children
                .iter()
                .map(|(name, child)| (name.clone(), ParamRecord::from(child.as_ref())))
                .collect(),
        }
    }
}
