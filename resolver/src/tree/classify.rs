use std::sync::Arc;
use tracing::{instrument, warn};

use crate::serialize::encode;
use crate::Param;

/// Marks every node of a freshly loaded tree as common or not, bottom-up, and
/// caches the encoding of every common node on the node itself.
///
/// A node is common iff all its children are common and its own content type
/// does not depend on the client's context. Failing to encode a common node
/// only loses the cache entry for it.
#[instrument(skip_all, fields(param.path = %root.path))]
pub fn mark_common(root: &mut Param) -> bool {
    deep_mark_common(root)
}

fn deep_mark_common(node: &mut Param) -> bool {
    let mut ok = true;
    for child in node.children.values_mut() {
        // Nothing else holds a reference yet, so this never copies.
        let child = Arc::make_mut(child);
        if !deep_mark_common(child) {
            ok = false;
        }
    }

    if node.content_type.is_context_dependent() {
        ok = false;
    }

    node.common = ok;
    node.deep_resolved = ok;
    node.serialized = None;

    if ok {
        match encode(node) {
            Ok(bytes) => node.serialized = Some(bytes),
            Err(e) => warn!(param.path = %node.path, err = %e, "failed to serialize common param"),
        }
    }

    ok
}
