use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{Param, ParamRow, StructureError};

/// Links a flat row set into a tree and returns its root.
///
/// Rows are buffered and linked by id, so the order the store emits them in
/// does not matter. The row set must describe exactly one tree: one root, no
/// unknown parents, no rows unreachable from the root, unique child names and
/// paths that are the concatenation of their ancestors' names.
pub fn build_tree(rows: Vec<ParamRow>) -> Result<Param, StructureError> {
    let mut index_by_id: HashMap<i64, usize> = HashMap::with_capacity(rows.len());
    let mut root: Option<usize> = None;

    for (idx, row) in rows.iter().enumerate() {
        match index_by_id.entry(row.id) {
            Entry::Occupied(_) => return Err(StructureError::DuplicateId(row.id)),
            Entry::Vacant(e) => {
                e.insert(idx);
            }
        }

        if row.parent_id.is_none() {
            if let Some(first) = root {
                return Err(StructureError::DuplicateRoot {
                    first: rows[first].path.clone(),
                    second: row.path.clone(),
                });
            }
            root = Some(idx);
        }
    }

    let root = root.ok_or(StructureError::MissingRoot)?;

    let mut children_of: Vec<Vec<usize>> = vec![vec![]; rows.len()];
    for (idx, row) in rows.iter().enumerate() {
        if let Some(parent_id) = row.parent_id {
            let parent = *index_by_id
                .get(&parent_id)
                .ok_or_else(|| StructureError::ParentNotFound {
                    path: row.path.clone(),
                    parent_id,
                })?;
            children_of[parent].push(idx);
        }
    }

    let mut rows: Vec<Option<ParamRow>> = rows.into_iter().map(Some).collect();
    let mut seen = vec![false; rows.len()];

    let tree = assemble(root, None, &mut rows, &children_of, &mut seen)?;

    // Anything left over hangs off a parent cycle.
    if let Some(idx) = seen.iter().position(|s| !s) {
        let path = rows[idx]
            .as_ref()
            .map(|row| row.path.clone())
            .unwrap_or_default();
        return Err(StructureError::Unreachable(path));
    }

    Ok(tree)
}

fn assemble(
    idx: usize,
    parent_path: Option<&str>,
    rows: &mut [Option<ParamRow>],
    children_of: &[Vec<usize>],
    seen: &mut [bool],
) -> Result<Param, StructureError> {
    seen[idx] = true;
    let row = rows[idx]
        .take()
        .expect("every row is reachable through exactly one parent");

    if let Some(parent_path) = parent_path {
        let expected = child_path(parent_path, &row.name);
        if row.path != expected {
            return Err(StructureError::PathMismatch {
                path: row.path,
                expected,
            });
        }
    }

    let mut param = Param::from(row);
    for &child_idx in &children_of[idx] {
        let child = assemble(child_idx, Some(&param.path), rows, children_of, seen)?;
        if param.children.contains_key(&child.name) {
            return Err(StructureError::DuplicateChild {
                parent: param.path,
                name: child.name,
            });
        }
        param.children.insert(child.name.clone(), Arc::new(child));
    }

    Ok(param)
}

fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path.ends_with('/') {
        format!("{}{}", parent_path, name)
    } else {
        format!("{}/{}", parent_path, name)
    }
}
