use std::collections::HashSet;

use crate::{ContentType, Param, SymlinkError};

mod classify;
mod context;
mod loader;

pub use self::classify::mark_common;
pub use self::context::{clone_for_context, ContextNode, ContextRef, OwnedParam};
pub use self::loader::build_tree;

/// A borrowed node that can be navigated from the root of its tree.
/// Implemented for the canonical tree and for context views.
pub trait TreeNode<'a>: Copy {
    fn path(self) -> &'a str;
    fn content_type(self) -> &'a ContentType;
    fn value(self) -> Option<&'a str>;
    fn descend(self, path: &str) -> Option<Self>;
}

impl<'a> TreeNode<'a> for &'a Param {
    fn path(self) -> &'a str {
        Param::path(self)
    }

    fn content_type(self) -> &'a ContentType {
        Param::content_type(self)
    }

    fn value(self) -> Option<&'a str> {
        Param::value(self)
    }

    fn descend(self, path: &str) -> Option<Self> {
        Param::descend(self, path)
    }
}

impl<'a> TreeNode<'a> for ContextRef<'a> {
    fn path(self) -> &'a str {
        ContextRef::path(&self)
    }

    fn content_type(self) -> &'a ContentType {
        ContextRef::content_type(&self)
    }

    fn value(self) -> Option<&'a str> {
        ContextRef::value(&self)
    }

    fn descend(self, path: &str) -> Option<Self> {
        ContextRef::descend(&self, path)
    }
}

/// Follows symlinks starting at `node` until reaching a node that is not a
/// symlink. Targets are absolute paths, looked up from `root`, and may pass
/// through symlinks themselves.
pub fn follow_symlinks<'a, N: TreeNode<'a>>(root: N, node: N) -> Result<N, SymlinkError> {
    resolve(root, node, &mut HashSet::new())
}

/// Looks up an absolute path from `root`, following symlinks met on the way
/// and at the end. Returns None if a component does not exist.
pub fn lookup<'a, N: TreeNode<'a>>(root: N, path: &str) -> Result<Option<N>, SymlinkError> {
    let mut visited = HashSet::new();
    match walk(root, path, &mut visited)? {
        Some(node) => resolve(root, node, &mut visited).map(Some),
        None => Ok(None),
    }
}

/// Walks `path` component by component, resolving every intermediate node.
/// The last node is returned as is.
fn walk<'a, N: TreeNode<'a>>(
    root: N,
    path: &str,
    visited: &mut HashSet<&'a str>,
) -> Result<Option<N>, SymlinkError> {
    let mut node = root;
    for component in path.split('/').filter(|c| !c.is_empty()) {
        node = resolve(root, node, visited)?;
        match node.descend(component) {
            Some(child) => node = child,
            None => return Ok(None),
        }
    }
    Ok(Some(node))
}

/// `visited` holds the symlinks currently being resolved. They are released
/// once resolved, so one lookup may pass the same symlink more than once.
fn resolve<'a, N: TreeNode<'a>>(
    root: N,
    node: N,
    visited: &mut HashSet<&'a str>,
) -> Result<N, SymlinkError> {
    let mut node = node;
    let mut entered = vec![];

    while *node.content_type() == ContentType::Symlink {
        if !visited.insert(node.path()) {
            return Err(SymlinkError::Cycle(node.path().to_string()));
        }
        entered.push(node.path());

        let target = node.value().unwrap_or_default().trim();
        node = walk(root, target, visited)?.ok_or_else(|| SymlinkError::Dangling {
            path: node.path().to_string(),
            target: target.to_string(),
        })?;
    }

    for path in entered {
        visited.remove(path);
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::{build_tree, follow_symlinks, lookup};
    use crate::fixtures::row;
    use crate::{ContentType, SymlinkError};

    #[test]
    fn follows_chain() {
        let root = build_tree(vec![
            row(1, None, "", "/", ContentType::Null, None),
            row(2, Some(1), "a", "/a", ContentType::Symlink, Some("/b")),
            row(3, Some(1), "b", "/b", ContentType::Symlink, Some(" /c\n")),
            row(4, Some(1), "c", "/c", ContentType::Text, Some("value")),
        ])
        .unwrap();

        let a = root.descend("a").unwrap();
        let target = follow_symlinks(&root, a).unwrap();
        assert_eq!("/c", target.path());
        assert_eq!(Some("value"), target.value());
    }

    #[test]
    fn detects_cycle() {
        let root = build_tree(vec![
            row(1, None, "", "/", ContentType::Null, None),
            row(2, Some(1), "a", "/a", ContentType::Symlink, Some("/b")),
            row(3, Some(1), "b", "/b", ContentType::Symlink, Some("/a")),
        ])
        .unwrap();

        let a = root.descend("a").unwrap();
        assert_eq!(
            Err(SymlinkError::Cycle("/a".into())),
            follow_symlinks(&root, a).map(|p| p.path())
        );
    }

    #[test]
    fn detects_dangling() {
        let root = build_tree(vec![
            row(1, None, "", "/", ContentType::Null, None),
            row(2, Some(1), "a", "/a", ContentType::Symlink, Some("/nope")),
        ])
        .unwrap();

        let a = root.descend("a").unwrap();
        assert_eq!(
            Err(SymlinkError::Dangling {
                path: "/a".into(),
                target: "/nope".into()
            }),
            follow_symlinks(&root, a).map(|p| p.path())
        );
    }

    #[test]
    fn lookup_through_intermediate_symlink() {
        let root = build_tree(vec![
            row(1, None, "", "/", ContentType::Null, None),
            row(2, Some(1), "app", "/app", ContentType::Null, None),
            row(3, Some(2), "port", "/app/port", ContentType::Text, Some("8080")),
            row(4, Some(1), "link", "/link", ContentType::Symlink, Some("/app")),
            row(5, Some(1), "port", "/port", ContentType::Symlink, Some("/link/port")),
        ])
        .unwrap();

        // plain descend stops at the symlink
        assert!(root.descend("link/port").is_none());

        let port = lookup(&root, "/link/port").unwrap().expect("must resolve");
        assert_eq!("/app/port", port.path());

        // a target that itself crosses a symlink
        let port = lookup(&root, "/port").unwrap().expect("must resolve");
        assert_eq!("/app/port", port.path());

        assert_eq!(None, lookup(&root, "/link/nope").unwrap().map(|p| p.path()));
    }

    #[test]
    fn lookup_reuses_symlink() {
        let root = build_tree(vec![
            row(1, None, "", "/", ContentType::Null, None),
            row(2, Some(1), "app", "/app", ContentType::Null, None),
            row(3, Some(2), "port", "/app/port", ContentType::Text, Some("8080")),
            row(4, Some(2), "next", "/app/next", ContentType::Symlink, Some("/link/port")),
            row(5, Some(1), "link", "/link", ContentType::Symlink, Some("/app")),
        ])
        .unwrap();

        let port = lookup(&root, "/link/next").unwrap().expect("must resolve");
        assert_eq!("/app/port", port.path());
    }

    #[test]
    fn lookup_detects_cycle_in_intermediate_symlink() {
        let root = build_tree(vec![
            row(1, None, "", "/", ContentType::Null, None),
            row(2, Some(1), "a", "/a", ContentType::Symlink, Some("/b/x")),
            row(3, Some(1), "b", "/b", ContentType::Symlink, Some("/a")),
        ])
        .unwrap();

        assert_eq!(
            Err(SymlinkError::Cycle("/a".into())),
            lookup(&root, "/a").map(|p| p.map(|p| p.path()))
        );
    }
}
