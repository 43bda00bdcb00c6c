//! Per-file checkpoint history tree: each node owns a name and a list of
//! child nodes; a non-owning back-link points at the parent for upward
//! traversal. Parent links are reconstructed on deserialize, never stored.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::linked_list::CheckpointList;

pub type NodeRef = Rc<RefCell<CheckpointTreeNode>>;

pub struct CheckpointTreeNode {
    pub name: String,
    pub parent: Option<Weak<RefCell<CheckpointTreeNode>>>,
    pub children: CheckpointList<NodeRef>,
}

impl CheckpointTreeNode {
    /// Allocates a new node with the given name and parent back-link. The
    /// caller is responsible for attaching it as a child via
    /// [`insert_child`] when `parent` is `Some`.
    pub fn create_node(name: impl Into<String>, parent: Option<&NodeRef>) -> NodeRef {
        Rc::new(RefCell::new(CheckpointTreeNode {
            name: name.into(),
            parent: parent.map(Rc::downgrade),
            children: CheckpointList::new(),
        }))
    }
}

/// Prepends `child` to `parent`'s child list and sets `child.parent` to
/// `parent`, so newly inserted siblings sort first in traversal order.
/// Both link directions are set here rather than left to the caller.
pub fn insert_child(parent: &NodeRef, child: &NodeRef) {
    child.borrow_mut().parent = Some(Rc::downgrade(parent));
    parent.borrow_mut().children.push_front(child.clone());
}

/// Depth-first search for a node named `name`, rooted at `root`. Children
/// are visited in list order. Because checkpoint names are globally
/// unique, the first match is the only match.
pub fn find(root: &NodeRef, name: &str) -> Option<NodeRef> {
    if root.borrow().name == name {
        return Some(root.clone());
    }

    for child in root.borrow().children.to_vec() {
        if let Some(found) = find(&child, name) {
            return Some(found);
        }
    }

    None
}

/// Collects every node name reachable from `root`, in DFS order. Used by
/// `list` and by consistency checks over M3.
pub fn collect_names(root: &NodeRef, out: &mut Vec<String>) {
    out.push(root.borrow().name.clone());
    for child in root.borrow().children.to_vec() {
        collect_names(&child, out);
    }
}

/// Removes `child` from `parent`'s child list by reference identity. Used to
/// roll back a `create` whose snapshot I/O failed after the tree was already
/// linked in. Returns `false` if `child` was not found (should not happen in
/// practice).
pub fn remove_child(parent: &NodeRef, child: &NodeRef) -> bool {
    let mut parent_ref = parent.borrow_mut();
    let mut cursor = parent_ref.children.cursor_front();
    if !cursor.is_valid() {
        return false;
    }
    loop {
        let is_match = cursor
            .with_payload(|c| Rc::ptr_eq(c, child))
            .unwrap_or(false);
        if is_match {
            cursor.delete();
            return true;
        }
        if !cursor.advance() {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_node_has_no_children_and_no_parent_by_default() {
        let root = CheckpointTreeNode::create_node("v1", None);
        assert_eq!(root.borrow().name, "v1");
        assert!(root.borrow().parent.is_none());
        assert_eq!(root.borrow().children.len(), 0);
    }

    #[test]
    fn insert_child_sets_back_link() {
        let root = CheckpointTreeNode::create_node("v1", None);
        let child = CheckpointTreeNode::create_node("v2", Some(&root));
        insert_child(&root, &child);

        assert_eq!(root.borrow().children.len(), 1);
        let parent = child.borrow().parent.as_ref().unwrap().upgrade().unwrap();
        assert_eq!(parent.borrow().name, "v1");
    }

    #[test]
    fn find_locates_a_grandchild_by_name() {
        let root = CheckpointTreeNode::create_node("v1", None);
        let v2 = CheckpointTreeNode::create_node("v2", Some(&root));
        insert_child(&root, &v2);
        let v3 = CheckpointTreeNode::create_node("v3", Some(&v2));
        insert_child(&v2, &v3);

        let found = find(&root, "v3").expect("v3 should be found");
        assert_eq!(found.borrow().name, "v3");
        assert!(find(&root, "nonexistent").is_none());
    }

    #[test]
    fn collect_names_visits_every_node() {
        let root = CheckpointTreeNode::create_node("v1", None);
        let v2 = CheckpointTreeNode::create_node("v2", Some(&root));
        insert_child(&root, &v2);

        let mut names = Vec::new();
        collect_names(&root, &mut names);
        assert_eq!(names, vec!["v1".to_string(), "v2".to_string()]);
    }
}
