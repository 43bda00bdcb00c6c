//! The checkpoint log: four FNV-keyed maps plus the `create`/`back`/
//! `swapto`/`delete`/`list` command semantics that keep them consistent with
//! each other and with the checkpoint trees they index.
//!
//! M1 maps a source path's hash to the path itself, M2 to the name of its
//! current checkpoint, M3 maps a checkpoint name's hash to the name itself
//! (a global uniqueness index), and M4 maps a source path's hash to the root
//! of its checkpoint tree. Snapshot/restore I/O is injected as a closure so
//! this module stays free of filesystem concerns; [`crate::fs_ops`] supplies
//! the real implementations.

use colored::Colorize;

use checkpoint_core::CheckpointError;

use crate::fnv::hash_str;
use crate::hash_map::CheckpointMap;
use crate::tree::{self, CheckpointTreeNode, NodeRef};

pub struct CheckpointLog {
    pub(crate) source_paths: CheckpointMap<String>,
    pub(crate) current_checkpoints: CheckpointMap<String>,
    pub(crate) snapshot_names: CheckpointMap<String>,
    pub(crate) trees: CheckpointMap<NodeRef>,
}

impl Default for CheckpointLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointLog {
    pub fn new() -> Self {
        CheckpointLog {
            source_paths: CheckpointMap::new(),
            current_checkpoints: CheckpointMap::new(),
            snapshot_names: CheckpointMap::new(),
            trees: CheckpointMap::new(),
        }
    }

    pub(crate) fn from_maps(
        source_paths: CheckpointMap<String>,
        current_checkpoints: CheckpointMap<String>,
        snapshot_names: CheckpointMap<String>,
        trees: CheckpointMap<NodeRef>,
    ) -> Self {
        CheckpointLog {
            source_paths,
            current_checkpoints,
            snapshot_names,
            trees,
        }
    }

    pub fn is_tracked(&self, source_path: &str) -> bool {
        self.source_paths.contains_key(hash_str(source_path))
    }

    /// Creates checkpoint `checkpoint_name` for `source_path`, parented at
    /// the file's current checkpoint, or as a fresh root if this is the
    /// file's first checkpoint. Checkpoint names are globally unique, so
    /// uniqueness is checked against M3 before any tree mutation happens; if
    /// `snapshot` fails after the tree has already been linked in, the link
    /// is undone before the error is returned.
    pub fn create(
        &mut self,
        source_path: &str,
        checkpoint_name: &str,
        snapshot: impl FnOnce(&str, &str) -> Result<(), CheckpointError>,
    ) -> Result<(), CheckpointError> {
        let checkpoint_hash = hash_str(checkpoint_name);
        if self.snapshot_names.contains_key(checkpoint_hash) {
            return Err(CheckpointError::NameConflict(checkpoint_name.to_string()));
        }

        let path_hash = hash_str(source_path);
        let is_first_checkpoint = !self.source_paths.contains_key(path_hash);

        if is_first_checkpoint {
            let root = CheckpointTreeNode::create_node(checkpoint_name, None);
            snapshot(source_path, checkpoint_name)?;

            self.source_paths.insert(path_hash, source_path.to_string());
            self.trees.insert(path_hash, root);
            self.current_checkpoints
                .insert(path_hash, checkpoint_name.to_string());
            self.snapshot_names
                .insert(checkpoint_hash, checkpoint_name.to_string());
        } else {
            let root = self.trees.get(path_hash).ok_or_else(|| {
                CheckpointError::Consistency(format!(
                    "missing checkpoint tree for tracked path '{source_path}'"
                ))
            })?;
            let current_name = self.current_checkpoints.get(path_hash).ok_or_else(|| {
                CheckpointError::Consistency(format!(
                    "missing current checkpoint for tracked path '{source_path}'"
                ))
            })?;
            let parent = tree::find(&root, &current_name).ok_or_else(|| {
                CheckpointError::Consistency(format!(
                    "current checkpoint '{current_name}' is missing from its tree"
                ))
            })?;

            let child = CheckpointTreeNode::create_node(checkpoint_name, Some(&parent));
            tree::insert_child(&parent, &child);

            if let Err(err) = snapshot(source_path, checkpoint_name) {
                tree::remove_child(&parent, &child);
                return Err(err);
            }

            self.current_checkpoints
                .insert(path_hash, checkpoint_name.to_string());
            self.snapshot_names
                .insert(checkpoint_hash, checkpoint_name.to_string());
        }

        Ok(())
    }

    /// Moves `source_path`'s current checkpoint to its immediate parent and
    /// restores the file to that checkpoint's snapshot. Fails if
    /// `source_path` is untracked or already at its root checkpoint.
    pub fn back(
        &mut self,
        source_path: &str,
        restore: impl FnOnce(&str, &str) -> Result<(), CheckpointError>,
    ) -> Result<(), CheckpointError> {
        let path_hash = hash_str(source_path);
        let root = self.trees.get(path_hash).ok_or_else(|| {
            CheckpointError::Consistency(format!("'{source_path}' is not tracked"))
        })?;
        let current_name = self.current_checkpoints.get(path_hash).ok_or_else(|| {
            CheckpointError::Consistency(format!(
                "missing current checkpoint for '{source_path}'"
            ))
        })?;
        let node = tree::find(&root, &current_name).ok_or_else(|| {
            CheckpointError::Consistency(format!(
                "current checkpoint '{current_name}' is missing from its tree"
            ))
        })?;

        let parent = node.borrow().parent.as_ref().and_then(|weak| weak.upgrade());
        let parent = parent.ok_or_else(|| {
            CheckpointError::Consistency(format!(
                "'{source_path}' is already at its root checkpoint"
            ))
        })?;

        let parent_name = parent.borrow().name.clone();
        restore(source_path, &parent_name)?;
        self.current_checkpoints.insert(path_hash, parent_name);
        Ok(())
    }

    /// Moves `source_path`'s current checkpoint directly to `checkpoint_name`
    /// (which need not be an ancestor or descendant of the current one) and
    /// restores the file to that snapshot.
    pub fn swapto(
        &mut self,
        source_path: &str,
        checkpoint_name: &str,
        restore: impl FnOnce(&str, &str) -> Result<(), CheckpointError>,
    ) -> Result<(), CheckpointError> {
        let checkpoint_hash = hash_str(checkpoint_name);
        if !self.snapshot_names.contains_key(checkpoint_hash) {
            return Err(CheckpointError::Consistency(format!(
                "checkpoint '{checkpoint_name}' does not exist"
            )));
        }

        let path_hash = hash_str(source_path);
        if !self.current_checkpoints.contains_key(path_hash) {
            return Err(CheckpointError::Consistency(format!(
                "'{source_path}' is not tracked"
            )));
        }

        restore(source_path, checkpoint_name)?;
        self.current_checkpoints
            .insert(path_hash, checkpoint_name.to_string());
        Ok(())
    }

    /// Stops tracking `source_path` entirely: drops it from M1/M2/M4 and
    /// removes every checkpoint name it ever held from M3, invoking
    /// `remove_snapshot` for each one so the caller can also delete the
    /// snapshot file from disk.
    pub fn delete(
        &mut self,
        source_path: &str,
        mut remove_snapshot: impl FnMut(&str) -> Result<(), CheckpointError>,
    ) -> Result<(), CheckpointError> {
        let path_hash = hash_str(source_path);
        self.source_paths.remove(path_hash).ok_or_else(|| {
            CheckpointError::Consistency(format!("'{source_path}' is not tracked"))
        })?;
        self.current_checkpoints.remove(path_hash);
        let root = self.trees.remove(path_hash).ok_or_else(|| {
            CheckpointError::Consistency(format!(
                "missing checkpoint tree for tracked path '{source_path}'"
            ))
        })?;

        let mut names = Vec::new();
        tree::collect_names(&root, &mut names);
        for name in &names {
            self.snapshot_names.remove(hash_str(name));
            remove_snapshot(name)?;
        }

        Ok(())
    }

    /// One entry per tracked source path: its path, current checkpoint name,
    /// and checkpoint tree root, in M1 iteration order.
    pub fn listing(&self) -> Vec<FileListing> {
        self.source_paths
            .entries()
            .into_iter()
            .map(|(path_hash, source_path)| FileListing {
                current_checkpoint: self
                    .current_checkpoints
                    .get(path_hash)
                    .unwrap_or_default(),
                root: self.trees.get(path_hash),
                source_path,
            })
            .collect()
    }

    /// Renders every tracked file and its checkpoint tree as human-readable
    /// text: `source_path: current_checkpoint` followed by, for each tree
    /// node, `name: child1, child2, …` and then each child's own
    /// sub-listing, recursively.
    pub fn format_listing(&self, use_colors: bool) -> String {
        let mut out = String::new();
        for entry in self.listing() {
            let header = format!("{}: {}", entry.source_path, entry.current_checkpoint);
            if use_colors {
                out.push_str(&header.bold().to_string());
            } else {
                out.push_str(&header);
            }
            out.push('\n');
            if let Some(root) = &entry.root {
                format_tree_node(root, &mut out, use_colors);
            }
        }
        out
    }
}

pub struct FileListing {
    pub source_path: String,
    pub current_checkpoint: String,
    pub root: Option<NodeRef>,
}

fn format_tree_node(node: &NodeRef, out: &mut String, use_colors: bool) {
    let (name, children) = {
        let node_ref = node.borrow();
        (node_ref.name.clone(), node_ref.children.to_vec())
    };
    let child_names: Vec<String> = children.iter().map(|c| c.borrow().name.clone()).collect();

    let rendered_name = if use_colors {
        name.green().to_string()
    } else {
        name
    };
    if child_names.is_empty() {
        out.push_str(&format!("  {rendered_name}\n"));
    } else {
        out.push_str(&format!("  {rendered_name}: {}\n", child_names.join(", ")));
    }

    for child in &children {
        format_tree_node(child, out, use_colors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_snapshot(_source_path: &str, _checkpoint_name: &str) -> Result<(), CheckpointError> {
        Ok(())
    }

    fn noop_restore(_source_path: &str, _checkpoint_name: &str) -> Result<(), CheckpointError> {
        Ok(())
    }

    #[test]
    fn create_first_checkpoint_tracks_the_file() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();

        assert!(log.is_tracked("a.txt"));
        assert_eq!(
            log.current_checkpoints.get(hash_str("a.txt")),
            Some("v1".to_string())
        );
    }

    #[test]
    fn create_duplicate_checkpoint_name_is_rejected_without_mutation() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();
        let err = log.create("b.txt", "v1", noop_snapshot).unwrap_err();
        assert!(matches!(err, CheckpointError::NameConflict(_)));
        assert!(!log.is_tracked("b.txt"));
    }

    #[test]
    fn create_rolls_back_tree_link_when_snapshot_fails() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();

        let failing = |_: &str, _: &str| Err(CheckpointError::SnapshotIo {
            path: "a.txt".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        });
        let err = log.create("a.txt", "v2", failing).unwrap_err();
        assert!(matches!(err, CheckpointError::SnapshotIo { .. }));

        let root = log.trees.get(hash_str("a.txt")).unwrap();
        assert_eq!(root.borrow().children.len(), 0);
        assert!(!log.snapshot_names.contains_key(hash_str("v2")));
    }

    #[test]
    fn back_moves_current_checkpoint_to_parent() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();
        log.create("a.txt", "v2", noop_snapshot).unwrap();

        log.back("a.txt", noop_restore).unwrap();
        assert_eq!(
            log.current_checkpoints.get(hash_str("a.txt")),
            Some("v1".to_string())
        );
    }

    #[test]
    fn back_at_root_checkpoint_fails() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();
        let err = log.back("a.txt", noop_restore).unwrap_err();
        assert!(matches!(err, CheckpointError::Consistency(_)));
    }

    #[test]
    fn swapto_unknown_checkpoint_fails() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();
        let err = log.swapto("a.txt", "missing", noop_restore).unwrap_err();
        assert!(matches!(err, CheckpointError::Consistency(_)));
    }

    #[test]
    fn swapto_existing_checkpoint_updates_current() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();
        log.create("a.txt", "v2", noop_snapshot).unwrap();
        log.back("a.txt", noop_restore).unwrap();

        log.swapto("a.txt", "v2", noop_restore).unwrap();
        assert_eq!(
            log.current_checkpoints.get(hash_str("a.txt")),
            Some("v2".to_string())
        );
    }

    #[test]
    fn delete_removes_all_four_maps_worth_of_state() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();
        log.create("a.txt", "v2", noop_snapshot).unwrap();

        log.delete("a.txt", |_| Ok(())).unwrap();

        assert!(!log.is_tracked("a.txt"));
        assert!(!log.current_checkpoints.contains_key(hash_str("a.txt")));
        assert!(!log.trees.contains_key(hash_str("a.txt")));
        assert!(!log.snapshot_names.contains_key(hash_str("v1")));
        assert!(!log.snapshot_names.contains_key(hash_str("v2")));
    }

    #[test]
    fn delete_untracked_path_fails() {
        let mut log = CheckpointLog::new();
        let err = log.delete("missing.txt", |_| Ok(())).unwrap_err();
        assert!(matches!(err, CheckpointError::Consistency(_)));
    }

    #[test]
    fn listing_reports_source_path_and_current_checkpoint() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();

        let listing = log.listing();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].source_path, "a.txt");
        assert_eq!(listing[0].current_checkpoint, "v1");
    }

    #[test]
    fn format_listing_includes_tree_shape() {
        let mut log = CheckpointLog::new();
        log.create("a.txt", "v1", noop_snapshot).unwrap();
        log.create("a.txt", "v2", noop_snapshot).unwrap();

        let text = log.format_listing(false);
        assert!(text.contains("a.txt: v2"));
        assert!(text.contains("v1: v2"));
    }
}
