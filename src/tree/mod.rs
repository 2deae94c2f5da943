//! Directory hierarchy reconstructed from flat record paths.
//!
//! Nodes live in one arena (`Vec<TreeNode>`); children are listed by
//! [`NodeId`] and a child refers to its parent by id only. A map from the
//! full component path to the node id gives O(1) lookup of every prefix.
//!
//! Nodes are only ever appended and a child is always created after its
//! parent, so children sit at higher indices than their parent. Walking the
//! arena backwards is therefore a post-order, which is how directory sizes
//! are aggregated in one pass.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::path::{join, split_display, ResolvedPath};
use crate::record::{ArchiveRecord, RecordKind};

// ── Nodes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Directory,
    File,
    Disk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub name:     String,
    /// Components joined with [`join`]; empty for the root.
    pub path:     String,
    pub depth:    usize,
    /// Own size for leaves, sum of children for directories.
    pub size:     u64,
    /// Index of the record this node came from. `None` for the root and for
    /// directories only implied by a descendant's path.
    pub origin:   Option<usize>,
    pub kind:     NodeKind,
    pub children: Vec<NodeId>,
    #[serde(skip)]
    pub parent:   Option<NodeId>,
}

impl TreeNode {
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Root | NodeKind::Directory)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && !self.is_directory()
    }

    pub fn is_implicit(&self) -> bool {
        self.kind == NodeKind::Directory && self.origin.is_none()
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DuplicateKind {
    #[error("an item already exists at this path")]
    PathExists,
    #[error("directory record would replace a file")]
    DirectoryOverFile,
    #[error("path passes through file {0:?}")]
    PrefixIsFile(String),
    #[error("path resolves to the archive root")]
    RootPath,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record {index} ({path:?}): {kind}")]
pub struct DuplicatePathError {
    pub index: usize,
    pub path:  String,
    pub kind:  DuplicateKind,
}

// ── Tree ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Tree {
    nodes:      Vec<TreeNode>,
    by_path:    HashMap<Vec<String>, NodeId>,
    duplicates: Vec<DuplicatePathError>,
}

impl Tree {
    fn new() -> Self {
        let root = TreeNode {
            name:     String::new(),
            path:     String::new(),
            depth:    0,
            size:     0,
            origin:   None,
            kind:     NodeKind::Root,
            children: Vec::new(),
            parent:   None,
        };
        let mut by_path = HashMap::new();
        by_path.insert(Vec::new(), NodeId::ROOT);
        Self { nodes: vec![root], by_path, duplicates: Vec::new() }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &TreeNode)> + '_ {
        self.nodes[id.0].children.iter().map(move |&c| (c, &self.nodes[c.0]))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn find(&self, components: &[String]) -> Option<NodeId> {
        self.by_path.get(components).copied()
    }

    /// Look up a display path as produced by [`join`], with `/` inside a
    /// component written as `%2F`.
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        self.find(&split_display(path))
    }

    /// Pre-order walk from the root, children in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { tree: self, stack: vec![NodeId::ROOT] }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Records that were left out because their path was already taken.
    pub fn duplicates(&self) -> &[DuplicatePathError] {
        &self.duplicates
    }

    /// Why `path` could not be inserted, or `None` if it can.
    pub fn conflict(&self, path: &ResolvedPath) -> Option<DuplicateKind> {
        let components = path.components();
        if components.is_empty() {
            return (!path.is_directory()).then_some(DuplicateKind::RootPath);
        }
        for n in 1..components.len() {
            if let Some(id) = self.find(&components[..n]) {
                if !self.node(id).is_directory() {
                    return Some(DuplicateKind::PrefixIsFile(join(&components[..n])));
                }
            }
        }
        let existing = self.node(self.find(components)?);
        match (path.is_directory(), existing.is_directory()) {
            (false, _)    => Some(DuplicateKind::PathExists),
            (true, false) => Some(DuplicateKind::DirectoryOverFile),
            (true, true)  => None,
        }
    }

    fn add_node(&mut self, parent: NodeId, components: &[String], kind: NodeKind, origin: Option<usize>, size: u64) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = components.len();
        self.nodes.push(TreeNode {
            name:     components.last().cloned().unwrap_or_default(),
            path:     join(components),
            depth,
            size,
            origin,
            kind,
            children: Vec::new(),
            parent:   Some(parent),
        });
        self.nodes[parent.0].children.push(id);
        self.by_path.insert(components.to_vec(), id);
        id
    }

    /// Recompute every directory size from the leaves up.
    fn aggregate_sizes(&mut self) {
        for node in self.nodes.iter_mut().filter(|n| n.is_directory()) {
            node.size = 0;
        }
        for i in (1..self.nodes.len()).rev() {
            let size = self.nodes[i].size;
            if let Some(parent) = self.nodes[i].parent {
                self.nodes[parent.0].size += size;
            }
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a> {
    tree:  &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (NodeId, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        self.stack.extend(node.children.iter().rev());
        Some((id, node))
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

pub struct HierarchyBuilder {
    tree: Tree,
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self { tree: Tree::new() }
    }

    /// Continue inserting into a finished tree.
    pub fn resume(tree: Tree) -> Self {
        Self { tree }
    }

    /// Build a tree from records in storage order. Conflicting records are
    /// skipped and listed in [`Tree::duplicates`].
    pub fn build<'a, I>(records: I) -> Tree
    where
        I: IntoIterator<Item = &'a ArchiveRecord>,
    {
        let mut builder = Self::new();
        for record in records {
            // Already recorded in the tree.
            let _ = builder.push(record);
        }
        builder.finish()
    }

    /// Insert one record. Nothing is created when the record conflicts with
    /// an existing node.
    pub fn push(&mut self, record: &ArchiveRecord) -> Result<NodeId, DuplicatePathError> {
        let path = record.resolved_path();
        match self.insert(record, &path) {
            Ok(id) => Ok(id),
            Err(kind) => {
                let err = DuplicatePathError { index: record.index, path: path.display(), kind };
                warn!(index = err.index, path = %err.path, reason = %err.kind, "skipping record at duplicate path");
                self.tree.duplicates.push(err.clone());
                Err(err)
            }
        }
    }

    /// Insert `record` at `path` without recording a refusal.
    pub(crate) fn insert(&mut self, record: &ArchiveRecord, path: &ResolvedPath) -> Result<NodeId, DuplicateKind> {
        if let Some(kind) = self.tree.conflict(path) {
            return Err(kind);
        }

        let dirs = path.directory_components();
        let mut parent = NodeId::ROOT;
        for n in 1..=dirs.len() {
            parent = match self.tree.find(&dirs[..n]) {
                Some(id) => id,
                None => self.tree.add_node(parent, &dirs[..n], NodeKind::Directory, None, 0),
            };
        }

        if path.is_directory() {
            let node = &mut self.tree.nodes[parent.0];
            match node.origin {
                None if node.kind == NodeKind::Directory => {
                    node.origin = Some(record.index);
                }
                Some(first) => {
                    debug!(index = record.index, first, path = %node.path, "merged repeated directory record");
                }
                None => {}
            }
            return Ok(parent);
        }

        let kind = match record.kind {
            RecordKind::Disk => NodeKind::Disk,
            _ => NodeKind::File,
        };
        Ok(self.tree.add_node(parent, path.components(), kind, Some(record.index), record.size()))
    }

    pub fn finish(mut self) -> Tree {
        self.tree.aggregate_sizes();
        self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Fork;

    fn file(index: usize, path: &str, size: u64) -> ArchiveRecord {
        ArchiveRecord {
            index,
            filename:  path.into(),
            separator: b':',
            data_fork: Some(Fork { uncompressed_size: size, compressed_size: size, descriptor: None }),
            ..ArchiveRecord::default()
        }
    }

    fn dir(index: usize, path: &str) -> ArchiveRecord {
        ArchiveRecord {
            index,
            filename:  path.into(),
            separator: b':',
            kind:      RecordKind::Directory,
            ..ArchiveRecord::default()
        }
    }

    fn names(tree: &Tree, id: NodeId) -> Vec<String> {
        tree.children(id).map(|(_, n)| n.name.clone()).collect()
    }

    #[test]
    fn creates_implicit_directories() {
        let tree = HierarchyBuilder::build(&[file(0, "GAMES:ADVENTURE:SAVE.DAT", 10)]);
        let games = tree.find_path("GAMES").unwrap();
        let adventure = tree.find_path("GAMES/ADVENTURE").unwrap();
        let save = tree.find_path("GAMES/ADVENTURE/SAVE.DAT").unwrap();

        assert!(tree.node(games).is_implicit());
        assert!(tree.node(adventure).is_implicit());
        assert_eq!(tree.parent(save), Some(adventure));
        assert_eq!(tree.parent(adventure), Some(games));
        assert_eq!(tree.parent(games), Some(NodeId::ROOT));
        assert_eq!(tree.node(save).depth, 3);
        assert!(tree.node(save).is_leaf());
        assert_eq!(tree.root().size, 10);
    }

    #[test]
    fn explicit_directory_is_reused_by_children() {
        let tree = HierarchyBuilder::build(&[dir(0, "GAMES"), file(1, "GAMES:FILE", 3)]);
        assert_eq!(names(&tree, NodeId::ROOT), ["GAMES"]);
        let games = tree.find_path("GAMES").unwrap();
        assert_eq!(tree.node(games).origin, Some(0));
        assert_eq!(tree.parent(tree.find_path("GAMES/FILE").unwrap()), Some(games));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn late_directory_record_reconciles_implicit_node() {
        let tree = HierarchyBuilder::build(&[file(0, "GAMES:FILE", 3), dir(1, "GAMES"), dir(2, "GAMES")]);
        let games = tree.find_path("GAMES").unwrap();
        assert_eq!(tree.node(games).origin, Some(1));
        assert_eq!(names(&tree, NodeId::ROOT), ["GAMES"]);
        assert!(tree.duplicates().is_empty());
    }

    #[test]
    fn empty_directory_is_not_a_leaf() {
        let tree = HierarchyBuilder::build(&[dir(0, "EMPTY")]);
        let empty = tree.node(tree.find_path("EMPTY").unwrap());
        assert!(empty.children.is_empty());
        assert!(!empty.is_leaf());
    }

    #[test]
    fn duplicate_leaf_is_skipped_and_reported() {
        let tree = HierarchyBuilder::build(&[
            file(0, "A:B", 1),
            file(1, "A:B", 2),
            file(2, "A:B:C", 4),
            dir(3, "A:B"),
            file(4, "A", 8),
        ]);
        let kinds: Vec<_> = tree.duplicates().iter().map(|d| (d.index, d.kind.clone())).collect();
        assert_eq!(kinds, [
            (1, DuplicateKind::PathExists),
            (2, DuplicateKind::PrefixIsFile("A/B".into())),
            (3, DuplicateKind::DirectoryOverFile),
            (4, DuplicateKind::PathExists),
        ]);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root().size, 1);
    }

    #[test]
    fn children_keep_first_seen_order() {
        let tree = HierarchyBuilder::build(&[
            file(0, "Z", 1),
            file(1, "M:X", 1),
            file(2, "A", 1),
            file(3, "M:B", 1),
        ]);
        assert_eq!(names(&tree, NodeId::ROOT), ["Z", "M", "A"]);
        assert_eq!(names(&tree, tree.find_path("M").unwrap()), ["X", "B"]);
        let order: Vec<_> = tree.iter().map(|(_, n)| n.path.clone()).collect();
        assert_eq!(order, ["", "Z", "M", "M/X", "M/B", "A"]);
    }

    #[test]
    fn sizes_aggregate_bottom_up() {
        let tree = HierarchyBuilder::build(&[
            file(0, "A:X", 5),
            file(1, "A:B:Y", 7),
            file(2, "C", 11),
        ]);
        assert_eq!(tree.node(tree.find_path("A/B").unwrap()).size, 7);
        assert_eq!(tree.node(tree.find_path("A").unwrap()).size, 12);
        assert_eq!(tree.root().size, 23);
    }

    #[test]
    fn resume_extends_and_reaggregates() {
        let tree = HierarchyBuilder::build(&[file(0, "A:X", 5)]);
        let mut builder = HierarchyBuilder::resume(tree);
        builder.push(&file(1, "A:Y", 6)).unwrap();
        let tree = builder.finish();
        assert_eq!(tree.node(tree.find_path("A").unwrap()).size, 11);
        assert_eq!(tree.root().size, 11);
    }

    #[test]
    fn slash_inside_a_name_keeps_paths_distinct() {
        let tree = HierarchyBuilder::build(&[file(0, "Mac:My/File", 1), file(1, "Mac:My:File", 2)]);
        assert!(tree.duplicates().is_empty());

        let slashed = tree.find_path("Mac/My%2FFile").unwrap();
        let nested = tree.find_path("Mac/My/File").unwrap();
        assert_ne!(slashed, nested);
        assert_eq!(tree.node(slashed).origin, Some(0));
        assert_eq!(tree.node(slashed).name, "My/File");
        assert_eq!(tree.node(nested).origin, Some(1));
        assert_eq!(tree.find(&["Mac".into(), "My/File".into()]), Some(slashed));

        let paths: Vec<_> = tree.iter().map(|(_, n)| n.path.clone()).collect();
        assert_eq!(paths, ["", "Mac", "Mac/My%2FFile", "Mac/My", "Mac/My/File"]);
    }

    #[test]
    fn separator_only_path_is_the_root() {
        let tree = HierarchyBuilder::build(&[dir(0, ":"), file(1, "::", 1)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.duplicates()[0].kind, DuplicateKind::RootPath);
    }
}
