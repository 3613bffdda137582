//! Nested bucket tree holding the live writers
//!
//! Levels are year, month, day and hour; hours hold the leaves. Removal is
//! always followed by upward pruning so no branch is ever left empty.

use std::collections::BTreeMap;

use crate::writer::entry::WriterEntry;

/// A tree node: either children keyed by path segment, or a writer
#[derive(Debug, Clone)]
pub enum Node {
    Branch(BTreeMap<u32, Node>),
    Leaf(WriterEntry),
}

impl Node {
    fn empty_branch() -> Self {
        Node::Branch(BTreeMap::new())
    }

    /// Move every writer under this node into `out`
    fn collect_leaves(self, out: &mut Vec<WriterEntry>) {
        match self {
            Node::Leaf(entry) => out.push(entry),
            Node::Branch(children) => {
                for (_, child) in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    fn count_leaves(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Branch(children) => children.values().map(Node::count_leaves).sum(),
        }
    }

    fn flatten_into(&self, path: &mut Vec<u32>, out: &mut Vec<(Vec<u32>, WriterEntry)>) {
        match self {
            Node::Leaf(entry) => out.push((path.clone(), entry.clone())),
            Node::Branch(children) => {
                for (segment, child) in children {
                    path.push(*segment);
                    child.flatten_into(path, out);
                    path.pop();
                }
            }
        }
    }
}

/// Writers indexed by bucket path
#[derive(Debug, Clone, Default)]
pub struct WriterTree {
    root: BTreeMap<u32, Node>,
}

impl WriterTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level children (years)
    pub fn root(&self) -> &BTreeMap<u32, Node> {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of writers in the tree
    pub fn len(&self) -> usize {
        self.root.values().map(Node::count_leaves).sum()
    }

    /// Look up the node at `path`
    pub fn node(&self, path: &[u32]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get(first)?;
        for segment in rest {
            node = match node {
                Node::Branch(children) => children.get(segment)?,
                Node::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &[u32]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get_mut(first)?;
        for segment in rest {
            node = match node {
                Node::Branch(children) => children.get_mut(segment)?,
                Node::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    /// Look up the writer at `path`
    pub fn get(&self, path: &[u32]) -> Option<&WriterEntry> {
        match self.node(path)? {
            Node::Leaf(entry) => Some(entry),
            Node::Branch(_) => None,
        }
    }

    /// Place `entry` at its bucket path, returning whatever it displaced
    pub fn insert(&mut self, entry: WriterEntry) -> Vec<WriterEntry> {
        let segments = entry.key.segments();
        let mut displaced = Vec::new();
        insert_at(&mut self.root, segments[0], &segments[1..], entry, &mut displaced);
        displaced
    }

    /// Detach the node at `path` without pruning
    pub fn remove(&mut self, path: &[u32]) -> Option<Node> {
        let (last, parents) = path.split_last()?;
        if parents.is_empty() {
            return self.root.remove(last);
        }
        match self.node_mut(parents)? {
            Node::Branch(children) => children.remove(last),
            Node::Leaf(_) => None,
        }
    }

    /// Remove empty ancestors of `path`, starting at its parent
    ///
    /// Stops at the first non-empty ancestor or at the root. A writer found
    /// where a branch belongs is detached too and returned for closing.
    pub fn prune(&mut self, path: &[u32]) -> Vec<WriterEntry> {
        let mut remnants = Vec::new();
        let mut depth = path.len().saturating_sub(1);

        while depth > 0 {
            let prefix = &path[..depth];
            let removable = match self.node(prefix) {
                Some(Node::Leaf(_)) => true,
                Some(Node::Branch(children)) => children.is_empty(),
                None => true,
            };
            if !removable {
                break;
            }
            if let Some(node) = self.remove(prefix) {
                node.collect_leaves(&mut remnants);
            }
            depth -= 1;
        }

        remnants
    }

    /// Remove the node at `path` and prune; returns every writer taken out
    pub fn remove_and_prune(&mut self, path: &[u32]) -> Vec<WriterEntry> {
        let mut removed = Vec::new();
        if let Some(node) = self.remove(path) {
            node.collect_leaves(&mut removed);
        }
        removed.extend(self.prune(path));
        removed
    }

    /// All writers with their tree paths, in path order
    pub fn flatten(&self) -> Vec<(Vec<u32>, WriterEntry)> {
        let mut out = Vec::new();
        let mut path = Vec::with_capacity(4);
        for (segment, node) in &self.root {
            path.push(*segment);
            node.flatten_into(&mut path, &mut out);
            path.pop();
        }
        out
    }
}

fn insert_at(
    children: &mut BTreeMap<u32, Node>,
    segment: u32,
    rest: &[u32],
    entry: WriterEntry,
    displaced: &mut Vec<WriterEntry>,
) {
    match rest.split_first() {
        None => {
            if let Some(old) = children.insert(segment, Node::Leaf(entry)) {
                old.collect_leaves(displaced);
            }
        }
        Some((next, rest)) => {
            let node = children.entry(segment).or_insert_with(Node::empty_branch);
            if let Node::Leaf(_) = node {
                std::mem::replace(node, Node::empty_branch()).collect_leaves(displaced);
            }
            if let Node::Branch(sub) = node {
                insert_at(sub, *next, rest, entry, displaced);
            }
        }
    }
}
