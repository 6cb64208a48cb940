use std::collections::HashMap;

use crate::host::{Node, NodeId, WeakNode};

struct IndexEntry {
    node: WeakNode,
    sequences: Vec<u64>,
}

/// Node to the ordered sequence indices of the mutations that touched it.
///
/// Nodes are held weakly; the index never keeps a detached node alive.
#[derive(Default)]
pub struct NodeMutationIndex {
    entries: HashMap<NodeId, IndexEntry>,
}

impl NodeMutationIndex {
    /// Append `sequence` to the node's entry, creating it if absent.
    /// A node touched twice by the same mutation is indexed once.
    pub fn record(&mut self, node: &Node, sequence: u64) {
        let entry = self.entries.entry(node.id()).or_insert_with(|| IndexEntry {
            node: node.downgrade(),
            sequences: Vec::new(),
        });
        if entry.sequences.last() != Some(&sequence) {
            entry.sequences.push(sequence);
        }
    }

    pub fn sequences_for(&self, node: &Node) -> Vec<u64> {
        self.entries
            .get(&node.id())
            .map(|entry| entry.sequences.clone())
            .unwrap_or_default()
    }

    /// Sequences touching `root` or any node currently beneath it, ascending.
    pub fn sequences_within(&self, root: &Node) -> Vec<u64> {
        let mut sequences: Vec<u64> = self
            .entries
            .values()
            .filter(|entry| entry.node.upgrade().is_some_and(|node| root.contains(&node)))
            .flat_map(|entry| entry.sequences.iter().copied())
            .collect();
        sequences.sort_unstable();
        sequences.dedup();
        sequences
    }

    /// Drop entries of nodes that no longer exist. Returns how many went.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.node.is_alive());
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
