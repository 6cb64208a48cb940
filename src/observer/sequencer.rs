//! Causal log of tree mutations.
//!
//! The sequencer is armed when it is built and stays armed for as long as it
//! lives. Each record of each delivered batch gets the next index (the log's
//! current length), so indices are gap-free and follow delivery order even
//! when a whole batch shares one timestamp.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use super::index::NodeMutationIndex;
use super::time::Timestamp;
use crate::host::{Document, MutationKind, MutationRecord, MutationWatcher, Node, NodeId};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    pub sequence: u64,
    pub kind: MutationKind,
    pub target: NodeId,
    /// Rendering of the target at the time the batch was handled.
    pub description: String,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    pub timestamp: Timestamp,
}

impl MutationEvent {
    /// Target, added and removed nodes, each once.
    pub fn affected(&self) -> Vec<NodeId> {
        let mut nodes = vec![self.target];
        for id in self.removed.iter().chain(&self.added) {
            if !nodes.contains(id) {
                nodes.push(*id);
            }
        }
        nodes
    }
}

/// Which mutations to return.
#[derive(Debug, Clone, Default)]
pub struct MutationQuery {
    node: Option<Node>,
    include_descendants: bool,
}

impl MutationQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// Mutations whose target, added or removed nodes include `node`.
    pub fn node(node: &Node) -> Self {
        Self {
            node: Some(node.clone()),
            include_descendants: false,
        }
    }

    /// Widen a node query to every node currently beneath it.
    #[must_use]
    pub fn with_descendants(mut self) -> Self {
        self.include_descendants = true;
        self
    }
}

#[derive(Default)]
struct SequencerState {
    log: RefCell<Vec<MutationEvent>>,
    index: RefCell<NodeMutationIndex>,
}

impl SequencerState {
    fn handle_batch(&self, batch: &[MutationRecord]) {
        let mut log = self.log.borrow_mut();
        let mut index = self.index.borrow_mut();
        let pruned = index.prune();
        let timestamp = Timestamp::now();

        for record in batch {
            let sequence = log.len() as u64;
            index.record(&record.target, sequence);
            for node in record.removed_nodes.iter().chain(&record.added_nodes) {
                index.record(node, sequence);
            }
            log.push(MutationEvent {
                sequence,
                kind: record.kind,
                target: record.target.id(),
                description: record.target.describe(),
                added: record.added_nodes.iter().map(Node::id).collect(),
                removed: record.removed_nodes.iter().map(Node::id).collect(),
                attribute_name: record.attribute_name.clone(),
                old_value: record.old_value.clone(),
                timestamp,
            });
        }

        debug!(batch = batch.len(), total = log.len(), pruned, "mutation batch sequenced");
    }
}

impl MutationWatcher for SequencerState {
    fn on_mutations(&self, batch: &[MutationRecord]) {
        self.handle_batch(batch);
    }
}

/// Subscribes to a document's change notifications and sequences them.
pub struct MutationSequencer {
    state: Rc<SequencerState>,
}

impl MutationSequencer {
    pub fn arm(document: &Document) -> Self {
        let state = Rc::new(SequencerState::default());
        let watcher: Rc<dyn MutationWatcher> = state.clone();
        document.watch(&watcher);
        info!("mutation sequencer armed");
        Self { state }
    }

    /// Events selected by `query`, in sequence order.
    pub fn query(&self, query: &MutationQuery) -> Vec<MutationEvent> {
        let log = self.state.log.borrow();
        let Some(node) = &query.node else {
            return log.clone();
        };
        let index = self.state.index.borrow();
        let sequences = if query.include_descendants {
            index.sequences_within(node)
        } else {
            index.sequences_for(node)
        };
        sequences
            .into_iter()
            .filter_map(|sequence| log.get(sequence as usize).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.log.borrow().is_empty()
    }

    /// Nodes with an index entry. Entries of dropped nodes go when the next
    /// batch arrives.
    pub fn indexed_nodes(&self) -> usize {
        self.state.index.borrow().len()
    }
}
