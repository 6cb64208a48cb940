use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use super::recorder::AssignmentEvent;
use super::sequencer::MutationEvent;
use crate::host::{NodeId, ObjectId};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_assignments: u64,
    pub total_mutations: u64,
    /// In order of each target's first write.
    pub assignments_by_target: Vec<TargetSummary>,
    pub assignments_by_field: BTreeMap<String, u64>,
    /// In order of each node's first mutation.
    pub mutations_by_node: Vec<NodeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub target: ObjectId,
    pub label: String,
    pub assignments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub node: NodeId,
    pub mutations: u64,
}

impl Summary {
    pub fn assignments_to(&self, target: ObjectId) -> u64 {
        self.assignments_by_target
            .iter()
            .find(|entry| entry.target == target)
            .map_or(0, |entry| entry.assignments)
    }

    pub fn mutations_of(&self, node: NodeId) -> u64 {
        self.mutations_by_node
            .iter()
            .find(|entry| entry.node == node)
            .map_or(0, |entry| entry.mutations)
    }
}

pub fn compute_summary(assignments: &[AssignmentEvent], mutations: &[MutationEvent]) -> Summary {
    let mut summary = Summary {
        total_assignments: assignments.len() as u64,
        total_mutations: mutations.len() as u64,
        ..Summary::default()
    };

    let mut by_target: IndexMap<ObjectId, TargetSummary> = IndexMap::new();
    for event in assignments {
        by_target
            .entry(event.target)
            .or_insert_with(|| TargetSummary {
                target: event.target,
                label: event.target_label.clone(),
                assignments: 0,
            })
            .assignments += 1;
        *summary.assignments_by_field.entry(event.field.clone()).or_insert(0) += 1;
    }
    summary.assignments_by_target = by_target.into_values().collect();

    let mut by_node: IndexMap<NodeId, u64> = IndexMap::new();
    for event in mutations {
        for node in event.affected() {
            *by_node.entry(node).or_insert(0) += 1;
        }
    }
    summary.mutations_by_node = by_node
        .into_iter()
        .map(|(node, mutations)| NodeSummary { node, mutations })
        .collect();

    summary
}
