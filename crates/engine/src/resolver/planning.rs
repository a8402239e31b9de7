//! Feature ordering over the run-after dependency graph.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, HashSet},
};

use indexmap::IndexMap;

use crate::error::LoadError;

/// Topologically orders `names` given `(dependency, dependent)` edges.
///
/// Among features that are ready at the same time the one listed first in
/// `names` runs first, so the incoming order is kept wherever the edges allow
/// it. Unknown endpoints must be rejected by the caller beforehand.
pub(crate) fn order_features(names: &[String], edges: &[(String, String)]) -> Result<Vec<usize>, LoadError> {
    let mut lookup: IndexMap<&str, usize> = IndexMap::new();
    for (position, name) in names.iter().enumerate() {
        if lookup.insert(name.as_str(), position).is_some() {
            return Err(LoadError::DuplicateFeature(name.clone()));
        }
    }

    let mut in_degrees = vec![0usize; names.len()];
    let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut seen_edges = HashSet::new();
    for (dependency, dependent) in edges {
        let (Some(&from), Some(&to)) = (lookup.get(dependency.as_str()), lookup.get(dependent.as_str())) else {
            continue;
        };
        if !seen_edges.insert((from, to)) {
            continue;
        }
        in_degrees[to] += 1;
        adjacency.entry(from).or_default().push(to);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degrees
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(position, _)| Reverse(position))
        .collect();

    let mut ordered = Vec::with_capacity(names.len());
    while let Some(Reverse(position)) = ready.pop() {
        ordered.push(position);
        if let Some(children) = adjacency.get(&position) {
            for &child in children {
                in_degrees[child] -= 1;
                if in_degrees[child] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }
    }

    if ordered.len() != names.len() {
        let blocked: HashSet<usize> = (0..names.len()).filter(|position| in_degrees[*position] > 0).collect();
        let mut participants: Vec<String> = on_cycles(blocked, &adjacency)
            .into_iter()
            .map(|position| names[position].clone())
            .collect();
        participants.sort();
        return Err(LoadError::Cycle { participants });
    }

    Ok(ordered)
}

/// Narrows the nodes Kahn's algorithm could not release to those on a cycle.
///
/// A blocked node without an edge to another blocked node is only downstream
/// of a cycle; such nodes are peeled off until none is left.
fn on_cycles(mut blocked: HashSet<usize>, adjacency: &HashMap<usize, Vec<usize>>) -> HashSet<usize> {
    loop {
        let downstream: Vec<usize> = blocked
            .iter()
            .copied()
            .filter(|node| {
                !adjacency
                    .get(node)
                    .is_some_and(|children| children.iter().any(|child| blocked.contains(child)))
            })
            .collect();
        if downstream.is_empty() {
            return blocked;
        }
        for node in downstream {
            blocked.remove(&node);
        }
    }
}
