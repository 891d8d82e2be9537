//! Kahn's algorithm, shared by strict and permissive topological sort.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::node::NodeId;

/// Returns nodes in topological order. If the graph contains a cycle, the
/// nodes participating in it (and anything only reachable through them)
/// are simply absent from the result — callers decide whether that's an
/// error (`topological_sort_strict`) or acceptable (`topological_sort_permissive`).
///
/// Ties are broken lexicographically by id for deterministic output.
pub(super) fn kahn(
    order: &[NodeId],
    successors: &FxHashMap<NodeId, Vec<NodeId>>,
) -> Vec<NodeId> {
    let mut in_degree: FxHashMap<NodeId, usize> = order.iter().map(|id| (id.clone(), 0)).collect();
    for targets in successors.values() {
        for target in targets {
            *in_degree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<NodeId> = VecDeque::new();
    let mut zero: Vec<NodeId> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| id.clone())
        .collect();
    zero.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    queue.extend(zero);

    let mut result = Vec::with_capacity(order.len());
    while let Some(id) = queue.pop_front() {
        result.push(id.clone());

        if let Some(targets) = successors.get(&id) {
            let mut newly_zero = Vec::new();
            for target in targets {
                if let Some(deg) = in_degree.get_mut(target) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        newly_zero.push(target.clone());
                    }
                }
            }
            newly_zero.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            queue.extend(newly_zero);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> (Vec<NodeId>, FxHashMap<NodeId, Vec<NodeId>>) {
        let mut order = Vec::new();
        let mut successors: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for (from, to) in pairs {
            let from = NodeId::new(*from);
            let to = NodeId::new(*to);
            if !order.contains(&from) {
                order.push(from.clone());
            }
            if !order.contains(&to) {
                order.push(to.clone());
            }
            successors.entry(from).or_default().push(to);
        }
        (order, successors)
    }

    #[test]
    fn linear_chain_sorts_in_order() {
        let (order, succ) = edges(&[("a", "b"), ("b", "c")]);
        let sorted = kahn(&order, &succ);
        assert_eq!(
            sorted,
            vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("c")]
        );
    }

    #[test]
    fn cycle_excludes_participants() {
        let (order, succ) = edges(&[("a", "b"), ("b", "a")]);
        let sorted = kahn(&order, &succ);
        assert!(sorted.is_empty());
    }

    #[test]
    fn partial_cycle_keeps_acyclic_part() {
        let (order, succ) = edges(&[("a", "b"), ("b", "c"), ("c", "b")]);
        let sorted = kahn(&order, &succ);
        assert_eq!(sorted, vec![NodeId::new("a")]);
    }

    #[test]
    fn ties_break_lexicographically() {
        let (order, succ) = edges(&[("a", "x"), ("a", "y"), ("a", "z")]);
        let sorted = kahn(&order, &succ);
        assert_eq!(sorted[0], NodeId::new("a"));
        assert_eq!(&sorted[1..], &[NodeId::new("x"), NodeId::new("y"), NodeId::new("z")]);
    }
}
