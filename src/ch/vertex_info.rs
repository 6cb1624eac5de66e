use ahash::{HashSet, HashSetExt};
use itertools::Itertools;

use super::witness_search::{RemainingGraph, WitnessCalculator};
use crate::graphs::{
    edge::{EdgePayload, EdgeRecord},
    EdgeId, VertexId, Weight,
};

/// A shortcut `tail -> head` replacing the two records around `via`.
#[derive(Clone, Debug, PartialEq)]
pub struct Shortcut {
    pub tail: VertexId,
    pub head: VertexId,
    pub via: VertexId,
    pub weight: Weight,
    pub sequence1: VertexId,
    pub sequence2: VertexId,
    /// Number of original edges the shortcut stands for.
    pub original_edges: u32,
}

impl Shortcut {
    pub fn payload(&self) -> EdgePayload {
        EdgePayload::Shortcut {
            via: self.via,
            sequence1: self.sequence1,
            sequence2: self.sequence2,
        }
    }
}

/// Everything the builder needs to know to rank and contract one vertex.
#[derive(Clone, Debug)]
pub struct VertexInfo {
    pub vertex: VertexId,
    /// Records entering `vertex` from remaining vertices, in travel
    /// orientation `u -> vertex`, with the id of the stored record.
    pub incoming: Vec<(EdgeId, EdgeRecord)>,
    /// Records leaving `vertex` towards remaining vertices.
    pub outgoing: Vec<(EdgeId, EdgeRecord)>,
    /// Shortcuts needed if `vertex` was contracted now.
    pub shortcuts: Vec<Shortcut>,
    pub search_depth: u32,
    pub contracted_neighbors: u32,
    /// Some restriction passes through `vertex`; witness searches get a
    /// larger hop budget.
    pub has_restrictions: bool,
    /// Original edges represented by `incoming` and `outgoing`.
    pub removed_original_edges: u32,
}

impl VertexInfo {
    pub fn build(
        graph: &RemainingGraph,
        witness: &WitnessCalculator,
        original_edges: &[u32],
        vertex: VertexId,
    ) -> VertexInfo {
        let turns = graph.turns;
        let restrictions = turns.restrictions();
        let count = |id: EdgeId| original_edges.get(id as usize).copied().unwrap_or(1);

        let mut incoming = Vec::new();
        let mut outgoing = Vec::new();
        let mut detours = Vec::new();
        let mut contracted_neighbors = HashSet::new();
        for (id, record) in graph.store.edges(vertex) {
            if record.is_loop() {
                if turns.is_edge_based() && record.direction().forward() {
                    detours.push((count(id), *record));
                }
                continue;
            }
            if graph.is_contracted(record.head()) {
                contracted_neighbors.insert(record.head());
                continue;
            }
            if record.direction().backward() {
                incoming.push((id, record.mirrored()));
            }
            if record.direction().forward() {
                outgoing.push((id, *record));
            }
        }

        let has_restrictions = turns.is_edge_based() && restrictions.is_some_and(|set| set.involves(vertex));
        let hop_limit = if has_restrictions {
            witness.hop_limit.saturating_mul(2)
        } else {
            witness.hop_limit
        };
        // Edge-based routes may have to come back to a vertex to turn around.
        let loops_needed = turns.is_edge_based();

        let mut shortcuts = Vec::new();
        let mut search_depth = 0;
        for (in_id, in_record) in &incoming {
            let source = in_record.tail();
            let arrival = in_record.sequence2();
            let mut candidates = Vec::new();
            for (out_id, out_record) in &outgoing {
                let target = out_record.head();
                if target == source && !loops_needed {
                    continue;
                }
                let leave = out_record.sequence1();
                let through = in_record.weight() + out_record.weight();
                let spans = count(*in_id) + count(*out_id);

                let best = if turns.allows_turn(&[arrival, vertex], leave) {
                    Some((through, spans))
                } else {
                    detours
                        .iter()
                        .filter(|(_, detour)| {
                            if detour.is_turn_loop() {
                                turns.allows_turn(&[vertex], leave)
                            } else {
                                turns.allows_turn(&[arrival, vertex], detour.sequence1())
                                    && turns.allows_turn(&[detour.sequence2(), vertex], leave)
                            }
                        })
                        .map(|(detour_spans, detour)| (through + detour.weight(), spans + detour_spans))
                        .min_by(|a, b| a.0.total_cmp(&b.0))
                };
                let Some((weight, original_edges)) = best else {
                    continue;
                };

                candidates.push(Shortcut {
                    tail: source,
                    head: target,
                    via: vertex,
                    weight,
                    sequence1: in_record.sequence1(),
                    sequence2: out_record.sequence2(),
                    original_edges,
                });
            }
            if candidates.is_empty() {
                continue;
            }

            let first = turns.is_edge_based().then(|| in_record.sequence1());
            let targets: Vec<_> = candidates
                .iter()
                .map(|candidate| turns.key(candidate.head, Some(candidate.sequence2)))
                .collect();
            let max_weight = candidates
                .iter()
                .map(|candidate| candidate.weight)
                .fold(0.0, Weight::max);
            let witnesses = witness.witness_weights(graph, source, first, vertex, &targets, max_weight, hop_limit);
            search_depth = search_depth.max(witnesses.depth);

            for (candidate, target) in candidates.into_iter().zip(&targets) {
                if witnesses.weight(target).map_or(true, |weight| weight > candidate.weight) {
                    shortcuts.push(candidate);
                }
            }
        }

        let removed_original_edges = incoming
            .iter()
            .chain(outgoing.iter())
            .map(|(id, _)| count(*id))
            .sum();

        VertexInfo {
            vertex,
            incoming,
            outgoing,
            shortcuts,
            search_depth,
            contracted_neighbors: contracted_neighbors.len() as u32,
            has_restrictions,
            removed_original_edges,
        }
    }

    /// Remaining vertices adjacent to this one.
    pub fn neighbors(&self) -> Vec<VertexId> {
        self.incoming
            .iter()
            .map(|(_, record)| record.tail())
            .chain(self.outgoing.iter().map(|(_, record)| record.head()))
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Original edges added by the shortcuts minus original edges removed.
    pub fn original_edges_difference(&self) -> i32 {
        let added: u32 = self.shortcuts.iter().map(|shortcut| shortcut.original_edges).sum();
        added as i32 - self.removed_original_edges as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graphs::{
            adjacency_store::AdjacencyStore,
            edge::{EdgeDirection, EdgeLayout},
            restrictions::RestrictionSet,
        },
        search::turns::TurnRules,
    };

    fn star(layout: EdgeLayout) -> AdjacencyStore {
        // 1 - 0 - 2 and 3 - 0, with a cheap detour 1 - 3.
        let mut store = AdjacencyStore::new(4, layout);
        for (tail, head, weight) in [(0, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0), (1, 3, 1.5)] {
            store
                .add_edge(tail, head, weight, EdgeDirection::Both, EdgePayload::Original)
                .unwrap();
        }
        store
    }

    #[test]
    fn shortcuts_are_only_added_without_witness() {
        let store = star(EdgeLayout::VertexBased);
        let contracted = vec![false; 4];
        let graph = RemainingGraph {
            store: &store,
            contracted: &contracted,
            turns: TurnRules::vertex_based(),
        };
        let original_edges = vec![1; store.arena_len()];

        let info = VertexInfo::build(&graph, &WitnessCalculator::new(16, 500), &original_edges, 0);
        let mut pairs: Vec<_> = info
            .shortcuts
            .iter()
            .map(|shortcut| (shortcut.tail, shortcut.head))
            .collect();
        pairs.sort();

        // 1 <-> 3 has the detour as witness.
        assert_eq!(pairs, vec![(1, 2), (2, 1), (2, 3), (3, 2)]);
        assert_eq!(info.incoming.len(), 3);
        assert_eq!(info.outgoing.len(), 3);
        assert_eq!(info.neighbors(), vec![1, 2, 3]);
        assert_eq!(info.original_edges_difference(), 4 * 2 - 6);
    }

    #[test]
    fn contracted_neighbors_are_counted_and_skipped() {
        let store = star(EdgeLayout::VertexBased);
        let contracted = vec![false, false, true, false];
        let graph = RemainingGraph {
            store: &store,
            contracted: &contracted,
            turns: TurnRules::vertex_based(),
        };
        let info = VertexInfo::build(&graph, &WitnessCalculator::new(16, 500), &[], 0);

        assert_eq!(info.contracted_neighbors, 1);
        assert!(info.shortcuts.is_empty());
    }

    #[test]
    fn forbidden_turns_produce_no_shortcut() {
        let store = star(EdgeLayout::EdgeBased);
        let contracted = vec![false; 4];
        let restrictions = RestrictionSet::from_sequences([vec![1, 0, 2]]).unwrap();
        let graph = RemainingGraph {
            store: &store,
            contracted: &contracted,
            turns: TurnRules::edge_based(Some(&restrictions)),
        };
        let info = VertexInfo::build(&graph, &WitnessCalculator::new(16, 500), &[], 0);

        assert!(info.has_restrictions);
        assert!(!info
            .shortcuts
            .iter()
            .any(|shortcut| shortcut.tail == 1 && shortcut.head == 2));
        assert!(info
            .shortcuts
            .iter()
            .any(|shortcut| shortcut.tail == 2 && shortcut.head == 1));
    }

    #[test]
    fn unbounded_hop_limit_is_not_doubled_past_the_maximum() {
        let store = star(EdgeLayout::EdgeBased);
        let contracted = vec![false; 4];
        let restrictions = RestrictionSet::from_sequences([vec![1, 0, 2]]).unwrap();
        let graph = RemainingGraph {
            store: &store,
            contracted: &contracted,
            turns: TurnRules::edge_based(Some(&restrictions)),
        };
        let bounded = VertexInfo::build(&graph, &WitnessCalculator::new(16, 500), &[], 0);
        let unbounded = VertexInfo::build(&graph, &WitnessCalculator::new(u32::MAX, 500), &[], 0);

        assert!(unbounded.has_restrictions);
        assert_eq!(unbounded.shortcuts, bounded.shortcuts);
    }

    #[test]
    fn forbidden_turns_can_be_bypassed_over_a_turn_loop() {
        let mut store = star(EdgeLayout::EdgeBased);
        store
            .add_edge(0, 0, 5.0, EdgeDirection::Both, EdgePayload::TurnLoop)
            .unwrap();
        let contracted = vec![false; 4];
        let restrictions = RestrictionSet::from_sequences([vec![1, 0, 2]]).unwrap();
        let graph = RemainingGraph {
            store: &store,
            contracted: &contracted,
            turns: TurnRules::edge_based(Some(&restrictions)),
        };
        let info = VertexInfo::build(&graph, &WitnessCalculator::new(16, 500), &[], 0);

        let detour = info
            .shortcuts
            .iter()
            .find(|shortcut| shortcut.tail == 1 && shortcut.head == 2)
            .unwrap();
        assert_eq!(detour.weight, 7.0);
        assert_eq!(detour.original_edges, 3);
        assert_eq!((detour.sequence1, detour.sequence2), (0, 0));
    }

    #[test]
    fn turning_around_becomes_a_loop_shortcut() {
        let mut store = AdjacencyStore::new(3, EdgeLayout::EdgeBased);
        store
            .add_edge(0, 1, 1.0, EdgeDirection::Both, EdgePayload::Original)
            .unwrap();
        store
            .add_edge(1, 1, 4.0, EdgeDirection::Both, EdgePayload::TurnLoop)
            .unwrap();
        let contracted = vec![false; 3];
        let restrictions = RestrictionSet::from_sequences([vec![0, 2]]).unwrap();
        let graph = RemainingGraph {
            store: &store,
            contracted: &contracted,
            turns: TurnRules::edge_based(Some(&restrictions)),
        };
        let info = VertexInfo::build(&graph, &WitnessCalculator::new(16, 500), &[], 1);

        assert_eq!(info.shortcuts.len(), 1);
        let around = &info.shortcuts[0];
        assert_eq!((around.tail, around.head), (0, 0));
        assert_eq!(around.weight, 6.0);
        assert_eq!((around.sequence1, around.sequence2), (1, 1));

        // Vertex-based searches have no turns to get around.
        let graph = RemainingGraph {
            turns: TurnRules::vertex_based(),
            ..graph
        };
        let info = VertexInfo::build(&graph, &WitnessCalculator::new(16, 500), &[], 1);
        assert!(info.shortcuts.is_empty());
    }
}
