use ahash::{HashMap, HashMapExt};
use indicatif::ParallelProgressIterator;
use log::{info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    contracted_graph::ContractedGraph,
    contraction_params::ContractionParams,
    priority_function::PriorityTerms,
    vertex_info::{Shortcut, VertexInfo},
    witness_search::{RemainingGraph, WitnessCalculator},
};
use crate::{
    error::{Result, RoutingError},
    graphs::{
        adjacency_store::AdjacencyStore,
        edge::{EdgeDirection, EdgeLayout, EdgeRecord},
        restrictions::RestrictionSet,
        EdgeId, Rank, VertexId,
    },
    queue::{heap_queue::HeapQueue, QueueElement},
    search::turns::TurnRules,
    utility::get_progressbar_long_jobs,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractionStats {
    /// Shortcuts in the frozen graph, each counted once.
    pub shortcuts: usize,
    /// Pops whose fresh priority sent the vertex back into the queue.
    pub requeued: usize,
    /// Original edges left in the frozen graph, each counted once.
    pub original_edges: usize,
    /// Most original edges a single shortcut stands for.
    pub max_shortcut_span: u32,
}

/// Contracts one vertex at a time in the order of a lazily updated priority.
pub struct HierarchyBuilder {
    params: ContractionParams,
    priority_terms: PriorityTerms,
    witness: WitnessCalculator,
    queue: HeapQueue<VertexId>,
}

impl HierarchyBuilder {
    pub fn new(params: ContractionParams) -> Self {
        let priority_terms = params.priority_terms();
        HierarchyBuilder::with_priority_terms(params, priority_terms)
    }

    pub fn with_priority_terms(params: ContractionParams, priority_terms: PriorityTerms) -> Self {
        let witness = WitnessCalculator::new(params.hop_limit, params.settle_limit);
        HierarchyBuilder {
            params,
            priority_terms,
            witness,
            queue: HeapQueue::new(),
        }
    }

    /// Generates the contraction hierarchy of `store`. Nothing is returned
    /// unless every vertex got contracted and the result passed its checks.
    pub fn build(
        &mut self,
        mut store: AdjacencyStore,
        restrictions: RestrictionSet,
    ) -> Result<(ContractedGraph, ContractionStats)> {
        validate(&store, &restrictions)?;
        let turns = TurnRules::for_layout(store.layout(), Some(&restrictions))?;
        let number_of_vertices = store.number_of_vertices();

        let mut original_edges = vec![1; store.arena_len()];
        let mut contracted = vec![false; number_of_vertices as usize];
        let mut ranks: Vec<Rank> = vec![0; number_of_vertices as usize];
        let mut stats = ContractionStats::default();

        info!("initializing queue for {} vertices", number_of_vertices);
        let graph = RemainingGraph {
            store: &store,
            contracted: &contracted,
            turns,
        };
        self.initialize(&graph, &original_edges);

        info!("start contracting");
        let bar = get_progressbar_long_jobs("contracting", number_of_vertices as u64, self.params.show_progress);
        let mut rank: Rank = 0;
        loop {
            let graph = RemainingGraph {
                store: &store,
                contracted: &contracted,
                turns,
            };
            let Some(info) = self.pop(&graph, &original_edges, &mut stats) else {
                break;
            };

            let mut added = 0;
            for shortcut in &info.shortcuts {
                if insert_shortcut(&mut store, &mut original_edges, shortcut, self.params.allow_parallel_edges)? {
                    added += 1;
                }
            }

            contracted[info.vertex as usize] = true;
            ranks[info.vertex as usize] = rank;
            trace!(
                "contracted {} with rank {}, {} of {} shortcuts inserted",
                info.vertex,
                rank,
                added,
                info.shortcuts.len()
            );
            rank += 1;
            bar.inc(1);
        }
        bar.finish_and_clear();

        if rank != number_of_vertices {
            return Err(RoutingError::InvariantViolation(format!(
                "contracted {} of {} vertices",
                rank, number_of_vertices
            )));
        }

        let snapshot = original_edges.clone();
        let graph = ContractedGraph::new_observed(store, ranks, restrictions, &mut |old, new| {
            let (old, new) = (old as usize, new as usize);
            if original_edges.len() <= new {
                original_edges.resize(new + 1, 1);
            }
            original_edges[new] = snapshot.get(old).copied().unwrap_or(1);
        })?;
        original_edges.truncate(graph.store().arena_len());

        for vertex in 0..graph.number_of_vertices() {
            for (id, record) in graph.store().edges(vertex) {
                if !record.direction().forward() || record.is_turn_loop() {
                    continue;
                }
                if record.is_shortcut() {
                    stats.shortcuts += 1;
                    stats.max_shortcut_span = stats
                        .max_shortcut_span
                        .max(original_edges.get(id as usize).copied().unwrap_or(1));
                } else {
                    stats.original_edges += 1;
                }
            }
        }
        info!(
            "finished contraction with {} shortcuts and {} requeues",
            stats.shortcuts, stats.requeued
        );

        Ok((graph, stats))
    }

    fn initialize(&mut self, graph: &RemainingGraph, original_edges: &[u32]) {
        self.priority_terms
            .iter_mut()
            .for_each(|(_, function)| function.initialize(graph.store));

        let number_of_vertices = graph.store.number_of_vertices();
        let bar = get_progressbar_long_jobs(
            "initializing queue",
            number_of_vertices as u64,
            self.params.show_progress,
        );
        let witness = self.witness;
        let priority_terms = &self.priority_terms;
        let elements: Vec<_> = (0..number_of_vertices)
            .into_par_iter()
            .progress_with(bar)
            .map(|vertex| {
                let info = VertexInfo::build(graph, &witness, original_edges, vertex);
                QueueElement::new(priority(priority_terms, &info), vertex)
            })
            .collect();
        self.queue = elements.into_iter().collect();
    }

    // Lazy popping of the vertex with minimum priority.
    fn pop(
        &mut self,
        graph: &RemainingGraph,
        original_edges: &[u32],
        stats: &mut ContractionStats,
    ) -> Option<VertexInfo> {
        while let Some(QueueElement { item: vertex, .. }) = self.queue.pop() {
            // If the fresh priority is greater than the minimum priority, then
            // repush the vertex with its updated priority.
            let info = VertexInfo::build(graph, &self.witness, original_edges, vertex);
            let fresh = priority(&self.priority_terms, &info);
            if self.queue.peek().is_some_and(|next| fresh > next.key) {
                self.queue.push(fresh, vertex);
                stats.requeued += 1;
                continue;
            }

            self.priority_terms
                .iter_mut()
                .for_each(|(_, function)| function.update(&info));
            return Some(info);
        }
        None
    }
}

fn priority(priority_terms: &PriorityTerms, info: &VertexInfo) -> f64 {
    priority_terms
        .iter()
        .map(|(coefficient, function)| coefficient * function.priority(info) as f64)
        .sum()
}

/// Rejects inputs the builder cannot contract, before any work is done.
fn validate(store: &AdjacencyStore, restrictions: &RestrictionSet) -> Result<()> {
    if !restrictions.is_empty() && store.layout() == EdgeLayout::VertexBased {
        return Err(RoutingError::UnsupportedConfiguration(
            "turn restrictions need an edge-based graph".to_string(),
        ));
    }
    if restrictions.max_sequence_len() > 3 {
        return Err(RoutingError::UnsupportedConfiguration(format!(
            "restriction sequences of {} vertices cannot be contracted, at most 3 are supported",
            restrictions.max_sequence_len()
        )));
    }

    // Every forward record needs a backward record at its head describing the
    // same travel, or backward searches would miss it.
    let mut balance: HashMap<(VertexId, VertexId, u64, VertexId, VertexId, VertexId), i64> = HashMap::new();
    for vertex in 0..store.number_of_vertices() {
        for (_, record) in store.edges(vertex) {
            if record.is_turn_loop() {
                continue;
            }
            if record.direction().forward() {
                *balance.entry(travel_key(record)).or_default() += 1;
            }
            if record.direction().backward() {
                *balance.entry(travel_key(&record.mirrored())).or_default() -= 1;
            }
        }
    }
    if let Some(((tail, head, ..), _)) = balance.iter().find(|(_, count)| **count != 0) {
        return Err(RoutingError::MalformedInput(format!(
            "edge {} -> {} is not stored at both of its endpoints",
            tail, head
        )));
    }
    Ok(())
}

fn travel_key(record: &EdgeRecord) -> (VertexId, VertexId, u64, VertexId, VertexId, VertexId) {
    (
        record.tail(),
        record.head(),
        record.weight().to_bits(),
        record.via().unwrap_or(VertexId::MAX),
        record.sequence1(),
        record.sequence2(),
    )
}

/// Keeps a per-edge side table in sync with record moves.
fn follow_moves(table: &mut Vec<u32>) -> impl FnMut(EdgeId, EdgeId) + '_ {
    move |old, new| {
        let (old, new) = (old as usize, new as usize);
        if table.len() <= new {
            table.resize(new + 1, 1);
        }
        table[new] = table.get(old).copied().unwrap_or(1);
    }
}

fn set_span(table: &mut Vec<u32>, id: EdgeId, span: u32) {
    let id = id as usize;
    if table.len() <= id {
        table.resize(id + 1, 1);
    }
    table[id] = span;
}

/// Whether `record` is a forward record the shortcut would duplicate.
fn is_parallel(store: &AdjacencyStore, record: &EdgeRecord, shortcut: &Shortcut) -> bool {
    record.direction().forward()
        && record.tail() == shortcut.tail
        && record.head() == shortcut.head
        && (store.layout() == EdgeLayout::VertexBased
            || (record.sequence1() == shortcut.sequence1 && record.sequence2() == shortcut.sequence2))
}

fn find_parallel(store: &AdjacencyStore, shortcut: &Shortcut) -> Option<(EdgeId, EdgeRecord)> {
    store
        .edges_between(shortcut.tail, shortcut.head)
        .find(|(_, record)| is_parallel(store, record, shortcut))
        .map(|(id, record)| (id, *record))
}

/// Inserts `shortcut` as a forward record at its tail and a backward record at
/// its head. Unless parallel edges are allowed, a lighter or equal parallel
/// record wins and a heavier one is retired. Returns whether it was inserted.
fn insert_shortcut(
    store: &mut AdjacencyStore,
    original_edges: &mut Vec<u32>,
    shortcut: &Shortcut,
    allow_parallel_edges: bool,
) -> Result<bool> {
    if !allow_parallel_edges {
        let dominated = store
            .edges_between(shortcut.tail, shortcut.head)
            .any(|(_, record)| is_parallel(store, record, shortcut) && record.weight() <= shortcut.weight);
        if dominated {
            return Ok(false);
        }
        while let Some((id, record)) = find_parallel(store, shortcut) {
            retire(store, original_edges, id, &record)?;
        }
    }

    let record = EdgeRecord::new(
        shortcut.tail,
        shortcut.head,
        shortcut.weight,
        EdgeDirection::Forward,
        shortcut.payload(),
    );
    let mirrored = record.mirrored();
    // Spans are set right away: for loops the second push may move the first
    // record, and moves carry the span along.
    let forward = store.add_edge_observed(
        record.tail(),
        record.head(),
        record.weight(),
        EdgeDirection::Forward,
        record.payload(),
        &mut follow_moves(original_edges),
    )?;
    set_span(original_edges, forward, shortcut.original_edges);
    let backward = store.add_edge_observed(
        mirrored.tail(),
        mirrored.head(),
        mirrored.weight(),
        EdgeDirection::Backward,
        mirrored.payload(),
        &mut follow_moves(original_edges),
    )?;
    set_span(original_edges, backward, shortcut.original_edges);
    Ok(true)
}

/// Drops the forward travel of `record` (stored at `id`) and the matching
/// backward travel at its head.
fn retire(store: &mut AdjacencyStore, original_edges: &mut Vec<u32>, id: EdgeId, record: &EdgeRecord) -> Result<()> {
    let mut observer = follow_moves(original_edges);
    clear_flag(store, id, record, EdgeDirection::Backward, &mut observer);

    let mirrored = record.mirrored();
    let counterpart = store
        .edges_between(record.head(), record.tail())
        .find(|(_, candidate)| {
            candidate.direction().backward()
                && candidate.weight() == record.weight()
                && candidate.payload() == mirrored.payload()
        })
        .map(|(id, candidate)| (id, *candidate));
    let Some((counterpart_id, counterpart)) = counterpart else {
        return Err(RoutingError::InvariantViolation(format!(
            "edge {} -> {} has no backward record at its head",
            record.tail(),
            record.head()
        )));
    };
    clear_flag(store, counterpart_id, &counterpart, EdgeDirection::Forward, &mut observer);
    Ok(())
}

/// Reduces a record to `keep`, removing it when it carried nothing else.
fn clear_flag(
    store: &mut AdjacencyStore,
    id: EdgeId,
    record: &EdgeRecord,
    keep: EdgeDirection,
    observer: &mut dyn FnMut(EdgeId, EdgeId),
) {
    if record.direction() == EdgeDirection::Both {
        if let Some(stored) = store.edge_mut(id) {
            stored.set_direction(keep);
        }
    } else {
        store.remove_record_observed(id, observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graphs::{edge::EdgePayload, path::EdgePath, Weight},
        search::{bidirectional::shortest_path, SearchOptions},
    };

    /// Weight of the lightest forward record `tail -> head`, if any.
    fn lightest(store: &AdjacencyStore, tail: VertexId, head: VertexId) -> Option<Weight> {
        store
            .edges_between(tail, head)
            .filter(|(_, record)| record.direction().forward())
            .map(|(_, record)| record.weight())
            .reduce(Weight::min)
    }

    fn add_both(store: &mut AdjacencyStore, tail: VertexId, head: VertexId, weight: Weight) {
        store
            .add_edge(tail, head, weight, EdgeDirection::Both, EdgePayload::Original)
            .unwrap();
    }

    fn cycle(length: u32) -> AdjacencyStore {
        let mut store = AdjacencyStore::new(length, EdgeLayout::VertexBased);
        for vertex in 0..length {
            add_both(&mut store, vertex, (vertex + 1) % length, 1.0);
        }
        store
    }

    #[test]
    fn contracted_cycle_keeps_all_distances() {
        let (graph, stats) = HierarchyBuilder::new(ContractionParams::default())
            .build(cycle(6), RestrictionSet::new())
            .unwrap();
        assert!(stats.shortcuts > 0);
        assert_eq!(stats.original_edges, 12);

        for source in 0..6 {
            for target in 0..6 {
                let path = shortest_path(
                    &graph,
                    &[EdgePath::root(source)],
                    &[EdgePath::root(target)],
                    &SearchOptions::default(),
                )
                .unwrap()
                .unwrap();
                let gap = (source as i32 - target as i32).unsigned_abs();
                assert_eq!(path.weight, gap.min(6 - gap) as Weight);
                assert_eq!(path.edges.len() as Weight, path.weight);
            }
        }
    }

    #[test]
    fn span_table_follows_every_move() {
        let (graph, stats) = HierarchyBuilder::new(ContractionParams::default())
            .build(cycle(9), RestrictionSet::new())
            .unwrap();

        let mut max_span = 0;
        for vertex in 0..graph.number_of_vertices() {
            for (id, record) in graph.store().edges(vertex) {
                if record.is_shortcut() && record.direction().forward() {
                    let path = graph.unpack(vertex, vec![(id, *record)], record.weight()).unwrap();
                    max_span = max_span.max(path.edges.len() as u32);
                }
            }
        }
        assert!(max_span >= 2);
        assert_eq!(stats.max_shortcut_span, max_span);
    }

    #[test]
    fn lighter_shortcut_retires_parallel_record() {
        let mut store = AdjacencyStore::new(3, EdgeLayout::VertexBased);
        add_both(&mut store, 0, 1, 1.0);
        add_both(&mut store, 1, 2, 1.0);
        add_both(&mut store, 0, 2, 5.0);
        let mut original_edges = vec![1; store.arena_len()];

        let shortcut = |weight| Shortcut {
            tail: 0,
            head: 2,
            via: 1,
            weight,
            sequence1: 1,
            sequence2: 1,
            original_edges: 2,
        };
        assert!(!insert_shortcut(&mut store, &mut original_edges, &shortcut(5.0), false).unwrap());
        assert!(insert_shortcut(&mut store, &mut original_edges, &shortcut(2.0), false).unwrap());

        assert_eq!(lightest(&store, 0, 2), Some(2.0));
        // The way back still uses the original edge.
        assert_eq!(lightest(&store, 2, 0), Some(5.0));
        let (_, original) = store
            .edges_between(0, 2)
            .find(|(_, record)| !record.is_shortcut())
            .unwrap();
        assert_eq!(original.direction(), EdgeDirection::Backward);
        assert!(validate(&store, &RestrictionSet::new()).is_ok());

        let (id, _) = store
            .edges_between(0, 2)
            .find(|(_, record)| record.is_shortcut())
            .unwrap();
        assert_eq!(original_edges[id as usize], 2);
    }

    #[test]
    fn parallel_shortcuts_are_kept_when_allowed() {
        let mut store = AdjacencyStore::new(3, EdgeLayout::VertexBased);
        add_both(&mut store, 0, 2, 5.0);
        let mut original_edges = vec![1; store.arena_len()];
        let shortcut = Shortcut {
            tail: 0,
            head: 2,
            via: 1,
            weight: 7.0,
            sequence1: 1,
            sequence2: 1,
            original_edges: 2,
        };

        assert!(insert_shortcut(&mut store, &mut original_edges, &shortcut, true).unwrap());
        assert_eq!(store.edges_between(0, 2).count(), 2);
        assert_eq!(lightest(&store, 0, 2), Some(5.0));
    }

    #[test]
    fn unsupported_and_malformed_inputs_are_rejected_up_front() {
        let restrictions = RestrictionSet::from_sequences([vec![0, 1, 2]]).unwrap();
        let result = HierarchyBuilder::new(ContractionParams::default()).build(cycle(3), restrictions);
        assert!(matches!(result, Err(RoutingError::UnsupportedConfiguration(_))));

        let mut store = AdjacencyStore::new(4, EdgeLayout::EdgeBased);
        for vertex in 0..3 {
            add_both(&mut store, vertex, vertex + 1, 1.0);
        }
        let long = RestrictionSet::from_sequences([vec![0, 1, 2, 3]]).unwrap();
        let result = HierarchyBuilder::new(ContractionParams::default()).build(store, long);
        assert!(matches!(result, Err(RoutingError::UnsupportedConfiguration(_))));

        let mut one_sided = AdjacencyStore::new(2, EdgeLayout::VertexBased);
        one_sided
            .add_edge(0, 1, 1.0, EdgeDirection::Forward, EdgePayload::Original)
            .unwrap();
        let result = HierarchyBuilder::new(ContractionParams::default()).build(one_sided, RestrictionSet::new());
        assert!(matches!(result, Err(RoutingError::MalformedInput(_))));
    }
}
