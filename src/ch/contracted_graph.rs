use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path as FilePath,
};

use ahash::{HashMap, HashMapExt};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RoutingError},
    graphs::{
        adjacency_store::AdjacencyStore,
        edge::{EdgeLayout, EdgeRecord},
        path::{EdgePath, Path},
        restrictions::RestrictionSet,
        EdgeId, Graph, Rank, VertexId, Weight,
    },
    search::turns::TurnRules,
};

/// Frozen hierarchy: the store with all shortcuts, a rank per vertex and, per
/// vertex, the start of the run suffix holding its upward records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractedGraph {
    store: AdjacencyStore,
    ranks: Vec<Rank>,
    upward_start: Vec<u32>,
    restrictions: RestrictionSet,
}

impl ContractedGraph {
    pub fn new(store: AdjacencyStore, ranks: Vec<Rank>, restrictions: RestrictionSet) -> Result<ContractedGraph> {
        ContractedGraph::new_observed(store, ranks, restrictions, &mut |_, _| {})
    }

    /// Freezes `store`. Record moves caused by compaction and sorting are
    /// reported as one composed permutation, `(id before, id after)`, so a
    /// side table has to apply them against a snapshot of itself.
    pub fn new_observed(
        mut store: AdjacencyStore,
        ranks: Vec<Rank>,
        restrictions: RestrictionSet,
        on_edge_moved: &mut dyn FnMut(EdgeId, EdgeId),
    ) -> Result<ContractedGraph> {
        let number_of_vertices = store.number_of_vertices() as usize;
        if ranks.len() != number_of_vertices {
            return Err(RoutingError::MalformedInput(format!(
                "{} ranks for {} vertices",
                ranks.len(),
                number_of_vertices
            )));
        }
        if let Some(rank) = first_misplaced_rank(&ranks) {
            return Err(RoutingError::MalformedInput(format!(
                "ranks are not a permutation, rank {} is out of range or repeated",
                rank
            )));
        }
        if !restrictions.is_empty() && store.layout() == EdgeLayout::VertexBased {
            return Err(RoutingError::UnsupportedConfiguration(
                "turn restrictions need an edge-based graph".to_string(),
            ));
        }

        let mut compacted: HashMap<EdgeId, EdgeId> = HashMap::new();
        store.compact(&mut |old, new| {
            compacted.insert(old, new);
        });
        let is_upward = |record: &EdgeRecord| {
            record.is_loop() || ranks[record.head() as usize] > ranks[record.tail() as usize]
        };
        let mut sorted: HashMap<EdgeId, EdgeId> = HashMap::new();
        store.sort_runs_by_key(
            |record| (is_upward(record), ranks[record.head() as usize]),
            &mut |old, new| {
                sorted.insert(old, new);
            },
        );
        report_composed_moves(&compacted, &sorted, on_edge_moved);

        let upward_start = (0..store.number_of_vertices())
            .map(|vertex| {
                let range = store.run_range(vertex);
                let downward = store.edges(vertex).filter(|(_, record)| !is_upward(record)).count();
                (range.start + downward) as u32
            })
            .collect();

        let graph = ContractedGraph {
            store,
            ranks,
            upward_start,
            restrictions,
        };
        graph.verify_rank_monotonicity()?;
        info!(
            "froze hierarchy with {} vertices and {} records",
            graph.number_of_vertices(),
            graph.store.number_of_records()
        );
        Ok(graph)
    }

    pub fn store(&self) -> &AdjacencyStore {
        &self.store
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn restrictions(&self) -> &RestrictionSet {
        &self.restrictions
    }

    pub fn number_of_vertices(&self) -> u32 {
        self.store.number_of_vertices()
    }

    pub fn number_of_shortcuts(&self) -> usize {
        (0..self.number_of_vertices())
            .flat_map(|vertex| self.store.edges(vertex))
            .filter(|(_, record)| record.is_shortcut())
            .count()
    }

    /// Linear scan asserting that the ranks are a permutation, every run and
    /// upward slice lies inside the arena, and every record in an upward slice
    /// leads to a higher ranked vertex. Also run on graphs read from disk.
    pub fn verify_rank_monotonicity(&self) -> Result<()> {
        let number_of_vertices = self.number_of_vertices();
        if self.ranks.len() != number_of_vertices as usize || self.upward_start.len() != number_of_vertices as usize {
            return Err(RoutingError::InvariantViolation(
                "rank table does not match the vertex count".to_string(),
            ));
        }
        if let Some(rank) = first_misplaced_rank(&self.ranks) {
            return Err(RoutingError::InvariantViolation(format!(
                "rank {} is out of range or repeated",
                rank
            )));
        }
        if !self.restrictions.is_empty() && self.layout() == EdgeLayout::VertexBased {
            return Err(RoutingError::InvariantViolation(
                "turn restrictions stored with a vertex-based graph".to_string(),
            ));
        }

        for vertex in 0..number_of_vertices {
            let range = self.store.run_range(vertex);
            if range.end > self.store.arena_len() {
                return Err(RoutingError::InvariantViolation(format!(
                    "run of {} ends outside the arena",
                    vertex
                )));
            }
            let start = self.upward_start[vertex as usize] as usize;
            if start < range.start || start > range.end {
                return Err(RoutingError::InvariantViolation(format!(
                    "upward slice of {} starts outside its run",
                    vertex
                )));
            }
            let rank = self.ranks[vertex as usize];
            for (_, record) in self.upward_edges(vertex) {
                if record.is_loop() {
                    continue;
                }
                match self.ranks.get(record.head() as usize) {
                    Some(&head_rank) if head_rank > rank => {}
                    head_rank => {
                        return Err(RoutingError::InvariantViolation(format!(
                            "upward record {} -> {} goes from rank {} to rank {:?}",
                            vertex,
                            record.head(),
                            rank,
                            head_rank
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Expands the meeting of a forward and a backward search into a route
    /// over original records.
    pub fn unpack_route(&self, forward: &EdgePath, backward: &EdgePath) -> Result<Path> {
        let mut hops = Vec::new();
        for (id, _) in forward.hops() {
            hops.push((id, *self.record(id)?));
        }
        for (id, _) in backward.hops().into_iter().rev() {
            // Backward records are stored at the far end; mirror them into
            // travel orientation.
            hops.push((id, self.record(id)?.mirrored()));
        }

        self.unpack(forward.root_vertex(), hops, forward.weight + backward.weight)
    }

    /// Replaces shortcut hops, given in travel orientation, by the original
    /// records they stand for.
    pub fn unpack(&self, start: VertexId, hops: Vec<(EdgeId, EdgeRecord)>, weight: Weight) -> Result<Path> {
        let mut path = Path {
            vertices: vec![start],
            edges: Vec::new(),
            weight,
        };

        let mut stack: Vec<(EdgeId, EdgeRecord)> = hops.into_iter().rev().collect();
        while let Some((id, record)) = stack.pop() {
            match record.via() {
                None => {
                    path.vertices.push(record.head());
                    path.edges.push(id);
                }
                Some(via) => stack.extend(self.bypassed(&record, via)?.into_iter().rev()),
            }
        }

        Ok(path)
    }

    /// The records a shortcut bypasses, in travel orientation: the record into
    /// `via`, optionally a loop at `via`, and the record out of it. Among the
    /// legal combinations the one closest to the shortcut weight wins.
    fn bypassed(&self, shortcut: &EdgeRecord, via: VertexId) -> Result<Vec<(EdgeId, EdgeRecord)>> {
        let turns = TurnRules::for_layout(self.store.layout(), Some(&self.restrictions))?;
        let edge_based = turns.is_edge_based();
        let firsts: Vec<_> = self
            .travel_records(shortcut.tail(), via)
            .filter(|(_, record)| !edge_based || record.sequence1() == shortcut.sequence1())
            .collect();
        let seconds: Vec<_> = self
            .travel_records(via, shortcut.head())
            .filter(|(_, record)| !edge_based || record.sequence2() == shortcut.sequence2())
            .collect();
        let loops: Vec<_> = self
            .store
            .edges(via)
            .filter(|(_, record)| edge_based && record.is_loop() && record.direction().forward())
            .map(|(id, record)| (id, *record))
            .collect();

        let mut best: Option<(Vec<(EdgeId, EdgeRecord)>, Weight)> = None;
        let mut consider = |pieces: Vec<(EdgeId, EdgeRecord)>| {
            let weight: Weight = pieces.iter().map(|(_, record)| record.weight()).sum();
            let deviation = (weight - shortcut.weight()).abs();
            if best.as_ref().map_or(true, |(_, current)| deviation < *current) {
                best = Some((pieces, deviation));
            }
        };

        for first in &firsts {
            let arrival = first.1.sequence2();
            for second in &seconds {
                let leave = second.1.sequence1();
                if turns.allows_turn(&[arrival, via], leave) {
                    consider(vec![*first, *second]);
                    continue;
                }
                for detour in &loops {
                    let record = &detour.1;
                    let legal = if record.is_turn_loop() {
                        turns.allows_turn(&[via], leave)
                    } else {
                        turns.allows_turn(&[arrival, via], record.sequence1())
                            && turns.allows_turn(&[record.sequence2(), via], leave)
                    };
                    if legal {
                        consider(vec![*first, *detour, *second]);
                    }
                }
            }
        }

        best.map(|(pieces, _)| pieces).ok_or_else(|| {
            RoutingError::InvariantViolation(format!(
                "shortcut {} -> {} via {} has no bypassed records",
                shortcut.tail(),
                shortcut.head(),
                via
            ))
        })
    }

    /// Records usable to travel `from -> to`, whichever endpoint stores them.
    fn travel_records(&self, from: VertexId, to: VertexId) -> impl Iterator<Item = (EdgeId, EdgeRecord)> + '_ {
        let at_tail = self
            .store
            .edges_between(from, to)
            .filter(|(_, record)| record.direction().forward())
            .map(|(id, record)| (id, *record));
        let at_head = self
            .store
            .edges_between(to, from)
            .filter(|(_, record)| record.direction().backward())
            .map(|(id, record)| (id, record.mirrored()));
        at_tail.chain(at_head)
    }

    fn record(&self, id: EdgeId) -> Result<&EdgeRecord> {
        self.store
            .edge(id)
            .ok_or_else(|| RoutingError::InvariantViolation(format!("search used missing record {}", id)))
    }

    pub fn write_to_file(&self, path: &FilePath) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn read_from_file(path: &FilePath) -> Result<ContractedGraph> {
        let reader = BufReader::new(File::open(path)?);
        let graph: ContractedGraph = bincode::deserialize_from(reader)?;
        graph.verify_rank_monotonicity()?;
        Ok(graph)
    }
}

/// A rank that is out of range or repeated, if any.
fn first_misplaced_rank(ranks: &[Rank]) -> Option<Rank> {
    let mut seen = vec![false; ranks.len()];
    for &rank in ranks {
        match seen.get_mut(rank as usize) {
            Some(slot) if !*slot => *slot = true,
            _ => return Some(rank),
        }
    }
    None
}

/// Reports `first` followed by `second` as a single set of moves.
fn report_composed_moves(
    first: &HashMap<EdgeId, EdgeId>,
    second: &HashMap<EdgeId, EdgeId>,
    on_edge_moved: &mut dyn FnMut(EdgeId, EdgeId),
) {
    let origin: HashMap<EdgeId, EdgeId> = first.iter().map(|(&old, &new)| (new, old)).collect();
    for (&middle, &new) in second {
        let old = origin.get(&middle).copied().unwrap_or(middle);
        if old != new {
            on_edge_moved(old, new);
        }
    }
    for (&old, &middle) in first {
        if !second.contains_key(&middle) {
            on_edge_moved(old, middle);
        }
    }
}

impl Graph for ContractedGraph {
    fn number_of_vertices(&self) -> u32 {
        self.store.number_of_vertices()
    }

    fn edges(&self, vertex: VertexId) -> Box<dyn Iterator<Item = (EdgeId, &EdgeRecord)> + '_> {
        Box::new(self.store.edges(vertex))
    }

    fn layout(&self) -> EdgeLayout {
        self.store.layout()
    }

    fn rank(&self, vertex: VertexId) -> Option<Rank> {
        self.ranks.get(vertex as usize).copied()
    }

    fn upward_edges(&self, vertex: VertexId) -> Box<dyn Iterator<Item = (EdgeId, &EdgeRecord)> + '_> {
        let range = self.store.run_range(vertex);
        let start = self
            .upward_start
            .get(vertex as usize)
            .map_or(range.end, |&start| (start as usize).clamp(range.start, range.end));
        Box::new(
            self.store.arena()[start..range.end]
                .iter()
                .enumerate()
                .filter_map(move |(offset, slot)| slot.as_ref().map(|record| ((start + offset) as EdgeId, record))),
        )
    }
}
