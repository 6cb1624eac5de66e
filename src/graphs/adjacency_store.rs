use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{
    edge::{EdgeDirection, EdgeLayout, EdgePayload, EdgeRecord},
    EdgeId, Graph, VertexId, Weight,
};
use crate::error::{Result, RoutingError};

/// Contiguous slice of the arena owned by one vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Run {
    start: u32,
    len: u32,
    capacity: u32,
}

impl Run {
    fn end(&self) -> usize {
        (self.start + self.len) as usize
    }

    fn grown_capacity(&self) -> u32 {
        if self.capacity == 0 {
            1
        } else if self.capacity.is_power_of_two() {
            self.capacity * 2
        } else {
            (self.len + 1).next_power_of_two()
        }
    }
}

/// Compact directed multigraph with one contiguous run of records per vertex.
///
/// Records are addressed by their arena index. Every operation that changes
/// the index of a live record reports `(old_id, new_id)` to the supplied
/// observer, so per-edge side tables can follow along.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdjacencyStore {
    layout: EdgeLayout,
    arena: Vec<Option<EdgeRecord>>,
    runs: Vec<Run>,
    number_of_records: u32,
}

impl AdjacencyStore {
    pub fn new(number_of_vertices: u32, layout: EdgeLayout) -> AdjacencyStore {
        AdjacencyStore {
            layout,
            arena: Vec::new(),
            runs: vec![Run::default(); number_of_vertices as usize],
            number_of_records: 0,
        }
    }

    pub fn layout(&self) -> EdgeLayout {
        self.layout
    }

    pub fn number_of_vertices(&self) -> u32 {
        self.runs.len() as u32
    }

    /// Number of live records (a `Both` edge counts twice, once per endpoint).
    pub fn number_of_records(&self) -> u32 {
        self.number_of_records
    }

    /// Length of the backing arena, slack included.
    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    pub fn degree(&self, vertex: VertexId) -> u32 {
        self.runs.get(vertex as usize).map_or(0, |run| run.len)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&EdgeRecord> {
        self.arena.get(id as usize)?.as_ref()
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut EdgeRecord> {
        self.arena.get_mut(id as usize)?.as_mut()
    }

    /// Arena indices of the run owned by `vertex`.
    pub fn run_range(&self, vertex: VertexId) -> Range<usize> {
        match self.runs.get(vertex as usize) {
            Some(run) => run.start as usize..run.end(),
            None => 0..0,
        }
    }

    pub fn edges(&self, vertex: VertexId) -> impl Iterator<Item = (EdgeId, &EdgeRecord)> + '_ {
        let range = self.run_range(vertex);
        let start = range.start;
        self.arena[range]
            .iter()
            .enumerate()
            .filter_map(move |(offset, slot)| {
                slot.as_ref()
                    .map(|record| ((start + offset) as EdgeId, record))
            })
    }

    /// Records at `from` pointing to `to`.
    pub fn edges_between(
        &self,
        from: VertexId,
        to: VertexId,
    ) -> impl Iterator<Item = (EdgeId, &EdgeRecord)> + '_ {
        self.edges(from).filter(move |(_, record)| record.head() == to)
    }

    pub fn add_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        weight: Weight,
        direction: EdgeDirection,
        payload: EdgePayload,
    ) -> Result<EdgeId> {
        self.add_edge_observed(from, to, weight, direction, payload, &mut |_, _| {})
    }

    /// Adds `from -> to`. A `Both` edge also gets a mirrored record at `to`.
    /// Returns the id of the record stored at `from`.
    pub fn add_edge_observed(
        &mut self,
        from: VertexId,
        to: VertexId,
        weight: Weight,
        direction: EdgeDirection,
        payload: EdgePayload,
        on_edge_moved: &mut dyn FnMut(EdgeId, EdgeId),
    ) -> Result<EdgeId> {
        self.check_vertex(from)?;
        self.check_vertex(to)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(RoutingError::MalformedInput(format!(
                "edge {} -> {} has weight {}",
                from, to, weight
            )));
        }
        match (from == to, payload) {
            (true, EdgePayload::TurnLoop) | (false, EdgePayload::Original) => {}
            (_, EdgePayload::Shortcut { via, .. }) if via != from && via != to => {}
            (true, _) => {
                return Err(RoutingError::MalformedInput(format!(
                    "self loop at {} is neither a turn loop nor a shortcut",
                    from
                )))
            }
            (false, _) => {
                return Err(RoutingError::MalformedInput(format!(
                    "edge {} -> {} has an invalid payload {:?}",
                    from, to, payload
                )))
            }
        }

        let record = EdgeRecord::new(from, to, weight, direction, payload);
        let id = self.push_record(record, on_edge_moved);
        // Growing the run of `to` never moves the run of `from`.
        if direction == EdgeDirection::Both && from != to {
            self.push_record(record.mirrored(), on_edge_moved);
        }
        Ok(id)
    }

    /// Appends a record to the run of its tail, growing the run if needed.
    pub(crate) fn push_record(
        &mut self,
        record: EdgeRecord,
        on_edge_moved: &mut dyn FnMut(EdgeId, EdgeId),
    ) -> EdgeId {
        let vertex = record.tail() as usize;
        let run = self.runs[vertex];

        if run.len == run.capacity {
            let capacity = run.grown_capacity();
            let run_end = (run.start + run.capacity) as usize;
            if run.capacity > 0 && run_end == self.arena.len() {
                self.arena.resize(run.start as usize + capacity as usize, None);
            } else {
                let start = self.arena.len();
                self.arena.resize(start + capacity as usize, None);
                for offset in 0..run.len as usize {
                    let old = run.start as usize + offset;
                    self.arena[start + offset] = self.arena[old].take();
                    on_edge_moved(old as EdgeId, (start + offset) as EdgeId);
                }
                self.runs[vertex].start = start as u32;
            }
            self.runs[vertex].capacity = capacity;
        }

        let run = &mut self.runs[vertex];
        let id = run.start + run.len;
        self.arena[id as usize] = Some(record);
        run.len += 1;
        self.number_of_records += 1;
        id
    }

    pub fn remove_edge(&mut self, from: VertexId, to: VertexId) -> u32 {
        self.remove_edge_observed(from, to, &mut |_, _| {})
    }

    /// Removes the `from -> to` direction stored at `from`. Records that may
    /// also be used by backward searches keep existing as backward-only.
    /// Returns the number of removed directions.
    pub fn remove_edge_observed(
        &mut self,
        from: VertexId,
        to: VertexId,
        on_edge_moved: &mut dyn FnMut(EdgeId, EdgeId),
    ) -> u32 {
        let Some(&run) = self.runs.get(from as usize) else {
            return 0;
        };

        let mut removed = 0;
        let mut index = run.start as usize;
        let mut end = run.end();
        while index < end {
            let Some(record) = self.arena[index].as_mut() else {
                break;
            };
            if record.head() != to || !record.direction().forward() {
                index += 1;
                continue;
            }

            removed += 1;
            if record.direction().backward() {
                record.set_direction(EdgeDirection::Backward);
                index += 1;
                continue;
            }

            // Back-fill the hole with the last record of the run.
            end -= 1;
            self.arena[index] = self.arena[end].take();
            if index != end {
                on_edge_moved(end as EdgeId, index as EdgeId);
            }
            self.runs[from as usize].len -= 1;
            self.number_of_records -= 1;
        }

        removed
    }

    /// Removes a single record by id, back-filling from the end of its run.
    pub fn remove_record_observed(
        &mut self,
        id: EdgeId,
        on_edge_moved: &mut dyn FnMut(EdgeId, EdgeId),
    ) -> Option<EdgeRecord> {
        let record = *self.edge(id)?;
        let vertex = record.tail() as usize;
        let last = self.runs[vertex].end() - 1;
        self.arena[id as usize] = self.arena[last].take();
        if id as usize != last {
            on_edge_moved(last as EdgeId, id);
        }
        self.runs[vertex].len -= 1;
        self.number_of_records -= 1;
        Some(record)
    }

    /// Lays all runs out back to back in vertex order without slack.
    /// Calling it twice in a row reports no moves the second time.
    pub fn compact(&mut self, on_edge_moved: &mut dyn FnMut(EdgeId, EdgeId)) {
        let mut arena = Vec::with_capacity(self.number_of_records as usize);

        for run in self.runs.iter_mut() {
            let start = arena.len();
            for offset in 0..run.len as usize {
                let old = run.start as usize + offset;
                arena.push(self.arena[old].take());
                if old != start + offset {
                    on_edge_moved(old as EdgeId, (start + offset) as EdgeId);
                }
            }
            *run = Run {
                start: start as u32,
                len: run.len,
                capacity: run.len,
            };
        }

        self.arena = arena;
    }

    /// Stable sort of every run by `key`.
    pub fn sort_runs_by_key<K, F>(&mut self, key: F, on_edge_moved: &mut dyn FnMut(EdgeId, EdgeId))
    where
        K: Ord,
        F: Fn(&EdgeRecord) -> K,
    {
        for vertex in 0..self.runs.len() {
            let range = self.run_range(vertex as VertexId);
            let start = range.start;
            let mut records: Vec<(usize, EdgeRecord)> = self.arena[range]
                .iter()
                .enumerate()
                .filter_map(|(offset, slot)| slot.map(|record| (start + offset, record)))
                .collect();
            records.sort_by_key(|(_, record)| key(record));

            for (offset, (old, record)) in records.into_iter().enumerate() {
                self.arena[start + offset] = Some(record);
                if old != start + offset {
                    on_edge_moved(old as EdgeId, (start + offset) as EdgeId);
                }
            }
        }
    }

    /// Raw arena view, slack included. Used to compare layouts.
    pub fn arena(&self) -> &[Option<EdgeRecord>] {
        &self.arena
    }

    fn check_vertex(&self, vertex: VertexId) -> Result<()> {
        if vertex as usize >= self.runs.len() {
            return Err(RoutingError::MalformedInput(format!(
                "vertex {} out of range 0..{}",
                vertex,
                self.runs.len()
            )));
        }
        Ok(())
    }
}

impl Graph for AdjacencyStore {
    fn number_of_vertices(&self) -> u32 {
        self.number_of_vertices()
    }

    fn edges(&self, vertex: VertexId) -> Box<dyn Iterator<Item = (EdgeId, &EdgeRecord)> + '_> {
        Box::new(AdjacencyStore::edges(self, vertex))
    }

    fn layout(&self) -> EdgeLayout {
        self.layout
    }
}
