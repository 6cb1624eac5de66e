use ahash::{HashMap, HashMapExt, HashSet};
use serde::{Deserialize, Serialize};

use super::{VertexId, Weight};
use crate::error::{Result, RoutingError};

/// Supplies forbidden vertex sequences for one vehicle class.
pub trait RestrictionSource {
    /// Sequences that involve `vertex`. The same sequence may be reported for
    /// several vertices.
    fn restrictions_at(&self, vertex: VertexId) -> Vec<Vec<VertexId>>;
}

impl RestrictionSource for HashMap<VertexId, Vec<Vec<VertexId>>> {
    fn restrictions_at(&self, vertex: VertexId) -> Vec<Vec<VertexId>> {
        self.get(&vertex).cloned().unwrap_or_default()
    }
}

/// Indexed set of forbidden vertex sequences.
///
/// A sequence `[a, b, c]` forbids arriving at `b` from `a` and leaving towards
/// `c`. A two vertex sequence `[a, b]` forbids the edge `a -> b` as a whole.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RestrictionSet {
    sequences: Vec<Vec<VertexId>>,
    by_first: HashMap<VertexId, Vec<u32>>,
    by_last: HashMap<VertexId, Vec<u32>>,
    involved: HashSet<VertexId>,
}

impl RestrictionSet {
    pub fn new() -> RestrictionSet {
        RestrictionSet::default()
    }

    pub fn from_sequences(sequences: impl IntoIterator<Item = Vec<VertexId>>) -> Result<RestrictionSet> {
        let mut restrictions = RestrictionSet::new();
        for sequence in sequences {
            restrictions.add(sequence)?;
        }
        Ok(restrictions)
    }

    /// Collects the restrictions of every vertex below `number_of_vertices`.
    pub fn from_source(source: &impl RestrictionSource, number_of_vertices: u32) -> Result<RestrictionSet> {
        let mut restrictions = RestrictionSet::new();
        for vertex in 0..number_of_vertices {
            for sequence in source.restrictions_at(vertex) {
                restrictions.add(sequence)?;
            }
        }
        Ok(restrictions)
    }

    /// Adds a sequence. Duplicates are ignored.
    pub fn add(&mut self, sequence: Vec<VertexId>) -> Result<()> {
        if sequence.len() < 2 {
            return Err(RoutingError::MalformedInput(format!(
                "restriction {:?} needs at least two vertices",
                sequence
            )));
        }
        if sequence.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(RoutingError::MalformedInput(format!(
                "restriction {:?} repeats a vertex",
                sequence
            )));
        }
        let (first, last) = (sequence[0], sequence[sequence.len() - 1]);
        if self.candidates(&self.by_first, first).any(|existing| *existing == sequence) {
            return Ok(());
        }

        let index = self.sequences.len() as u32;
        self.by_first.entry(first).or_default().push(index);
        self.by_last.entry(last).or_default().push(index);
        self.involved.extend(sequence.iter().copied());
        self.sequences.push(sequence);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequences(&self) -> &[Vec<VertexId>] {
        &self.sequences
    }

    pub fn max_sequence_len(&self) -> usize {
        self.sequences.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether any sequence passes through or ends at `vertex`.
    pub fn involves(&self, vertex: VertexId) -> bool {
        self.involved.contains(&vertex)
    }

    /// Whether stepping to `next` completes a forbidden sequence.
    ///
    /// `history` holds the original vertices walked so far, oldest first, and
    /// ends with the current vertex. Only sequences ending in `next` matter.
    pub fn forbids_forward(&self, history: &[VertexId], next: VertexId) -> bool {
        (0..history.len()).any(|start| {
            let walked = &history[start..];
            self.candidates(&self.by_first, walked[0]).any(|sequence| {
                sequence.len() == walked.len() + 1
                    && sequence[..walked.len()] == *walked
                    && sequence[walked.len()] == next
            })
        })
    }

    /// Backward counterpart of [`RestrictionSet::forbids_forward`].
    ///
    /// `future` holds the original vertices from the current vertex onwards in
    /// travel order, as discovered by a backward search. Stepping back to
    /// `previous` is forbidden if `previous` followed by a prefix of `future`
    /// is a forbidden sequence.
    pub fn forbids_backward(&self, future: &[VertexId], previous: VertexId) -> bool {
        (0..future.len()).any(|end| {
            let ahead = &future[..=end];
            self.candidates(&self.by_last, ahead[end]).any(|sequence| {
                sequence.len() == ahead.len() + 1 && sequence[0] == previous && sequence[1..] == *ahead
            })
        })
    }

    /// Turn cost of a maneuver given as consecutive original vertices:
    /// `0.0` if allowed, [`Weight::MAX`] if it contains a forbidden sequence
    /// ending at its last vertex.
    pub fn turn_weight(&self, maneuver: &[VertexId]) -> Weight {
        match maneuver.split_last() {
            Some((&last, history)) if !history.is_empty() && self.forbids_forward(history, last) => Weight::MAX,
            _ => 0.0,
        }
    }

    fn candidates<'a>(
        &'a self,
        index: &'a HashMap<VertexId, Vec<u32>>,
        vertex: VertexId,
    ) -> impl Iterator<Item = &'a Vec<VertexId>> + 'a {
        index
            .get(&vertex)
            .into_iter()
            .flatten()
            .map(move |&position| &self.sequences[position as usize])
    }
}

impl RestrictionSource for RestrictionSet {
    fn restrictions_at(&self, vertex: VertexId) -> Vec<Vec<VertexId>> {
        self.candidates(&self.by_first, vertex).cloned().collect()
    }
}

/// Restrictions grouped per vertex, in the shape produced by ingestion code.
pub fn group_by_first_vertex(sequences: &[Vec<VertexId>]) -> HashMap<VertexId, Vec<Vec<VertexId>>> {
    let mut grouped: HashMap<VertexId, Vec<Vec<VertexId>>> = HashMap::new();
    for sequence in sequences {
        if let Some(&first) = sequence.first() {
            grouped.entry(first).or_default().push(sequence.clone());
        }
    }
    grouped
}
