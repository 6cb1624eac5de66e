use serde::{Deserialize, Serialize};

use super::{VertexId, Weight};

/// Which searches may expand a record, relative to the vertex storing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeDirection {
    Both,
    Forward,
    Backward,
}

impl EdgeDirection {
    pub fn forward(&self) -> bool {
        matches!(self, EdgeDirection::Both | EdgeDirection::Forward)
    }

    pub fn backward(&self) -> bool {
        matches!(self, EdgeDirection::Both | EdgeDirection::Backward)
    }

    pub fn reversed(&self) -> EdgeDirection {
        match self {
            EdgeDirection::Both => EdgeDirection::Both,
            EdgeDirection::Forward => EdgeDirection::Backward,
            EdgeDirection::Backward => EdgeDirection::Forward,
        }
    }
}

/// Search direction of a traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn allows(&self, direction: EdgeDirection) -> bool {
        match self {
            Direction::Forward => direction.forward(),
            Direction::Backward => direction.backward(),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Record layout chosen when a store is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeLayout {
    /// Search state is the vertex alone; parallel shortcuts merge regardless of
    /// their sequence endpoints.
    VertexBased,
    /// Search state includes the arrival vertex so turn restrictions and
    /// U-turn suppression can be enforced.
    EdgeBased,
}

/// Variable part of an edge record.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum EdgePayload {
    Original,
    Shortcut {
        via: VertexId,
        /// First original vertex after the tail, walking tail to head.
        sequence1: VertexId,
        /// Last original vertex before the head, walking tail to head.
        sequence2: VertexId,
    },
    /// Explicit self loop carrying the cost of a forced detour.
    TurnLoop,
}

/// A directed record stored in the run of its tail vertex.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    tail: VertexId,
    head: VertexId,
    weight: Weight,
    direction: EdgeDirection,
    payload: EdgePayload,
}

impl EdgeRecord {
    pub fn new(
        tail: VertexId,
        head: VertexId,
        weight: Weight,
        direction: EdgeDirection,
        payload: EdgePayload,
    ) -> EdgeRecord {
        EdgeRecord {
            tail,
            head,
            weight,
            direction,
            payload,
        }
    }

    pub fn tail(&self) -> VertexId {
        self.tail
    }

    pub fn head(&self) -> VertexId {
        self.head
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn direction(&self) -> EdgeDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: EdgeDirection) {
        self.direction = direction;
    }

    pub fn payload(&self) -> EdgePayload {
        self.payload
    }

    pub fn is_shortcut(&self) -> bool {
        matches!(self.payload, EdgePayload::Shortcut { .. })
    }

    pub fn is_turn_loop(&self) -> bool {
        matches!(self.payload, EdgePayload::TurnLoop)
    }

    /// Turn loops and shortcuts that leave and re-enter the same vertex.
    pub fn is_loop(&self) -> bool {
        self.tail == self.head
    }

    pub fn via(&self) -> Option<VertexId> {
        match self.payload {
            EdgePayload::Shortcut { via, .. } => Some(via),
            _ => None,
        }
    }

    /// First original vertex after the tail when walking tail -> head.
    pub fn sequence1(&self) -> VertexId {
        match self.payload {
            EdgePayload::Shortcut { sequence1, .. } => sequence1,
            _ => self.head,
        }
    }

    /// Last original vertex before the head when walking tail -> head.
    pub fn sequence2(&self) -> VertexId {
        match self.payload {
            EdgePayload::Shortcut { sequence2, .. } => sequence2,
            _ => self.tail,
        }
    }

    /// The same connection stored at the head vertex.
    ///
    /// Sequence endpoints are expressed in storage orientation (tail to head),
    /// so mirroring swaps them.
    pub fn mirrored(&self) -> EdgeRecord {
        let payload = match self.payload {
            EdgePayload::Shortcut {
                via,
                sequence1,
                sequence2,
            } => EdgePayload::Shortcut {
                via,
                sequence1: sequence2,
                sequence2: sequence1,
            },
            other => other,
        };

        EdgeRecord {
            tail: self.head,
            head: self.tail,
            weight: self.weight,
            direction: self.direction.reversed(),
            payload,
        }
    }
}
