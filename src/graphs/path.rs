use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{EdgeId, VertexId, Weight};

/// Persistent singly linked search path.
///
/// Extending a path is O(1) and shares the prefix with every other branch
/// built on top of it; only [`EdgePath::vertices`] walks the whole chain.
#[derive(Debug, PartialEq)]
pub struct EdgePath {
    pub vertex: VertexId,
    pub weight: Weight,
    /// Record used to reach `vertex`, `None` for a root.
    pub edge: Option<EdgeId>,
    /// Last original vertex before `vertex`, used for turn checks.
    pub arrival: Option<VertexId>,
    pub predecessor: Option<Arc<EdgePath>>,
}

impl EdgePath {
    pub fn root(vertex: VertexId) -> Arc<EdgePath> {
        EdgePath::weighted_root(vertex, 0.0)
    }

    /// A root carrying an initial weight, e.g. the partial edge between a
    /// snapped location and the vertex.
    pub fn weighted_root(vertex: VertexId, weight: Weight) -> Arc<EdgePath> {
        Arc::new(EdgePath {
            vertex,
            weight,
            edge: None,
            arrival: None,
            predecessor: None,
        })
    }

    pub fn extend(
        self: &Arc<Self>,
        vertex: VertexId,
        weight: Weight,
        edge: EdgeId,
        arrival: Option<VertexId>,
    ) -> Arc<EdgePath> {
        Arc::new(EdgePath {
            vertex,
            weight,
            edge: Some(edge),
            arrival,
            predecessor: Some(Arc::clone(self)),
        })
    }

    pub fn root_vertex(&self) -> VertexId {
        let mut current = self;
        while let Some(predecessor) = current.predecessor.as_deref() {
            current = predecessor;
        }
        current.vertex
    }

    /// Vertices from the root to this vertex.
    pub fn vertices(&self) -> Vec<VertexId> {
        let mut vertices: Vec<VertexId> = self.iter().map(|path| path.vertex).collect();
        vertices.reverse();
        vertices
    }

    /// `(edge, vertex reached)` hops from the root to this vertex.
    pub fn hops(&self) -> Vec<(EdgeId, VertexId)> {
        let mut hops: Vec<_> = self
            .iter()
            .filter_map(|path| path.edge.map(|edge| (edge, path.vertex)))
            .collect();
        hops.reverse();
        hops
    }

    /// Walks from this node towards the root.
    pub fn iter(&self) -> impl Iterator<Item = &EdgePath> + '_ {
        std::iter::successors(Some(self), |path| path.predecessor.as_deref())
    }
}

/// A materialized route over original edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub vertices: Vec<VertexId>,
    /// Original records traversed, one per consecutive vertex pair.
    pub edges: Vec<EdgeId>,
    pub weight: Weight,
}
