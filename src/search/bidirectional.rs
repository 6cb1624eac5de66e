use std::sync::Arc;

use log::trace;

use super::{dijkstra::Dijkstra, turns::TurnRules, SearchOptions};
use crate::{
    ch::contracted_graph::ContractedGraph,
    error::Result,
    graphs::{
        edge::Direction,
        path::{EdgePath, Path},
        Graph, Weight,
    },
};

/// Best meeting of the forward and the backward upward search.
#[derive(Clone, Debug)]
pub struct Meeting {
    pub weight: Weight,
    pub forward: Arc<EdgePath>,
    pub backward: Arc<EdgePath>,
}

/// Shortest route from any source root to any target root, unpacked into
/// original records. `Ok(None)` if no target is reachable.
pub fn shortest_path(
    graph: &ContractedGraph,
    sources: &[Arc<EdgePath>],
    targets: &[Arc<EdgePath>],
    options: &SearchOptions,
) -> Result<Option<Path>> {
    match meet(graph, sources, targets, options)? {
        Some(meeting) => Ok(Some(graph.unpack_route(&meeting.forward, &meeting.backward)?)),
        None => Ok(None),
    }
}

pub fn shortest_path_weight(
    graph: &ContractedGraph,
    sources: &[Arc<EdgePath>],
    targets: &[Arc<EdgePath>],
    options: &SearchOptions,
) -> Result<Option<Weight>> {
    Ok(meet(graph, sources, targets, options)?.map(|meeting| meeting.weight))
}

/// Alternates upward searches from both ends. A side keeps stepping while its
/// frontier minimum is below the best meeting weight found so far; every
/// vertex settled by both sides is a meeting candidate.
pub fn meet(
    graph: &ContractedGraph,
    sources: &[Arc<EdgePath>],
    targets: &[Arc<EdgePath>],
    options: &SearchOptions,
) -> Result<Option<Meeting>> {
    let turns = TurnRules::for_layout(graph.layout(), Some(graph.restrictions()))?;
    let mut forward = Dijkstra::upward(graph, Direction::Forward, turns, options.clone())?;
    let mut backward = Dijkstra::upward(graph, Direction::Backward, turns, options.clone())?;
    forward.initialize(sources)?;
    backward.initialize(targets)?;

    let mut best: Option<Meeting> = None;
    loop {
        let below_best = |weight: Weight| best.as_ref().map_or(true, |meeting| weight < meeting.weight);
        let forward_open = forward.frontier_weight().is_some_and(below_best);
        let backward_open = backward.frontier_weight().is_some_and(below_best);
        if !forward_open && !backward_open {
            break;
        }

        if forward_open {
            if let Some(path) = forward.step()? {
                for candidate in backward.settled_at(path.vertex) {
                    consider(&mut best, &turns, &path, candidate);
                }
            }
        }
        if backward_open {
            if let Some(path) = backward.step()? {
                for candidate in forward.settled_at(path.vertex) {
                    consider(&mut best, &turns, candidate, &path);
                }
            }
        }
    }

    if let Some(meeting) = &best {
        trace!("met at {} with weight {}", meeting.forward.vertex, meeting.weight);
    }
    Ok(best)
}

fn consider(best: &mut Option<Meeting>, turns: &TurnRules, forward: &Arc<EdgePath>, backward: &Arc<EdgePath>) {
    let weight = forward.weight + backward.weight;
    if best.as_ref().is_some_and(|meeting| meeting.weight <= weight) {
        return;
    }
    if !turns.allows_meeting(forward, backward) {
        return;
    }
    *best = Some(Meeting {
        weight,
        forward: Arc::clone(forward),
        backward: Arc::clone(backward),
    });
}
