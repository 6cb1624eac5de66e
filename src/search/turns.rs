use crate::{
    error::{Result, RoutingError},
    graphs::{
        edge::{Direction, EdgeLayout, EdgeRecord},
        path::EdgePath,
        restrictions::RestrictionSet,
        VertexId,
    },
};

/// Identity of a search state. In vertex-based searches `arrival` is always
/// `None`, in edge-based searches it is the original vertex the state was
/// entered from (walking in search direction).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchKey {
    pub vertex: VertexId,
    pub arrival: Option<VertexId>,
}

/// Turn legality shared by witness searches and queries.
///
/// Forward searches track the original vertex they arrived from, backward
/// searches the original vertex they will continue to. A move is rejected if
/// it reverses onto that vertex or completes a forbidden sequence. Turn loops
/// reset the arrival to the vertex itself.
#[derive(Clone, Copy, Debug)]
pub struct TurnRules<'a> {
    edge_based: bool,
    restrictions: Option<&'a RestrictionSet>,
    history_len: usize,
}

impl<'a> TurnRules<'a> {
    pub fn vertex_based() -> TurnRules<'a> {
        TurnRules {
            edge_based: false,
            restrictions: None,
            history_len: 0,
        }
    }

    pub fn edge_based(restrictions: Option<&'a RestrictionSet>) -> TurnRules<'a> {
        let restrictions = restrictions.filter(|restrictions| !restrictions.is_empty());
        TurnRules {
            edge_based: true,
            restrictions,
            history_len: restrictions.map_or(0, |restrictions| restrictions.max_sequence_len() - 1),
        }
    }

    /// Rules for a graph with the given layout. Restrictions need an
    /// edge-based layout.
    pub fn for_layout(layout: EdgeLayout, restrictions: Option<&'a RestrictionSet>) -> Result<TurnRules<'a>> {
        match layout {
            EdgeLayout::EdgeBased => Ok(TurnRules::edge_based(restrictions)),
            EdgeLayout::VertexBased => match restrictions {
                Some(restrictions) if !restrictions.is_empty() => Err(RoutingError::UnsupportedConfiguration(
                    "turn restrictions need an edge-based graph".to_string(),
                )),
                _ => Ok(TurnRules::vertex_based()),
            },
        }
    }

    pub fn is_edge_based(&self) -> bool {
        self.edge_based
    }

    pub fn restrictions(&self) -> Option<&'a RestrictionSet> {
        self.restrictions
    }

    pub fn key(&self, vertex: VertexId, arrival: Option<VertexId>) -> SearchKey {
        SearchKey {
            vertex,
            arrival: if self.edge_based { arrival } else { None },
        }
    }

    /// Arrival tracked at the head of `record` after traversing it.
    pub fn arrival_after(&self, record: &EdgeRecord) -> Option<VertexId> {
        if !self.edge_based {
            None
        } else if record.is_turn_loop() {
            Some(record.tail())
        } else {
            Some(record.sequence2())
        }
    }

    /// Whether the search at `path` may continue along `record`.
    pub fn allows(&self, direction: Direction, path: &EdgePath, record: &EdgeRecord) -> bool {
        if !self.edge_based || record.is_turn_loop() {
            return true;
        }
        let next = record.sequence1();
        if path.arrival == Some(next) {
            return false;
        }

        match self.restrictions {
            None => true,
            Some(restrictions) => {
                let walked = self.walked(direction, path);
                match direction {
                    Direction::Forward => !restrictions.forbids_forward(&walked, next),
                    Direction::Backward => !restrictions.forbids_backward(&walked, next),
                }
            }
        }
    }

    /// Whether `next` may follow the original vertices `history`, which end
    /// with the current vertex. Used where a search path is not at hand.
    pub fn allows_turn(&self, history: &[VertexId], next: VertexId) -> bool {
        if !self.edge_based {
            return true;
        }
        if history.len() > 1 && history[history.len() - 2] == next {
            return false;
        }
        self.restrictions
            .map_or(true, |restrictions| !restrictions.forbids_forward(history, next))
    }

    /// Whether a forward label and a backward label at the same vertex can be
    /// joined into one route.
    pub fn allows_meeting(&self, forward: &EdgePath, backward: &EdgePath) -> bool {
        if !self.edge_based {
            return true;
        }
        let vertex = forward.vertex;
        let Some(next) = backward.arrival.filter(|&next| next != vertex) else {
            return true;
        };
        if forward.arrival == Some(next) {
            return false;
        }

        match self.restrictions {
            None => true,
            Some(restrictions) => !restrictions.forbids_forward(&self.walked(Direction::Forward, forward), next),
        }
    }

    /// Original vertices around `path` in travel order, ending (forward) or
    /// starting (backward) with `path.vertex`. Walks the predecessor chain
    /// as long as hops are single original edges.
    fn walked(&self, direction: Direction, path: &EdgePath) -> Vec<VertexId> {
        let mut walked = vec![path.vertex];
        let mut current = path;
        while walked.len() < self.history_len {
            let Some(arrival) = current.arrival.filter(|&arrival| arrival != current.vertex) else {
                break;
            };
            walked.push(arrival);
            match current.predecessor.as_deref() {
                Some(predecessor) if predecessor.vertex == arrival => current = predecessor,
                _ => break,
            }
        }

        if direction == Direction::Forward {
            walked.reverse();
        }
        walked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::edge::{EdgeDirection, EdgePayload};

    #[test]
    fn rejects_u_turns_and_forbidden_turns() {
        let restrictions = RestrictionSet::from_sequences([vec![0, 1, 2]]).unwrap();
        let rules = TurnRules::edge_based(Some(&restrictions));

        let root = EdgePath::root(0);
        let at_one = root.extend(1, 1.0, 0, Some(0));

        let to_two = EdgeRecord::new(1, 2, 1.0, EdgeDirection::Both, EdgePayload::Original);
        let back = EdgeRecord::new(1, 0, 1.0, EdgeDirection::Both, EdgePayload::Original);
        let to_three = EdgeRecord::new(1, 3, 1.0, EdgeDirection::Both, EdgePayload::Original);
        let turn_loop = EdgeRecord::new(1, 1, 5.0, EdgeDirection::Both, EdgePayload::TurnLoop);

        assert!(!rules.allows(Direction::Forward, &at_one, &to_two));
        assert!(!rules.allows(Direction::Forward, &at_one, &back));
        assert!(rules.allows(Direction::Forward, &at_one, &to_three));
        assert!(rules.allows(Direction::Forward, &at_one, &turn_loop));

        let after_loop = at_one.extend(1, 6.0, 7, rules.arrival_after(&turn_loop));
        assert!(rules.allows(Direction::Forward, &after_loop, &to_two));
    }

    #[test]
    fn backward_searches_check_the_mirrored_turn() {
        let restrictions = RestrictionSet::from_sequences([vec![0, 1, 2]]).unwrap();
        let rules = TurnRules::edge_based(Some(&restrictions));

        // Backward search from 2 reached 1, it will continue to 2 in travel order.
        let root = EdgePath::root(2);
        let at_one = root.extend(1, 1.0, 0, Some(2));
        let from_zero = EdgeRecord::new(1, 0, 1.0, EdgeDirection::Backward, EdgePayload::Original);
        let from_three = EdgeRecord::new(1, 3, 1.0, EdgeDirection::Backward, EdgePayload::Original);

        assert!(!rules.allows(Direction::Backward, &at_one, &from_zero));
        assert!(rules.allows(Direction::Backward, &at_one, &from_three));
    }

    #[test]
    fn meeting_points_respect_turns() {
        let restrictions = RestrictionSet::from_sequences([vec![0, 1, 2]]).unwrap();
        let rules = TurnRules::edge_based(Some(&restrictions));

        let forward = EdgePath::root(0).extend(1, 1.0, 0, Some(0));
        let towards_two = EdgePath::root(2).extend(1, 1.0, 1, Some(2));
        let towards_three = EdgePath::root(3).extend(1, 1.0, 2, Some(3));
        let towards_zero = EdgePath::root(0).extend(1, 1.0, 3, Some(0));

        assert!(!rules.allows_meeting(&forward, &towards_two));
        assert!(rules.allows_meeting(&forward, &towards_three));
        assert!(!rules.allows_meeting(&forward, &towards_zero));
        assert!(TurnRules::vertex_based().allows_meeting(&forward, &towards_zero));
    }

    #[test]
    fn explicit_turns_are_checked_like_search_moves() {
        let restrictions = RestrictionSet::from_sequences([vec![0, 1, 2], vec![4, 5]]).unwrap();
        let rules = TurnRules::edge_based(Some(&restrictions));

        assert!(!rules.allows_turn(&[0, 1], 2));
        assert!(!rules.allows_turn(&[0, 1], 0));
        assert!(rules.allows_turn(&[0, 1], 3));
        assert!(rules.allows_turn(&[1], 2));
        assert!(!rules.allows_turn(&[4], 5));
        assert!(TurnRules::vertex_based().allows_turn(&[0, 1], 0));
    }

    #[test]
    fn restrictions_need_edge_based_layout() {
        let restrictions = RestrictionSet::from_sequences([vec![0, 1, 2]]).unwrap();
        assert!(TurnRules::for_layout(EdgeLayout::VertexBased, Some(&restrictions)).is_err());
        assert!(TurnRules::for_layout(EdgeLayout::VertexBased, Some(&RestrictionSet::new())).is_ok());
        assert!(TurnRules::for_layout(EdgeLayout::EdgeBased, Some(&restrictions))
            .unwrap()
            .is_edge_based());
    }
}
