use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

use crate::{
    graphs::{
        adjacency_store::AdjacencyStore,
        edge::{Direction, EdgeRecord},
        path::EdgePath,
        EdgeId, VertexId, Weight,
    },
    queue::{heap_queue::HeapQueue, QueueElement},
    search::turns::{SearchKey, TurnRules},
};

/// The store restricted to vertices that are not contracted yet.
#[derive(Clone, Copy)]
pub struct RemainingGraph<'a> {
    pub store: &'a AdjacencyStore,
    pub contracted: &'a [bool],
    pub turns: TurnRules<'a>,
}

impl<'a> RemainingGraph<'a> {
    pub fn is_contracted(&self, vertex: VertexId) -> bool {
        self.contracted[vertex as usize]
    }

    /// Records at `vertex` usable by a search in `direction` that lead to a
    /// remaining vertex.
    pub fn edges(
        &self,
        vertex: VertexId,
        direction: Direction,
    ) -> impl Iterator<Item = (EdgeId, &'a EdgeRecord)> + 'a {
        let contracted = self.contracted;
        self.store
            .edges(vertex)
            .filter(move |(_, record)| direction.allows(record.direction()) && !contracted[record.head() as usize])
    }
}

/// Outcome of a batched witness search.
#[derive(Debug, Default)]
pub struct WitnessWeights {
    weights: HashMap<SearchKey, Weight>,
    /// States settled before the search stopped.
    pub settled: u32,
    /// Largest hop count among settled states.
    pub depth: u32,
}

impl WitnessWeights {
    /// Best witness weight found for `target`, if any.
    pub fn weight(&self, target: &SearchKey) -> Option<Weight> {
        self.weights.get(target).copied()
    }
}

/// Bounded local searches proving that a shortcut is unnecessary.
///
/// Searches are limited by hops and by settled states, so a missing witness
/// only means a shortcut is added, never that a route is lost.
#[derive(Clone, Copy, Debug)]
pub struct WitnessCalculator {
    pub hop_limit: u32,
    pub settle_limit: u32,
}

impl WitnessCalculator {
    pub fn new(hop_limit: u32, settle_limit: u32) -> WitnessCalculator {
        WitnessCalculator {
            hop_limit,
            settle_limit,
        }
    }

    /// Whether a path from `source` to `target` avoiding `excluded` costs at
    /// most `candidate_weight`.
    pub fn has_witness(
        &self,
        graph: &RemainingGraph,
        source: VertexId,
        first: Option<VertexId>,
        excluded: VertexId,
        target: SearchKey,
        candidate_weight: Weight,
    ) -> bool {
        self.witness_weights(graph, source, first, excluded, &[target], candidate_weight, self.hop_limit)
            .weight(&target)
            .is_some_and(|weight| weight <= candidate_weight)
    }

    /// One bounded forward search from `source` towards many targets.
    ///
    /// `first` pins the first original vertex after `source`: an edge-based
    /// witness must leave `source` the same way as the shortcut it replaces.
    /// Targets are search states, so they also pin the arrival.
    #[allow(clippy::too_many_arguments)]
    pub fn witness_weights(
        &self,
        graph: &RemainingGraph,
        source: VertexId,
        first: Option<VertexId>,
        excluded: VertexId,
        targets: &[SearchKey],
        max_weight: Weight,
        hop_limit: u32,
    ) -> WitnessWeights {
        let turns = graph.turns;
        let mut queue = HeapQueue::new();
        let mut labels: HashMap<SearchKey, (Weight, u32)> = HashMap::new();
        let mut settled: HashSet<SearchKey> = HashSet::new();
        let mut remaining: HashSet<SearchKey> = targets.iter().copied().collect();
        let mut result = WitnessWeights::default();

        let root = turns.key(source, None);
        queue.push(0.0, root);
        labels.insert(root, (0.0, 0));

        while let Some(QueueElement { key: weight, item: key }) = queue.pop() {
            if settled.contains(&key) || labels.get(&key).is_some_and(|&(current, _)| current < weight) {
                continue;
            }
            settled.insert(key);
            result.settled += 1;
            let hops = labels[&key].1;
            result.depth = result.depth.max(hops);

            if remaining.remove(&key) {
                result.weights.insert(key, weight);
                if remaining.is_empty() {
                    break;
                }
            }
            if result.settled >= self.settle_limit {
                break;
            }
            if hops >= hop_limit {
                continue;
            }

            // Turn checks only look at the arrival, contracted graphs never
            // carry longer restrictions.
            let state = EdgePath {
                vertex: key.vertex,
                weight,
                edge: None,
                arrival: key.arrival,
                predecessor: None,
            };
            for (_, record) in graph.edges(key.vertex, Direction::Forward) {
                if record.head() == excluded {
                    continue;
                }
                if key == root && first.is_some_and(|first| record.is_turn_loop() || record.sequence1() != first) {
                    continue;
                }
                if !turns.allows(Direction::Forward, &state, record) {
                    continue;
                }

                let alternative_weight = weight + record.weight();
                if alternative_weight > max_weight {
                    continue;
                }
                let head = turns.key(record.head(), turns.arrival_after(record));
                if settled.contains(&head) {
                    continue;
                }
                let current_weight = labels.get(&head).map_or(Weight::MAX, |&(current, _)| current);
                if alternative_weight < current_weight {
                    labels.insert(head, (alternative_weight, hops + 1));
                    queue.push(alternative_weight, head);
                }
            }
        }

        result
    }
}
