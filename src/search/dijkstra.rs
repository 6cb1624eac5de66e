use std::sync::Arc;

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

use super::{
    turns::{SearchKey, TurnRules},
    SearchOptions, SearchOutcome,
};
use crate::{
    error::{Result, RoutingError},
    graphs::{edge::Direction, path::EdgePath, Graph, VertexId, Weight},
    queue::{heap_queue::HeapQueue, QueueElement},
};

/// Label-setting search over a [`Graph`], driven one settled state at a time
/// so that two instances can be interleaved by the bidirectional search.
pub struct Dijkstra<'a> {
    graph: &'a dyn Graph,
    direction: Direction,
    only_upward: bool,
    stall_on_demand: bool,
    turns: TurnRules<'a>,
    options: SearchOptions,
    queue: HeapQueue<SearchKey>,
    labels: HashMap<SearchKey, Arc<EdgePath>>,
    settled: HashSet<SearchKey>,
    settled_at: HashMap<VertexId, Vec<Arc<EdgePath>>>,
    max_reached: bool,
}

impl<'a> Dijkstra<'a> {
    pub fn new(
        graph: &'a dyn Graph,
        direction: Direction,
        turns: TurnRules<'a>,
        options: SearchOptions,
    ) -> Dijkstra<'a> {
        Dijkstra {
            graph,
            direction,
            only_upward: false,
            stall_on_demand: false,
            turns,
            options,
            queue: HeapQueue::new(),
            labels: HashMap::new(),
            settled: HashSet::new(),
            settled_at: HashMap::new(),
            max_reached: false,
        }
    }

    /// A search restricted to records leading to higher ranked vertices.
    ///
    /// Vertex-based searches additionally stall states that are reached more
    /// cheaply through a higher ranked neighbour.
    pub fn upward(
        graph: &'a dyn Graph,
        direction: Direction,
        turns: TurnRules<'a>,
        options: SearchOptions,
    ) -> Result<Dijkstra<'a>> {
        if graph.number_of_vertices() > 0 && graph.rank(0).is_none() {
            return Err(RoutingError::UnsupportedConfiguration(
                "upward search needs a contracted graph".to_string(),
            ));
        }
        let mut search = Dijkstra::new(graph, direction, turns, options);
        search.only_upward = true;
        search.stall_on_demand = !turns.is_edge_based();
        Ok(search)
    }

    /// Runs a complete search from `starts`, honouring U-turn suppression on
    /// edge-based graphs.
    pub fn run(
        graph: &dyn Graph,
        starts: Vec<Arc<EdgePath>>,
        direction: Direction,
        only_upward: bool,
    ) -> Result<SearchOutcome> {
        let turns = TurnRules::for_layout(graph.layout(), None)?;
        Dijkstra::run_with(graph, starts, direction, only_upward, turns, SearchOptions::default())
    }

    pub fn run_with(
        graph: &dyn Graph,
        starts: Vec<Arc<EdgePath>>,
        direction: Direction,
        only_upward: bool,
        turns: TurnRules<'_>,
        options: SearchOptions,
    ) -> Result<SearchOutcome> {
        let mut search = if only_upward {
            Dijkstra::upward(graph, direction, turns, options)?
        } else {
            Dijkstra::new(graph, direction, turns, options)
        };
        search.initialize(&starts)?;
        search.settle_all()?;
        Ok(search.into_outcome())
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Queues `starts`. Fails before queueing anything if a start lies
    /// outside the graph.
    pub fn initialize(&mut self, starts: &[Arc<EdgePath>]) -> Result<()> {
        let number_of_vertices = self.graph.number_of_vertices();
        if let Some(start) = starts.iter().find(|start| start.vertex >= number_of_vertices) {
            return Err(RoutingError::MalformedInput(format!(
                "start vertex {} is not in the graph with {} vertices",
                start.vertex, number_of_vertices
            )));
        }
        for start in starts {
            if start.weight > self.options.max_weight {
                self.max_reached = true;
                continue;
            }
            let key = self.turns.key(start.vertex, start.arrival);
            if self.labels.get(&key).is_some_and(|label| label.weight <= start.weight) {
                continue;
            }
            self.labels.insert(key, Arc::clone(start));
            self.queue.push(start.weight, key);
        }
        Ok(())
    }

    /// Weight of the cheapest unsettled label, discarding stale queue entries.
    pub fn frontier_weight(&mut self) -> Option<Weight> {
        while let Some(&QueueElement { key: weight, item }) = self.queue.peek() {
            if self.is_current(weight, &item) {
                return Some(weight);
            }
            self.queue.pop();
        }
        None
    }

    /// Settles the next state and relaxes its records. Stalled states are
    /// settled silently. Returns `None` once the queue is exhausted.
    pub fn step(&mut self) -> Result<Option<Arc<EdgePath>>> {
        loop {
            self.options.check_cancelled()?;
            let Some(QueueElement { key: weight, item: key }) = self.queue.pop() else {
                return Ok(None);
            };
            if !self.is_current(weight, &key) {
                continue;
            }
            let Some(path) = self.labels.get(&key).cloned() else {
                continue;
            };
            self.settled.insert(key);

            if self.stall_on_demand && self.is_stalled(&path) {
                continue;
            }

            self.relax(&path)?;
            self.settled_at
                .entry(path.vertex)
                .or_default()
                .push(Arc::clone(&path));
            return Ok(Some(path));
        }
    }

    pub fn settle_all(&mut self) -> Result<()> {
        while self.step()?.is_some() {}
        Ok(())
    }

    /// Non-stalled labels settled at `vertex`, cheapest first.
    pub fn settled_at(&self, vertex: VertexId) -> &[Arc<EdgePath>] {
        self.settled_at.get(&vertex).map_or(&[], Vec::as_slice)
    }

    pub fn max_reached(&self) -> bool {
        self.max_reached
    }

    pub fn into_outcome(self) -> SearchOutcome {
        let labels = self
            .settled_at
            .into_iter()
            .filter_map(|(vertex, mut paths)| {
                // The first settled label is the cheapest.
                paths.truncate(1);
                paths.pop().map(|path| (vertex, path))
            })
            .collect();

        SearchOutcome {
            labels,
            max_reached: self.max_reached,
        }
    }

    fn is_current(&self, weight: Weight, key: &SearchKey) -> bool {
        !self.settled.contains(key) && self.labels.get(key).is_some_and(|label| label.weight >= weight)
    }

    /// A state is stalled if a higher ranked neighbour, reached by this
    /// search, offers a cheaper way in.
    fn is_stalled(&self, path: &EdgePath) -> bool {
        let opposite = self.direction.opposite();
        self.graph.upward_edges(path.vertex).any(|(_, record)| {
            !record.is_loop()
                && opposite.allows(record.direction())
                && self
                    .labels
                    .get(&self.turns.key(record.head(), None))
                    .is_some_and(|label| label.weight + record.weight() < path.weight)
        })
    }

    fn relax(&mut self, path: &Arc<EdgePath>) -> Result<()> {
        let graph = self.graph;
        let turns = self.turns;
        let vertex = path.vertex;
        let edges = if self.only_upward {
            graph.upward_edges(vertex)
        } else {
            graph.edges(vertex)
        };

        for (id, record) in edges {
            if !self.direction.allows(record.direction()) {
                continue;
            }
            if self.only_upward && !record.is_loop() && graph.rank(record.head()) <= graph.rank(vertex) {
                return Err(RoutingError::InvariantViolation(format!(
                    "upward record {} -> {} does not lead to a higher rank",
                    vertex,
                    record.head()
                )));
            }
            if !turns.allows(self.direction, path, record) {
                continue;
            }

            let weight = path.weight + record.weight();
            if weight > self.options.max_weight {
                self.max_reached = true;
                continue;
            }
            let arrival = turns.arrival_after(record);
            let key = turns.key(record.head(), arrival);
            if self.settled.contains(&key) || self.labels.get(&key).is_some_and(|label| label.weight <= weight) {
                continue;
            }
            self.labels.insert(key, path.extend(record.head(), weight, id, arrival));
            self.queue.push(weight, key);
        }

        Ok(())
    }
}
