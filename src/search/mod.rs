use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use ahash::HashMap;

use crate::{
    error::{Result, RoutingError},
    graphs::{path::EdgePath, VertexId, Weight},
};

pub mod bidirectional;
pub mod dijkstra;
pub mod many_to_many;
pub mod turns;

/// Cooperative cancellation shared between a caller and running searches.
///
/// Cloning shares the flag, so a clone handed to another thread can cancel
/// every search using the original.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }

    /// Cancels automatically once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Cancellation {
        Cancellation {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RoutingError::Cancelled);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SearchOptions {
    /// Labels heavier than this are neither settled nor queued.
    pub max_weight: Weight,
    pub cancellation: Option<Cancellation>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            max_weight: Weight::MAX,
            cancellation: None,
        }
    }
}

impl SearchOptions {
    pub fn with_max_weight(max_weight: Weight) -> SearchOptions {
        SearchOptions {
            max_weight,
            ..SearchOptions::default()
        }
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(cancellation) => cancellation.check(),
            None => Ok(()),
        }
    }
}

/// Result of a unidirectional search.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Best settled path per reached vertex.
    pub labels: HashMap<VertexId, Arc<EdgePath>>,
    /// Whether some label was cut off by `max_weight`.
    pub max_reached: bool,
}

impl SearchOutcome {
    pub fn weight(&self, vertex: VertexId) -> Option<Weight> {
        self.labels.get(&vertex).map(|path| path.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let cancellation = Cancellation::new();
        let handle = cancellation.clone();
        assert!(cancellation.check().is_ok());

        handle.cancel();
        assert!(matches!(cancellation.check(), Err(RoutingError::Cancelled)));
    }

    #[test]
    fn expired_deadline_cancels() {
        let cancellation = Cancellation::with_timeout(Duration::ZERO);
        assert!(cancellation.is_cancelled());
    }
}
