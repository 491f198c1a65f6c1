//! Ordered stream lists
//!
//! One list per direction. List order is match priority: direct streams are
//! queued at the front so they get the first pick of matching routes, other
//! streams are appended in arrival order.

use std::collections::VecDeque;
use std::sync::Arc;

use route_types::{same_stream, Direction, DirectionMap, IoStream, StreamRoute};
use tracing::{error, trace};

use crate::error::RoutingError;

/// Per-direction ordered lists of streams asking for routing
#[derive(Default)]
pub struct StreamRegistry {
    lists: DirectionMap<VecDeque<Arc<dyn IoStream>>>,
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |d: Direction| {
            self.lists[d]
                .iter()
                .map(|s| s.name().to_string())
                .collect::<Vec<_>>()
        };
        f.debug_struct("StreamRegistry")
            .field("output", &names(Direction::Output))
            .field("input", &names(Direction::Input))
            .finish()
    }
}

impl StreamRegistry {
    /// Create empty lists
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream, direct streams first
    pub fn add(&mut self, stream: Arc<dyn IoStream>) {
        let list = &mut self.lists[stream.direction()];
        if stream.is_direct() {
            list.push_front(stream);
        } else {
            list.push_back(stream);
        }
    }

    /// Remove every occurrence of a stream
    ///
    /// Returns the number of entries removed.
    pub fn remove(&mut self, stream: &Arc<dyn IoStream>) -> usize {
        let list = &mut self.lists[stream.direction()];
        let before = list.len();
        list.retain(|s| !same_stream(s, stream));
        before - list.len()
    }

    /// Canonical current output stream (echo reference)
    pub fn first_output_stream(&self) -> Result<Arc<dyn IoStream>, RoutingError> {
        match self.lists[Direction::Output].front() {
            Some(stream) => Ok(Arc::clone(stream)),
            None => {
                error!("current stream NOT FOUND for echo reference");
                Err(RoutingError::NoOutputStream)
            }
        }
    }

    /// Streams of one direction in priority order
    pub fn streams(&self, direction: Direction) -> impl Iterator<Item = &Arc<dyn IoStream>> {
        self.lists[direction].iter()
    }

    /// Number of streams in one direction
    pub fn len(&self, direction: Direction) -> usize {
        self.lists[direction].len()
    }

    /// Returns true if no stream is queued in either direction
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|(_, list)| list.is_empty())
    }

    /// Returns true if the stream is queued
    pub fn contains(&self, stream: &Arc<dyn IoStream>) -> bool {
        self.lists[stream.direction()]
            .iter()
            .any(|s| same_stream(s, stream))
    }

    /// Find and bind a stream for a route
    ///
    /// Walks the route's direction in priority order and offers the first
    /// stream that is started, routed by policy, not already claimed by
    /// another route this cycle, and accepted by the route's matching
    /// predicate. Returns the stream if the route took it.
    pub fn set_stream_for_route(&self, route: &mut dyn StreamRoute) -> Option<Arc<dyn IoStream>> {
        let candidate = self.lists[route.direction()].iter().find(|stream| {
            stream.is_started()
                && stream.is_routed_by_policy()
                && !stream.is_new_route_available()
                && route.is_matching_with_stream(stream.as_ref())
        })?;

        trace!(
            "route {} is matching with stream {}",
            route.name(),
            candidate.name()
        );
        route
            .set_stream(Arc::clone(candidate))
            .then(|| Arc::clone(candidate))
    }
}
