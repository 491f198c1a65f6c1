//! Audio Stream Route Matching Engine
//!
//! This crate decides, on every policy cycle, which audio routes of a static
//! topology must be opened, closed, muted or reopened, given the set of
//! active audio streams.
//!
//! # Architecture
//!
//! A cycle runs in three steps:
//!
//! - **Match**: each route takes the first eligible stream of its direction.
//!   Direct streams are queued first and win over regular streams.
//! - **Aggregate**: bound routes fold their bit into the per-direction
//!   [`RouteMasks`], which compare the current cycle with the previous one
//! - **Apply**: routes leaving use (or needing a repath) are disabled, then
//!   routes entering use (or needing a repath) are enabled, around the policy
//!   stages of a [`RoutingCommit`]
//!
//! Device-backed routes and audio streams are supplied by the caller through
//! the [`StreamRoute`](route_types::StreamRoute) and
//! [`IoStream`](route_types::IoStream) traits.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use route_mux::{NoopCommit, StreamRouteCollection};
//! use route_sim::{ActionLog, VirtualRoute, VirtualRouteConfig, VirtualStream};
//! use route_types::Direction;
//!
//! let log = ActionLog::new();
//! let mut routing = StreamRouteCollection::new();
//! routing.add_route(Box::new(VirtualRoute::new(
//!     VirtualRouteConfig::new("Media", Direction::Output, 0),
//!     log.clone(),
//! )));
//! routing.add_stream(Arc::new(VirtualStream::new("music", Direction::Output, 0x1)));
//!
//! let report = routing.reconsider_routing(&mut NoopCommit, false);
//! assert!(report.changed);
//! ```

pub mod actor;
pub mod engine;
pub mod error;
pub mod events;
pub mod masks;
pub mod registry;
pub mod streams;

// Re-export actor types
pub use actor::{run_routing_actor, RoutingActorCommand, RoutingHandle};

// Re-export engine types
pub use engine::{
    CycleMasks, CycleReport, DisableOutcome, EnableOutcome, NoopCommit, RoutingCommit,
    RoutingConfig, RoutingStage, StreamRouteCollection,
};
pub use error::RoutingError;
pub use events::RoutingEvent;
pub use masks::RouteMasks;
pub use registry::RouteRegistry;
pub use streams::StreamRegistry;
