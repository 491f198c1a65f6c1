//! Audio Route Simulation Library
//!
//! This crate provides a simulation layer for exercising the route matching
//! engine without audio hardware. It includes:
//!
//! - **VirtualRoute**: a [`StreamRoute`](route_types::StreamRoute) that records
//!   every device action into a shared [`ActionLog`]
//! - **VirtualStream**: an [`IoStream`](route_types::IoStream) whose state can
//!   be flipped from tests
//! - **TopologyConfig**: a JSON description of routes, streams and a scenario
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use route_sim::{ActionLog, VirtualRoute, VirtualRouteConfig, VirtualStream};
//! use route_types::{Direction, IoStream, StreamRoute};
//!
//! let log = ActionLog::new();
//! let mut route = VirtualRoute::new(
//!     VirtualRouteConfig::new("Media", Direction::Output, 0).with_applicability(0x1),
//!     log.clone(),
//! );
//!
//! let stream: Arc<dyn IoStream> = Arc::new(VirtualStream::new("music", Direction::Output, 0x1));
//! assert!(route.is_matching_with_stream(stream.as_ref()));
//! assert!(route.set_stream(stream));
//! ```

pub mod log;
pub mod route;
pub mod stream;
pub mod topology;

pub use log::{ActionLog, ActionRecord, RouteAction};
pub use route::{RouteControl, VirtualRoute, VirtualRouteConfig};
pub use stream::{VirtualStream, VirtualStreamConfig};
pub use topology::{BuiltTopology, ScenarioStep, TopologyConfig, TopologyError};
