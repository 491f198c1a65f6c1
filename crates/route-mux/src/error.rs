//! Error types for the routing engine

use route_types::{RouteKey, RouteMask};
use thiserror::Error;

/// Errors that can occur in the routing engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// A route with the same name and direction is already registered
    #[error("route already registered: {0}")]
    DuplicateRoute(RouteKey),

    /// Route identity mask does not have exactly one bit set
    #[error("route {route}: mask {mask} is not a single bit")]
    InvalidMask {
        /// Rejected route
        route: RouteKey,
        /// Offending mask
        mask: RouteMask,
    },

    /// Route identity bit already owned by another route in the same direction
    #[error("route {route}: mask {mask} already owned by {existing}")]
    MaskCollision {
        /// Rejected route
        route: RouteKey,
        /// Route owning the bit
        existing: RouteKey,
        /// Contested mask
        mask: RouteMask,
    },

    /// Route not found
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// No output stream is registered
    #[error("no output stream registered")]
    NoOutputStream,

    /// The routing actor stopped or dropped the request
    #[error("routing actor unavailable")]
    ActorUnavailable,
}
