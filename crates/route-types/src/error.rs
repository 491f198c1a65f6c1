//! Error types reported by route device actions

use thiserror::Error;

/// Errors a route can report when asked to open its device path
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The device behind the route could not be opened
    #[error("failed to open device for route {route}: {reason}")]
    DeviceOpen { route: String, reason: String },

    /// Capabilities for the route's device are not loaded
    #[error("device unavailable for route {0}")]
    DeviceUnavailable(String),

    /// The route was asked to route without a bound stream
    #[error("no stream bound to route {0}")]
    NoStream(String),
}
