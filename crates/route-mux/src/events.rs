//! Routing engine events
//!
//! The engine buffers an event for every registry change, stream binding and
//! device action. Callers drain the buffer after each operation; the routing
//! actor forwards the events through its event channel.

use route_types::{DeviceMask, Direction, RouteKey, RouteMask};

use crate::masks::RouteMasks;

/// Event emitted by the routing engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingEvent {
    // -------------------------------------------------------------------------
    // Registry events
    // -------------------------------------------------------------------------
    /// A route was registered
    RouteAdded {
        /// Registry key
        key: RouteKey,
        /// Identity bit
        mask: RouteMask,
    },

    /// A route registration was dropped
    RouteRejected {
        /// Registry key of the rejected route
        key: RouteKey,
        /// Why the route was dropped
        reason: String,
    },

    /// Every route was dropped
    RoutesReset,

    /// A stream started asking for routing
    StreamAdded {
        /// Stream name
        name: String,
        /// Stream direction
        direction: Direction,
        /// Stream was queued ahead of non-direct streams
        direct: bool,
    },

    /// A stream stopped asking for routing
    StreamRemoved {
        /// Stream name
        name: String,
        /// Stream direction
        direction: Direction,
    },

    // -------------------------------------------------------------------------
    // Cycle events
    // -------------------------------------------------------------------------
    /// A stream was bound to a route during the match phase
    RouteBound {
        /// Registry key
        key: RouteKey,
        /// Stream name
        stream: String,
    },

    /// Routing changed in a direction
    RoutingChanged {
        /// Direction that changed
        direction: Direction,
        /// Masks at the end of the match phase
        masks: RouteMasks,
    },

    /// A route was asked to close; the route acts only in its platform's phase
    RouteDisabled {
        /// Registry key
        key: RouteKey,
        /// Called after the policy unroute
        post_disable: bool,
    },

    /// A route was asked to open and reported no error
    ///
    /// The route acts only in the phase its platform needs, so one event is
    /// emitted per enable pass that selected it.
    RouteEnabled {
        /// Registry key
        key: RouteKey,
        /// Called before the policy reroute
        pre_enable: bool,
    },

    /// A route failed to open
    RouteFailed {
        /// Registry key
        key: RouteKey,
        /// Error reported by the route
        error: String,
    },

    // -------------------------------------------------------------------------
    // Device events
    // -------------------------------------------------------------------------
    /// A supported device was connected
    CapabilitiesLoaded {
        /// Registry key
        key: RouteKey,
        /// Device that was connected
        device: DeviceMask,
    },

    /// A supported device was disconnected
    CapabilitiesReset {
        /// Registry key
        key: RouteKey,
        /// Device that was disconnected
        device: DeviceMask,
    },
}

impl RoutingEvent {
    /// Check if this is a registry lifecycle event
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            RoutingEvent::RouteAdded { .. }
                | RoutingEvent::RouteRejected { .. }
                | RoutingEvent::RoutesReset
                | RoutingEvent::StreamAdded { .. }
                | RoutingEvent::StreamRemoved { .. }
        )
    }

    /// Check if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RoutingEvent::RouteRejected { .. } | RoutingEvent::RouteFailed { .. }
        )
    }

    /// Get the route key if this event is associated with a specific route
    pub fn route_key(&self) -> Option<&RouteKey> {
        match self {
            RoutingEvent::RouteAdded { key, .. }
            | RoutingEvent::RouteRejected { key, .. }
            | RoutingEvent::RouteBound { key, .. }
            | RoutingEvent::RouteDisabled { key, .. }
            | RoutingEvent::RouteEnabled { key, .. }
            | RoutingEvent::RouteFailed { key, .. }
            | RoutingEvent::CapabilitiesLoaded { key, .. }
            | RoutingEvent::CapabilitiesReset { key, .. } => Some(key),
            _ => None,
        }
    }
}
