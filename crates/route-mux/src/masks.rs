//! Per-direction route state aggregation
//!
//! Each direction accumulates the routes enabled during the current cycle
//! and the routes flagged for reflow or repath. Comparing that with the
//! previous cycle gives the sets the policy layer acts on:
//!
//! | Set | Formula |
//! |-----|---------|
//! | unmuted routes | `prev & enabled & !reflow` |
//! | routes to mute | `(prev & !enabled) \| reflow` |
//! | opened routes | `prev & enabled & !repath` |
//! | routes to disable | `(prev & !enabled) \| repath` |

use route_types::RouteMask;
use serde::{Deserialize, Serialize};

/// Bitmask accumulator for one direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMasks {
    /// Routes that need a mute / unmute sequence
    need_reflow: RouteMask,
    /// Routes that need to be closed and reopened
    need_repath: RouteMask,
    /// Routes enabled in the current cycle
    enabled: RouteMask,
    /// Routes enabled at the end of the previous cycle
    prev_enabled: RouteMask,
}

impl RouteMasks {
    /// Create masks from explicit values
    pub fn new(
        prev_enabled: RouteMask,
        enabled: RouteMask,
        need_reflow: RouteMask,
        need_repath: RouteMask,
    ) -> Self {
        Self {
            need_reflow,
            need_repath,
            enabled,
            prev_enabled,
        }
    }

    /// Fold a route into the enabled set
    pub fn set_enabled_route(&mut self, route: RouteMask) {
        self.enabled |= route;
    }

    /// Fold a route into the reflow set
    pub fn set_need_reflow_route(&mut self, route: RouteMask) {
        self.need_reflow |= route;
    }

    /// Fold a route into the repath set
    pub fn set_need_repath_route(&mut self, route: RouteMask) {
        self.need_repath |= route;
    }

    /// Routes enabled in the current cycle
    pub fn enabled_routes(&self) -> RouteMask {
        self.enabled
    }

    /// Routes enabled at the end of the previous cycle
    pub fn prev_enabled_routes(&self) -> RouteMask {
        self.prev_enabled
    }

    /// Routes flagged for reflow
    pub fn need_reflow_routes(&self) -> RouteMask {
        self.need_reflow
    }

    /// Routes flagged for repath
    pub fn need_repath_routes(&self) -> RouteMask {
        self.need_repath
    }

    /// Start a new cycle: the enabled set becomes the previous set
    pub fn reset(&mut self) {
        self.prev_enabled = self.enabled;
        self.enabled = RouteMask::EMPTY;
        self.need_reflow = RouteMask::EMPTY;
        self.need_repath = RouteMask::EMPTY;
    }

    /// Forget everything, including the previous cycle
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Checks if the routing conditions changed in this direction
    ///
    /// True if the enabled set moved or any route needs reconfiguration.
    pub fn routing_has_changed(&self) -> bool {
        self.prev_enabled != self.enabled
            || !self.need_reflow.is_empty()
            || !self.need_repath.is_empty()
    }

    /// Routes that stay enabled and can stay unmuted
    pub fn unmuted_routes(&self) -> RouteMask {
        self.prev_enabled & self.enabled & !self.need_reflow
    }

    /// Routes leaving the enabled set, or staying but needing a reflow
    pub fn routes_to_mute(&self) -> RouteMask {
        (self.prev_enabled & !self.enabled) | self.need_reflow
    }

    /// Routes that stay open without being reopened
    pub fn opened_routes(&self) -> RouteMask {
        self.prev_enabled & self.enabled & !self.need_repath
    }

    /// Routes to close in this cycle
    pub fn routes_to_disable(&self) -> RouteMask {
        (self.prev_enabled & !self.enabled) | self.need_repath
    }
}
