//! Routing decision engine
//!
//! [`StreamRouteCollection`] composes the route registry, the ordered stream
//! lists and the per-direction masks, and runs the reconsideration cycle:
//!
//! 1. **Match**: every route not yet used is offered the first eligible
//!    stream of its direction
//! 2. **Disable**: routes leaving use (or needing a repath) are closed,
//!    before and after the policy unroute
//! 3. **Enable**: routes entering use (or needing a repath) are opened,
//!    before and after the policy reroute
//!
//! [`reconsider_routing`](StreamRouteCollection::reconsider_routing) runs the
//! whole pipeline in that order. The individual phases stay public for
//! callers that drive the policy layer themselves; such callers must disable
//! before they enable.

use std::fmt;
use std::sync::Arc;

use route_types::{
    DeviceMask, Direction, DirectionMap, IoStream, RouteError, RouteKey, RouteMask, StreamRoute,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::error::RoutingError;
use crate::events::RoutingEvent;
use crate::masks::RouteMasks;
use crate::registry::RouteRegistry;
use crate::streams::StreamRegistry;

/// Masks of both directions
pub type CycleMasks = DirectionMap<RouteMasks>;

/// Routing engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Stop a cycle after the match phase when nothing changed
    #[serde(default = "default_true")]
    pub skip_unchanged_cycles: bool,
    /// Log the registry dump at debug level after a changed cycle
    #[serde(default)]
    pub dump_on_change: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            skip_unchanged_cycles: true,
            dump_on_change: false,
        }
    }
}

/// Point of the pipeline at which the policy layer is called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingStage {
    /// Mute `routes_to_mute`
    Mute,
    /// Disconnect routes at policy level
    Unroute,
    /// Apply configuration of routes staying or arriving
    Configure,
    /// Connect routes at policy level
    Route,
    /// Unmute enabled routes
    Unmute,
}

impl RoutingStage {
    /// Stages in pipeline order
    pub const ORDER: [RoutingStage; 5] = [
        RoutingStage::Mute,
        RoutingStage::Unroute,
        RoutingStage::Configure,
        RoutingStage::Route,
        RoutingStage::Unmute,
    ];
}

/// Policy-level collaborator committing the new routing
///
/// Implemented for any `FnMut(RoutingStage, &CycleMasks)`.
pub trait RoutingCommit {
    /// Perform the policy work of one stage
    fn commit(&mut self, stage: RoutingStage, masks: &CycleMasks);
}

impl<F> RoutingCommit for F
where
    F: FnMut(RoutingStage, &CycleMasks),
{
    fn commit(&mut self, stage: RoutingStage, masks: &CycleMasks) {
        self(stage, masks)
    }
}

/// Commit that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCommit;

impl RoutingCommit for NoopCommit {
    fn commit(&mut self, _stage: RoutingStage, _masks: &CycleMasks) {}
}

/// Routes closed by a disable pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisableOutcome {
    /// Keys of the routes asked to close
    pub disabled: Vec<RouteKey>,
}

/// Routes asked to open by an enable pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnableOutcome {
    /// Keys of the routes whose open call returned no error
    pub enabled: Vec<RouteKey>,
    /// Routes that reported an error
    pub failed: Vec<(RouteKey, RouteError)>,
}

/// Result of a full reconsideration cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Whether routing changed (or the cycle was forced)
    pub changed: bool,
    /// Number of routes bound to a stream during the match phase
    pub bound: usize,
    /// Routes asked to close, in call order, without duplicates
    pub disabled: Vec<RouteKey>,
    /// Routes asked to open without error, in call order, without duplicates
    pub enabled: Vec<RouteKey>,
    /// Routes that failed to open
    pub failed: Vec<(RouteKey, RouteError)>,
    /// Masks at the end of the match phase
    pub masks: CycleMasks,
}

/// Route registry, stream lists and route masks driven as one unit
pub struct StreamRouteCollection {
    config: RoutingConfig,
    routes: RouteRegistry,
    streams: StreamRegistry,
    masks: CycleMasks,
    /// A match pass or a single-route bind ran since the last availability
    /// reset
    cycle_built: bool,
    event_buffer: Vec<RoutingEvent>,
}

impl fmt::Debug for StreamRouteCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRouteCollection")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .field("streams", &self.streams)
            .field("masks", &self.masks)
            .finish()
    }
}

impl StreamRouteCollection {
    /// Create an empty collection with default configuration
    pub fn new() -> Self {
        Self::with_config(RoutingConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: RoutingConfig) -> Self {
        Self {
            config,
            routes: RouteRegistry::new(),
            streams: StreamRegistry::new(),
            masks: CycleMasks::default(),
            cycle_built: false,
            event_buffer: Vec::new(),
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Update the configuration
    pub fn set_config(&mut self, config: RoutingConfig) {
        self.config = config;
    }

    // -------------------------------------------------------------------------
    // Route registry
    // -------------------------------------------------------------------------

    /// Register a route
    ///
    /// A duplicate key, a multi-bit mask or a bit already owned in the same
    /// direction only produces a warning; the route is dropped and `false`
    /// returned.
    pub fn add_route(&mut self, route: Box<dyn StreamRoute>) -> bool {
        let key = route.key();
        let mask = route.mask();
        match self.routes.add(route) {
            Ok(key) => {
                info!("Added route {} (mask {})", key, mask);
                self.event_buffer
                    .push(RoutingEvent::RouteAdded { key, mask });
                true
            }
            Err(e) => {
                warn!("add_route: element({}) not added: {}", key, e);
                self.event_buffer.push(RoutingEvent::RouteRejected {
                    key,
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Drop every route and forget all routing state
    pub fn reset(&mut self) {
        self.routes.clear();
        for (_, masks) in self.masks.iter_mut() {
            masks.clear();
        }
        self.cycle_built = false;
        self.event_buffer.push(RoutingEvent::RoutesReset);
    }

    /// Start a new cycle
    ///
    /// Every route moves its current usage to previous usage and the masks
    /// snapshot `enabled` into `prev_enabled`. Without a match pass since the
    /// last reset this is a no-op, so back-to-back resets keep the state of
    /// the last completed cycle.
    pub fn reset_availability(&mut self) {
        if !self.cycle_built {
            trace!("availability already reset");
            return;
        }
        for (_, masks) in self.masks.iter_mut() {
            masks.reset();
        }
        self.routes.reset_availability();
        self.cycle_built = false;
    }

    /// Number of registered routes
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if a route is registered under `key`
    pub fn contains_route(&self, key: &str) -> bool {
        self.routes.contains(key)
    }

    /// Registered route keys in iteration order
    pub fn route_keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.routes.keys()
    }

    /// Look up a route
    pub fn route(&self, key: &str) -> Option<&dyn StreamRoute> {
        self.routes.get(key)
    }

    /// Most suitable route for a stream's attributes
    ///
    /// The first matching route in key order wins.
    pub fn find_matching_route(&self, stream: &dyn IoStream) -> Option<&dyn StreamRoute> {
        self.routes.find_matching_route(stream)
    }

    /// Load or drop capabilities of every route supporting `device`
    ///
    /// Returns the number of routes touched.
    pub fn handle_device_connection_state(&mut self, device: DeviceMask, connected: bool) -> usize {
        let touched = self.routes.handle_device_connection_state(device, connected);
        debug!(
            "Device {} {}: {} route(s) updated",
            device,
            if connected { "connected" } else { "disconnected" },
            touched.len()
        );
        let count = touched.len();
        for key in touched {
            self.event_buffer.push(if connected {
                RoutingEvent::CapabilitiesLoaded { key, device }
            } else {
                RoutingEvent::CapabilitiesReset { key, device }
            });
        }
        count
    }

    // -------------------------------------------------------------------------
    // Stream registry
    // -------------------------------------------------------------------------

    /// Queue a stream for routing, direct streams first
    pub fn add_stream(&mut self, stream: Arc<dyn IoStream>) {
        debug!(
            "Adding {} stream {}{}",
            stream.direction(),
            stream.name(),
            if stream.is_direct() { " (direct)" } else { "" }
        );
        self.event_buffer.push(RoutingEvent::StreamAdded {
            name: stream.name().to_string(),
            direction: stream.direction(),
            direct: stream.is_direct(),
        });
        self.streams.add(stream);
    }

    /// Remove every occurrence of a stream
    pub fn remove_stream(&mut self, stream: &Arc<dyn IoStream>) {
        if self.streams.remove(stream) > 0 {
            debug!("Removed {} stream {}", stream.direction(), stream.name());
            self.event_buffer.push(RoutingEvent::StreamRemoved {
                name: stream.name().to_string(),
                direction: stream.direction(),
            });
        }
    }

    /// Canonical current output stream, used as echo reference
    pub fn first_output_stream(&self) -> Result<Arc<dyn IoStream>, RoutingError> {
        self.streams.first_output_stream()
    }

    /// Streams of one direction in priority order
    pub fn streams(&self, direction: Direction) -> impl Iterator<Item = &Arc<dyn IoStream>> {
        self.streams.streams(direction)
    }

    /// Number of streams queued in one direction
    pub fn stream_count(&self, direction: Direction) -> usize {
        self.streams.len(direction)
    }

    // -------------------------------------------------------------------------
    // Match phase
    // -------------------------------------------------------------------------

    /// Bind streams to every route not used yet in this cycle
    ///
    /// Returns the number of routes bound.
    pub fn prepare_routing(&mut self) -> usize {
        let mut bound = 0;
        for (key, route) in self.routes.iter_mut() {
            if route.is_used() {
                continue;
            }
            let Some(stream) = self.streams.set_stream_for_route(route.as_mut()) else {
                continue;
            };

            route.set_used();
            let masks = &mut self.masks[route.direction()];
            masks.set_enabled_route(route.mask());
            if route.need_reflow() {
                masks.set_need_reflow_route(route.mask());
            }
            if route.need_repath() {
                masks.set_need_repath_route(route.mask());
            }

            trace!("Route {} bound to stream {}", key, stream.name());
            self.event_buffer.push(RoutingEvent::RouteBound {
                key: key.clone(),
                stream: stream.name().to_string(),
            });
            bound += 1;
        }
        self.cycle_built = true;
        bound
    }

    /// Offer the stream lists to a single route
    ///
    /// Returns whether a stream was bound. The route's usage and the masks
    /// are left untouched; [`prepare_routing`](Self::prepare_routing) does
    /// that bookkeeping. A successful bind counts as cycle state, so the next
    /// [`reset_availability`](Self::reset_availability) releases the claimed
    /// stream.
    pub fn set_stream_for_route(&mut self, key: &str) -> Result<bool, RoutingError> {
        let route = self
            .routes
            .get_mut(key)
            .ok_or_else(|| RoutingError::RouteNotFound(key.to_string()))?;
        let bound = self.streams.set_stream_for_route(route.as_mut()).is_some();
        if bound {
            self.cycle_built = true;
        }
        Ok(bound)
    }

    // -------------------------------------------------------------------------
    // Disable / enable phases
    // -------------------------------------------------------------------------

    /// Close routes that were used and no longer are, or that need a repath
    ///
    /// `post_disable` is forwarded to each route, which decides whether its
    /// platform closes the device in this phase.
    pub fn disable_routes(&mut self, post_disable: bool) -> DisableOutcome {
        let mut outcome = DisableOutcome::default();
        for (key, route) in self.routes.iter_mut() {
            let leaving = route.previously_used() && !route.is_used();
            if !(leaving || route.need_repath()) {
                continue;
            }
            debug!("Route {} to be disabled", key);
            route.unroute(post_disable);
            self.event_buffer.push(RoutingEvent::RouteDisabled {
                key: key.clone(),
                post_disable,
            });
            outcome.disabled.push(key.clone());
        }
        outcome
    }

    /// Ask routes that were not used and now are, or that need a repath, to
    /// open
    ///
    /// Every selected route is called in both enable passes and only acts in
    /// the one its platform needs, so `enabled` lists each route that returned
    /// no error in this pass. A failing route is logged and reported; the
    /// remaining routes are still processed.
    pub fn enable_routes(&mut self, pre_enable: bool) -> EnableOutcome {
        let mut outcome = EnableOutcome::default();
        for (key, route) in self.routes.iter_mut() {
            let arriving = !route.previously_used() && route.is_used();
            if !(arriving || route.need_repath()) {
                continue;
            }
            debug!("Route {} to be enabled", key);
            match route.route(pre_enable) {
                Ok(()) => {
                    self.event_buffer.push(RoutingEvent::RouteEnabled {
                        key: key.clone(),
                        pre_enable,
                    });
                    outcome.enabled.push(key.clone());
                }
                Err(e) => {
                    error!("error while routing {}: {}", key, e);
                    self.event_buffer.push(RoutingEvent::RouteFailed {
                        key: key.clone(),
                        error: e.to_string(),
                    });
                    outcome.failed.push((key.clone(), e));
                }
            }
        }
        outcome
    }

    /// Disable pass run after the policy unroute
    pub fn post_disable_routes(&mut self) -> DisableOutcome {
        self.disable_routes(true)
    }

    /// Enable pass run before the policy reroute
    pub fn pre_enable_routes(&mut self) -> EnableOutcome {
        self.enable_routes(true)
    }

    /// Run a full reconsideration cycle
    ///
    /// Resets availability, matches streams to routes, and if anything
    /// changed (or `force` is set) runs the device phases around the policy
    /// stages: mute, disable, unroute, post-disable, configure, pre-enable,
    /// route, enable, unmute. Every disable runs before any enable.
    pub fn reconsider_routing(
        &mut self,
        commit: &mut dyn RoutingCommit,
        force: bool,
    ) -> CycleReport {
        self.reset_availability();
        let bound = self.prepare_routing();
        let changed = self.routing_has_changed();

        let mut report = CycleReport {
            changed: changed || force,
            bound,
            masks: self.masks,
            ..Default::default()
        };

        if !changed && !force && self.config.skip_unchanged_cycles {
            debug!("Routing unchanged, {} route(s) bound", bound);
            return report;
        }

        for (direction, masks) in self.masks.iter() {
            if masks.routing_has_changed() {
                info!(
                    "{} routing changed: enabled {} -> {}, reflow {}, repath {}",
                    direction,
                    masks.prev_enabled_routes(),
                    masks.enabled_routes(),
                    masks.need_reflow_routes(),
                    masks.need_repath_routes()
                );
                self.event_buffer.push(RoutingEvent::RoutingChanged {
                    direction,
                    masks: *masks,
                });
            }
        }

        let masks = self.masks;
        commit.commit(RoutingStage::Mute, &masks);

        let mut disabled = self.disable_routes(false).disabled;
        commit.commit(RoutingStage::Unroute, &masks);
        disabled.extend(self.post_disable_routes().disabled);

        commit.commit(RoutingStage::Configure, &masks);

        let mut enabled = self.pre_enable_routes();
        commit.commit(RoutingStage::Route, &masks);
        let standard = self.enable_routes(false);
        enabled.enabled.extend(standard.enabled);
        enabled.failed.extend(standard.failed);

        commit.commit(RoutingStage::Unmute, &masks);

        for key in disabled {
            if !report.disabled.contains(&key) {
                report.disabled.push(key);
            }
        }
        for (key, e) in enabled.failed {
            if !report.failed.iter().any(|(k, _)| *k == key) {
                report.failed.push((key, e));
            }
        }
        for key in enabled.enabled {
            let failed = report.failed.iter().any(|(k, _)| *k == key);
            if !failed && !report.enabled.contains(&key) {
                report.enabled.push(key);
            }
        }

        if self.config.dump_on_change {
            debug!("{}", self.dump_to_string());
        }
        report
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Snapshot of one direction's masks
    pub fn masks(&self, direction: Direction) -> RouteMasks {
        self.masks[direction]
    }

    /// Snapshot of both directions' masks
    pub fn cycle_masks(&self) -> CycleMasks {
        self.masks
    }

    /// Routes enabled in the current cycle
    pub fn enabled_route_mask(&self, direction: Direction) -> RouteMask {
        self.masks[direction].enabled_routes()
    }

    /// Routes enabled at the end of the previous cycle
    pub fn prev_enabled_route_mask(&self, direction: Direction) -> RouteMask {
        self.masks[direction].prev_enabled_routes()
    }

    /// Routes needing a mute / unmute sequence
    pub fn need_reflow_route_mask(&self, direction: Direction) -> RouteMask {
        self.masks[direction].need_reflow_routes()
    }

    /// Routes needing a full close / reopen
    pub fn need_repath_route_mask(&self, direction: Direction) -> RouteMask {
        self.masks[direction].need_repath_routes()
    }

    /// Routes that can stay unmuted
    pub fn unmuted_routes(&self, direction: Direction) -> RouteMask {
        self.masks[direction].unmuted_routes()
    }

    /// Routes to mute
    pub fn routes_to_mute(&self, direction: Direction) -> RouteMask {
        self.masks[direction].routes_to_mute()
    }

    /// Routes that stay open
    pub fn opened_routes(&self, direction: Direction) -> RouteMask {
        self.masks[direction].opened_routes()
    }

    /// Routes to close
    pub fn routes_to_disable(&self, direction: Direction) -> RouteMask {
        self.masks[direction].routes_to_disable()
    }

    /// Whether routing changed in either direction
    pub fn routing_has_changed(&self) -> bool {
        self.masks[Direction::Output].routing_has_changed()
            || self.masks[Direction::Input].routing_has_changed()
    }

    /// Keys of the routes whose bit is set in `mask` for `direction`
    pub fn route_keys_in(&self, direction: Direction, mask: RouteMask) -> Vec<RouteKey> {
        self.routes
            .iter()
            .filter(|(_, r)| r.direction() == direction && mask.intersects(r.mask()))
            .map(|(k, _)| k.clone())
            .collect()
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Render the route state for operational inspection
    pub fn dump(&self, sink: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        self.routes.dump(sink, indent)?;
        for (direction, masks) in self.masks.iter() {
            writeln!(
                sink,
                "{:pad$}{} masks: enabled {} prev {} reflow {} repath {}",
                "",
                direction,
                masks.enabled_routes(),
                masks.prev_enabled_routes(),
                masks.need_reflow_routes(),
                masks.need_repath_routes(),
                pad = indent + 4
            )?;
        }
        Ok(())
    }

    /// Render the dump into a string
    pub fn dump_to_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.dump(&mut out, 0);
        out
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<RoutingEvent> {
        std::mem::take(&mut self.event_buffer)
    }
}

impl Default for StreamRouteCollection {
    fn default() -> Self {
        Self::new()
    }
}
