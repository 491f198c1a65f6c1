//! Route registry
//!
//! Owns every route of the static topology, keyed by name plus direction
//! suffix. Iteration follows key order, which is also the tie-break when
//! more than one route could serve a stream or a device.

use std::collections::BTreeMap;
use std::fmt;

use route_types::{DeviceMask, IoStream, RouteKey, StreamRoute};
use tracing::{debug, info};

use crate::error::RoutingError;

/// Owner of all routes
#[derive(Default)]
pub struct RouteRegistry {
    routes: BTreeMap<RouteKey, Box<dyn StreamRoute>>,
}

impl fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RouteRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route
    ///
    /// The route is refused if its key is taken, if its mask is not a single
    /// bit, or if another route of the same direction owns that bit. A refused
    /// route is dropped.
    pub fn add(&mut self, route: Box<dyn StreamRoute>) -> Result<RouteKey, RoutingError> {
        let key = route.key();
        if self.routes.contains_key(&key) {
            return Err(RoutingError::DuplicateRoute(key));
        }

        let mask = route.mask();
        if !mask.is_single_route() {
            return Err(RoutingError::InvalidMask { route: key, mask });
        }

        let direction = route.direction();
        if let Some((existing, _)) = self
            .routes
            .iter()
            .find(|(_, r)| r.direction() == direction && r.mask().intersects(mask))
        {
            return Err(RoutingError::MaskCollision {
                route: key,
                existing: existing.clone(),
                mask,
            });
        }

        self.routes.insert(key.clone(), route);
        Ok(key)
    }

    /// Drop every route
    pub fn clear(&mut self) {
        info!("Dropping {} routes", self.routes.len());
        self.routes.clear();
    }

    /// Start a new cycle on every route
    pub fn reset_availability(&mut self) {
        for route in self.routes.values_mut() {
            route.reset_availability();
        }
    }

    /// First route, in key order, able to carry `stream`
    pub fn find_matching_route(&self, stream: &dyn IoStream) -> Option<&dyn StreamRoute> {
        let mut matching = self
            .routes
            .values()
            .filter(|r| r.is_matching_with_stream(stream));
        let first = matching.next()?;

        let others = matching.count();
        if others > 0 {
            debug!(
                "{} more route(s) match stream {}, keeping {}",
                others,
                stream.name(),
                first.name()
            );
        }
        Some(first.as_ref())
    }

    /// Load or drop capabilities of every route supporting `device`
    ///
    /// Returns the keys of the routes that were touched.
    pub fn handle_device_connection_state(
        &mut self,
        device: DeviceMask,
        connected: bool,
    ) -> Vec<RouteKey> {
        let mut touched = Vec::new();
        for (key, route) in self.routes.iter_mut() {
            if !route.supported_device_mask().contains(device) {
                continue;
            }
            if connected {
                route.load_capabilities();
            } else {
                route.reset_capabilities();
            }
            touched.push(key.clone());
        }
        touched
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no route is registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns true if a route is registered under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.routes.contains_key(key)
    }

    /// Registered keys in iteration order
    pub fn keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.routes.keys()
    }

    /// Look up a route
    pub fn get(&self, key: &str) -> Option<&dyn StreamRoute> {
        self.routes.get(key).map(|r| r.as_ref())
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Box<dyn StreamRoute>> {
        self.routes.get_mut(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&RouteKey, &dyn StreamRoute)> {
        self.routes.iter().map(|(k, r)| (k, r.as_ref()))
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&RouteKey, &mut Box<dyn StreamRoute>)> {
        self.routes.iter_mut()
    }

    /// Render every route for diagnostics
    pub fn dump(&self, sink: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        writeln!(sink, "{:indent$}Stream Routes:", "", indent = indent)?;
        for route in self.routes.values() {
            route.dump(sink, indent + 4)?;
        }
        Ok(())
    }
}
