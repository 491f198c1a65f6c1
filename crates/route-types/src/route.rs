//! Route capability contract
//!
//! A route is one physical or logical signal path between the audio
//! subsystem and a device. Its implementation lives in the device layer; the
//! matching engine only drives it through [`StreamRoute`].

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::error::RouteError;
use crate::mask::{DeviceMask, RouteMask};
use crate::stream::IoStream;
use crate::Direction;

/// Registry key of a route: its name plus a direction suffix
///
/// The same name may exist once per direction, e.g. `Media_Playback` and
/// `Media_Capture`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RouteKey(String);

impl RouteKey {
    /// Build the key for a route name in a direction
    pub fn new(name: &str, direction: Direction) -> Self {
        RouteKey(format!("{}{}", name, direction.key_suffix()))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RouteKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Capability contract of a route
///
/// The engine calls these methods once per reconsideration cycle and never
/// concurrently. `used` and `previously_used` are the route's own view of its
/// participation; the engine mirrors them into per-direction bitmasks.
///
/// Platform ordering constraints (open the device before or after the policy
/// reroute, close it before or after unrouting) are encoded in
/// [`route`](StreamRoute::route) and [`unroute`](StreamRoute::unroute): both
/// are called in every cycle with a flag telling which phase is running, and
/// the implementation acts only in the phase its platform needs.
pub trait StreamRoute: Send {
    /// Human-readable route name
    fn name(&self) -> &str;

    /// Direction of the route
    fn direction(&self) -> Direction;

    /// Returns true for playback routes
    fn is_out(&self) -> bool {
        self.direction().is_out()
    }

    /// Registry key of the route
    fn key(&self) -> RouteKey {
        RouteKey::new(self.name(), self.direction())
    }

    /// Single-bit identity of the route within its direction
    fn mask(&self) -> RouteMask;

    /// Whether the route has been claimed by a stream in the current cycle
    fn is_used(&self) -> bool;

    /// Mark the route as claimed for the current cycle
    fn set_used(&mut self);

    /// Whether the route was claimed during the previous cycle
    fn previously_used(&self) -> bool;

    /// Route stays in use but needs a mute / unmute sequence
    fn need_reflow(&self) -> bool;

    /// Route stays in use but needs a full close / reopen
    fn need_repath(&self) -> bool;

    /// Whether the route can carry the given stream
    fn is_matching_with_stream(&self, stream: &dyn IoStream) -> bool;

    /// Bind a stream to the route for the current cycle
    ///
    /// Returns false if the route refuses the stream.
    fn set_stream(&mut self, stream: Arc<dyn IoStream>) -> bool;

    /// Close / detach the route
    ///
    /// `post_disable` is true when called after the policy-level unroute.
    fn unroute(&mut self, post_disable: bool);

    /// Open / attach the route
    ///
    /// `pre_enable` is true when called before the policy-level reroute.
    fn route(&mut self, pre_enable: bool) -> Result<(), RouteError>;

    /// Start a new cycle: current usage becomes previous usage
    fn reset_availability(&mut self);

    /// Devices this route can reach
    fn supported_device_mask(&self) -> DeviceMask;

    /// A supported device was connected
    fn load_capabilities(&mut self);

    /// A supported device was disconnected
    fn reset_capabilities(&mut self);

    /// Render the route state for diagnostics
    fn dump(&self, sink: &mut dyn fmt::Write, indent: usize) -> fmt::Result;
}
