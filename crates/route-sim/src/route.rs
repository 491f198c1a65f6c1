//! Virtual route simulation
//!
//! Provides a route that behaves like a device-backed route (binds streams,
//! opens and closes a device path, tracks capabilities) and records every
//! device action into an [`ActionLog`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use route_types::{
    same_stream, DeviceMask, Direction, IoStream, RouteError, RouteMask, StreamRoute,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::log::{ActionLog, RouteAction};

/// Configuration for creating a virtual route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualRouteConfig {
    /// Route name (without direction suffix)
    pub name: String,
    /// Direction of the route
    pub direction: Direction,
    /// Bit index of the route mask
    pub bit: u32,
    /// Stream attributes this route accepts (output flags or input sources)
    pub applicability_mask: u32,
    /// Devices the route can reach
    #[serde(default)]
    pub supported_devices: DeviceMask,
    /// Platform opens the device before the policy reroute
    #[serde(default)]
    pub open_before_route: bool,
    /// Platform closes the device after the policy unroute
    #[serde(default)]
    pub close_after_unroute: bool,
    /// Whether capabilities are available at startup
    #[serde(default = "default_true")]
    pub capabilities_loaded: bool,
}

fn default_true() -> bool {
    true
}

impl VirtualRouteConfig {
    /// Create a config accepting every stream attribute
    pub fn new(name: impl Into<String>, direction: Direction, bit: u32) -> Self {
        Self {
            name: name.into(),
            direction,
            bit,
            applicability_mask: u32::MAX,
            supported_devices: DeviceMask::NONE,
            open_before_route: false,
            close_after_unroute: false,
            capabilities_loaded: true,
        }
    }

    /// Restrict the stream attributes the route accepts
    pub fn with_applicability(mut self, mask: u32) -> Self {
        self.applicability_mask = mask;
        self
    }

    /// Set the devices the route can reach
    pub fn with_devices(mut self, devices: DeviceMask) -> Self {
        self.supported_devices = devices;
        self
    }

    /// Open the device in the pre-enable phase
    pub fn opening_before_route(mut self) -> Self {
        self.open_before_route = true;
        self
    }

    /// Close the device in the post-disable phase
    pub fn closing_after_unroute(mut self) -> Self {
        self.close_after_unroute = true;
        self
    }

    /// Start without capabilities (device not yet connected)
    pub fn without_capabilities(mut self) -> Self {
        self.capabilities_loaded = false;
        self
    }

    /// Route mask derived from the bit index
    pub fn mask(&self) -> RouteMask {
        RouteMask::from_bit(self.bit)
    }
}

/// Out-of-band controls for a virtual route
///
/// Requests raised here take effect at the start of the next cycle, when the
/// route resets its availability.
#[derive(Debug, Default)]
pub struct RouteControl {
    reflow_requested: AtomicBool,
    repath_requested: AtomicBool,
    fail_on_route: AtomicBool,
}

impl RouteControl {
    /// Ask for a mute / unmute sequence on the next cycle
    pub fn request_reflow(&self) {
        self.reflow_requested.store(true, Ordering::Relaxed);
    }

    /// Ask for a full close / reopen on the next cycle
    pub fn request_repath(&self) {
        self.repath_requested.store(true, Ordering::Relaxed);
    }

    /// Make every subsequent open attempt fail (or succeed again)
    pub fn set_fail_on_route(&self, fail: bool) {
        self.fail_on_route.store(fail, Ordering::Relaxed);
    }

    fn take_reflow(&self) -> bool {
        self.reflow_requested.swap(false, Ordering::Relaxed)
    }

    fn take_repath(&self) -> bool {
        self.repath_requested.swap(false, Ordering::Relaxed)
    }

    fn should_fail(&self) -> bool {
        self.fail_on_route.load(Ordering::Relaxed)
    }
}

/// A simulated route backed by a recorded, not real, device
pub struct VirtualRoute {
    config: VirtualRouteConfig,
    key: String,
    used: bool,
    previously_used: bool,
    reflow_this_cycle: bool,
    repath_this_cycle: bool,
    capabilities_loaded: bool,
    opened: bool,
    /// Stream attached to the open device path
    current_stream: Option<Arc<dyn IoStream>>,
    /// Stream bound during the current cycle
    new_stream: Option<Arc<dyn IoStream>>,
    control: Arc<RouteControl>,
    log: ActionLog,
}

impl fmt::Debug for VirtualRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualRoute")
            .field("key", &self.key)
            .field("used", &self.used)
            .field("previously_used", &self.previously_used)
            .field("opened", &self.opened)
            .field("capabilities_loaded", &self.capabilities_loaded)
            .field("current_stream", &self.current_stream.as_ref().map(|s| s.name()))
            .field("new_stream", &self.new_stream.as_ref().map(|s| s.name()))
            .finish()
    }
}

impl VirtualRoute {
    /// Create a new virtual route recording into `log`
    pub fn new(config: VirtualRouteConfig, log: ActionLog) -> Self {
        Self::with_control(config, log, Arc::new(RouteControl::default()))
    }

    /// Create a new virtual route driven by a shared control handle
    pub fn with_control(
        config: VirtualRouteConfig,
        log: ActionLog,
        control: Arc<RouteControl>,
    ) -> Self {
        let key = format!("{}{}", config.name, config.direction.key_suffix());
        let capabilities_loaded = config.capabilities_loaded;
        Self {
            config,
            key,
            used: false,
            previously_used: false,
            reflow_this_cycle: false,
            repath_this_cycle: false,
            capabilities_loaded,
            opened: false,
            current_stream: None,
            new_stream: None,
            control,
            log,
        }
    }

    /// Get the control handle
    pub fn control(&self) -> Arc<RouteControl> {
        Arc::clone(&self.control)
    }

    /// Whether the simulated device path is open
    pub fn is_opened(&self) -> bool {
        self.opened
    }

    /// Whether device capabilities are loaded
    pub fn capabilities_loaded(&self) -> bool {
        self.capabilities_loaded
    }

    fn stream_changed(&self) -> bool {
        match (&self.new_stream, &self.current_stream) {
            (Some(new), Some(current)) => !same_stream(new, current),
            (Some(_), None) => true,
            _ => false,
        }
    }
}

impl StreamRoute for VirtualRoute {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn direction(&self) -> Direction {
        self.config.direction
    }

    fn mask(&self) -> RouteMask {
        self.config.mask()
    }

    fn is_used(&self) -> bool {
        self.used
    }

    fn set_used(&mut self) {
        self.used = true;
    }

    fn previously_used(&self) -> bool {
        self.previously_used
    }

    fn need_reflow(&self) -> bool {
        self.used && self.previously_used && (self.reflow_this_cycle || self.need_repath())
    }

    fn need_repath(&self) -> bool {
        self.used && self.previously_used && (self.repath_this_cycle || self.stream_changed())
    }

    fn is_matching_with_stream(&self, stream: &dyn IoStream) -> bool {
        self.capabilities_loaded
            && stream.direction() == self.config.direction
            && stream.applicability_mask() & self.config.applicability_mask != 0
    }

    fn set_stream(&mut self, stream: Arc<dyn IoStream>) -> bool {
        if stream.direction() != self.config.direction {
            warn!(
                "{}: refusing {} stream {}",
                self.key,
                stream.direction(),
                stream.name()
            );
            return false;
        }
        stream.set_new_route_available(true);
        self.log.record(
            self.key.clone(),
            RouteAction::StreamBound {
                stream: stream.name().to_string(),
            },
        );
        self.new_stream = Some(stream);
        true
    }

    fn unroute(&mut self, post_disable: bool) {
        if post_disable != self.config.close_after_unroute {
            return;
        }
        if self.opened {
            debug!("{}: closing device path", self.key);
            self.log
                .record(self.key.clone(), RouteAction::Closed { post_disable });
        }
        self.opened = false;
        self.current_stream = None;
    }

    fn route(&mut self, pre_enable: bool) -> Result<(), RouteError> {
        if pre_enable != self.config.open_before_route {
            return Ok(());
        }
        if self.control.should_fail() {
            self.log.record(self.key.clone(), RouteAction::OpenFailed);
            return Err(RouteError::DeviceOpen {
                route: self.key.clone(),
                reason: "injected failure".to_string(),
            });
        }
        if !self.capabilities_loaded {
            self.log.record(self.key.clone(), RouteAction::OpenFailed);
            return Err(RouteError::DeviceUnavailable(self.key.clone()));
        }
        let Some(stream) = self.new_stream.clone() else {
            return Err(RouteError::NoStream(self.key.clone()));
        };

        debug!("{}: opening device path for {}", self.key, stream.name());
        self.current_stream = Some(stream);
        self.opened = true;
        self.log
            .record(self.key.clone(), RouteAction::Opened { pre_enable });
        Ok(())
    }

    fn reset_availability(&mut self) {
        if let Some(stream) = self.new_stream.take() {
            stream.set_new_route_available(false);
        }
        self.previously_used = self.used;
        self.used = false;
        self.reflow_this_cycle = self.control.take_reflow();
        self.repath_this_cycle = self.control.take_repath();
    }

    fn supported_device_mask(&self) -> DeviceMask {
        self.config.supported_devices
    }

    fn load_capabilities(&mut self) {
        self.capabilities_loaded = true;
        self.log
            .record(self.key.clone(), RouteAction::CapabilitiesLoaded);
    }

    fn reset_capabilities(&mut self) {
        self.capabilities_loaded = false;
        self.log
            .record(self.key.clone(), RouteAction::CapabilitiesReset);
    }

    fn dump(&self, sink: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        let pad = indent + 2;
        writeln!(sink, "{:indent$}Route {}:", "", self.key, indent = indent)?;
        writeln!(sink, "{:pad$}mask: {}", "", self.mask(), pad = pad)?;
        writeln!(
            sink,
            "{:pad$}used: {} (previously {})",
            "",
            self.used,
            self.previously_used,
            pad = pad
        )?;
        writeln!(
            sink,
            "{:pad$}devices: {} capabilities: {}",
            "",
            self.config.supported_devices,
            if self.capabilities_loaded {
                "loaded"
            } else {
                "unavailable"
            },
            pad = pad
        )?;
        writeln!(
            sink,
            "{:pad$}stream: {}",
            "",
            self.current_stream
                .as_ref()
                .map(|s| s.name())
                .unwrap_or("none"),
            pad = pad
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::VirtualStream;

    fn output_route(log: &ActionLog) -> VirtualRoute {
        VirtualRoute::new(
            VirtualRouteConfig::new("Media", Direction::Output, 0).with_applicability(0x1),
            log.clone(),
        )
    }

    fn stream(name: &str) -> Arc<dyn IoStream> {
        Arc::new(VirtualStream::new(name, Direction::Output, 0x1))
    }

    #[test]
    fn test_key_and_mask() {
        let route = output_route(&ActionLog::new());
        assert_eq!(route.key().as_str(), "Media_Playback");
        assert_eq!(route.mask(), RouteMask(0x1));
    }

    #[test]
    fn test_matching_requires_capabilities_and_attributes() {
        let mut route = output_route(&ActionLog::new());
        let music = stream("music");
        let other = VirtualStream::new("ring", Direction::Output, 0x2);
        let capture = VirtualStream::new("mic", Direction::Input, 0x1);

        assert!(route.is_matching_with_stream(music.as_ref()));
        assert!(!route.is_matching_with_stream(&other));
        assert!(!route.is_matching_with_stream(&capture));

        route.reset_capabilities();
        assert!(!route.is_matching_with_stream(music.as_ref()));
    }

    #[test]
    fn test_set_stream_claims_stream() {
        let mut route = output_route(&ActionLog::new());
        let music = stream("music");

        assert!(route.set_stream(Arc::clone(&music)));
        assert!(music.is_new_route_available());

        route.reset_availability();
        assert!(!music.is_new_route_available());
    }

    #[test]
    fn test_open_only_in_configured_phase() {
        let log = ActionLog::new();
        let mut route = output_route(&log);
        route.set_stream(stream("music"));
        route.set_used();

        route.route(true).unwrap();
        assert!(!route.is_opened());

        route.route(false).unwrap();
        assert!(route.is_opened());
        assert_eq!(log.opened_routes(), vec!["Media_Playback".to_string()]);
    }

    #[test]
    fn test_repath_when_stream_changes() {
        let mut route = output_route(&ActionLog::new());
        route.set_stream(stream("music"));
        route.set_used();
        route.route(false).unwrap();

        // Same route, different stream on the next cycle
        route.reset_availability();
        route.set_stream(stream("game"));
        route.set_used();

        assert!(route.need_repath());
        assert!(route.need_reflow());
    }

    #[test]
    fn test_requested_reflow_applies_to_next_cycle_only() {
        let mut route = output_route(&ActionLog::new());
        let music = stream("music");
        route.set_stream(Arc::clone(&music));
        route.set_used();
        route.route(false).unwrap();

        route.control().request_reflow();
        route.reset_availability();
        route.set_stream(Arc::clone(&music));
        route.set_used();
        assert!(route.need_reflow());
        assert!(!route.need_repath());

        route.reset_availability();
        route.set_stream(music);
        route.set_used();
        assert!(!route.need_reflow());
    }

    #[test]
    fn test_injected_failure() {
        let log = ActionLog::new();
        let mut route = output_route(&log);
        route.set_stream(stream("music"));
        route.control().set_fail_on_route(true);

        assert!(matches!(
            route.route(false),
            Err(RouteError::DeviceOpen { .. })
        ));
        assert_eq!(log.actions_for("Media_Playback").last(), Some(&RouteAction::OpenFailed));
    }

    #[test]
    fn test_dump() {
        let route = output_route(&ActionLog::new());
        let mut out = String::new();
        route.dump(&mut out, 4).unwrap();

        assert!(out.starts_with("    Route Media_Playback:\n"));
        assert!(out.contains("      mask: 0x00000001"));
        assert!(out.contains("stream: none"));
    }
}
