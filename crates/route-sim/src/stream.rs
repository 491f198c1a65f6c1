//! Virtual stream simulation

use std::sync::atomic::{AtomicBool, Ordering};

use route_types::{Direction, IoStream};
use serde::{Deserialize, Serialize};

/// Configuration for creating a virtual stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualStreamConfig {
    /// Display name
    pub name: String,
    /// Direction of the stream
    pub direction: Direction,
    /// Output flags or input source
    pub applicability_mask: u32,
    /// Needs a dedicated low-latency path
    #[serde(default)]
    pub direct: bool,
    /// Running at startup
    #[serde(default = "default_true")]
    pub started: bool,
    /// Routed by policy at startup
    #[serde(default = "default_true")]
    pub routed_by_policy: bool,
}

fn default_true() -> bool {
    true
}

/// A simulated audio session
///
/// State lives in atomics so a test can flip it through a shared `Arc` while
/// the stream registry holds another reference.
#[derive(Debug)]
pub struct VirtualStream {
    name: String,
    direction: Direction,
    applicability_mask: u32,
    direct: bool,
    started: AtomicBool,
    routed_by_policy: AtomicBool,
    new_route_available: AtomicBool,
}

impl VirtualStream {
    /// Create a started, policy-routed, non-direct stream
    pub fn new(name: impl Into<String>, direction: Direction, applicability_mask: u32) -> Self {
        Self {
            name: name.into(),
            direction,
            applicability_mask,
            direct: false,
            started: AtomicBool::new(true),
            routed_by_policy: AtomicBool::new(true),
            new_route_available: AtomicBool::new(false),
        }
    }

    /// Create a stream from its configuration
    pub fn from_config(config: &VirtualStreamConfig) -> Self {
        let stream = Self::new(
            config.name.clone(),
            config.direction,
            config.applicability_mask,
        );
        stream.set_started(config.started);
        stream.set_routed_by_policy(config.routed_by_policy);
        Self {
            direct: config.direct,
            ..stream
        }
    }

    /// Mark the stream as needing a direct path
    pub fn direct(mut self) -> Self {
        self.direct = true;
        self
    }

    /// Start or stop the stream
    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::Relaxed);
    }

    /// Grant or revoke policy routing
    pub fn set_routed_by_policy(&self, routed: bool) {
        self.routed_by_policy.store(routed, Ordering::Relaxed);
    }
}

impl IoStream for VirtualStream {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn is_direct(&self) -> bool {
        self.direct
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    fn is_routed_by_policy(&self) -> bool {
        self.routed_by_policy.load(Ordering::Relaxed)
    }

    fn is_new_route_available(&self) -> bool {
        self.new_route_available.load(Ordering::Relaxed)
    }

    fn set_new_route_available(&self, available: bool) {
        self.new_route_available.store(available, Ordering::Relaxed);
    }

    fn applicability_mask(&self) -> u32 {
        self.applicability_mask
    }

    fn name(&self) -> &str {
        &self.name
    }
}
