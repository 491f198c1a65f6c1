//! Topology and scenario configuration
//!
//! A topology file lists the static routes, the streams that exist at
//! startup and an optional scenario of steps to replay:
//!
//! ```json
//! {
//!   "routes": [
//!     { "name": "Media", "direction": "Output", "bit": 0, "applicability_mask": 1 }
//!   ],
//!   "streams": [
//!     { "name": "music", "direction": "Output", "applicability_mask": 1 }
//!   ],
//!   "scenario": [
//!     { "action": "reconsider" },
//!     { "action": "stop_stream", "stream": "music" },
//!     { "action": "reconsider" }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use route_types::{DeviceMask, RouteMask};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::log::ActionLog;
use crate::route::{RouteControl, VirtualRoute, VirtualRouteConfig};
use crate::stream::{VirtualStream, VirtualStreamConfig};

/// Errors that can occur while loading or building a topology
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Failed to read the topology file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("invalid topology: {0}")]
    Json(#[from] serde_json::Error),

    /// Route bit index outside the mask width
    #[error("route {route}: bit {bit} exceeds the {capacity}-route limit")]
    InvalidBit {
        route: String,
        bit: u32,
        capacity: u32,
    },

    /// Two streams share a name
    #[error("duplicate stream name: {0}")]
    DuplicateStream(String),

    /// A scenario step names an unknown stream
    #[error("unknown stream: {0}")]
    UnknownStream(String),

    /// A scenario step names an unknown route
    #[error("unknown route: {0}")]
    UnknownRoute(String),
}

/// One step of a replayed scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Run a reconsideration cycle
    Reconsider {
        /// Run the device stages even if nothing changed
        #[serde(default)]
        force: bool,
    },
    /// Start a stream
    StartStream { stream: String },
    /// Stop a stream
    StopStream { stream: String },
    /// Add a stream to the stream registry
    AttachStream { stream: String },
    /// Remove a stream from the stream registry
    DetachStream { stream: String },
    /// A device was plugged in
    ConnectDevice { device: DeviceMask },
    /// A device was unplugged
    DisconnectDevice { device: DeviceMask },
    /// Ask a route (by name) for a mute / unmute sequence
    RequestReflow { route: String },
    /// Ask a route (by name) for a full close / reopen
    RequestRepath { route: String },
    /// Make a route's device open fail (or succeed again)
    FailRoute { route: String, fail: bool },
    /// Print the registry dump
    Dump,
}

/// Static description of routes, streams and a scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Routes to register
    pub routes: Vec<VirtualRouteConfig>,
    /// Streams attached at startup
    #[serde(default)]
    pub streams: Vec<VirtualStreamConfig>,
    /// Steps to replay
    #[serde(default)]
    pub scenario: Vec<ScenarioStep>,
}

impl TopologyConfig {
    /// Parse a topology from JSON text
    pub fn from_json(text: &str) -> Result<Self, TopologyError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a topology from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Create the virtual routes and streams
    ///
    /// Route key and mask conflicts are not checked here; the route registry
    /// rejects them on insertion.
    pub fn build(&self, log: &ActionLog) -> Result<BuiltTopology, TopologyError> {
        let mut routes = Vec::with_capacity(self.routes.len());
        let mut controls = HashMap::new();

        for config in &self.routes {
            if config.bit >= RouteMask::CAPACITY {
                return Err(TopologyError::InvalidBit {
                    route: config.name.clone(),
                    bit: config.bit,
                    capacity: RouteMask::CAPACITY,
                });
            }
            let control = Arc::new(RouteControl::default());
            controls
                .entry(config.name.clone())
                .or_insert_with(Vec::new)
                .push(Arc::clone(&control));
            routes.push(VirtualRoute::with_control(config.clone(), log.clone(), control));
        }

        let mut streams: Vec<(String, Arc<VirtualStream>)> = Vec::with_capacity(self.streams.len());
        for config in &self.streams {
            if streams.iter().any(|(name, _)| *name == config.name) {
                return Err(TopologyError::DuplicateStream(config.name.clone()));
            }
            streams.push((config.name.clone(), Arc::new(VirtualStream::from_config(config))));
        }

        info!(
            "Built topology: {} routes, {} streams",
            routes.len(),
            streams.len()
        );

        Ok(BuiltTopology {
            routes,
            controls,
            streams,
        })
    }
}

/// Routes and streams created from a [`TopologyConfig`]
#[derive(Debug)]
pub struct BuiltTopology {
    /// Routes, ready to move into a registry
    pub routes: Vec<VirtualRoute>,
    /// Control handles by route name (one per direction using the name)
    controls: HashMap<String, Vec<Arc<RouteControl>>>,
    /// Streams in declaration order
    streams: Vec<(String, Arc<VirtualStream>)>,
}

impl BuiltTopology {
    /// Look up a stream by name
    pub fn stream(&self, name: &str) -> Result<Arc<VirtualStream>, TopologyError> {
        self.streams
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| Arc::clone(s))
            .ok_or_else(|| TopologyError::UnknownStream(name.to_string()))
    }

    /// Iterate over all streams in declaration order
    pub fn streams(&self) -> impl Iterator<Item = &Arc<VirtualStream>> {
        self.streams.iter().map(|(_, s)| s)
    }

    /// Control handles of every route registered under `name`
    pub fn controls(&self, name: &str) -> Result<&[Arc<RouteControl>], TopologyError> {
        self.controls
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| TopologyError::UnknownRoute(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_types::{Direction, IoStream};

    const SAMPLE: &str = r#"{
        "routes": [
            { "name": "Media", "direction": "Output", "bit": 0, "applicability_mask": 1,
              "supported_devices": 12, "open_before_route": true },
            { "name": "Media", "direction": "Input", "bit": 0, "applicability_mask": 1 }
        ],
        "streams": [
            { "name": "music", "direction": "Output", "applicability_mask": 1, "direct": true }
        ],
        "scenario": [
            { "action": "reconsider" },
            { "action": "disconnect_device", "device": 4 },
            { "action": "reconsider", "force": true }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let topology = TopologyConfig::from_json(SAMPLE).unwrap();

        assert_eq!(topology.routes.len(), 2);
        assert!(topology.routes[0].open_before_route);
        assert!(!topology.routes[0].close_after_unroute);
        assert!(topology.routes[0].capabilities_loaded);
        assert_eq!(topology.routes[0].supported_devices, DeviceMask(12));
        assert_eq!(
            topology.scenario,
            vec![
                ScenarioStep::Reconsider { force: false },
                ScenarioStep::DisconnectDevice {
                    device: DeviceMask(4)
                },
                ScenarioStep::Reconsider { force: true },
            ]
        );
    }

    #[test]
    fn test_build() {
        let topology = TopologyConfig::from_json(SAMPLE).unwrap();
        let built = topology.build(&ActionLog::new()).unwrap();

        assert_eq!(built.routes.len(), 2);
        assert_eq!(built.controls("Media").unwrap().len(), 2);
        let music = built.stream("music").unwrap();
        assert!(music.is_direct());
        assert_eq!(music.direction(), Direction::Output);
        assert!(matches!(
            built.stream("ring"),
            Err(TopologyError::UnknownStream(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_bit() {
        let topology = TopologyConfig {
            routes: vec![VirtualRouteConfig::new("Wide", Direction::Output, 32)],
            ..Default::default()
        };
        assert!(matches!(
            topology.build(&ActionLog::new()),
            Err(TopologyError::InvalidBit { bit: 32, .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_stream() {
        let stream = VirtualStreamConfig {
            name: "music".to_string(),
            direction: Direction::Output,
            applicability_mask: 1,
            direct: false,
            started: true,
            routed_by_policy: true,
        };
        let topology = TopologyConfig {
            streams: vec![stream.clone(), stream],
            ..Default::default()
        };
        assert!(matches!(
            topology.build(&ActionLog::new()),
            Err(TopologyError::DuplicateStream(_))
        ));
    }
}
