//! Shared record of device actions performed by virtual routes

use std::sync::{Arc, Mutex, MutexGuard};

/// Device-level action performed by a virtual route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// A stream was bound to the route
    StreamBound {
        /// Name of the stream
        stream: String,
    },
    /// The device path was opened
    Opened {
        /// Opened during the pre-enable phase
        pre_enable: bool,
    },
    /// Opening the device path failed
    OpenFailed,
    /// The device path was closed
    Closed {
        /// Closed during the post-disable phase
        post_disable: bool,
    },
    /// Device capabilities were loaded after a device connection
    CapabilitiesLoaded,
    /// Device capabilities were dropped after a device disconnection
    CapabilitiesReset,
}

impl RouteAction {
    /// Returns true for open actions (successful or not)
    pub fn is_open(&self) -> bool {
        matches!(self, RouteAction::Opened { .. } | RouteAction::OpenFailed)
    }

    /// Returns true for close actions
    pub fn is_close(&self) -> bool {
        matches!(self, RouteAction::Closed { .. })
    }
}

/// One entry of the action log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    /// Registry key of the route (`<name>_Playback` / `<name>_Capture`)
    pub route: String,
    /// What happened
    pub action: RouteAction,
}

/// Ordered, shared log of actions across all virtual routes
///
/// Cloning the log yields another handle to the same entries, so a test can
/// keep one handle while the routes move into the registry.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    entries: Arc<Mutex<Vec<ActionRecord>>>,
}

impl ActionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ActionRecord>> {
        // Entries are plain data, a poisoned lock is still readable
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an action
    pub fn record(&self, route: impl Into<String>, action: RouteAction) {
        self.lock().push(ActionRecord {
            route: route.into(),
            action,
        });
    }

    /// Copy of every entry, oldest first
    pub fn snapshot(&self) -> Vec<ActionRecord> {
        self.lock().clone()
    }

    /// Take every entry, leaving the log empty
    pub fn drain(&self) -> Vec<ActionRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Actions recorded for one route, oldest first
    pub fn actions_for(&self, route: &str) -> Vec<RouteAction> {
        self.lock()
            .iter()
            .filter(|r| r.route == route)
            .map(|r| r.action.clone())
            .collect()
    }

    /// Route keys that were opened, in order
    pub fn opened_routes(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| matches!(r.action, RouteAction::Opened { .. }))
            .map(|r| r.route.clone())
            .collect()
    }

    /// Route keys that were closed, in order
    pub fn closed_routes(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| r.action.is_close())
            .map(|r| r.route.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let log = ActionLog::new();
        let other = log.clone();

        other.record("Media_Playback", RouteAction::Opened { pre_enable: false });
        log.record("Media_Playback", RouteAction::Closed { post_disable: true });

        assert_eq!(log.len(), 2);
        assert_eq!(other.opened_routes(), vec!["Media_Playback".to_string()]);
        assert_eq!(other.closed_routes(), vec!["Media_Playback".to_string()]);
    }

    #[test]
    fn test_drain_empties_log() {
        let log = ActionLog::new();
        log.record("Voice_Capture", RouteAction::CapabilitiesReset);

        let drained = log.drain();
        assert_eq!(drained.len(), 1);
        assert!(log.is_empty());
    }
}
