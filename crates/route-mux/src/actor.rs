//! Routing Actor
//!
//! This module provides an async actor owning a [`StreamRouteCollection`].
//! Every registry change and every reconsideration cycle is processed by the
//! actor, so the collection is never touched from two tasks at once.
//!
//! # Architecture
//!
//! The actor receives commands through a channel and emits events through
//! another. Callers:
//! - Send registry commands (add routes, add/remove streams, device changes)
//! - Request reconsideration cycles and get the [`CycleReport`] back
//! - Receive every [`RoutingEvent`] through a single stream
//!
//! # Example
//!
//! ```rust,ignore
//! use route_mux::actor::{run_routing_actor, RoutingActorCommand};
//! use route_mux::{NoopCommit, RoutingConfig};
//! use tokio::sync::mpsc;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//!
//! tokio::spawn(run_routing_actor(
//!     cmd_rx,
//!     event_tx,
//!     RoutingConfig::default(),
//!     Box::new(NoopCommit),
//! ));
//! ```

use std::fmt;
use std::sync::Arc;

use route_types::{DeviceMask, IoStream, StreamRoute};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::{CycleMasks, CycleReport, RoutingCommit, RoutingConfig, StreamRouteCollection};
use crate::error::RoutingError;
use crate::events::RoutingEvent;

/// Commands sent to the routing actor
pub enum RoutingActorCommand {
    /// Register a route
    AddRoute {
        /// The route to register
        route: Box<dyn StreamRoute>,
        /// Whether the route was accepted
        response: oneshot::Sender<bool>,
    },

    /// Queue a stream for routing
    AddStream {
        /// The stream to queue
        stream: Arc<dyn IoStream>,
    },

    /// Remove a stream from routing
    RemoveStream {
        /// The stream to remove
        stream: Arc<dyn IoStream>,
    },

    /// A device was connected or disconnected
    DeviceConnectionState {
        /// The device
        device: DeviceMask,
        /// Connected (true) or disconnected (false)
        connected: bool,
    },

    /// Run a reconsideration cycle
    Reconsider {
        /// Run the device phases even if nothing changed
        force: bool,
        /// Channel to send back the cycle report
        response: oneshot::Sender<CycleReport>,
    },

    /// Query the current masks of both directions
    QueryMasks {
        /// Channel to send back the masks
        response: oneshot::Sender<CycleMasks>,
    },

    /// Render the registry dump
    Dump {
        /// Channel to send back the dump
        response: oneshot::Sender<String>,
    },

    /// Start a new cycle without matching
    ResetAvailability,

    /// Drop every route
    Reset,

    /// Shutdown the actor
    Shutdown,
}

impl fmt::Debug for RoutingActorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingActorCommand::AddRoute { route, .. } => f
                .debug_struct("AddRoute")
                .field("key", &route.key())
                .finish_non_exhaustive(),
            RoutingActorCommand::AddStream { stream } => f
                .debug_struct("AddStream")
                .field("stream", &stream.name())
                .finish(),
            RoutingActorCommand::RemoveStream { stream } => f
                .debug_struct("RemoveStream")
                .field("stream", &stream.name())
                .finish(),
            RoutingActorCommand::DeviceConnectionState { device, connected } => f
                .debug_struct("DeviceConnectionState")
                .field("device", device)
                .field("connected", connected)
                .finish(),
            RoutingActorCommand::Reconsider { force, .. } => f
                .debug_struct("Reconsider")
                .field("force", force)
                .finish_non_exhaustive(),
            RoutingActorCommand::QueryMasks { .. } => f.write_str("QueryMasks"),
            RoutingActorCommand::Dump { .. } => f.write_str("Dump"),
            RoutingActorCommand::ResetAvailability => f.write_str("ResetAvailability"),
            RoutingActorCommand::Reset => f.write_str("Reset"),
            RoutingActorCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Cloneable client for the routing actor
#[derive(Debug, Clone)]
pub struct RoutingHandle {
    cmd_tx: mpsc::Sender<RoutingActorCommand>,
}

impl RoutingHandle {
    /// Wrap the command side of the actor's channel
    pub fn new(cmd_tx: mpsc::Sender<RoutingActorCommand>) -> Self {
        Self { cmd_tx }
    }

    async fn send(&self, cmd: RoutingActorCommand) -> Result<(), RoutingError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RoutingError::ActorUnavailable)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoutingActorCommand,
    ) -> Result<T, RoutingError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| RoutingError::ActorUnavailable)
    }

    /// Register a route, returns whether it was accepted
    pub async fn add_route(&self, route: Box<dyn StreamRoute>) -> Result<bool, RoutingError> {
        self.request(|response| RoutingActorCommand::AddRoute { route, response })
            .await
    }

    /// Queue a stream for routing
    pub async fn add_stream(&self, stream: Arc<dyn IoStream>) -> Result<(), RoutingError> {
        self.send(RoutingActorCommand::AddStream { stream }).await
    }

    /// Remove a stream from routing
    pub async fn remove_stream(&self, stream: Arc<dyn IoStream>) -> Result<(), RoutingError> {
        self.send(RoutingActorCommand::RemoveStream { stream }).await
    }

    /// Report a device connection change
    pub async fn device_connection_state(
        &self,
        device: DeviceMask,
        connected: bool,
    ) -> Result<(), RoutingError> {
        self.send(RoutingActorCommand::DeviceConnectionState { device, connected })
            .await
    }

    /// Run a reconsideration cycle
    pub async fn reconsider(&self, force: bool) -> Result<CycleReport, RoutingError> {
        self.request(|response| RoutingActorCommand::Reconsider { force, response })
            .await
    }

    /// Current masks of both directions
    pub async fn masks(&self) -> Result<CycleMasks, RoutingError> {
        self.request(|response| RoutingActorCommand::QueryMasks { response })
            .await
    }

    /// Registry dump
    pub async fn dump(&self) -> Result<String, RoutingError> {
        self.request(|response| RoutingActorCommand::Dump { response })
            .await
    }

    /// Ask the actor to stop
    pub async fn shutdown(&self) -> Result<(), RoutingError> {
        self.send(RoutingActorCommand::Shutdown).await
    }
}

/// Forward buffered engine events to the event channel
async fn flush_events(
    collection: &mut StreamRouteCollection,
    event_tx: &mpsc::Sender<RoutingEvent>,
) {
    for event in collection.drain_events() {
        if event_tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
            return;
        }
    }
}

/// Run the routing actor
///
/// Processes commands until [`RoutingActorCommand::Shutdown`] is received or
/// the command channel closes. `commit` is called at each policy stage of
/// every cycle that changes routing.
pub async fn run_routing_actor(
    mut cmd_rx: mpsc::Receiver<RoutingActorCommand>,
    event_tx: mpsc::Sender<RoutingEvent>,
    config: RoutingConfig,
    mut commit: Box<dyn RoutingCommit + Send>,
) {
    let mut collection = StreamRouteCollection::with_config(config);
    info!("Routing actor started");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            RoutingActorCommand::AddRoute { route, response } => {
                let accepted = collection.add_route(route);
                let _ = response.send(accepted);
            }

            RoutingActorCommand::AddStream { stream } => {
                collection.add_stream(stream);
            }

            RoutingActorCommand::RemoveStream { stream } => {
                collection.remove_stream(&stream);
            }

            RoutingActorCommand::DeviceConnectionState { device, connected } => {
                collection.handle_device_connection_state(device, connected);
            }

            RoutingActorCommand::Reconsider { force, response } => {
                let report = collection.reconsider_routing(commit.as_mut(), force);
                if !report.failed.is_empty() {
                    warn!("{} route(s) failed to open", report.failed.len());
                }
                let _ = response.send(report);
            }

            RoutingActorCommand::QueryMasks { response } => {
                let _ = response.send(collection.cycle_masks());
            }

            RoutingActorCommand::Dump { response } => {
                let _ = response.send(collection.dump_to_string());
            }

            RoutingActorCommand::ResetAvailability => {
                collection.reset_availability();
            }

            RoutingActorCommand::Reset => {
                collection.reset();
            }

            RoutingActorCommand::Shutdown => {
                info!("Routing actor shutting down");
                break;
            }
        }

        flush_events(&mut collection, &event_tx).await;
    }

    info!("Routing actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{NoopCommit, RoutingStage};
    use route_sim::{ActionLog, VirtualRoute, VirtualRouteConfig, VirtualStream};
    use route_types::{Direction, RouteMask};
    use std::sync::Mutex;

    fn spawn_actor(
        commit: Box<dyn RoutingCommit + Send>,
    ) -> (
        mpsc::Sender<RoutingActorCommand>,
        mpsc::Receiver<RoutingEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);
        let handle = tokio::spawn(run_routing_actor(
            cmd_rx,
            event_tx,
            RoutingConfig::default(),
            commit,
        ));
        (cmd_tx, event_rx, handle)
    }

    async fn add_route(
        cmd_tx: &mpsc::Sender<RoutingActorCommand>,
        config: VirtualRouteConfig,
        log: &ActionLog,
    ) -> bool {
        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(RoutingActorCommand::AddRoute {
                route: Box::new(VirtualRoute::new(config, log.clone())),
                response: resp_tx,
            })
            .await
            .unwrap();
        resp_rx.await.unwrap()
    }

    async fn reconsider(cmd_tx: &mpsc::Sender<RoutingActorCommand>, force: bool) -> CycleReport {
        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(RoutingActorCommand::Reconsider {
                force,
                response: resp_tx,
            })
            .await
            .unwrap();
        resp_rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_add_route_and_reject_duplicate() {
        let log = ActionLog::new();
        let (cmd_tx, mut event_rx, actor) = spawn_actor(Box::new(NoopCommit));

        let config = VirtualRouteConfig::new("Media", Direction::Output, 0);
        assert!(add_route(&cmd_tx, config.clone(), &log).await);
        assert!(!add_route(&cmd_tx, config, &log).await);

        assert!(matches!(
            event_rx.recv().await,
            Some(RoutingEvent::RouteAdded { .. })
        ));
        assert!(matches!(
            event_rx.recv().await,
            Some(RoutingEvent::RouteRejected { .. })
        ));

        cmd_tx.send(RoutingActorCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_reconsider_opens_route_and_commits_stages() {
        let log = ActionLog::new();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&stages);
        let commit = move |stage: RoutingStage, _: &CycleMasks| {
            recorded.lock().unwrap().push(stage);
        };
        let (cmd_tx, mut event_rx, actor) = spawn_actor(Box::new(commit));

        add_route(
            &cmd_tx,
            VirtualRouteConfig::new("Media", Direction::Output, 0),
            &log,
        )
        .await;
        cmd_tx
            .send(RoutingActorCommand::AddStream {
                stream: Arc::new(VirtualStream::new("music", Direction::Output, 0x1)),
            })
            .await
            .unwrap();

        let report = reconsider(&cmd_tx, false).await;
        assert!(report.changed);
        assert_eq!(report.masks[Direction::Output].enabled_routes(), RouteMask(0x1));
        assert_eq!(log.opened_routes(), vec!["Media_Playback".to_string()]);
        assert_eq!(*stages.lock().unwrap(), RoutingStage::ORDER.to_vec());

        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(RoutingActorCommand::QueryMasks { response: resp_tx })
            .await
            .unwrap();
        let masks = resp_rx.await.unwrap();
        assert_eq!(masks[Direction::Output].enabled_routes(), RouteMask(0x1));

        cmd_tx.send(RoutingActorCommand::Shutdown).await.unwrap();
        actor.await.unwrap();

        let mut saw_enabled = false;
        while let Some(event) = event_rx.recv().await {
            if let RoutingEvent::RouteEnabled {
                key,
                pre_enable: false,
            } = event
            {
                assert_eq!(key.as_str(), "Media_Playback");
                saw_enabled = true;
            }
        }
        assert!(saw_enabled);
    }

    #[tokio::test]
    async fn test_remove_stream_closes_route() {
        let log = ActionLog::new();
        let (cmd_tx, _event_rx, actor) = spawn_actor(Box::new(NoopCommit));

        add_route(
            &cmd_tx,
            VirtualRouteConfig::new("Media", Direction::Output, 0),
            &log,
        )
        .await;
        let music: Arc<dyn IoStream> = Arc::new(VirtualStream::new("music", Direction::Output, 0x1));
        cmd_tx
            .send(RoutingActorCommand::AddStream {
                stream: Arc::clone(&music),
            })
            .await
            .unwrap();
        reconsider(&cmd_tx, false).await;

        cmd_tx
            .send(RoutingActorCommand::RemoveStream { stream: music })
            .await
            .unwrap();
        let report = reconsider(&cmd_tx, false).await;

        assert!(report.changed);
        assert_eq!(
            report.disabled.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            vec!["Media_Playback"]
        );
        assert_eq!(log.closed_routes(), vec!["Media_Playback".to_string()]);

        drop(cmd_tx);
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_dump_and_reset() {
        let log = ActionLog::new();
        let (cmd_tx, _event_rx, actor) = spawn_actor(Box::new(NoopCommit));

        add_route(
            &cmd_tx,
            VirtualRouteConfig::new("Media", Direction::Output, 0),
            &log,
        )
        .await;
        cmd_tx.send(RoutingActorCommand::Reset).await.unwrap();

        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(RoutingActorCommand::Dump { response: resp_tx })
            .await
            .unwrap();
        let dump = resp_rx.await.unwrap();
        assert!(dump.starts_with("Stream Routes:\n"));
        assert!(!dump.contains("Media_Playback"));

        cmd_tx.send(RoutingActorCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_actor() {
        let log = ActionLog::new();
        let (cmd_tx, _event_rx, actor) = spawn_actor(Box::new(NoopCommit));
        let handle = RoutingHandle::new(cmd_tx);

        let route = Box::new(VirtualRoute::new(
            VirtualRouteConfig::new("Media", Direction::Output, 0),
            log.clone(),
        ));
        assert_eq!(handle.add_route(route).await, Ok(true));
        handle
            .add_stream(Arc::new(VirtualStream::new("music", Direction::Output, 0x1)))
            .await
            .unwrap();
        let report = handle.reconsider(false).await.unwrap();
        assert_eq!(report.bound, 1);

        handle.shutdown().await.unwrap();
        actor.await.unwrap();

        assert_eq!(
            handle.reconsider(false).await,
            Err(RoutingError::ActorUnavailable)
        );
    }
}
