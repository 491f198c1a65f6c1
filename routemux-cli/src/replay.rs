//! Scenario replay against the routing actor

use std::sync::Arc;

use anyhow::Result;
use route_mux::{CycleMasks, CycleReport, RoutingHandle};
use route_sim::{ActionLog, BuiltTopology, RouteAction, ScenarioStep};
use route_types::{DeviceMask, Direction, IoStream, RouteKey};
use tracing::{info, warn};

/// Drives a built topology through the routing actor
pub struct Replayer {
    routing: RoutingHandle,
    topology: BuiltTopology,
    log: ActionLog,
    cycle: u32,
}

impl Replayer {
    /// Create a replayer; call [`register`](Self::register) before replaying
    pub fn new(routing: RoutingHandle, topology: BuiltTopology, log: ActionLog) -> Self {
        Self {
            routing,
            topology,
            log,
            cycle: 0,
        }
    }

    /// Hand every route and startup stream to the actor
    pub async fn register(&mut self) -> Result<()> {
        for route in std::mem::take(&mut self.topology.routes) {
            if !self.routing.add_route(Box::new(route)).await? {
                warn!("A route of the topology was rejected, see above");
            }
        }

        let streams: Vec<Arc<dyn IoStream>> = self
            .topology
            .streams()
            .map(|s| Arc::clone(s) as Arc<dyn IoStream>)
            .collect();
        for stream in streams {
            self.routing.add_stream(stream).await?;
        }
        Ok(())
    }

    /// Apply one scenario step
    pub async fn apply(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::Reconsider { force } => {
                self.reconsider(*force).await?;
            }
            ScenarioStep::StartStream { stream } => {
                self.topology.stream(stream)?.set_started(true);
            }
            ScenarioStep::StopStream { stream } => {
                self.topology.stream(stream)?.set_started(false);
            }
            ScenarioStep::AttachStream { stream } => {
                let stream = self.topology.stream(stream)?;
                self.routing.add_stream(stream).await?;
            }
            ScenarioStep::DetachStream { stream } => {
                let stream = self.topology.stream(stream)?;
                self.routing.remove_stream(stream).await?;
            }
            ScenarioStep::ConnectDevice { device } => {
                self.device(*device, true).await?;
            }
            ScenarioStep::DisconnectDevice { device } => {
                self.device(*device, false).await?;
            }
            ScenarioStep::RequestReflow { route } => {
                for control in self.topology.controls(route)? {
                    control.request_reflow();
                }
            }
            ScenarioStep::RequestRepath { route } => {
                for control in self.topology.controls(route)? {
                    control.request_repath();
                }
            }
            ScenarioStep::FailRoute { route, fail } => {
                for control in self.topology.controls(route)? {
                    control.set_fail_on_route(*fail);
                }
            }
            ScenarioStep::Dump => {
                print!("{}", self.dump().await?);
            }
        }
        Ok(())
    }

    async fn device(&self, device: DeviceMask, connected: bool) -> Result<()> {
        info!(
            "Device {} {}",
            device,
            if connected { "connected" } else { "disconnected" }
        );
        self.routing
            .device_connection_state(device, connected)
            .await?;
        Ok(())
    }

    /// Run one cycle and print its outcome
    pub async fn reconsider(&mut self, force: bool) -> Result<CycleReport> {
        self.cycle += 1;
        let report = self.routing.reconsider(force).await?;
        print_report(self.cycle, &report, &self.log);
        Ok(report)
    }

    /// Registry dump from the actor
    pub async fn dump(&self) -> Result<String> {
        Ok(self.routing.dump().await?)
    }

    /// Masks of both directions after the last cycle
    pub async fn masks(&self) -> Result<CycleMasks> {
        Ok(self.routing.masks().await?)
    }

    /// Stop the routing actor
    pub async fn shutdown(&self) -> Result<()> {
        Ok(self.routing.shutdown().await?)
    }
}

fn print_report(cycle: u32, report: &CycleReport, log: &ActionLog) {
    let keys = |keys: &[RouteKey]| {
        keys.iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!(
        "cycle {}: {} ({} bound)",
        cycle,
        if report.changed { "changed" } else { "unchanged" },
        report.bound
    );
    for direction in Direction::ALL {
        let m = &report.masks[direction];
        println!(
            "  {:<6} enabled {} prev {} reflow {} repath {}",
            direction.name(),
            m.enabled_routes(),
            m.prev_enabled_routes(),
            m.need_reflow_routes(),
            m.need_repath_routes()
        );
    }
    if !report.disabled.is_empty() {
        println!("  disabled: {}", keys(&report.disabled));
    }
    if !report.enabled.is_empty() {
        println!("  enabled:  {}", keys(&report.enabled));
    }
    for (key, e) in &report.failed {
        println!("  failed:   {} ({})", key, e);
    }
    for record in log.drain() {
        match record.action {
            RouteAction::StreamBound { .. } => {}
            action => println!("  device:   {} {:?}", record.route, action),
        }
    }
}
