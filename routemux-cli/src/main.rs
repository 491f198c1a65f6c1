//! routemux - replay an audio route topology through the routing engine
//!
//! Loads a JSON topology (routes, streams, scenario), registers it with the
//! routing actor and replays the scenario, printing what every cycle opened,
//! closed or failed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use route_mux::{run_routing_actor, CycleMasks, RoutingConfig, RoutingHandle, RoutingStage};
use route_sim::{ActionLog, TopologyConfig};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod replay;

use replay::Replayer;

/// Command-line arguments for routemux
#[derive(Parser, Debug)]
#[command(name = "routemux")]
#[command(about = "Replay audio route topologies through the route matching engine")]
#[command(version)]
struct Args {
    /// Topology file (JSON)
    topology: PathBuf,

    /// Cycles to run when the topology has no scenario
    #[arg(short, long, default_value = "1")]
    cycles: u32,

    /// Print the registry dump after the last step
    #[arg(short, long)]
    dump: bool,

    /// Print the final masks as JSON
    #[arg(long)]
    json: bool,

    /// Run device phases even when routing is unchanged
    #[arg(long)]
    no_skip: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "routemux=info,route_mux=info,route_types=info,route_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let topology = TopologyConfig::load(&args.topology)
        .with_context(|| format!("Failed to load topology {}", args.topology.display()))?;
    info!(
        "Loaded topology {}: {} routes, {} streams, {} steps",
        args.topology.display(),
        topology.routes.len(),
        topology.streams.len(),
        topology.scenario.len()
    );

    let log = ActionLog::new();
    let built = topology.build(&log).context("Failed to build topology")?;

    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let (event_tx, mut event_rx) = mpsc::channel(256);

    let config = RoutingConfig {
        skip_unchanged_cycles: !args.no_skip,
        ..Default::default()
    };
    let commit = |stage: RoutingStage, masks: &CycleMasks| {
        for (direction, m) in masks.iter() {
            debug!(
                "{:?} {}: mute {} disable {} opened {} unmuted {}",
                stage,
                direction,
                m.routes_to_mute(),
                m.routes_to_disable(),
                m.opened_routes(),
                m.unmuted_routes()
            );
        }
    };
    let actor = tokio::spawn(run_routing_actor(cmd_rx, event_tx, config, Box::new(commit)));

    let events = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if event.is_lifecycle() || event.is_failure() {
                info!("{:?}", event);
            } else {
                debug!("{:?}", event);
            }
        }
    });

    let mut replayer = Replayer::new(RoutingHandle::new(cmd_tx), built, log);
    replayer.register().await?;

    if topology.scenario.is_empty() {
        for _ in 0..args.cycles {
            replayer.reconsider(false).await?;
        }
    } else {
        for step in &topology.scenario {
            replayer.apply(step).await?;
        }
    }

    if args.dump {
        print!("{}", replayer.dump().await?);
    }
    if args.json {
        let masks = replayer.masks().await?;
        println!("{}", serde_json::to_string_pretty(&masks)?);
    }

    replayer.shutdown().await?;
    actor.await.context("Routing actor panicked")?;
    events.await.context("Event logger panicked")?;
    Ok(())
}
