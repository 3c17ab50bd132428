//! Read-only HTTP view of a running simulation.
//!
//! The engine runs on the blocking pool; each tick publishes a [`Frame`] that
//! handlers read from a shared slot and subscribers receive over SSE.

use std::{
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, runtime::Handle, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::{
    components::{Agent, Building, ResourceNode, Stockpile},
    config::StoragePolicy,
    engine::EngineBuilder,
    narrative::{NarrativeBridge, TemplateChronicler},
    scenario::Scenario,
    terrain::TerrainGrid,
    world::{DisasterKind, GameState},
};

/// Per-tick view of the world. Terrain is served separately since it does
/// not change between ticks.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub tick: u64,
    pub population: usize,
    pub population_peak: usize,
    pub resources: Stockpile,
    pub max_storage: f64,
    pub disaster: Option<DisasterKind>,
    pub agents: Vec<Agent>,
    pub buildings: Vec<Building>,
    pub nodes: Vec<ResourceNode>,
    pub lore: Vec<String>,
    pub completed: bool,
}

impl Frame {
    pub fn from_state(state: &GameState, storage: &StoragePolicy) -> Self {
        Self {
            tick: state.total_ticks,
            population: state.population(),
            population_peak: state.population_peak,
            resources: state.resources,
            max_storage: state.max_storage(storage),
            disaster: state.disaster,
            agents: state.agents.clone(),
            buildings: state.buildings.clone(),
            nodes: state.nodes.clone(),
            lore: state.lore.clone(),
            completed: false,
        }
    }
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_ticks: u64,
    pub frame: Option<Frame>,
    pub completed: bool,
}

struct AppState {
    broadcaster: broadcast::Sender<String>,
    latest_frame: Mutex<Option<Frame>>,
    terrain: TerrainGrid,
    total_ticks: u64,
    scenario_name: String,
    simulation_done: AtomicBool,
}

impl AppState {
    fn latest(&self) -> Option<Frame> {
        self.latest_frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, frame: Frame) {
        if let Ok(payload) = serde_json::to_string(&frame) {
            let _ = self.broadcaster.send(payload);
        }
        *self
            .latest_frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub ticks: u64,
    pub snapshot_interval: u64,
    pub snapshot_dir: PathBuf,
    pub tick_pacing: Option<Duration>,
    /// Continue from this state instead of founding a new settlement.
    pub resume: Option<GameState>,
    pub host: String,
    pub port: u16,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        ticks,
        snapshot_interval,
        snapshot_dir,
        tick_pacing,
        resume,
        host,
        port,
    } = config;

    let scenario_name = scenario.name.clone();
    let mut settings = scenario.engine_settings();
    settings.snapshot_interval_ticks = snapshot_interval;
    settings.snapshot_dir = snapshot_dir;
    settings.tick_pacing = tick_pacing;

    let storage = scenario.simulation.economy.storage;
    let bridge = NarrativeBridge::new(Arc::new(TemplateChronicler)).on_runtime(Handle::current());
    let mut engine = EngineBuilder::new(settings, scenario.simulation)
        .with_default_systems()
        .with_narrative(bridge)
        .build();
    let mut world = match resume {
        Some(state) => state,
        None => engine.initialize_game(),
    };

    let (tx, _) = broadcast::channel::<String>(512);
    let state = Arc::new(AppState {
        broadcaster: tx,
        latest_frame: Mutex::new(Some(Frame::from_state(&world, &storage))),
        terrain: world.terrain.clone(),
        total_ticks: ticks,
        scenario_name: scenario_name.clone(),
        simulation_done: AtomicBool::new(false),
    });

    let for_sim = Arc::clone(&state);
    let sim_handle = tokio::task::spawn_blocking(move || -> Result<()> {
        engine.run_with_hook(&mut world, ticks, |snapshot| {
            for_sim.publish(Frame::from_state(snapshot, &storage));
        })?;

        for_sim.simulation_done.store(true, Ordering::SeqCst);
        let mut last = Frame::from_state(&world, &storage);
        last.completed = true;
        for_sim.publish(last);
        Ok(())
    });

    let label = scenario_name.clone();
    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(())) => tracing::info!(scenario = %label, "simulation completed"),
            Ok(Err(err)) => tracing::error!(error = ?err, "simulation error"),
            Err(err) => tracing::error!(error = ?err, "simulation task failed"),
        }
    });

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    tracing::info!(%addr, scenario = %scenario_name, "state server listening");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/terrain", get(terrain))
        .route("/api/events", get(stream_events))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down state server");
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        total_ticks: state.total_ticks,
        frame: state.latest(),
        completed: state.simulation_done.load(Ordering::SeqCst),
    })
}

async fn terrain(State(state): State<Arc<AppState>>) -> Json<TerrainGrid> {
    Json(state.terrain.clone())
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::rng::RngManager;

    fn app(world: &GameState) -> Arc<AppState> {
        let (tx, _) = broadcast::channel(8);
        Arc::new(AppState {
            broadcaster: tx,
            latest_frame: Mutex::new(None),
            terrain: world.terrain.clone(),
            total_ticks: 10,
            scenario_name: "test".into(),
            simulation_done: AtomicBool::new(false),
        })
    }

    #[test]
    fn frame_reports_storage_ceiling() {
        let config = SimulationConfig::default();
        let world = GameState::initialize(&config, &mut RngManager::new(1));
        let frame = Frame::from_state(&world, &StoragePolicy::Unbounded);
        assert_eq!(frame.max_storage, 2000.0);
        assert_eq!(frame.population, 6);
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("terrain").is_none());
    }

    #[tokio::test]
    async fn published_frames_reach_handlers_and_subscribers() {
        let config = SimulationConfig::default();
        let world = GameState::initialize(&config, &mut RngManager::new(2));
        let state = app(&world);
        let mut rx = state.broadcaster.subscribe();

        state.publish(Frame::from_state(&world, &config.economy.storage));

        let Json(envelope) = latest_state(State(Arc::clone(&state))).await;
        assert_eq!(envelope.frame.map(|f| f.population), Some(6));
        assert!(!envelope.completed);
        let payload = rx.recv().await.unwrap();
        assert!(payload.contains("\"population\":6"));

        let Json(grid) = terrain(State(state)).await;
        assert!(grid.matches(80, 60));
    }
}
