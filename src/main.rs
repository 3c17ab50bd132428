use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use evociv::{
    engine::{Engine, EngineBuilder},
    narrative::{NarrativeBridge, TemplateChronicler},
    persistence,
    scenario::{Scenario, ScenarioLoader},
    web::{self, WebServerConfig},
    world::GameState,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Agent civilization simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scenario headless and print a summary
    Run {
        #[command(flatten)]
        sim: SimArgs,

        /// Write a save file here when the run finishes
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Run a scenario behind a read-only HTTP/SSE state server
    Serve {
        #[command(flatten)]
        sim: SimArgs,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Debug, Args)]
struct SimArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/default.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Continue from a save file, crediting time spent offline
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Sleep this many milliseconds between ticks
    #[arg(long)]
    tick_ms: Option<u64>,
}

impl SimArgs {
    fn load_scenario(&self) -> Result<Scenario> {
        ScenarioLoader::new(".").load(&self.scenario)
    }

    fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("snapshots"))
    }

    fn tick_pacing(&self) -> Option<Duration> {
        self.tick_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}

fn load_or_found(engine: &mut Engine, resume: Option<&PathBuf>) -> Result<GameState> {
    match resume {
        Some(path) => {
            let config = engine.config().clone();
            let state =
                persistence::load_from_path(path, &config, engine.rng_mut(), chrono::Utc::now())
                    .with_context(|| format!("failed to resume from {}", path.display()))?;
            tracing::info!(path = %path.display(), tick = state.total_ticks, "resumed save");
            Ok(state)
        }
        None => Ok(engine.initialize_game()),
    }
}

async fn run_headless(sim: SimArgs, save: Option<PathBuf>) -> Result<()> {
    let scenario = sim.load_scenario()?;
    let ticks = scenario.ticks(sim.ticks);
    let mut settings = scenario.engine_settings();
    settings.snapshot_interval_ticks = sim
        .snapshot_interval
        .unwrap_or(scenario.snapshot_interval_ticks);
    settings.snapshot_dir = sim.snapshot_dir();
    settings.tick_pacing = sim.tick_pacing();

    let bridge = NarrativeBridge::new(Arc::new(TemplateChronicler)).on_runtime(Handle::current());
    let mut engine = EngineBuilder::new(settings, scenario.simulation.clone())
        .with_default_systems()
        .with_narrative(bridge)
        .build();
    let mut world = load_or_found(&mut engine, sim.resume.as_ref())?;

    let world = tokio::task::spawn_blocking(move || -> Result<GameState> {
        engine.run(&mut world, ticks)?;
        Ok(world)
    })
    .await
    .context("simulation task panicked")??;

    if let Some(path) = save {
        persistence::save_to_path(&path, &world, chrono::Utc::now())
            .with_context(|| format!("failed to save to {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved");
    }

    println!(
        "Scenario '{}' completed at tick {}. Population: {} (peak {}), buildings: {}",
        scenario.name,
        world.total_ticks,
        world.population(),
        world.population_peak,
        world.buildings.len()
    );
    if let Some(entry) = world.lore.first() {
        println!("Latest chronicle: {entry}");
    }
    Ok(())
}

async fn serve(sim: SimArgs, host: String, port: u16) -> Result<()> {
    let scenario = sim.load_scenario()?;
    let ticks = scenario.ticks(sim.ticks);
    let resume = match &sim.resume {
        Some(path) => {
            let mut rng = evociv::rng::RngManager::new(scenario.seed);
            Some(
                persistence::load_from_path(path, &scenario.simulation, &mut rng, chrono::Utc::now())
                    .with_context(|| format!("failed to resume from {}", path.display()))?,
            )
        }
        None => None,
    };

    web::run(WebServerConfig {
        ticks,
        snapshot_interval: sim
            .snapshot_interval
            .unwrap_or(scenario.snapshot_interval_ticks),
        snapshot_dir: sim.snapshot_dir(),
        tick_pacing: sim.tick_pacing(),
        resume,
        scenario,
        host,
        port,
    })
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("evociv=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { sim, save } => run_headless(sim, save).await,
        Command::Serve { sim, host, port } => serve(sim, host, port).await,
    }
}
