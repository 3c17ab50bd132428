//! Chronicle entries for the lore log.
//!
//! A [`Chronicler`] turns a summary of the settlement into one sentence of
//! history. The [`NarrativeBridge`] keeps the tick loop synchronous: requests
//! run on the tokio blocking pool when a runtime is attached, and finished
//! entries are merged between ticks.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::components::Agent;
use crate::world::{DisasterKind, GameState};

const TICKS_PER_YEAR: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChronicleError {
    #[error("chronicler is rate limited")]
    RateLimited,
    #[error("chronicler refused the request: {0}")]
    PermissionDenied(String),
    #[error("chronicler unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Temperament {
    Swift,
    Strong,
    Resilient,
    Balanced,
}

impl Temperament {
    /// The first trait whose population average crosses its threshold.
    pub fn of(agents: &[Agent]) -> Self {
        let count = agents.len().max(1) as f64;
        let mean = |f: fn(&Agent) -> f64| agents.iter().map(f).sum::<f64>() / count;
        if mean(|a| a.stats.speed) > 2.0 {
            Temperament::Swift
        } else if mean(|a| a.stats.max_carry) > 15.0 {
            Temperament::Strong
        } else if mean(|a| a.stats.resilience) > 0.3 {
            Temperament::Resilient
        } else {
            Temperament::Balanced
        }
    }
}

impl fmt::Display for Temperament {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Temperament::Swift => "Swift",
            Temperament::Strong => "Strong",
            Temperament::Resilient => "Resilient",
            Temperament::Balanced => "Balanced",
        };
        f.write_str(label)
    }
}

/// Everything a chronicler is told about the settlement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChronicleRequest {
    pub year: u64,
    pub population: usize,
    pub peak: usize,
    pub food: u64,
    pub wood: u64,
    pub stone: u64,
    pub temperament: Temperament,
    pub disaster: Option<DisasterKind>,
}

impl ChronicleRequest {
    pub fn from_state(state: &GameState) -> Self {
        let floor = |v: f64| v.max(0.0).floor() as u64;
        Self {
            year: state.total_ticks / TICKS_PER_YEAR + 1,
            population: state.population(),
            peak: state.population_peak,
            food: floor(state.resources.food),
            wood: floor(state.resources.wood),
            stone: floor(state.resources.stone),
            temperament: Temperament::of(&state.agents),
            disaster: state.disaster,
        }
    }

    /// Prompt text for chroniclers backed by a language model.
    pub fn prompt(&self) -> String {
        let disaster = self.disaster.map(DisasterKind::label).unwrap_or("none");
        format!(
            "You are the chronicler of a small simulated civilization.\n\
             Year: {}\n\
             Population: {} (peak {})\n\
             Stores: food {}, wood {}, stone {}\n\
             Dominant trait: {}\n\
             Recent disaster: {}\n\
             Write one sentence for the history log in a mythic, slightly cryptic tone. No markdown.",
            self.year, self.population, self.peak, self.food, self.wood, self.stone, self.temperament, disaster
        )
    }
}

pub trait Chronicler: Send + Sync {
    fn chronicle(&self, request: &ChronicleRequest) -> Result<String, ChronicleError>;
}

/// Offline chronicler that writes entries from fixed phrasing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateChronicler;

impl Chronicler for TemplateChronicler {
    fn chronicle(&self, request: &ChronicleRequest) -> Result<String, ChronicleError> {
        let people = match request.temperament {
            Temperament::Swift => "fleet-footed",
            Temperament::Strong => "broad-backed",
            Temperament::Resilient => "unbowed",
            Temperament::Balanced => "patient",
        };
        let omen = match request.disaster {
            Some(DisasterKind::Earthquake) => " while the ground still trembles",
            Some(DisasterKind::Blizzard) => " beneath a sky of endless snow",
            None => "",
        };
        Ok(format!(
            "In year {}, {} {} souls keep {} measures of grain{}.",
            request.year, request.population, people, request.food, omen
        ))
    }
}

type Outcome = Result<String, ChronicleError>;

pub struct NarrativeBridge {
    chronicler: Arc<dyn Chronicler>,
    runtime: Option<Handle>,
    in_flight: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
}

impl NarrativeBridge {
    /// Runs requests inline until a runtime is attached.
    pub fn new(chronicler: Arc<dyn Chronicler>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            chronicler,
            runtime: None,
            in_flight: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    pub fn on_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Starts a chronicle request. Ignored while another is still running.
    pub fn request(&mut self, request: ChronicleRequest) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(year = request.year, "chronicle already in flight, skipping");
            return;
        }
        tracing::info!(year = request.year, population = request.population, "requesting chronicle");

        let chronicler = Arc::clone(&self.chronicler);
        let tx = self.tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let job = move || {
            let outcome = chronicler.chronicle(&request);
            in_flight.store(false, Ordering::SeqCst);
            let _ = tx.send(outcome);
        };
        match &self.runtime {
            Some(handle) => {
                handle.spawn_blocking(job);
            }
            None => job(),
        }
    }

    /// Merges finished entries into the lore log, newest first. Returns how
    /// many were added.
    pub fn drain_into(&mut self, state: &mut GameState, capacity: usize) -> usize {
        let mut added = 0;
        while let Ok(outcome) = self.rx.try_recv() {
            match outcome {
                Ok(entry) => {
                    let entry = entry.trim();
                    if entry.is_empty() {
                        continue;
                    }
                    state.push_lore(entry, capacity);
                    added += 1;
                }
                Err(ChronicleError::RateLimited) => {
                    tracing::warn!("chronicle skipped: rate limited");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "chronicle failed");
                }
            }
        }
        added
    }
}
