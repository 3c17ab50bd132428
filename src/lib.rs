pub mod components;
pub mod config;
pub mod engine;
pub mod movement;
pub mod narrative;
pub mod pathfinding;
pub mod persistence;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod spatial;
pub mod systems;
pub mod terrain;
pub mod web;
pub mod world;

pub use config::SimulationConfig;
pub use engine::{Engine, EngineBuilder, EngineSettings};
pub use scenario::Scenario;
pub use world::GameState;
