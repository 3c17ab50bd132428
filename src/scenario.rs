use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{config::SimulationConfig, engine::EngineSettings};

fn default_snapshot_interval_ticks() -> u64 {
    0
}

fn default_lore_interval_ticks() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    #[serde(default = "default_lore_interval_ticks")]
    pub lore_interval_ticks: u64,
    /// Overrides on top of the default tunables.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(3600)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::new(self.name.clone(), self.seed);
        settings.snapshot_interval_ticks = self.snapshot_interval_ticks;
        settings.lore_interval_ticks = self.lore_interval_ticks;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_scenario_parses() {
        let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
        let scenario = loader.load("scenarios/default.yaml").unwrap();
        assert_eq!(scenario.name, "default");
        assert_eq!(scenario.simulation.agents.initial_population, 6);
        assert_eq!(scenario.ticks(None), 7200);
        assert_eq!(scenario.ticks(Some(5)), 5);
        assert_eq!(scenario.engine_settings().lore_interval_ticks, 3000);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ScenarioLoader::new("/nonexistent").load("nope.yaml").unwrap_err();
        assert!(err.to_string().contains("nope.yaml"));
    }
}
