use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::persistence::SaveEnvelope;
use crate::world::GameState;

/// Periodic checkpoints written as loadable save files.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    /// An interval of zero disables snapshots.
    pub fn new(output_dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn is_due(&self, tick: u64) -> bool {
        self.interval > 0 && tick > 0 && tick % self.interval == 0
    }

    pub fn maybe_write(&self, state: &GameState, scenario_name: &str) -> Result<Option<PathBuf>> {
        if !self.is_due(state.total_ticks) {
            return Ok(None);
        }

        let dir = self.output_dir.join(scenario_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        let file_path = dir.join(format!("tick_{:06}.json", state.total_ticks));
        let envelope = SaveEnvelope::new(state.clone(), chrono::Utc::now());
        let json = serde_json::to_string_pretty(&envelope)?;
        fs::write(&file_path, json)
            .with_context(|| format!("failed to write snapshot {}", file_path.display()))?;
        tracing::debug!(path = %file_path.display(), "snapshot written");
        Ok(Some(file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::rng::RngManager;

    #[test]
    fn writes_only_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path(), 10);
        let config = SimulationConfig::default();
        let mut state = GameState::initialize(&config, &mut RngManager::new(1));

        state.total_ticks = 7;
        assert!(writer.maybe_write(&state, "demo").unwrap().is_none());

        state.total_ticks = 20;
        let path = writer.maybe_write(&state, "demo").unwrap().expect("due");
        assert!(path.ends_with("demo/tick_000020.json"));
        let saved: SaveEnvelope = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved.state, state);
    }

    #[test]
    fn zero_interval_disables() {
        let writer = SnapshotWriter::new("unused", 0);
        assert!(!writer.is_due(0));
        assert!(!writer.is_due(100));
    }
}
