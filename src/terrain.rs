//! Procedural biome map.
//!
//! The map is a grid of scalars in `[0, 1]`: uniform noise, box-blurred into
//! contiguous blobs, then contrast-stretched so biome bands separate cleanly.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TerrainConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Biome {
    DeepWater,
    Water,
    Sand,
    Grass,
    Forest,
    Rock,
    Mountain,
    Snow,
}

impl Biome {
    pub fn classify(value: f64, config: &TerrainConfig) -> Biome {
        if value < config.deep_water {
            Biome::DeepWater
        } else if value <= config.water {
            Biome::Water
        } else if value < config.sand {
            Biome::Sand
        } else if value < config.grass {
            Biome::Grass
        } else if value < config.forest {
            Biome::Forest
        } else if value < config.mountain {
            Biome::Rock
        } else if value < config.snow {
            Biome::Mountain
        } else {
            Biome::Snow
        }
    }

    pub fn is_passable(self) -> bool {
        matches!(
            self,
            Biome::Sand | Biome::Grass | Biome::Forest | Biome::Rock
        )
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TerrainShapeError {
    #[error("terrain has no rows")]
    Empty,
    #[error("terrain row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Row-major terrain values. Serialized as a list of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<f64>>", try_from = "Vec<Vec<f64>>")]
pub struct TerrainGrid {
    width: usize,
    height: usize,
    cells: Vec<f64>,
}

impl TerrainGrid {
    pub fn generate<R: Rng>(
        width: usize,
        height: usize,
        config: &TerrainConfig,
        rng: &mut R,
    ) -> Self {
        let cells = (0..width * height).map(|_| rng.gen::<f64>()).collect();
        let mut grid = Self {
            width,
            height,
            cells,
        };
        for _ in 0..config.smoothing_passes {
            grid.box_blur();
        }
        for value in &mut grid.cells {
            *value = ((*value - 0.5) * config.contrast + 0.5).clamp(0.0, 1.0);
        }
        grid
    }

    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            cells: vec![value.clamp(0.0, 1.0); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn matches(&self, width: usize, height: usize) -> bool {
        self.width == width && self.height == height && self.cells.len() == width * height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = value.clamp(0.0, 1.0);
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.cells
    }

    pub fn biome(&self, x: usize, y: usize, config: &TerrainConfig) -> Option<Biome> {
        self.get(x, y).map(|value| Biome::classify(value, config))
    }

    /// One 3x3 averaging pass; edge cells average over their in-bounds neighbors.
    fn box_blur(&mut self) {
        let mut next = vec![0.0; self.cells.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let mut sum = 0.0;
                let mut count = 0u32;
                for ny in y.saturating_sub(1)..=(y + 1).min(self.height - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(self.width - 1) {
                        sum += self.cells[ny * self.width + nx];
                        count += 1;
                    }
                }
                next[y * self.width + x] = sum / f64::from(count);
            }
        }
        self.cells = next;
    }
}

impl From<TerrainGrid> for Vec<Vec<f64>> {
    fn from(grid: TerrainGrid) -> Self {
        if grid.width == 0 {
            return Vec::new();
        }
        grid.cells
            .chunks(grid.width)
            .map(|row| row.to_vec())
            .collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for TerrainGrid {
    type Error = TerrainShapeError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        let expected = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || expected == 0 {
            return Err(TerrainShapeError::Empty);
        }
        let height = rows.len();
        let mut cells = Vec::with_capacity(expected * height);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != expected {
                return Err(TerrainShapeError::Ragged {
                    row,
                    found: values.len(),
                    expected,
                });
            }
            cells.extend(values.into_iter().map(|v| v.clamp(0.0, 1.0)));
        }
        Ok(Self {
            width: expected,
            height,
            cells,
        })
    }
}
