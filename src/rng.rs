use std::collections::HashMap;
use std::f64::consts::TAU;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Hands out one deterministic stream per named consumer, all derived from
/// the master seed in first-use order.
pub struct RngManager {
    master: ChaCha8Rng,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master: ChaCha8Rng::seed_from_u64(seed),
            streams: HashMap::new(),
        }
    }

    pub fn stream(&mut self, name: &str) -> SystemRng<'_> {
        let master = &mut self.master;
        let entry = self
            .streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(master.next_u64()));
        SystemRng { inner: entry }
    }
}

pub struct SystemRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl<'a> RngCore for SystemRng<'a> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// Helpers for the probability rolls the simulation makes everywhere.
pub trait RngExt {
    /// True with probability `p`; `p >= 1.0` always fires, `p <= 0.0` never does.
    fn chance(&mut self, p: f64) -> bool;
    /// Uniform angle in `[0, 2π)`.
    fn angle(&mut self) -> f64;
    /// Uniform value in `[-half_width, half_width)`.
    fn spread(&mut self, half_width: f64) -> f64;
}

impl<R: Rng> RngExt for R {
    fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.gen::<f64>() < p
    }

    fn angle(&mut self) -> f64 {
        self.gen::<f64>() * TAU
    }

    fn spread(&mut self, half_width: f64) -> f64 {
        (self.gen::<f64>() * 2.0 - 1.0) * half_width
    }
}
