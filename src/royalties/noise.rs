//! Variance sources for forecast monthly breakdowns.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use std::sync::Mutex;

/// Supplies the multiplicative variance applied to each projected month.
pub trait NoiseSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Uniform variance in `[low, high]` drawn from the thread RNG.
pub struct UniformNoise {
    distribution: Uniform<f64>,
}

impl UniformNoise {
    pub fn new(low: f64, high: f64) -> anyhow::Result<Self> {
        let distribution = Uniform::new_inclusive(low, high)
            .map_err(|e| anyhow::anyhow!("Invalid noise range [{}, {}]: {}", low, high, e))?;
        Ok(Self { distribution })
    }

    /// The ±10% band used for production forecasts.
    pub fn standard() -> Self {
        Self {
            distribution: Uniform::new_inclusive(0.9, 1.1).expect("0.9..=1.1 is a valid range"),
        }
    }
}

impl NoiseSource for UniformNoise {
    fn sample(&self) -> f64 {
        self.distribution.sample(&mut rand::rng())
    }
}

/// Always returns the same factor; `FixedNoise(1.0)` disables variance.
#[derive(Debug, Clone, Copy)]
pub struct FixedNoise(pub f64);

impl NoiseSource for FixedNoise {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Uniform variance from a seeded RNG, for reproducible runs.
pub struct SeededNoise {
    distribution: Uniform<f64>,
    rng: Mutex<StdRng>,
}

impl SeededNoise {
    pub fn new(seed: u64, low: f64, high: f64) -> anyhow::Result<Self> {
        let distribution = Uniform::new_inclusive(low, high)
            .map_err(|e| anyhow::anyhow!("Invalid noise range [{}, {}]: {}", low, high, e))?;
        Ok(Self {
            distribution,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }
}

impl NoiseSource for SeededNoise {
    fn sample(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap();
        self.distribution.sample(&mut *rng)
    }
}
