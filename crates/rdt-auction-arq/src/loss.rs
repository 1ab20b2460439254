use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform draw against `probability`; `None` or anything `<= 0.0` never drops.
pub fn should_drop<R: Rng>(rng: &mut R, probability: Option<f64>) -> bool {
    match probability {
        Some(p) if p > 0.0 => rng.random::<f64>() < p,
        _ => false,
    }
}

/// Endpoint-local loss injection for acks (sender) or frames (receiver).
#[derive(Debug, Clone)]
pub struct LossSimulator {
    probability: Option<f64>,
    rng: StdRng,
    dropped: u64,
}

impl LossSimulator {
    pub fn new(probability: Option<f64>) -> Self {
        Self {
            probability,
            rng: StdRng::from_os_rng(),
            dropped: 0,
        }
    }

    pub fn seeded(probability: Option<f64>, seed: u64) -> Self {
        Self {
            probability,
            rng: StdRng::seed_from_u64(seed),
            dropped: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::seeded(None, 0)
    }

    pub fn should_drop(&mut self) -> bool {
        let drop = should_drop(&mut self.rng, self.probability);
        if drop {
            self.dropped += 1;
        }
        drop
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
