use crate::traits::RandomSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `RandomSource` over any `rand` generator.
pub struct RngSource<R: Rng> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        RngSource { rng }
    }
}

impl RngSource<StdRng> {
    /// Reproducible X assignment, e.g. for rehearsing a session.
    pub fn seeded(seed: u64) -> Self {
        RngSource::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os() -> Self {
        RngSource::new(StdRng::from_rng(&mut rand::rng()))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn coin_flip(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }
}
