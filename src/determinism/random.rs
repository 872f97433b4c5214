//! Seeded randomness. The only source of random values in a pipeline run.

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

/// ChaCha8 stream seeded from configuration.
#[derive(Debug)]
pub struct SeededRandom {
    seed: u64,
    rng: Mutex<ChaCha8Rng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_u64(&self) -> u64 {
        self.rng.lock().next_u64()
    }

    pub fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng.lock().fill_bytes(dest);
    }

    /// Random-variant UUID drawn from the seeded stream.
    pub fn uuid(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.fill_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }

    /// Hyphenated form of [`SeededRandom::uuid`], used as the parity report run id.
    pub fn run_id(&self) -> String {
        self.uuid().hyphenated().to_string()
    }
}
