//! Randomness source, passed explicitly so connection flows stay
//! reproducible in tests.

use std::sync::Mutex;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

pub trait Random: Send + Sync {
    fn int_n(&self, max: usize) -> usize;
    fn next_i64(&self) -> i64;
}

/// OS-entropy-backed source; the default everywhere outside tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct CryptRandom;

impl Random for CryptRandom {
    fn int_n(&self, max: usize) -> usize {
        (OsRng.next_u64() % max as u64) as usize
    }

    fn next_i64(&self) -> i64 {
        OsRng.next_u64() as i64
    }
}

/// Deterministic seeded source for tests.
#[derive(Debug)]
pub struct StaticRandom {
    rng: Mutex<StdRng>,
}

impl StaticRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Random for StaticRandom {
    fn int_n(&self, max: usize) -> usize {
        (self.rng.lock().expect("rng lock").next_u64() % max as u64) as usize
    }

    fn next_i64(&self) -> i64 {
        self.rng.lock().expect("rng lock").next_u64() as i64
    }
}

const ALPHA_NUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn bytes(r: &dyn Random, size: usize) -> Vec<u8> {
    (0..size).map(|_| r.int_n(256) as u8).collect()
}

pub fn alphanum(r: &dyn Random, size: usize) -> Vec<u8> {
    (0..size).map(|_| ALPHA_NUM[r.int_n(ALPHA_NUM.len())]).collect()
}
