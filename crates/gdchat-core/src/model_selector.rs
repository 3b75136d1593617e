//! Backend model rotation.

use crate::error::{ChatError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Picks the backend model for each remote call.
///
/// Selection is uniform over the pool minus the model used last, so the same
/// model is never chosen twice in a row unless the pool has a single entry.
#[derive(Debug)]
pub struct ModelSelector {
    pool: Vec<String>,
    usage: HashMap<String, u64>,
    last_used: Option<String>,
    rng: StdRng,
}

impl ModelSelector {
    pub fn new(pool: Vec<String>) -> Self {
        Self::with_rng(pool, StdRng::from_entropy())
    }

    /// Deterministic selector for tests and reproducible runs.
    pub fn with_seed(pool: Vec<String>, seed: u64) -> Self {
        Self::with_rng(pool, StdRng::seed_from_u64(seed))
    }

    fn with_rng(pool: Vec<String>, rng: StdRng) -> Self {
        let mut unique = Vec::with_capacity(pool.len());
        for model in pool {
            if !unique.contains(&model) {
                unique.push(model);
            }
        }
        Self {
            pool: unique,
            usage: HashMap::new(),
            last_used: None,
            rng,
        }
    }

    /// Chooses the next model, records the use and returns its id.
    pub fn choose(&mut self) -> Result<String> {
        let candidates: Vec<&String> = if self.pool.len() > 1 {
            self.pool
                .iter()
                .filter(|model| Some(*model) != self.last_used.as_ref())
                .collect()
        } else {
            self.pool.iter().collect()
        };

        let chosen = candidates
            .choose(&mut self.rng)
            .map(|model| (*model).clone())
            .ok_or(ChatError::NoModels)?;

        *self.usage.entry(chosen.clone()).or_insert(0) += 1;
        self.last_used = Some(chosen.clone());
        tracing::debug!("[ModelSelector] Selected {}", chosen);
        Ok(chosen)
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    pub fn last_used(&self) -> Option<&str> {
        self.last_used.as_deref()
    }

    /// Invocation count for `model` (zero when never used).
    pub fn usage(&self, model: &str) -> u64 {
        self.usage.get(model).copied().unwrap_or(0)
    }

    /// Forgets counters and the last used model.
    pub fn reset(&mut self) {
        self.usage.clear();
        self.last_used = None;
    }
}
