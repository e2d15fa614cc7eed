// ============================================================
// Layer 2 — Prediction Service
// ============================================================
// One query operation: (inchi, property_token) → probability in
// [0, 1] that the property's value is positive, with at most one
// computed-and-cached result per key.
//
// Flow per request:
//   1. cache check (no inference lock needed; a stale miss at
//      worst costs one redundant recompute)
//   2. exclusive section: re-check cache, canonicalize the
//      molecule, run the forward pass(es), idempotent cache write
//   3. return the stored value, so racing callers agree
//
// Resampling: with context_pairs > 0 each draw shuffles the
// molecule's known facts (the queried property excluded),
// truncates, and the positive probabilities are averaged over
// rand_draws draws under a fixed seed. A molecule with zero known
// facts degrades to the single deterministic no-context pass, so
// every successful prediction is a finite value.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::domain::errors::PredictError;
use crate::domain::traits::{MoleculeConverter, PropertySource};
use crate::data::property_store::PropertyStore;
use crate::infra::prediction_cache::PredictionCache;
use crate::ml::predictor::Predictor;

/// Explicit sampling parameters for the prediction procedure.
#[derive(Debug, Clone)]
pub struct PredictOptions {
    /// RNG seed for reproducible context draws
    pub seed: u64,

    /// Number of randomized forward passes to average over;
    /// meaningful only with context_pairs > 0
    pub rand_draws: usize,

    /// How many known facts each draw feeds the decoder; 0 keeps
    /// the minimal deterministic prior query
    pub context_pairs: usize,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self { seed: 137, rand_draws: 1, context_pairs: 0 }
    }
}

pub struct PredictService {
    // The model instance and its device memory are a shared
    // exclusive resource; the mutex is the atomicity boundary
    // around "run model, read cache, write cache".
    predictor: Mutex<Predictor>,
    store:     PropertyStore,
    cache:     PredictionCache,
    options:   PredictOptions,
    passes:    AtomicUsize,
}

impl PredictService {
    pub fn new(
        predictor: Predictor,
        store:     PropertyStore,
        cache:     PredictionCache,
        options:   PredictOptions,
    ) -> Self {
        Self {
            predictor: Mutex::new(predictor),
            store,
            cache,
            options,
            passes: AtomicUsize::new(0),
        }
    }

    /// Cached prediction for one (molecule, property) key.
    pub fn predict(&self, inchi: &str, property_token: usize) -> Result<f64, PredictError> {
        if let Some(value) = self.cache.get(inchi, property_token)? {
            tracing::debug!("Cache hit for ({inchi}, {property_token})");
            return Ok(value);
        }

        let predictor = self.predictor.lock().expect("predictor mutex poisoned");

        // Another request may have computed this key while we
        // waited on the lock.
        if let Some(value) = self.cache.get(inchi, property_token)? {
            return Ok(value);
        }

        let value = self.compute(&predictor, inchi, property_token)?;
        let stored = self.cache.put(inchi, property_token, value)?;
        tracing::info!("Predicted ({inchi}, {property_token}) = {stored:.4}");
        Ok(stored)
    }

    fn compute(
        &self,
        predictor:      &Predictor,
        inchi:          &str,
        property_token: usize,
    ) -> Result<f64, PredictError> {
        let smiles = self.store.inchi_to_smiles(inchi)?;
        let selfies = self.store.smiles_to_selfies(&smiles)?;

        let known = if self.options.context_pairs > 0 {
            self.known_context(predictor, inchi, property_token)?
        } else {
            Vec::new()
        };

        if known.is_empty() {
            // Minimal contract: one deterministic prior pass.
            let p = predictor.positive_probability(&selfies, property_token, &[])?;
            self.passes.fetch_add(1, Ordering::Relaxed);
            return Ok(p as f64);
        }

        let draws = self.options.rand_draws.max(1);
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut acc = 0.0f64;
        for _ in 0..draws {
            let mut context = known.clone();
            context.shuffle(&mut rng);
            context.truncate(self.options.context_pairs);
            let p = predictor.positive_probability(&selfies, property_token, &context)?;
            self.passes.fetch_add(1, Ordering::Relaxed);
            acc += p as f64;
        }
        Ok(acc / draws as f64)
    }

    /// Known facts usable as decoder context: the queried property
    /// is excluded, and facts with tokens outside their vocabulary
    /// blocks are dropped with a warning.
    fn known_context(
        &self,
        predictor:      &Predictor,
        inchi:          &str,
        property_token: usize,
    ) -> Result<Vec<(usize, usize)>, PredictError> {
        let facts = self
            .store
            .known_facts(inchi)
            .map_err(|e| PredictError::Store(e.to_string()))?;
        let tokenizer = predictor.tokenizer();
        let mut context = Vec::new();
        for fact in facts {
            if fact.property_token == property_token {
                continue;
            }
            if !tokenizer.is_property_token(fact.property_token)
                || !tokenizer.is_value_token(fact.value_token)
            {
                tracing::warn!(
                    "Dropping fact ({}, {}) of '{inchi}': outside vocabulary blocks",
                    fact.property_token, fact.value_token
                );
                continue;
            }
            context.push((fact.property_token, fact.value_token));
        }
        Ok(context)
    }

    /// Number of model forward passes executed so far. Exposed for
    /// observability; also the probe the idempotence tests use.
    pub fn forward_passes(&self) -> usize {
        self.passes.load(Ordering::Relaxed)
    }
}
