//! Application state: storage port, content generator, clock, random source and auth keys.
//!
//! Handlers receive `Arc<AppState>`; nothing in here holds per-request
//! mutable state. The store is the only shared mutable resource.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, instrument, warn};

use crate::auth::AuthKeys;
use crate::clock::Clock;
use crate::config::{load_app_config_from_env, EngineConfig, HttpSettings};
use crate::generator::ContentGenerator;
use crate::openai::{OpenAI, TextGenerator};
use crate::store::{DocumentStore, MemoryStore};

/// Where per-request randomness comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomSource {
    Entropy,
    /// Every request starts from the same seed, so template output is reproducible.
    Seeded(u64),
}

impl RandomSource {
    /// CONTENT_SEED=<u64> switches to seeded generation.
    pub fn from_env() -> Self {
        match std::env::var("CONTENT_SEED") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(seed) => RandomSource::Seeded(seed),
                Err(_) => {
                    warn!(target: "adventure_backend", %raw, "CONTENT_SEED is not a u64; using entropy");
                    RandomSource::Entropy
                }
            },
            Err(_) => RandomSource::Entropy,
        }
    }

    pub fn rng(&self) -> StdRng {
        match self {
            RandomSource::Entropy => StdRng::from_entropy(),
            RandomSource::Seeded(seed) => StdRng::seed_from_u64(*seed),
        }
    }
}

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub generator: ContentGenerator,
    pub clock: Clock,
    pub random: RandomSource,
    pub engine: EngineConfig,
    pub auth: AuthKeys,
    pub http: HttpSettings,
}

impl AppState {
    /// Build state from env: load config, pick the generator, init auth keys.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let cfg = load_app_config_from_env();
        let engine = cfg.engine;

        let external: Option<Arc<dyn TextGenerator>> =
            match OpenAI::from_env(engine.generation_timeout(), engine.generation_max_tokens()) {
                Some(oa) => {
                    info!(target: "adventure_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                    Some(Arc::new(oa))
                }
                None => {
                    info!(target: "adventure_backend", "OpenAI disabled (no OPENAI_API_KEY). Using template content.");
                    None
                }
            };
        let generator = ContentGenerator::new(external, cfg.prompts, engine.generation_timeout());

        let random = RandomSource::from_env();
        if let RandomSource::Seeded(seed) = random {
            info!(target: "adventure_backend", seed, "Seeded content generation");
        }

        Self {
            store: Arc::new(MemoryStore::new()),
            generator,
            clock: Clock::System,
            random,
            auth: AuthKeys::from_env(engine.token_ttl_hours),
            engine,
            http: HttpSettings::from_env(),
        }
    }

    /// Deterministic state: fixed clock, seeded randomness, in-memory store.
    #[cfg(test)]
    pub fn for_tests(store: MemoryStore, external: Option<Arc<dyn TextGenerator>>) -> Self {
        use crate::config::Prompts;

        let engine = EngineConfig::default();
        Self {
            store: Arc::new(store),
            generator: ContentGenerator::new(external, Prompts::default(), std::time::Duration::from_millis(200)),
            clock: Clock::fixed(crate::clock::test_now()),
            random: RandomSource::Seeded(7),
            auth: AuthKeys::new("test-secret", engine.token_ttl_hours),
            engine,
            http: HttpSettings::default(),
        }
    }
}
