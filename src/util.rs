use std::path::PathBuf;

use crate::config::{BackendConfig, SimulationConfig};

const SIM_SEED: &str = "SIM_SEED";

pub fn get_seed() -> Option<u64> {
    let seed_from_env = std::env::var(SIM_SEED);
    seed_from_env.ok().and_then(|res| res.parse().ok())
}

const SIM_HISTORY_PATH: &str = "SIM_HISTORY_PATH";

pub fn get_history_path() -> Option<PathBuf> {
    let path_from_env = std::env::var(SIM_HISTORY_PATH);
    path_from_env.ok().filter(|res| !res.is_empty()).map(PathBuf::from)
}

const SIM_DURATION_SECS: &str = "SIM_DURATION_SECS";

pub fn get_duration_secs() -> Option<u64> {
    let duration_from_env = std::env::var(SIM_DURATION_SECS);
    duration_from_env.ok().and_then(|res| res.parse().ok())
}

/// Apply environment overrides on top of a loaded configuration
///
/// A history path switches the store to the JSON-lines backend.
pub fn apply_env_overrides(config: &mut SimulationConfig) {
    if let Some(seed) = get_seed() {
        config.seed = Some(seed);
    }

    if let Some(path) = get_history_path() {
        config.storage.backend = BackendConfig::Jsonl { path };
    }

    if let Some(duration) = get_duration_secs() {
        config.run.duration_secs = Some(duration);
    }
}

/// Round to one decimal place for display
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
