//! Runtime options, optionally read from `CONVRT_*` environment variables.

use std::env;

pub const ENV_TUNING_RELAXED: &str = "CONVRT_TUNING_RELAXED";
pub const ENV_AUTOTUNE_LEVEL: &str = "CONVRT_AUTOTUNE_LEVEL";
pub const ENV_DETERMINISTIC_OPS: &str = "CONVRT_DETERMINISTIC_OPS";
pub const ENV_AUTOTUNE_CACHE_RESULTS: &str = "CONVRT_AUTOTUNE_CACHE_RESULTS";

const DEFAULT_AUTOTUNE_LEVEL: u8 = 4;
const MAX_AUTOTUNE_LEVEL: u8 = 4;

/// How the one-time autotuning transition of a call site is synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TuningExclusion {
    /// The search runs under the plan's lock: exactly one search per call site.
    #[default]
    Exclusive,
    /// Concurrent first callers may search redundantly; the first installed result wins.
    Relaxed,
}

/// Debug and profiling configuration forwarded to the algorithm search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugOptions {
    /// Search effort from 0 (no measurement) to 4 (measure and verify every candidate).
    pub autotune_level: u8,
    /// Restrict the search to algorithms with deterministic results.
    pub deterministic_ops: bool,
    /// Allow the search to reuse results it cached for identical descriptors.
    pub autotune_cache_results: bool,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            autotune_level: DEFAULT_AUTOTUNE_LEVEL,
            deterministic_ops: false,
            autotune_cache_results: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeOptions {
    pub tuning_exclusion: TuningExclusion,
    pub debug: DebugOptions,
}

impl RuntimeOptions {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads options through `lookup`; unset or blank variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = DebugOptions::default();

        let tuning_exclusion = match read(ENV_TUNING_RELAXED) {
            Some(value) if parse_bool(&value) => TuningExclusion::Relaxed,
            _ => TuningExclusion::Exclusive,
        };
        let autotune_level = read(ENV_AUTOTUNE_LEVEL)
            .and_then(|value| value.trim().parse::<u8>().ok())
            .map(|level| level.min(MAX_AUTOTUNE_LEVEL))
            .unwrap_or(defaults.autotune_level);
        let deterministic_ops = read(ENV_DETERMINISTIC_OPS)
            .map(|value| parse_bool(&value))
            .unwrap_or(defaults.deterministic_ops);
        let autotune_cache_results = read(ENV_AUTOTUNE_CACHE_RESULTS)
            .map(|value| parse_bool(&value))
            .unwrap_or(defaults.autotune_cache_results);

        Self {
            tuning_exclusion,
            debug: DebugOptions {
                autotune_level,
                deterministic_ops,
                autotune_cache_results,
            },
        }
    }

    pub fn with_tuning_exclusion(mut self, tuning_exclusion: TuningExclusion) -> Self {
        self.tuning_exclusion = tuning_exclusion;
        self
    }
}

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}
