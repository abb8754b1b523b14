//! Lightweight counters and timing scopes for the dispatch path.
//!
//! Recording only happens with the `profiler` feature; otherwise every hook compiles to nothing.

#[cfg(feature = "profiler")]
use std::collections::HashMap;
#[cfg(feature = "profiler")]
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
#[cfg(feature = "profiler")]
use std::time::Instant;

#[cfg_attr(not(feature = "profiler"), allow(dead_code))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub calls: u64,
    pub total_ns: u128,
}

#[cfg(feature = "profiler")]
#[derive(Default)]
struct Profiler {
    cache: Mutex<HashMap<&'static str, u64>>,
    scopes: Mutex<HashMap<&'static str, Stat>>,
}

#[cfg(feature = "profiler")]
fn instance() -> &'static Profiler {
    static INSTANCE: OnceLock<Profiler> = OnceLock::new();
    INSTANCE.get_or_init(Profiler::default)
}

/// Counts one occurrence of a cache event such as a plan hit or miss.
#[inline(always)]
pub fn cache_event(name: &'static str) {
    #[cfg(feature = "profiler")]
    {
        if let Ok(mut cache) = instance().cache.lock() {
            *cache.entry(name).or_default() += 1;
        }
    }
    #[cfg(not(feature = "profiler"))]
    {
        let _ = name;
    }
}

/// Adds an externally measured duration to scope `name`.
#[inline(always)]
pub fn record_scope(name: &'static str, duration: Duration) {
    #[cfg(feature = "profiler")]
    {
        if let Ok(mut scopes) = instance().scopes.lock() {
            let entry = scopes.entry(name).or_default();
            entry.calls = entry.calls.saturating_add(1);
            entry.total_ns = entry.total_ns.saturating_add(duration.as_nanos());
        }
    }
    #[cfg(not(feature = "profiler"))]
    {
        let _ = (name, duration);
    }
}

/// Times the enclosing block until the guard drops.
#[must_use = "the scope ends when the guard is dropped"]
pub struct ScopeGuard {
    #[cfg(feature = "profiler")]
    name: &'static str,
    #[cfg(feature = "profiler")]
    start: Instant,
}

#[inline(always)]
pub fn backend_scope(name: &'static str) -> ScopeGuard {
    #[cfg(feature = "profiler")]
    {
        ScopeGuard {
            name,
            start: Instant::now(),
        }
    }
    #[cfg(not(feature = "profiler"))]
    {
        let _ = name;
        ScopeGuard {}
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        #[cfg(feature = "profiler")]
        record_scope(self.name, self.start.elapsed());
    }
}

/// Drains cache counters, sorted by name. Always empty without the `profiler` feature.
pub fn take_cache_events() -> Vec<(&'static str, u64)> {
    #[cfg(feature = "profiler")]
    {
        let mut events = instance()
            .cache
            .lock()
            .map(|mut cache| cache.drain().collect::<Vec<_>>())
            .unwrap_or_default();
        events.sort_unstable_by_key(|(name, _)| *name);
        events
    }
    #[cfg(not(feature = "profiler"))]
    {
        Vec::new()
    }
}

/// Drains scope timings, sorted by name. Always empty without the `profiler` feature.
pub fn take_scope_stats() -> Vec<(&'static str, Stat)> {
    #[cfg(feature = "profiler")]
    {
        let mut stats = instance()
            .scopes
            .lock()
            .map(|mut scopes| scopes.drain().collect::<Vec<_>>())
            .unwrap_or_default();
        stats.sort_unstable_by_key(|(name, _)| *name);
        stats
    }
    #[cfg(not(feature = "profiler"))]
    {
        Vec::new()
    }
}
