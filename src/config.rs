//! Process-wide configuration knobs
//!
//! The engine reads a small number of environment overrides with compiled-in
//! defaults. Everything else (output mode, thread count) arrives through
//! command-line flags and is injected into each command at dispatch time;
//! there are no other process-wide mutable values.

use std::time::Duration;

/// Hard ceiling on batch worker count; `--threads` is clamped to this
pub const DEFAULT_MAX_THREADS: usize = 16;

/// Worker count used when `--threads` is not supplied
pub const DEFAULT_THREADS: usize = 5;

/// Per-worker delay between successive API calls, in milliseconds
pub const DEFAULT_STANDARD_DELAY_MS: u64 = 200;

/// Resolved process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on concurrent batch workers
    pub max_threads: usize,
    /// Pacing delay applied by each worker between iterations
    pub standard_delay: Duration,
    /// Bearer token attached by the REST shim, if present
    pub access_token: Option<String>,
}

impl Config {
    /// Loads configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let max_threads = read_env_usize("GWADM_MAX_THREADS")
            .filter(|&n| n >= 1)
            .unwrap_or(DEFAULT_MAX_THREADS);
        let delay_ms =
            read_env_u64("GWADM_STANDARD_DELAY").unwrap_or(DEFAULT_STANDARD_DELAY_MS);

        Self {
            max_threads,
            standard_delay: Duration::from_millis(delay_ms),
            access_token: std::env::var("GWADM_ACCESS_TOKEN").ok(),
        }
    }

    /// Clamps a requested worker count into `1..=max_threads`
    ///
    /// `None` (flag not supplied) resolves to the fixed default rather than
    /// the ceiling.
    pub fn clamp_threads(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) => n.clamp(1, self.max_threads),
            None => DEFAULT_THREADS.min(self.max_threads),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            standard_delay: Duration::from_millis(DEFAULT_STANDARD_DELAY_MS),
            access_token: None,
        }
    }
}

fn read_env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn read_env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_respects_ceiling_and_floor() {
        let cfg = Config::default();
        assert_eq!(cfg.clamp_threads(Some(0)), 1);
        assert_eq!(cfg.clamp_threads(Some(9999)), DEFAULT_MAX_THREADS);
        assert_eq!(cfg.clamp_threads(Some(4)), 4);
        assert_eq!(cfg.clamp_threads(None), DEFAULT_THREADS);
    }
}
