// src/config.rs

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::time::Duration;

/// Minimum fuzzy similarity (0-100) for a cascade match when no exact key hits.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 93.0;

/// Decimal places coordinates are rounded to when used as merge join keys.
pub const DEFAULT_COORD_PRECISION: u32 = 5;

/// Maximum cells written to the result sink per flush.
pub const DEFAULT_SINK_BATCH_SIZE: usize = 50;

/// Mandatory pause between sink flushes, to respect remote rate limits.
pub const DEFAULT_SINK_FLUSH_PAUSE: Duration = Duration::from_millis(1100);

/// Retry attempts against a rate-limited sink before the flush is fatal.
pub const DEFAULT_SINK_MAX_RETRIES: u32 = 5;

/// Ceiling on a single backoff wait, jitter included.
pub const DEFAULT_SINK_BACKOFF_CAP: Duration = Duration::from_secs(64);

/// Tunable knobs for one reconciliation run.
///
/// Constructed once per process and passed down explicitly; nothing in the
/// core reads configuration from globals.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Fuzzy-match acceptance threshold on the 0-100 scale
    pub fuzzy_threshold: f64,

    /// Decimal precision for coordinate equality keys
    pub coord_precision: u32,

    /// Sink batch cap (cells per flush)
    pub sink_batch_size: usize,

    /// Pause inserted between consecutive sink flushes
    pub sink_flush_pause: Duration,

    /// Bound on rate-limit retries per flush
    pub sink_max_retries: u32,

    /// Upper bound on a single backoff wait
    pub sink_backoff_cap: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            coord_precision: DEFAULT_COORD_PRECISION,
            sink_batch_size: DEFAULT_SINK_BATCH_SIZE,
            sink_flush_pause: DEFAULT_SINK_FLUSH_PAUSE,
            sink_max_retries: DEFAULT_SINK_MAX_RETRIES,
            sink_backoff_cap: DEFAULT_SINK_BACKOFF_CAP,
        }
    }
}

impl ReconcileConfig {
    /// Builds a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = ReconcileConfig::default();
        if let Some(t) = env_f64("RECONCILE_FUZZY_THRESHOLD") {
            if (0.0..=100.0).contains(&t) {
                cfg.fuzzy_threshold = t;
            } else {
                warn!("RECONCILE_FUZZY_THRESHOLD={} outside 0-100, keeping default", t);
            }
        }
        if let Some(p) = env_u64("RECONCILE_COORD_PRECISION") {
            cfg.coord_precision = p.min(9) as u32;
        }
        if let Some(b) = env_u64("RECONCILE_SINK_BATCH_SIZE") {
            cfg.sink_batch_size = (b as usize).max(1);
        }
        if let Some(r) = env_u64("RECONCILE_SINK_MAX_RETRIES") {
            cfg.sink_max_retries = r as u32;
        }
        info!(
            "Config: fuzzy_threshold={}, coord_precision={}, sink_batch_size={}",
            cfg.fuzzy_threshold, cfg.coord_precision, cfg.sink_batch_size
        );
        cfg
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Loads environment variables from a .env file.
pub fn load_env_from_file(file_path: &str) -> Result<()> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    match File::open(file_path) {
        Ok(file) => {
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = line.context("Failed to read line from env file")?;
                if line.starts_with('#') || line.trim().is_empty() {
                    continue;
                }
                if let Some(idx) = line.find('=') {
                    let key = line[..idx].trim();
                    let value = line[idx + 1..].trim().trim_matches('"');
                    if std::env::var(key).is_err() {
                        // Set only if not already set
                        std::env::set_var(key, value);
                        debug!("Set env var from file: {}", key);
                    }
                }
            }
            info!("Successfully processed env file: {}", file_path);
        }
        Err(e) => {
            warn!(
                "Could not open env file '{}': {}. Proceeding with system environment variables.",
                file_path, e
            );
            // Not returning an error, as .env file is optional.
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = ReconcileConfig::default();
        assert_eq!(cfg.fuzzy_threshold, DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(cfg.coord_precision, DEFAULT_COORD_PRECISION);
        assert_eq!(cfg.sink_batch_size, DEFAULT_SINK_BATCH_SIZE);
    }
}
