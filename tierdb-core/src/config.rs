//! Tiering configuration
//!
//! One explicit configuration value is threaded into every operation of the
//! reclamation pipeline; there is no ambient global state. Validation runs
//! before the config reaches the pressure controller, since the reclamation
//! loop itself has no iteration cap and relies on sane limits upstream.

use crate::eviction::EvictionPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the eviction/tiering core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieringConfig {
    /// Memory ceiling in bytes. Reclamation triggers above 80% of this.
    pub max_memory: usize,
    /// Eviction policy used to rank candidates.
    pub policy: EvictionPolicy,
    /// Keys drawn per eviction-pool population pass.
    pub sample_count: usize,
    /// Maximum row groups handed to the cold store per batch.
    pub batch_size: usize,
    /// Capacity of each namespace's EvictQueue.
    pub evict_queue_cap: usize,
    /// Capacity of each namespace's FreeQueue.
    pub free_queue_cap: usize,
    /// FreeQueue depth below which a proactive tiering batch runs.
    pub free_queue_low_water: usize,
    /// LFU logarithmic increment factor.
    pub lfu_log_factor: u32,
    /// Minutes between LFU counter decays.
    pub lfu_decay_minutes: u32,
    /// Interval at which the reduced LRU clock is refreshed.
    pub clock_refresh_interval_ms: u64,
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            max_memory: 512 * 1024 * 1024, // 512 MB
            policy: EvictionPolicy::Lru,
            sample_count: 5,
            batch_size: 32,
            evict_queue_cap: 1024,
            free_queue_cap: 1024,
            free_queue_low_water: 1023,
            lfu_log_factor: 10,
            lfu_decay_minutes: 1,
            clock_refresh_interval_ms: 100,
        }
    }
}

impl TieringConfig {
    /// Validate limits that keep the reclamation loop well-behaved.
    pub fn validate(&self) -> Result<()> {
        if self.max_memory == 0 {
            anyhow::bail!("max_memory cannot be 0");
        }

        if self.sample_count == 0 {
            anyhow::bail!("sample_count cannot be 0");
        }

        if self.batch_size == 0 {
            anyhow::bail!("batch_size cannot be 0");
        }

        if self.evict_queue_cap == 0 || self.free_queue_cap == 0 {
            anyhow::bail!("queue capacities cannot be 0");
        }

        if self.free_queue_low_water >= self.free_queue_cap {
            anyhow::bail!(
                "free_queue_low_water ({}) must be below free_queue_cap ({})",
                self.free_queue_low_water,
                self.free_queue_cap
            );
        }

        if self.lfu_decay_minutes == 0 {
            anyhow::bail!("lfu_decay_minutes cannot be 0");
        }

        Ok(())
    }

    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: TieringConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
