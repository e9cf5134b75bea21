//! Executor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for the executor and the reference workloads.
///
/// All fields have defaults matching the cockpit's behaviour. Override them
/// through [`ExecutorConfig::from_env`] or the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of workers, i.e. how many runs may be `running` at once.
    pub pool_size: usize,

    /// Pause before each step of the ticking job workload.
    pub tick_ms: u64,

    /// Percentage points added per tick by the ticking job workload.
    pub progress_step: u8,

    /// Pause before each wave of the batch workload.
    pub batch_tick_ms: u64,

    /// Number of waves a batch run is split into.
    pub batch_waves: u32,

    /// Buffer of the event broadcast channel; slower subscribers lag.
    pub event_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            tick_ms: 250,
            progress_step: 20,
            batch_tick_ms: 200,
            batch_waves: 10,
            event_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl ExecutorConfig {
    /// Defaults overridden by environment variables.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `COCKPIT_POOL_SIZE`       | `4`     |
    /// | `COCKPIT_TICK_MS`         | `250`   |
    /// | `COCKPIT_PROGRESS_STEP`   | `20`    |
    /// | `COCKPIT_BATCH_TICK_MS`   | `200`   |
    /// | `COCKPIT_BATCH_WAVES`     | `10`    |
    /// | `COCKPIT_EVENT_CAPACITY`  | `1024`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        override_with(&lookup, "COCKPIT_POOL_SIZE", &mut config.pool_size)?;
        override_with(&lookup, "COCKPIT_TICK_MS", &mut config.tick_ms)?;
        override_with(&lookup, "COCKPIT_PROGRESS_STEP", &mut config.progress_step)?;
        override_with(&lookup, "COCKPIT_BATCH_TICK_MS", &mut config.batch_tick_ms)?;
        override_with(&lookup, "COCKPIT_BATCH_WAVES", &mut config.batch_waves)?;
        override_with(&lookup, "COCKPIT_EVENT_CAPACITY", &mut config.event_capacity)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |var: &'static str, value: u64| {
            if value == 0 {
                Err(ConfigError {
                    var,
                    value: "0".into(),
                    reason: "must be positive".into(),
                })
            } else {
                Ok(())
            }
        };
        positive("COCKPIT_POOL_SIZE", self.pool_size as u64)?;
        positive("COCKPIT_PROGRESS_STEP", u64::from(self.progress_step))?;
        positive("COCKPIT_BATCH_WAVES", u64::from(self.batch_waves))?;
        positive("COCKPIT_EVENT_CAPACITY", self.event_capacity as u64)?;
        if self.progress_step > 100 {
            return Err(ConfigError {
                var: "COCKPIT_PROGRESS_STEP",
                value: self.progress_step.to_string(),
                reason: "must be at most 100".into(),
            });
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn batch_tick(&self) -> Duration {
        Duration::from_millis(self.batch_tick_ms)
    }
}

fn override_with<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(());
    };
    *slot = raw.trim().parse().map_err(|e: T::Err| ConfigError {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    Ok(())
}
