//! Configuration for Sluice limiters.
//!
//! Each strategy has its own config struct. Validation is fail-fast: a
//! non-positive duration or capacity is a [`SluiceError::Config`] at
//! construction time, never silently clamped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SluiceError};

/// Behavior when the external store cannot serve an admission decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Reject while the store is unavailable. The default: protects
    /// downstream capacity.
    #[default]
    FailClosed,
    /// Admit while the store is unavailable.
    FailOpen,
}

/// Configuration for [`FixedWindowLimiter`](crate::limiter::FixedWindowLimiter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedWindowConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Maximum admissions per window.
    pub max_requests: u64,
}

impl FixedWindowConfig {
    /// Check that every parameter is strictly positive.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("window_ms", self.window_ms)?;
        ensure_positive("max_requests", self.max_requests)
    }
}

/// Configuration for [`SlidingWindowLimiter`](crate::limiter::SlidingWindowLimiter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidingWindowConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Maximum admissions inside any window-length interval.
    pub max_requests: u64,
}

impl SlidingWindowConfig {
    /// Check that every parameter is strictly positive.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("window_ms", self.window_ms)?;
        ensure_positive("max_requests", self.max_requests)
    }
}

/// Configuration for
/// [`DistributedSlidingWindowLimiter`](crate::limiter::DistributedSlidingWindowLimiter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedWindowConfig {
    /// Store key under which the shared window state lives. Replicas that
    /// share a key share a budget.
    pub key: String,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Maximum admissions inside any window-length interval, across all
    /// replicas.
    pub max_requests: u64,
    /// What to do when the store cannot answer.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl DistributedWindowConfig {
    /// Check that the key is non-empty and every parameter is strictly
    /// positive.
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(SluiceError::Config("key must not be empty".to_string()));
        }
        ensure_positive("window_ms", self.window_ms)?;
        ensure_positive("max_requests", self.max_requests)
    }
}

/// Configuration for [`LeakyBucketLimiter`](crate::limiter::LeakyBucketLimiter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakyBucketConfig {
    /// Maximum queued work items.
    pub capacity: usize,
    /// Interval between drain ticks, in milliseconds.
    pub leak_interval_ms: u64,
    /// Work items started per drain tick.
    #[serde(default = "default_drain_workers")]
    pub drain_workers: usize,
}

impl LeakyBucketConfig {
    /// Check that every parameter is strictly positive.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("capacity", self.capacity as u64)?;
        ensure_positive("leak_interval_ms", self.leak_interval_ms)?;
        ensure_positive("drain_workers", self.drain_workers as u64)
    }
}

fn default_drain_workers() -> usize {
    1
}

/// Configuration for [`TokenBucketLimiter`](crate::limiter::TokenBucketLimiter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Maximum tokens the pool can hold.
    pub capacity: u64,
    /// Interval between refill ticks, in milliseconds. Each tick adds one
    /// token.
    pub refill_interval_ms: u64,
}

impl TokenBucketConfig {
    /// Check that every parameter is strictly positive.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("capacity", self.capacity)?;
        ensure_positive("refill_interval_ms", self.refill_interval_ms)
    }
}

/// Strategy-tagged limiter settings.
///
/// This is the serialized form callers load from configuration; pass it to
/// [`limiter::from_settings`](crate::limiter::from_settings) to build the
/// matching limiter without naming a concrete type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum LimiterSettings {
    FixedWindow(FixedWindowConfig),
    SlidingWindow(SlidingWindowConfig),
    DistributedSlidingWindow(DistributedWindowConfig),
    LeakyBucket(LeakyBucketConfig),
    TokenBucket(TokenBucketConfig),
}

impl LimiterSettings {
    /// Load settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter settings");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: LimiterSettings = serde_yaml::from_str(yaml)
            .map_err(|e| SluiceError::Config(format!("Failed to parse limiter settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the wrapped strategy config.
    pub fn validate(&self) -> Result<()> {
        match self {
            LimiterSettings::FixedWindow(config) => config.validate(),
            LimiterSettings::SlidingWindow(config) => config.validate(),
            LimiterSettings::DistributedSlidingWindow(config) => config.validate(),
            LimiterSettings::LeakyBucket(config) => config.validate(),
            LimiterSettings::TokenBucket(config) => config.validate(),
        }
    }
}

fn ensure_positive(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(SluiceError::Config(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}
