//! Sluice - Admission-Control Rate Limiting
//!
//! This crate implements a family of rate limiters that decide, per request,
//! whether to admit or reject work under a configured throughput budget. Four
//! strategies are provided behind the common [`limiter::RateLimiter`]
//! capability: fixed window, sliding window (local and distributed variants),
//! leaky bucket, and token bucket.
//!
//! Rejection is an expected outcome, not an error: every strategy answers
//! admission synchronously and never blocks one caller on another. The leaky
//! bucket defers *execution* of admitted work to a background drain schedule;
//! the distributed sliding window keeps its counters in an external scored
//! store shared by any number of replicas.

pub mod clock;
pub mod config;
pub mod error;
pub mod limiter;
pub mod scheduler;
pub mod store;
