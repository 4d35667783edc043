//! Infrastructure - configuration, caching, logging and metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (`KEY=VALUE` loading, defaults)
//! - `cache` - Expiring key-value cache with memory and file backends
//! - `logging` - tracing-subscriber setup
//! - `metrics` - Lock-free lookup counters

pub mod cache;
pub mod config;
pub mod logging;
pub mod metrics;

// Re-export commonly used types
pub use cache::{cache_key, FileStore, KeyValueStore, MemoryStore, TtlCache};
pub use config::{Config, FallbackPolicy, ProviderKind};
pub use metrics::Metrics;
