use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, MemoryCache, NoopCache};

/// Service configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables. `DATABASE_URL` is read by the binary
/// entrypoint, not here.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// gRPC bind port for the transport layer (default: `4000`).
    pub grpc_port: u16,
    /// HTTP bind port for the transport layer (default: `4001`).
    pub http_port: u16,
    /// Whether published-document reads go through the in-process cache
    /// (default: `false`).
    pub cache_enabled: bool,
    /// TTL for cached published documents (default: `300` seconds).
    pub cache_ttl: Duration,
    /// Backup retention worker settings.
    pub retention: RetentionConfig,
}

/// Settings for the backup retention worker.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// How often the worker wakes up (default: `5` seconds).
    pub tick_interval: Duration,
    /// Bucket widths swept each tick, finest first. Additional entries add
    /// coarser thinning passes (default: one 10-minute level).
    pub windows: Vec<Duration>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            tick_interval: Duration::from_secs(5),
            windows: vec![Duration::from_secs(600)],
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `GRPC_PORT`             | `4000`  |
    /// | `HTTP_PORT`             | `4001`  |
    /// | `CACHE_ENABLED`         | `false` |
    /// | `CACHE_TTL_SECS`        | `300`   |
    /// | `RETENTION_TICK_SECS`   | `5`     |
    /// | `RETENTION_WINDOW_MINS` | `10`    |
    pub fn from_env() -> Self {
        let grpc_port: u16 = std::env::var("GRPC_PORT")
            .unwrap_or_else(|_| "4000".into())
            .parse()
            .expect("GRPC_PORT must be a valid u16");

        let http_port: u16 = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "4001".into())
            .parse()
            .expect("HTTP_PORT must be a valid u16");

        let cache_enabled = std::env::var("CACHE_ENABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let cache_ttl_secs: u64 = std::env::var("CACHE_TTL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("CACHE_TTL_SECS must be a valid u64");

        let tick_secs: u64 = std::env::var("RETENTION_TICK_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("RETENTION_TICK_SECS must be a valid u64");

        let windows: Vec<Duration> = std::env::var("RETENTION_WINDOW_MINS")
            .unwrap_or_else(|_| "10".into())
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                let mins: u64 = s.parse().expect("RETENTION_WINDOW_MINS must be a comma-separated list of minutes");
                Duration::from_secs(mins * 60)
            })
            .collect();

        ServiceConfig {
            grpc_port,
            http_port,
            cache_enabled,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            retention: RetentionConfig {
                tick_interval: Duration::from_secs(tick_secs),
                windows,
            },
        }
    }

    /// Build the cache adapter for this configuration: an in-process TTL
    /// cache when enabled, otherwise the no-op cache. Engines behave
    /// identically either way.
    pub fn build_cache(&self) -> Arc<dyn Cache> {
        if self.cache_enabled {
            Arc::new(MemoryCache::new())
        } else {
            Arc::new(NoopCache)
        }
    }
}
