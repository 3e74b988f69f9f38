//! Invoker configuration loaded from environment variables.

use std::time::Duration;

use vfp_engine::{PoolConfig, ProcessContext};

/// Service configuration.
///
/// All fields have defaults suitable for local development; in production
/// every value is overridden via environment variables.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,

    /// Deployment context baked into every rendered job environment.
    pub region: String,
    pub domain: String,
    pub realm: String,
    pub stage: String,

    /// Logical job queue name, carried for observability.
    pub job_queue_name: String,
    /// Container image the job template runs.
    pub container_image: String,
    /// Container runtime binary used by the executor.
    pub container_runtime: String,
    /// Per-job resource request.
    pub job_vcpus: u32,
    pub job_memory_mib: u32,

    /// Worker pool sizing.
    pub min_vcpus: u32,
    pub max_vcpus: u32,
    pub desired_vcpus: u32,
    /// Idle grace before scale-down, in seconds.
    pub idle_grace_secs: u64,
    /// Scheduler poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl InvokerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                        |
    /// |------------------------|--------------------------------|
    /// | `HOST`                 | `0.0.0.0`                      |
    /// | `PORT`                 | `3000`                         |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                           |
    /// | `CORS_ORIGINS`         | (empty)                        |
    /// | `AWS_REGION`           | `us-east-1`                    |
    /// | `DOMAIN`               | `dev`                          |
    /// | `REALM`                | `USAmazon`                     |
    /// | `STAGE`                | `Beta`                         |
    /// | `JOB_QUEUE_NAME`       | `VendorFeedProcessorJobQueue`  |
    /// | `CONTAINER_IMAGE`      | `vendor-feed-processor:1.0`    |
    /// | `CONTAINER_RUNTIME`    | `docker`                       |
    /// | `JOB_VCPUS`            | `1`                            |
    /// | `JOB_MEMORY_MIB`       | `512`                          |
    /// | `MIN_VCPUS`            | `1`                            |
    /// | `MAX_VCPUS`            | `8`                            |
    /// | `DESIRED_VCPUS`        | `0`                            |
    /// | `IDLE_GRACE_SECS`      | `60`                           |
    /// | `POLL_INTERVAL_MS`     | `250`                          |
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 3000),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            region: env_or("AWS_REGION", "us-east-1"),
            domain: env_or("DOMAIN", "dev"),
            realm: env_or("REALM", "USAmazon"),
            stage: env_or("STAGE", "Beta"),
            job_queue_name: env_or("JOB_QUEUE_NAME", "VendorFeedProcessorJobQueue"),
            container_image: env_or("CONTAINER_IMAGE", "vendor-feed-processor:1.0"),
            container_runtime: env_or("CONTAINER_RUNTIME", "docker"),
            job_vcpus: parse_env("JOB_VCPUS", 1),
            job_memory_mib: parse_env("JOB_MEMORY_MIB", 512),
            min_vcpus: parse_env("MIN_VCPUS", 1),
            max_vcpus: parse_env("MAX_VCPUS", 8),
            desired_vcpus: parse_env("DESIRED_VCPUS", 0),
            idle_grace_secs: parse_env("IDLE_GRACE_SECS", 60),
            poll_interval_ms: parse_env("POLL_INTERVAL_MS", 250),
        }
    }

    /// Pool sizing derived from this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_vcpus: self.min_vcpus,
            max_vcpus: self.max_vcpus,
            desired_vcpus: self.desired_vcpus,
            unit_vcpus: self.job_vcpus,
            unit_memory_mib: self.job_memory_mib,
            idle_grace: Duration::from_secs(self.idle_grace_secs),
        }
    }

    /// Fixed environment context for rendered jobs.
    pub fn process_context(&self) -> ProcessContext {
        ProcessContext {
            region: self.region.clone(),
            domain: self.domain.clone(),
            realm: self.realm.clone(),
            stage: self.stage.clone(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
