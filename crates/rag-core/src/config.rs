//! Environment-variable driven configuration, read once at process startup.
//!
//! Mirrors the teacher's `SecretReference::resolve()` convention for
//! credentials: plain `std::env::var` with a documented default for every
//! knob named in spec.md §6, and a hard, enumerated failure when a required
//! variable is absent.

use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::registry::Environment;

/// Concurrency and timing knobs common to both services, resolved from
/// environment variables with the defaults spec.md documents.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub environment: Environment,
    pub log_retention_days: u32,
    pub cache_ttl_seconds: u64,
    pub cache_max_size: usize,
    pub gateway_semaphore: usize,
    pub embeddings_semaphore: usize,
    pub health_check_timeout: Duration,
}

impl SharedConfig {
    /// Load from environment variables, collecting every parse/missing
    /// failure into one error instead of failing on the first.
    pub fn load() -> Result<Self> {
        let mut errors = Vec::new();

        let environment = match env_or("PIPELINE_ENV", "dev").parse::<Environment>() {
            Ok(e) => e,
            Err(e) => {
                errors.push(e.to_string());
                Environment::Dev
            }
        };

        let log_retention_days = parse_env_or("LOG_RETENTION_DAYS", 7, &mut errors);
        let cache_ttl_seconds = parse_env_or("CACHE_TTL_SECONDS", 3600, &mut errors);
        let cache_max_size = parse_env_or("CACHE_MAX_SIZE", 5000, &mut errors);
        let gateway_semaphore = parse_env_or("GATEWAY_CONCURRENCY", 20, &mut errors);
        let embeddings_semaphore = parse_env_or("EMBEDDINGS_CONCURRENCY", 50, &mut errors);
        let health_check_timeout_secs: u64 = parse_env_or("HEALTH_CHECK_TIMEOUT_SECONDS", 2, &mut errors);

        if !errors.is_empty() {
            return Err(PipelineError::Internal(format!(
                "configuration errors: {}",
                errors.join("; ")
            )));
        }

        Ok(Self {
            environment,
            log_retention_days,
            cache_ttl_seconds,
            cache_max_size,
            gateway_semaphore,
            embeddings_semaphore,
            health_check_timeout: Duration::from_secs(health_check_timeout_secs),
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or<T>(name: &str, default: T, errors: &mut Vec<String>) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(e) => {
                errors.push(format!("{name}: {e}"));
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes env-var mutation across tests in this module, matching the
    // teacher's ENV_MUTEX pattern for tests that touch process environment.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_when_unset() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("PIPELINE_ENV");
        std::env::remove_var("CACHE_TTL_SECONDS");
        let cfg = SharedConfig::load().unwrap();
        assert_eq!(cfg.environment, Environment::Dev);
        assert_eq!(cfg.cache_ttl_seconds, 3600);
    }

    #[test]
    fn reads_overridden_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("PIPELINE_ENV", "prod");
        std::env::set_var("CACHE_MAX_SIZE", "9999");
        let cfg = SharedConfig::load().unwrap();
        assert_eq!(cfg.environment, Environment::Prod);
        assert_eq!(cfg.cache_max_size, 9999);
        std::env::remove_var("PIPELINE_ENV");
        std::env::remove_var("CACHE_MAX_SIZE");
    }

    #[test]
    fn invalid_environment_fails_loudly() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("PIPELINE_ENV", "nonsense");
        let err = SharedConfig::load().unwrap_err();
        assert!(err.to_string().contains("PIPELINE_ENV"));
        std::env::remove_var("PIPELINE_ENV");
    }

    #[test]
    fn invalid_numeric_value_is_reported_by_name() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("GATEWAY_CONCURRENCY", "not-a-number");
        let err = SharedConfig::load().unwrap_err();
        assert!(err.to_string().contains("GATEWAY_CONCURRENCY"));
        std::env::remove_var("GATEWAY_CONCURRENCY");
    }
}
