/// Configuration management for the proctree engine
///
/// Handles process manager defaults and logging parameters.

use serde::{Deserialize, Serialize};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Process manager configuration
    pub manager: ManagerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Defaults applied by the process manager when it seeds a new tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Successes required by the default Parallel root of a freshly registered kind
    pub root_required_successes: usize,
    /// Failures required by the default Parallel root of a freshly registered kind
    pub root_required_failures: usize,
}

/// Logging configuration for the tracing subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (e.g., "info", "proctree=debug")
    pub filter: String,
    /// Whether log lines include the emitting module path
    pub with_target: bool,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for embedding applications
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            root_required_successes: env_usize("PROCTREE_ROOT_SUCCESSES", 1),
            root_required_failures: env_usize("PROCTREE_ROOT_FAILURES", 1),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var("PROCTREE_LOG").unwrap_or_else(|_| "info".to_string()),
            with_target: std::env::var("PROCTREE_LOG_TARGETS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_usize_fallback_on_garbage() {
        std::env::set_var("PROCTREE_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_usize("PROCTREE_TEST_GARBAGE", 7), 7);
        assert_eq!(env_usize("PROCTREE_TEST_UNSET_KEY", 3), 3);
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = Config {
            manager: ManagerConfig {
                root_required_successes: 2,
                root_required_failures: 1,
            },
            logging: LoggingConfig {
                filter: "proctree=debug".into(),
                with_target: true,
            },
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.manager, config.manager);
        assert_eq!(back.logging, config.logging);
    }
}
