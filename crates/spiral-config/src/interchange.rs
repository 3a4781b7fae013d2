use std::sync::OnceLock;

use serde::Deserialize;

const DEFAULT_MAX_DEPTH: usize = 64;

/// Settings shared by every encoder and decoder in the process.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterchangeConfig {
    /// Deepest nesting level a value may reach before conversion stops.
    pub max_depth: usize,
    /// Verify that every element of a decoded collection shares the first
    /// element's tag instead of trusting the first element alone.
    pub strict_collections: bool,
}

impl Default for InterchangeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_collections: false,
        }
    }
}

impl InterchangeConfig {
    /// Builds a configuration snapshot from environment variables.
    pub fn from_env() -> Self {
        let max_depth = std::env::var("SPIRAL_IVALUE_MAX_DEPTH")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|depth| *depth > 0)
            .unwrap_or(DEFAULT_MAX_DEPTH);

        let strict_collections = std::env::var("SPIRAL_IVALUE_STRICT")
            .ok()
            .map(|v| matches!(v.trim(), "1" | "true" | "True" | "on" | "ON"))
            .unwrap_or(false);

        Self {
            max_depth,
            strict_collections,
        }
    }

    /// Parses the `interchange` section of a JSON config file.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw)?;
        if cfg.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        Ok(cfg)
    }
}

static CONFIG: OnceLock<InterchangeConfig> = OnceLock::new();

/// Returns the lazily initialised interchange configuration.
pub fn config() -> &'static InterchangeConfig {
    CONFIG.get_or_init(InterchangeConfig::from_env)
}

/// Installs `cfg` unless a configuration is already active, and returns the
/// one in effect.
pub fn configure(cfg: InterchangeConfig) -> &'static InterchangeConfig {
    CONFIG.get_or_init(|| cfg)
}

/// Errors raised while loading interchange settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse interchange config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid interchange config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
    use std::sync::{Mutex, OnceLock};

    fn with_env(vars: &[(&str, Option<&str>)], test: impl FnOnce()) {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        let _lock = GUARD
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, value)| {
                let previous = std::env::var(key).ok();
                match value {
                    Some(val) => std::env::set_var(key, val),
                    None => std::env::remove_var(key),
                }
                ((*key).to_string(), previous)
            })
            .collect();

        let result = catch_unwind(AssertUnwindSafe(test));

        for (key, value) in snapshot {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }

        if let Err(err) = result {
            resume_unwind(err);
        }
    }

    #[test]
    fn defaults_without_environment() {
        with_env(
            &[
                ("SPIRAL_IVALUE_MAX_DEPTH", None),
                ("SPIRAL_IVALUE_STRICT", None),
            ],
            || {
                let cfg = InterchangeConfig::from_env();
                assert_eq!(cfg, InterchangeConfig::default());
                assert_eq!(cfg.max_depth, 64);
                assert!(!cfg.strict_collections);
            },
        );
    }

    #[test]
    fn environment_overrides_defaults() {
        with_env(
            &[
                ("SPIRAL_IVALUE_MAX_DEPTH", Some("8")),
                ("SPIRAL_IVALUE_STRICT", Some("on")),
            ],
            || {
                let cfg = InterchangeConfig::from_env();
                assert_eq!(cfg.max_depth, 8);
                assert!(cfg.strict_collections);
            },
        );
    }

    #[test]
    fn unusable_depths_fall_back() {
        for raw in ["0", "-3", "deep"] {
            with_env(&[("SPIRAL_IVALUE_MAX_DEPTH", Some(raw))], || {
                assert_eq!(InterchangeConfig::from_env().max_depth, 64);
            });
        }
    }

    #[test]
    fn first_configuration_wins() {
        let cfg = InterchangeConfig {
            max_depth: 12,
            strict_collections: true,
        };
        assert_eq!(configure(cfg.clone()), &cfg);
        assert_eq!(config(), &cfg);
        assert_eq!(configure(InterchangeConfig::default()), &cfg);
    }

    #[test]
    fn json_sections_fill_missing_fields() {
        let cfg = InterchangeConfig::from_json_str(r#"{ "strict_collections": true }"#)
            .expect("config");
        assert_eq!(cfg.max_depth, 64);
        assert!(cfg.strict_collections);
    }

    #[test]
    fn json_rejects_bad_sections() {
        assert!(matches!(
            InterchangeConfig::from_json_str(r#"{ "max_depth": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            InterchangeConfig::from_json_str(r#"{ "depth": 3 }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
