//! Declarative policy configuration.
//!
//! [`PolicyConfig`] mirrors the three built-in policies with plain numeric fields (durations in
//! milliseconds) so a policy can be loaded from a config file. With the `serde` feature it
//! deserializes from an internally tagged map:
//!
//! ```json
//! { "kind": "exponential", "initial_interval_ms": 500, "multiplier": 1.5 }
//! ```
//!
//! Unset or zero `limit_ms` / `multiplier` fall back to the policy defaults. Required fields
//! (`max_attempts`, `backoff_period_ms`, `initial_interval_ms`) must be present.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::policy::{BackoffPolicy, CountLimited, Exponential, FixedInterval};

/// Serializable description of a backoff policy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum PolicyConfig {
    /// See [`CountLimited`].
    CountLimited {
        #[cfg_attr(feature = "serde", serde(default))]
        max_attempts: Option<usize>,
    },
    /// See [`FixedInterval`].
    FixedInterval {
        #[cfg_attr(feature = "serde", serde(default))]
        backoff_period_ms: Option<u64>,
        #[cfg_attr(feature = "serde", serde(default))]
        limit_ms: Option<u64>,
    },
    /// See [`Exponential`].
    Exponential {
        #[cfg_attr(feature = "serde", serde(default))]
        initial_interval_ms: Option<u64>,
        #[cfg_attr(feature = "serde", serde(default))]
        multiplier: Option<f64>,
        #[cfg_attr(feature = "serde", serde(default))]
        limit_ms: Option<u64>,
    },
}

impl PolicyConfig {
    /// Policy kind as written in config files.
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyConfig::CountLimited { .. } => "count_limited",
            PolicyConfig::FixedInterval { .. } => "fixed_interval",
            PolicyConfig::Exponential { .. } => "exponential",
        }
    }

    /// Resolve into a shareable policy, applying defaults.
    pub fn into_policy(self) -> Result<Arc<dyn BackoffPolicy>, ConfigError> {
        let policy = self.kind();
        let missing = |field| ConfigError::MissingField { policy, field };

        match self {
            PolicyConfig::CountLimited { max_attempts } => {
                let max_attempts = max_attempts.ok_or_else(|| missing("max_attempts"))?;
                Ok(Arc::new(CountLimited::new(max_attempts)))
            }
            PolicyConfig::FixedInterval { backoff_period_ms, limit_ms } => {
                let period = backoff_period_ms.ok_or_else(|| missing("backoff_period_ms"))?;
                Ok(Arc::new(
                    FixedInterval::new(Duration::from_millis(period))
                        .with_limit(Duration::from_millis(limit_ms.unwrap_or(0))),
                ))
            }
            PolicyConfig::Exponential { initial_interval_ms, multiplier, limit_ms } => {
                let initial = initial_interval_ms.ok_or_else(|| missing("initial_interval_ms"))?;
                let multiplier = multiplier.unwrap_or(0.0);
                if !multiplier.is_finite() || multiplier < 0.0 {
                    return Err(ConfigError::InvalidField {
                        policy,
                        field: "multiplier",
                        reason: format!("must be a finite, non-negative number (got {})", multiplier),
                    });
                }
                Ok(Arc::new(
                    Exponential::new(Duration::from_millis(initial))
                        .with_multiplier(multiplier)
                        .with_limit(Duration::from_millis(limit_ms.unwrap_or(0))),
                ))
            }
        }
    }
}

impl From<CountLimited> for PolicyConfig {
    fn from(policy: CountLimited) -> Self {
        PolicyConfig::CountLimited { max_attempts: Some(policy.max_attempts()) }
    }
}

impl From<FixedInterval> for PolicyConfig {
    fn from(policy: FixedInterval) -> Self {
        PolicyConfig::FixedInterval {
            backoff_period_ms: Some(millis(policy.backoff_period())),
            limit_ms: Some(millis(policy.limit())),
        }
    }
}

impl From<Exponential> for PolicyConfig {
    fn from(policy: Exponential) -> Self {
        PolicyConfig::Exponential {
            initial_interval_ms: Some(millis(policy.initial_interval())),
            multiplier: Some(policy.multiplier()),
            limit_ms: Some(millis(policy.limit())),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
