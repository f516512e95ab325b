//! Convenient re-exports for common types.
pub use crate::{
    config::PolicyConfig,
    error::{BuildError, ConfigError},
    policy::{
        AttemptSnapshot, BackoffPolicy, CountLimited, Exponential, FixedInterval, DEFAULT_LIMIT,
        DEFAULT_MULTIPLIER,
    },
    sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper},
    state::Lifecycle,
    telemetry::{LogSink, MemorySink, RetryEvent, TelemetrySink},
    template::{Execution, RetryTemplate, RetryTemplateBuilder},
};
