#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # persevere
//!
//! Retry templates for async Rust: run a fallible operation under a pluggable stop/delay policy
//! until it succeeds, the policy gives up, or an interrupt arrives.
//!
//! ## Features
//!
//! - **Backoff policies**: count-limited, fixed interval with a cumulative ceiling, exponential
//!   with a delay cap
//! - **Lifecycle callbacks**: `on_open`, `on_error`, `on_close`
//! - **Cooperative interrupts**: any future can close the current attempt state; in-flight
//!   attempts are never cancelled
//! - **Telemetry** through `tower::Service` sinks
//! - **Declarative config** (`serde` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use persevere::{Exponential, RetryTemplate};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (stop, interrupt) = tokio::sync::oneshot::channel::<()>();
//!     let template = RetryTemplate::<String, std::io::Error>::builder()
//!         .policy(Exponential::new(Duration::from_millis(50)).with_limit(Duration::from_secs(2)))
//!         .with_interrupt(interrupt)
//!         .build()
//!         .unwrap();
//!
//!     let result = template
//!         .execute(|| async { Ok::<_, std::io::Error>("connected".to_string()) })
//!         .await;
//!     assert_eq!(result.unwrap(), "connected");
//!     drop(stop);
//! }
//! ```

pub mod config;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod sleeper;
pub mod state;
pub mod telemetry;
pub mod template;

// Re-exports
pub use config::PolicyConfig;
pub use error::{BuildError, ConfigError};
pub use policy::{BackoffPolicy, CountLimited, Exponential, FixedInterval};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use state::{AttemptSnapshot, AttemptState, Lifecycle};
pub use template::{Execution, RetryTemplate, RetryTemplateBuilder};
