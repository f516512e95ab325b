#![cfg(feature = "serde")]

use persevere::prelude::*;
use std::time::Duration;

fn parse(json: &str) -> PolicyConfig {
    serde_json::from_str(json).expect("valid policy config")
}

#[test]
fn parses_count_limited() {
    let cfg = parse(r#"{ "kind": "count_limited", "max_attempts": 4 }"#);
    assert_eq!(cfg, PolicyConfig::CountLimited { max_attempts: Some(4) });

    let policy = cfg.into_policy().unwrap();
    assert!(!policy.should_stop(&AttemptSnapshot::open(3)));
    assert!(policy.should_stop(&AttemptSnapshot::open(4)));
}

#[test]
fn fixed_interval_without_limit_uses_default_ceiling() {
    let policy = parse(r#"{ "kind": "fixed_interval", "backoff_period_ms": 1000 }"#)
        .into_policy()
        .unwrap();
    assert!(policy.should_stop(&AttemptSnapshot::open(30)));
    assert!(!policy.should_stop(&AttemptSnapshot::open(29)));
}

#[test]
fn exponential_zero_fields_fall_back_to_defaults() {
    let policy = parse(
        r#"{ "kind": "exponential", "initial_interval_ms": 500, "multiplier": 0, "limit_ms": 0 }"#,
    )
    .into_policy()
    .unwrap();
    assert_eq!(policy.delay(&AttemptSnapshot::open(4)), Duration::from_millis(4000));
    assert_eq!(policy.delay(&AttemptSnapshot::open(12)), DEFAULT_LIMIT);
}

#[test]
fn missing_required_field_is_reported() {
    let err = parse(r#"{ "kind": "exponential", "multiplier": 3.0 }"#).into_policy().unwrap_err();
    assert_eq!(
        err,
        ConfigError::MissingField { policy: "exponential", field: "initial_interval_ms" }
    );
}

#[test]
fn unknown_kind_is_rejected() {
    let parsed: Result<PolicyConfig, _> = serde_json::from_str(r#"{ "kind": "fibonacci" }"#);
    assert!(parsed.is_err());
}

#[test]
fn config_round_trips_through_json() {
    let cfg: PolicyConfig = FixedInterval::new(Duration::from_millis(250))
        .with_limit(Duration::from_secs(5))
        .into();
    let json = serde_json::to_value(&cfg).unwrap();
    assert_eq!(json["kind"], "fixed_interval");
    assert_eq!(json["limit_ms"], 5000);
    assert_eq!(serde_json::from_value::<PolicyConfig>(json).unwrap(), cfg);
}

#[tokio::test]
async fn configured_policy_drives_a_template() {
    let policy = parse(r#"{ "kind": "count_limited", "max_attempts": 2 }"#).into_policy().unwrap();
    let template = RetryTemplate::<u8, std::io::Error>::builder()
        .shared_policy(policy)
        .with_sleeper(InstantSleeper)
        .build()
        .unwrap();

    let report = template
        .execute_with_report(|| async { Err(std::io::Error::new(std::io::ErrorKind::Other, "down")) })
        .await;
    assert_eq!(report.attempts, 2);
    assert_eq!(report.result.unwrap_err().to_string(), "down");
}
