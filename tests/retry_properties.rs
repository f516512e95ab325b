use persevere::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("attempt {0} failed")]
struct AttemptError(usize);

fn failing_op(
    calls: &Arc<AtomicUsize>,
) -> impl FnMut() -> futures::future::Ready<Result<u8, AttemptError>> + Send {
    let calls = calls.clone();
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        futures::future::ready(Err(AttemptError(n)))
    }
}

#[tokio::test]
async fn attempts_match_invocations_for_every_policy() {
    let policies: Vec<Arc<dyn BackoffPolicy>> = vec![
        Arc::new(CountLimited::new(4)),
        Arc::new(FixedInterval::new(Duration::from_millis(10)).with_limit(Duration::from_millis(70))),
    ];

    for policy in policies {
        let template = RetryTemplate::<u8, AttemptError>::builder()
            .shared_policy(policy.clone())
            .with_sleeper(InstantSleeper)
            .build()
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let report = template.execute_with_report(failing_op(&calls)).await;

        assert_eq!(report.attempts, calls.load(Ordering::SeqCst), "{:?}", policy);
        assert_eq!(report.result, Err(AttemptError(report.attempts)));
    }
}

#[tokio::test]
async fn count_limited_exhausts_after_n_attempts() {
    let template = RetryTemplate::<u8, AttemptError>::builder()
        .policy(CountLimited::new(7))
        .with_sleeper(InstantSleeper)
        .build()
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let report = template.execute_with_report(failing_op(&calls)).await;

    assert_eq!(report.attempts, 7);
    assert!(report.result.is_err());
}

#[tokio::test]
async fn success_on_third_attempt_stops_the_loop() {
    let template = RetryTemplate::<&'static str, AttemptError>::builder()
        .policy(CountLimited::new(5))
        .with_sleeper(InstantSleeper)
        .build()
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let report = template
        .execute_with_report(move || {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(AttemptError(n))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

    assert_eq!(report.attempts, 3);
    assert_eq!(report.result, Ok("done"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn fixed_interval_default_ceiling_allows_thirty_attempts() {
    let sleeper = TrackingSleeper::new();
    let template = RetryTemplate::<u8, AttemptError>::builder()
        .policy(FixedInterval::new(Duration::from_millis(1000)))
        .with_sleeper(sleeper.clone())
        .build()
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let report = template.execute_with_report(failing_op(&calls)).await;

    assert_eq!(report.attempts, 30);
    assert_eq!(sleeper.total(), DEFAULT_LIMIT);
}

#[test]
fn exponential_defaults_double_then_cap() {
    let policy = Exponential::new(Duration::from_millis(500));
    let delays: Vec<u128> =
        (1..=8).map(|count| policy.delay(&AttemptSnapshot::open(count)).as_millis()).collect();
    assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 16_000, 30_000, 30_000]);
}

#[tokio::test]
async fn callbacks_see_every_step_in_order() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let (open_log, error_log, close_log) = (log.clone(), log.clone(), log.clone());

    let template = RetryTemplate::<u8, AttemptError>::builder()
        .policy(CountLimited::new(3))
        .on_open(move || open_log.lock().unwrap().push("open".into()))
        .on_error(move |e| error_log.lock().unwrap().push(format!("error {}", e.0)))
        .on_close(move |result| close_log.lock().unwrap().push(format!("close {:?}", result)))
        .with_sleeper(InstantSleeper)
        .build()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let _ = template
        .execute(move || {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 3 {
                    Ok(3)
                } else {
                    Err(AttemptError(n))
                }
            }
        })
        .await;

    assert_eq!(
        *log.lock().unwrap(),
        vec!["open", "error 1", "error 2", "close Ok(3)"]
    );
}

#[tokio::test]
async fn callbacks_are_optional() {
    let template = RetryTemplate::<u8, AttemptError>::builder()
        .policy(CountLimited::new(2))
        .with_sleeper(InstantSleeper)
        .build()
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let result = template.execute(failing_op(&calls)).await;

    assert_eq!(result, Err(AttemptError(2)));
}

#[tokio::test]
async fn cloned_templates_share_configuration() {
    let opens = Arc::new(AtomicUsize::new(0));
    let o = opens.clone();
    let template = RetryTemplate::<u8, AttemptError>::builder()
        .policy(CountLimited::new(1))
        .on_open(move || {
            o.fetch_add(1, Ordering::SeqCst);
        })
        .with_sleeper(InstantSleeper)
        .build()
        .unwrap();
    let clone = template.clone();

    let (a, b) = tokio::join!(
        template.execute(|| async { Ok(1) }),
        clone.execute(|| async { Ok(2) }),
    );

    assert_eq!((a, b), (Ok(1), Ok(2)));
    assert_eq!(opens.load(Ordering::SeqCst), 2);
}
