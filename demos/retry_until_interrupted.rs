//! Exponential retry that runs until ctrl-c (or 3 seconds) interrupts it.
use persevere::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("persevere=debug,info").init();

    let interrupt = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = tokio::time::sleep(Duration::from_secs(3)) => {}
        }
    };

    let template = RetryTemplate::<&'static str, std::io::Error>::builder()
        .policy(Exponential::new(Duration::from_millis(100)).with_limit(Duration::from_secs(1)))
        .on_open(|| println!("starting"))
        .on_error(|e| println!("attempt failed: {e}"))
        .on_close(|result| println!("finished: {result:?}"))
        .with_interrupt(interrupt)
        .with_sink(LogSink)
        .build()?;

    let attempts = Arc::new(AtomicUsize::new(0));
    let report = template
        .execute_with_report(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                // Replace with your real fallible work
                Err::<&'static str, _>(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "upstream unavailable",
                ))
            }
        })
        .await;

    println!(
        "attempts={} interrupted={} ok={}",
        report.attempts,
        report.was_interrupted(),
        report.result.is_ok()
    );
    Ok(())
}
