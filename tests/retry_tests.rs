use anyhow::{anyhow, Result};
use gwadm::error::Error;
use gwadm::retry::{with_exponential_backoff, Retrier, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn fast_config(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_backoff_ms: 10,
        backoff_factor: 2.0,
        max_backoff_ms: 100,
        add_jitter: false,
    }
}

#[tokio::test]
async fn test_successful_operation_returns_immediately() -> Result<()> {
    let config = fast_config(3);

    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_clone = call_count.clone();

    let result = with_exponential_backoff(
        || async {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(42)
        },
        |_| true,
        &config,
    )
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_retries_until_success() -> Result<()> {
    let config = fast_config(5);

    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_clone = call_count.clone();

    // Fails twice with a retryable error, then succeeds: K + 1 attempts.
    let result = with_exponential_backoff(
        || async {
            let count = call_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                Err(anyhow!("Temporary failure"))
            } else {
                Ok(42)
            }
        },
        |_| true,
        &config,
    )
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(call_count.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_respects_max_attempts() -> Result<()> {
    let config = fast_config(2);

    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_clone = call_count.clone();

    let result: Result<i32, _> = with_exponential_backoff(
        || async {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("Persistent failure"))
        },
        |_| true,
        &config,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(call_count.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_terminal_error_aborts_after_one_attempt() -> Result<()> {
    let config = fast_config(5);

    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_clone = call_count.clone();

    let retrier = Retrier::new(&config, "alice@x - bob@x:");
    let result = retrier
        .run(|| {
            let call_count = call_count_clone.clone();
            async move {
                call_count.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(Error::Upstream {
                    status: 403,
                    message: "forbidden".to_string(),
                })
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_retrier_recovers_from_transient_failures() -> Result<()> {
    let config = fast_config(5);

    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_clone = call_count.clone();

    let retrier = Retrier::new(&config, "alice@x:");
    let result = retrier
        .run(|| {
            let call_count = call_count_clone.clone();
            async move {
                let count = call_count.fetch_add(1, Ordering::SeqCst);
                if count < 3 {
                    Err(Error::Transient("HTTP 429".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(call_count.load(Ordering::SeqCst), 4);
    Ok(())
}

#[tokio::test]
async fn test_backoff_increases_exponentially() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 3,
        initial_backoff_ms: 10,
        backoff_factor: 2.0,
        max_backoff_ms: 1000, // High enough to not be capped
        add_jitter: false,
    };

    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_clone = call_count.clone();

    let start_times = Arc::new(std::sync::Mutex::new(Vec::new()));
    let start_times_clone = start_times.clone();

    let result: Result<i32, _> = with_exponential_backoff(
        || async {
            let now = std::time::Instant::now();
            let count = call_count_clone.fetch_add(1, Ordering::SeqCst);
            start_times_clone.lock().unwrap().push((count, now));
            Err(anyhow!("Persistent failure"))
        },
        |_| true,
        &config,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(call_count.load(Ordering::SeqCst), 3);

    let times = start_times.lock().unwrap();
    assert_eq!(times.len(), 3);

    if times.len() >= 3 {
        let diff1 = times[1].1.duration_since(times[0].1);
        let diff2 = times[2].1.duration_since(times[1].1);

        // The second delay should be roughly twice the first; allow margin
        // for scheduler timing.
        assert!(
            diff2 > diff1,
            "Second delay ({:?}) should be greater than first delay ({:?})",
            diff2,
            diff1
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_max_backoff_is_respected() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 5,
        initial_backoff_ms: 10,
        backoff_factor: 10.0, // Large factor to hit max quickly
        max_backoff_ms: 50,   // Low max to force capping
        add_jitter: false,
    };

    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_clone = call_count.clone();

    let start_times = Arc::new(std::sync::Mutex::new(Vec::new()));
    let start_times_clone = start_times.clone();

    let _result: Result<i32, _> = with_exponential_backoff(
        || async {
            let now = std::time::Instant::now();
            let count = call_count_clone.fetch_add(1, Ordering::SeqCst);
            start_times_clone.lock().unwrap().push((count, now));
            Err(anyhow!("Persistent failure"))
        },
        |_| true,
        &config,
    )
    .await;

    let times = start_times.lock().unwrap();
    if times.len() >= 5 {
        // Third and subsequent delays are capped, so they should be roughly
        // equal to each other.
        let diff3 = times[3].1.duration_since(times[2].1);
        let diff4 = times[4].1.duration_since(times[3].1);

        let ratio = diff4.as_millis() as f64 / diff3.as_millis() as f64;
        assert!(
            ratio > 0.8 && ratio < 1.2,
            "Fourth delay ({:?}) should be approximately equal to third delay ({:?})",
            diff4,
            diff3
        );
    }

    Ok(())
}
