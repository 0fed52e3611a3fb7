//! Rate limiter FIFO ordering and admission-rate bounds.
//!
//! Uses tokio's paused clock: sleeps auto-advance virtual time, so the
//! wall-clock assertions are deterministic.

use std::sync::Arc;
use std::time::Duration;

use pagesift::ServiceConfig;
use pagesift::fetch::RateLimiter;
use tokio::sync::Mutex;

fn limiter(rps: f64) -> RateLimiter {
    let config = ServiceConfig::builder()
        .default_refill_rps(rps)
        .max_token_wait(Duration::from_secs(60))
        .build();
    RateLimiter::new(&config)
}

#[tokio::test(start_paused = true)]
async fn three_simultaneous_calls_complete_in_order_at_refill_pace() {
    let rl = limiter(1.0);
    let completions: Arc<Mutex<Vec<(u32, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
    let start = tokio::time::Instant::now();

    let mut handles = Vec::new();
    for i in 0..3u32 {
        let rl = rl.clone();
        let completions = Arc::clone(&completions);
        handles.push(tokio::spawn(async move {
            rl.check_limit("https://x.example/page").await.unwrap();
            completions.lock().await.push((i, start.elapsed()));
        }));
        // Deterministic enqueue order.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let completions = completions.lock().await;
    let order: Vec<u32> = completions.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, vec![0, 1, 2], "waiters must resume in call order");

    // First call is admitted immediately; the next two wait roughly one and
    // two refill periods.
    assert!(completions[0].1 < Duration::from_millis(200));
    assert!(completions[1].1 >= Duration::from_millis(900));
    assert!(completions[1].1 <= Duration::from_millis(1400));
    assert!(completions[2].1 >= Duration::from_millis(1900));
    assert!(completions[2].1 <= Duration::from_millis(2400));
}

#[tokio::test(start_paused = true)]
async fn admission_count_is_bounded_by_refill_rate() {
    let rl = limiter(2.0);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut admitted = 0usize;
    while tokio::time::Instant::now() < deadline {
        rl.check_limit("https://bounded.example/").await.unwrap();
        admitted += 1;
        if admitted > 50 {
            break;
        }
    }
    // ceil(5s * 2/s) + capacity 1.
    assert!(
        admitted <= 11,
        "admitted {admitted} requests in 5s at 2 rps"
    );
}

#[tokio::test(start_paused = true)]
async fn separate_hosts_never_queue_behind_each_other() {
    let rl = limiter(0.5);
    rl.check_limit("https://a.example/").await.unwrap();

    // b.example's first token is free even though a.example is exhausted.
    let start = tokio::time::Instant::now();
    rl.check_limit("https://b.example/").await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
}
