//! Fire-and-forget webhook delivery.
//!
//! Terminal job transitions POST a JSON payload to the job's webhook URL
//! with a 10 second timeout and a single retry after 1 second on non-2xx or
//! transport error. Delivery never blocks or fails the queue.

use std::time::Duration;

use tracing::{debug, warn};

use crate::jobs::types::WebhookPayload;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Deliver a payload, retrying once. Returns whether any attempt got a 2xx.
pub async fn deliver(client: &reqwest::Client, url: &str, payload: &WebhookPayload) -> bool {
    for attempt in 1..=2u8 {
        match client
            .post(url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!(url, job_id = %payload.job_id, attempt, "webhook delivered");
                return true;
            }
            Ok(response) => {
                warn!(
                    url,
                    job_id = %payload.job_id,
                    status = response.status().as_u16(),
                    attempt,
                    "webhook rejected"
                );
            }
            Err(e) => {
                warn!(url, job_id = %payload.job_id, attempt, error = %e, "webhook delivery failed");
            }
        }
        if attempt == 1 {
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
    false
}

/// Spawn a fire-and-forget delivery task.
pub fn deliver_detached(client: reqwest::Client, url: String, payload: WebhookPayload) {
    tokio::spawn(async move {
        deliver(&client, &url, &payload).await;
    });
}
