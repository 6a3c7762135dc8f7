//! Startup reachability probe for the local speech services.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("{service} is not reachable at {url}: {reason}")]
pub struct ServiceUnavailable {
    pub service: &'static str,
    pub url: String,
    pub reason: String,
}

/// GET `url` until it answers with a success status, at most `attempts`
/// times, sleeping `delay` between tries.
pub async fn wait_healthy(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
    attempts: u32,
    delay: Duration,
) -> Result<(), ServiceUnavailable> {
    let mut reason = String::from("no attempt made");
    for attempt in 1..=attempts.max(1) {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                log::info!("health: {service} ready at {url}");
                return Ok(());
            }
            Ok(resp) => reason = format!("HTTP {}", resp.status()),
            Err(e) => reason = e.to_string(),
        }
        log::debug!("health: {service} attempt {attempt}/{attempts} failed: {reason}");
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    Err(ServiceUnavailable {
        service,
        url: url.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_service_reports_url() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        // Port 9 (discard) on loopback is closed on test machines.
        let err = wait_healthy(&client, "stt", "http://127.0.0.1:9/health", 2, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err.service, "stt");
        assert!(err.to_string().contains("127.0.0.1:9"));
    }
}
