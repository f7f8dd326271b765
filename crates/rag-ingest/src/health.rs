//! Startup dependency wait and `/health` aggregation.
//!
//! Grounded on `intent_api.py`'s `wait_for_dependency`: poll a service's
//! health endpoint with exponential backoff before the process starts
//! accepting traffic, so a slow-to-boot downstream does not surface as a
//! wave of request failures at startup.

use std::time::Duration;

use rag_core::Registry;

/// Polls `{base_url}/health` up to 5 times with `2^attempt` second backoff.
/// Returns `Ok(())` once the dependency answers with a success status, or
/// `Err` describing the last failure once attempts are exhausted.
pub async fn wait_for_dependency(http: &reqwest::Client, name: &str, base_url: &str) -> anyhow::Result<()> {
    const MAX_ATTEMPTS: u32 = 5;
    let mut last_error = String::new();

    for attempt in 0..MAX_ATTEMPTS {
        match http
            .get(format!("{base_url}/health"))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(service = name, attempt, "dependency is healthy");
                return Ok(());
            }
            Ok(resp) => last_error = format!("status {}", resp.status()),
            Err(e) => last_error = e.to_string(),
        }

        let backoff = Duration::from_secs(2u64.pow(attempt));
        tracing::warn!(
            service = name,
            attempt,
            backoff_secs = backoff.as_secs(),
            error = %last_error,
            "dependency not ready, retrying"
        );
        tokio::time::sleep(backoff).await;
    }

    anyhow::bail!("dependency '{name}' never became healthy after {MAX_ATTEMPTS} attempts: {last_error}")
}

/// Aggregate health status of every required downstream service, queried in
/// parallel with a per-service timeout.
pub async fn aggregate_health(http: &reqwest::Client, registry: &Registry, timeout: Duration) -> bool {
    let services = ["llm_gateway", "vector_store", "embedder"];
    let checks = services.iter().map(|name| {
        let url = registry.service_url(name).map(str::to_string);
        let http = http.clone();
        async move {
            let Some(url) = url else { return false };
            http.get(format!("{url}/health"))
                .timeout(timeout)
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false)
        }
    });

    futures::future::join_all(checks).await.into_iter().all(|ok| ok)
}
