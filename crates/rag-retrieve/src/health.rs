//! Startup dependency wait and `/health` aggregation.
//!
//! Grounded on `rag-ingest::health`'s `wait_for_dependency`, extended with
//! the reranker/compressor endpoints when configured: unlike
//! `llm_gateway`/`vector_store`/`embedder`, those two are optional pipeline
//! stages (spec.md §4.9), so their absence from config is not itself
//! unhealthy.

use std::time::Duration;

use rag_core::Registry;

/// Polls `{base_url}/health` up to 5 times with `2^attempt` second backoff.
pub async fn wait_for_dependency(http: &reqwest::Client, name: &str, base_url: &str) -> anyhow::Result<()> {
    const MAX_ATTEMPTS: u32 = 5;
    let mut last_error = String::new();

    for attempt in 0..MAX_ATTEMPTS {
        match http.get(format!("{base_url}/health")).timeout(Duration::from_secs(2)).send().await {
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

/// Aggregate health status of every required downstream service, plus the
/// reranker/compressor if this deployment has them configured.
pub async fn aggregate_health(
    http: &reqwest::Client,
    registry: &Registry,
    rerank_url: Option<&str>,
    compress_url: Option<&str>,
    timeout: Duration,
) -> bool {
    let required = ["llm_gateway", "vector_store", "embedder"];
    let mut checks: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send>>> = Vec::new();

    for name in required {
        let url = registry.service_url(name).map(str::to_string);
        let http = http.clone();
        checks.push(Box::pin(async move {
            let Some(url) = url else { return false };
            check_one(&http, &url, timeout).await
        }));
    }

    for url in [rerank_url, compress_url].into_iter().flatten() {
        let http = http.clone();
        let url = url.to_string();
        checks.push(Box::pin(async move { check_one(&http, &url, timeout).await }));
    }

    futures::future::join_all(checks).await.into_iter().all(|ok| ok)
}

async fn check_one(http: &reqwest::Client, base_url: &str, timeout: Duration) -> bool {
    http.get(format!("{base_url}/health"))
        .timeout(timeout)
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}
