use anyhow::{Context, Result};
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

pub fn create_client(user_agent: &str) -> Result<Client> {
    let client = ClientBuilder::new()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(25))
        .pool_max_idle_per_host(6)
        .build()?;

    Ok(client)
}

const FIRST_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Tries `url` up to `max_retries` times (at least once), doubling the pause
/// after every miss. A response only counts once its status is 2xx.
pub async fn fetch_with_retry(client: &Client, url: &str, max_retries: u32) -> Result<Response> {
    let attempts = max_retries.max(1);
    let mut delay = FIRST_RETRY_DELAY;

    let mut attempt = 1;
    loop {
        let failure = match get_ok(client, url).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };
        if attempt >= attempts {
            return Err(failure)
                .with_context(|| format!("Giving up on {} after {} attempts", url, attempts));
        }

        warn!("Attempt {}/{} for {} missed: {:#}; next try in {:?}", attempt, attempts, url, failure, delay);
        sleep(delay).await;
        delay *= 2;
        attempt += 1;
    }
}

async fn get_ok(client: &Client, url: &str) -> Result<Response> {
    let response = client.get(url).send().await.map_err(|e| {
        error!("Request failed for {}: {}", url, e);
        anyhow::Error::from(e)
    })?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("HTTP error: {}", status);
    }
    Ok(response)
}
