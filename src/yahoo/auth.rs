use crate::config::YahooEndpoints;
use crate::error::ProviderError;
use reqwest::{Client, StatusCode, header::REFERER};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

const REFERER_URL: &str = "https://finance.yahoo.com/";

/// Session crumb shared by every request of one client.
///
/// The matching session cookie lives in the reqwest cookie jar, so only the
/// crumb itself is kept here.
#[derive(Debug, Default)]
pub struct CrumbStore {
    crumb: RwLock<Option<String>>,
}

impl CrumbStore {
    pub async fn get(
        &self,
        client: &Client,
        endpoints: &YahooEndpoints,
    ) -> Result<String, ProviderError> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut guard = self.crumb.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        let crumb = fetch_crumb(client, endpoints).await?;
        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    pub async fn invalidate(&self) {
        *self.crumb.write().await = None;
    }
}

#[instrument(skip(client))]
async fn fetch_crumb(client: &Client, endpoints: &YahooEndpoints) -> Result<String, ProviderError> {
    // The cookie host answers 404 while still setting the session cookie
    let cookie_response = client
        .get(&endpoints.cookie_url)
        .header(REFERER, REFERER_URL)
        .send()
        .await
        .map_err(|e| ProviderError::Session(format!("failed to fetch session cookie: {e}")))?;
    debug!(status = %cookie_response.status(), "Visited cookie endpoint");

    let crumb_url = format!("{}/v1/test/getcrumb", endpoints.query_url);
    let response = client.get(&crumb_url).header(REFERER, REFERER_URL).send().await?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited);
    }
    if !status.is_success() {
        return Err(ProviderError::Session(format!(
            "crumb endpoint responded with status {status}"
        )));
    }

    let body = response.text().await?;
    let crumb = body.trim();

    if crumb.is_empty() || crumb.len() >= 100 || crumb.contains(char::is_whitespace) || crumb.contains('<') {
        return Err(ProviderError::Session("crumb endpoint returned an unusable body".to_string()));
    }

    info!("Obtained new provider session crumb");
    Ok(crumb.to_string())
}
