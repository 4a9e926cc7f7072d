//! Yahoo Finance client.

pub mod auth;
pub mod format;
pub mod ticker;

pub use ticker::Ticker;

use crate::config::YahooEndpoints;
use crate::error::ProviderError;
use crate::provider::{QuoteInfo, TickerMethod, TickerProvider};
use async_trait::async_trait;
use auth::CrumbStore;
use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

pub struct YahooClient {
    client: Client,
    endpoints: YahooEndpoints,
    crumb: CrumbStore,
}

impl YahooClient {
    pub fn new(endpoints: YahooEndpoints, timeout: Duration) -> Result<Self, ProviderError> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .gzip(true)
            .user_agent(user_agent)
            .build()?;

        Ok(YahooClient {
            client,
            endpoints,
            crumb: CrumbStore::default(),
        })
    }

    /// Handle scoped to `symbol`. The symbol is used verbatim.
    pub fn ticker(&self, symbol: &str) -> Ticker<'_> {
        Ticker::new(self, symbol)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.endpoints.query_url).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "bad provider base url {}: {e}",
                self.endpoints.query_url
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::InvalidResponse(format!(
                    "provider base url {} cannot carry a path",
                    self.endpoints.query_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(
        &self,
        url: Url,
        query: &[(&str, &str)],
        with_crumb: bool,
    ) -> Result<Value, ProviderError> {
        let mut refreshed = false;

        loop {
            let mut request = self.client.get(url.clone()).query(query);
            if with_crumb {
                let crumb = self.crumb.get(&self.client, &self.endpoints).await?;
                request = request.query(&[("crumb", crumb.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            debug!(%url, %status, "Provider responded");

            // Expired session: refresh the crumb once and replay
            if status == StatusCode::UNAUTHORIZED && with_crumb && !refreshed {
                warn!(%url, "Provider rejected session crumb, refreshing");
                self.crumb.invalidate().await;
                refreshed = true;
                continue;
            }

            let body = response.text().await?;
            return interpret_response(status, &body);
        }
    }

    /// First `quoteSummary` result for the given modules.
    #[instrument(skip(self))]
    pub(crate) async fn quote_summary(
        &self,
        symbol: &str,
        modules: &[&str],
    ) -> Result<Value, ProviderError> {
        let url = self.url(&["v10", "finance", "quoteSummary", symbol])?;
        let modules = modules.join(",");
        let body = self
            .get_json(
                url,
                &[
                    ("modules", modules.as_str()),
                    ("formatted", "true"),
                    ("corsDomain", "finance.yahoo.com"),
                ],
                true,
            )
            .await?;
        first_result(&body, "quoteSummary", symbol)
    }

    /// First `v7` quote result.
    #[instrument(skip(self))]
    pub(crate) async fn quote(&self, symbol: &str) -> Result<Value, ProviderError> {
        let url = self.url(&["v7", "finance", "quote"])?;
        let body = self.get_json(url, &[("symbols", symbol)], true).await?;
        first_result(&body, "quoteResponse", symbol)
    }

    #[instrument(skip(self))]
    pub(crate) async fn chart(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
        events: &str,
    ) -> Result<Value, ProviderError> {
        let url = self.url(&["v8", "finance", "chart", symbol])?;
        let body = self
            .get_json(
                url,
                &[
                    ("range", range),
                    ("interval", interval),
                    ("events", events),
                    ("includePrePost", "false"),
                ],
                false,
            )
            .await?;
        first_result(&body, "chart", symbol)
    }

    #[instrument(skip(self))]
    pub(crate) async fn search(&self, symbol: &str) -> Result<Value, ProviderError> {
        let url = self.url(&["v1", "finance", "search"])?;
        self.get_json(
            url,
            &[
                ("q", symbol),
                ("quotesCount", "0"),
                ("newsCount", "10"),
                ("enableFuzzyQuery", "false"),
            ],
            false,
        )
        .await
    }
}

#[async_trait]
impl TickerProvider for YahooClient {
    async fn info(&self, symbol: &str) -> Result<QuoteInfo, ProviderError> {
        self.ticker(symbol).info().await
    }

    async fn fetch(&self, symbol: &str, method: TickerMethod) -> Result<Value, ProviderError> {
        self.ticker(symbol).fetch(method).await
    }
}

/// Error description Yahoo embeds as `{<root>: {error: {description}}}`.
fn upstream_error_message(body: &Value) -> Option<String> {
    body.as_object()?.values().find_map(|root| {
        root.pointer("/error/description")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn interpret_response(status: StatusCode, body: &str) -> Result<Value, ProviderError> {
    let parsed = serde_json::from_str::<Value>(body);

    if status.is_success() {
        return parsed.map_err(|e| ProviderError::InvalidResponse(e.to_string()));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited);
    }

    let message = parsed
        .ok()
        .as_ref()
        .and_then(upstream_error_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    if status == StatusCode::NOT_FOUND {
        Err(ProviderError::NotFound(message))
    } else {
        Err(ProviderError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

fn first_result(body: &Value, root: &str, symbol: &str) -> Result<Value, ProviderError> {
    if let Some(message) = upstream_error_message(body) {
        return Err(ProviderError::NotFound(message));
    }

    let results = body
        .pointer(&format!("/{root}/result"))
        .ok_or_else(|| ProviderError::InvalidResponse(format!("missing {root}.result")))?;

    match results.as_array().and_then(|r| r.first()) {
        Some(first) => Ok(first.clone()),
        None => Err(ProviderError::NotFound(format!(
            "Quote not found for symbol: {symbol}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    fn client_for(server: &ServerGuard) -> YahooClient {
        let endpoints = YahooEndpoints {
            query_url: server.url(),
            cookie_url: format!("{}/cookie", server.url()),
        };
        YahooClient::new(endpoints, Duration::from_secs(5)).unwrap()
    }

    async fn mock_session(server: &mut ServerGuard, crumb_hits: usize) -> (mockito::Mock, mockito::Mock) {
        let cookie = server
            .mock("GET", "/cookie")
            .with_status(404)
            .with_header("set-cookie", "A3=d=session; Path=/")
            .create_async()
            .await;
        let crumb = server
            .mock("GET", "/v1/test/getcrumb")
            .with_status(200)
            .with_body("abc123")
            .expect(crumb_hits)
            .create_async()
            .await;
        (cookie, crumb)
    }

    #[tokio::test]
    async fn test_yahoo_client_creation() {
        let client = YahooClient::new(YahooEndpoints::default(), Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_info_flattens_summary_and_merges_quote() {
        let mut server = Server::new_async().await;
        let (_cookie, crumb) = mock_session(&mut server, 1).await;

        let summary = server
            .mock("GET", "/v10/finance/quoteSummary/AAPL")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("crumb".into(), "abc123".into()),
                Matcher::UrlEncoded(
                    "modules".into(),
                    "financialData,quoteType,defaultKeyStatistics,assetProfile,summaryDetail".into(),
                ),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "quoteSummary": {
                        "result": [{
                            "summaryDetail": { "maxAge": 1, "previousClose": { "raw": 189.7, "fmt": "189.70" } },
                            "assetProfile": { "sector": "Technology" }
                        }],
                        "error": null
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let quote = server
            .mock("GET", "/v7/finance/quote")
            .match_query(Matcher::UrlEncoded("symbols".into(), "AAPL".into()))
            .with_status(200)
            .with_body(
                json!({
                    "quoteResponse": {
                        "result": [{ "symbol": "AAPL", "regularMarketPrice": 191.2, "currency": "USD" }],
                        "error": null
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let info = client.ticker("AAPL").info().await.unwrap();

        assert_eq!(info["previousClose"], json!(189.7));
        assert_eq!(info["sector"], json!("Technology"));
        assert_eq!(info["regularMarketPrice"], json!(191.2));
        assert_eq!(info["symbol"], json!("AAPL"));

        summary.assert_async().await;
        quote.assert_async().await;
        // Crumb fetched once, reused by the second call
        crumb.assert_async().await;
    }

    #[tokio::test]
    async fn test_info_survives_quote_failure() {
        let mut server = Server::new_async().await;
        let _session = mock_session(&mut server, 1).await;

        let _summary = server
            .mock("GET", "/v10/finance/quoteSummary/MSFT")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"quoteSummary":{"result":[{"quoteType":{"symbol":"MSFT","quoteType":"EQUITY"}}],"error":null}}"#)
            .create_async()
            .await;
        let _quote = server
            .mock("GET", "/v7/finance/quote")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server);
        let info = client.info("MSFT").await.unwrap();
        assert_eq!(info["quoteType"], json!("EQUITY"));
    }

    #[tokio::test]
    async fn test_unknown_symbol_maps_to_not_found() {
        let mut server = Server::new_async().await;
        let _session = mock_session(&mut server, 1).await;

        let _summary = server
            .mock("GET", "/v10/finance/quoteSummary/NOPE123")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found for symbol: NOPE123"}}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.info("NOPE123").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert_eq!(err.to_string(), "Quote not found for symbol: NOPE123");
    }

    #[tokio::test]
    async fn test_symbol_is_percent_encoded_not_altered() {
        let mut server = Server::new_async().await;

        let chart = server
            .mock("GET", "/v8/finance/chart/brk%2Fb%20x")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"chart":{"result":[{"meta":{},"timestamp":[]}],"error":null}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let records = client.ticker("brk/b x").history("1mo", "1d").await.unwrap();
        assert!(records.is_empty());
        chart.assert_async().await;
    }

    #[tokio::test]
    async fn test_crumb_refreshed_once_on_unauthorized() {
        let mut server = Server::new_async().await;
        let (_cookie, crumb) = mock_session(&mut server, 2).await;

        let rejected = server
            .mock("GET", "/v7/finance/quote")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.ticker("AAPL").fast_info().await.unwrap_err();

        assert!(matches!(err, ProviderError::Upstream { status: 401, .. }));
        rejected.assert_async().await;
        crumb.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited_status() {
        let mut server = Server::new_async().await;

        let _search = server
            .mock("GET", "/v1/finance/search")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("Too Many Requests")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.fetch("AAPL", TickerMethod::News).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn test_news_passthrough() {
        let mut server = Server::new_async().await;

        let _search = server
            .mock("GET", "/v1/finance/search")
            .match_query(Matcher::UrlEncoded("q".into(), "AAPL".into()))
            .with_status(200)
            .with_body(r#"{"count":1,"quotes":[],"news":[{"uuid":"n1","title":"Apple reports"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let news = client.fetch("AAPL", TickerMethod::News).await.unwrap();
        assert_eq!(news, json!([{ "uuid": "n1", "title": "Apple reports" }]));
    }

    #[test]
    fn test_interpret_response_shapes() {
        assert!(matches!(
            interpret_response(StatusCode::OK, "<html>"),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            interpret_response(StatusCode::BAD_GATEWAY, ""),
            Err(ProviderError::Upstream { status: 502, .. })
        ));
        assert_eq!(
            interpret_response(StatusCode::OK, r#"{"a":1}"#).unwrap(),
            json!({ "a": 1 })
        );
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let body = json!({ "quoteResponse": { "result": [], "error": null } });
        let err = first_result(&body, "quoteResponse", "ZZZZ").unwrap_err();
        assert_eq!(err.to_string(), "Quote not found for symbol: ZZZZ");
    }
}
