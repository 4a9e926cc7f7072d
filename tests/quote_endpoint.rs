use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use yfinance_proxy::api;
use yfinance_proxy::config::YahooEndpoints;
use yfinance_proxy::data_structures::AppState;
use yfinance_proxy::yahoo::YahooClient;

const API_KEY: &str = "it-key";

async fn upstream_session(server: &mut ServerGuard) -> Vec<Mock> {
    vec![
        server
            .mock("GET", "/cookie")
            .with_status(404)
            .create_async()
            .await,
        server
            .mock("GET", "/v1/test/getcrumb")
            .with_status(200)
            .with_body("crumb-1")
            .create_async()
            .await,
    ]
}

fn app(server: &ServerGuard) -> axum::Router {
    let endpoints = YahooEndpoints {
        query_url: server.url(),
        cookie_url: format!("{}/cookie", server.url()),
    };
    let client = YahooClient::new(endpoints, Duration::from_secs(5)).unwrap();
    api::router(AppState::new(Arc::new(client), Some(API_KEY), "it-node"))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(api::API_KEY_HEADER, API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

#[tokio::test]
async fn quote_endpoint_returns_upstream_snapshot() {
    let mut server = Server::new_async().await;
    let _session = upstream_session(&mut server).await;

    let _summary = server
        .mock("GET", "/v10/finance/quoteSummary/aapl")
        .match_query(Matcher::UrlEncoded("crumb".into(), "crumb-1".into()))
        .with_status(200)
        .with_body(
            json!({
                "quoteSummary": {
                    "result": [{
                        "quoteType": { "symbol": "AAPL", "longName": "Apple\u{a0}Inc." },
                        "financialData": { "currentPrice": { "raw": 191.2, "fmt": "191.20" } }
                    }],
                    "error": null
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _quote = server
        .mock("GET", "/v7/finance/quote")
        .match_query(Matcher::UrlEncoded("symbols".into(), "aapl".into()))
        .with_status(200)
        .with_body(r#"{"quoteResponse":{"result":[{"symbol":"AAPL","marketState":"REGULAR"}],"error":null}}"#)
        .create_async()
        .await;

    let (status, body) = get(app(&server), "/quote/aapl").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["longName"], json!("Apple Inc."));
    assert_eq!(body["currentPrice"], json!(191.2));
    assert_eq!(body["marketState"], json!("REGULAR"));
    // Provider's canonical symbol is not rewritten
    assert_eq!(body["symbol"], json!("AAPL"));
}

#[tokio::test]
async fn quote_endpoint_unknown_symbol_is_server_error() {
    let mut server = Server::new_async().await;
    let _session = upstream_session(&mut server).await;

    let _missing = server
        .mock("GET", "/v10/finance/quoteSummary/NOPE123")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found for symbol: NOPE123"}}}"#)
        .create_async()
        .await;

    let (status, body) = get(app(&server), "/quote/NOPE123").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, b"Internal Server Error");
}

#[tokio::test]
async fn data_endpoint_reports_upstream_failures_per_symbol() {
    let mut server = Server::new_async().await;

    let _msft = server
        .mock("GET", "/v8/finance/chart/MSFT")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "chart": {
                    "result": [{
                        "meta": { "exchangeTimezoneName": "America/New_York" },
                        "timestamp": [1699281000],
                        "indicators": {
                            "quote": [{ "open": [352.1], "high": [357.0], "low": [351.0], "close": [356.5], "volume": [23828300] }],
                            "adjclose": [{ "adjclose": [356.5] }]
                        }
                    }],
                    "error": null
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _gone = server
        .mock("GET", "/v8/finance/chart/GONE")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#)
        .create_async()
        .await;

    let (status, body) = get(app(&server), "/data/history?symbols=MSFT,GONE").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["MSFT"][0]["Date"], json!("2023-11-06T00:00:00-05:00"));
    assert_eq!(body["MSFT"][0]["Close"], json!(356.5));
    assert_eq!(body["MSFT"][0]["Volume"], json!(23828300));
    assert_eq!(body["GONE"], json!({ "error": "No data found, symbol may be delisted" }));
}
