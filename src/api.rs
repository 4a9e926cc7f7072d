use crate::data_structures::{AppState, NodeName, SharedApiKey, SharedProvider};
use crate::error::ApiError;
use crate::provider::{QuoteInfo, TickerMethod};
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

pub const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub symbol: Option<String>,
    pub symbols: Option<String>,
}

impl DataQuery {
    /// `symbol` wins over `symbols`; `None` when neither names anything.
    fn symbol_list(&self) -> Option<Vec<String>> {
        if let Some(symbol) = self.symbol.as_deref().filter(|s| !s.is_empty()) {
            return Some(vec![symbol.trim().to_string()]);
        }
        self.symbols.as_deref().filter(|s| !s.is_empty()).map(|symbols| {
            symbols
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

pub fn router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/", get(root_handler))
        .route("/data/{method}", get(get_data_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/quote/{symbol}", get(get_quote_handler))
        .merge(guarded)
        .with_state(state)
}

#[instrument(skip(provider))]
pub async fn get_quote_handler(
    State(provider): State<SharedProvider>,
    Path(symbol): Path<String>,
) -> Result<Json<QuoteInfo>, ApiError> {
    debug!("Received quote request");

    let info = provider.info(&symbol).await?;

    info!(field_count = info.len(), "Returning quote snapshot");
    Ok(Json(info))
}

#[instrument(skip(provider, query), fields(symbol = ?query.symbol, symbols = ?query.symbols))]
pub async fn get_data_handler(
    State(provider): State<SharedProvider>,
    Path(method): Path<String>,
    Query(query): Query<DataQuery>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let Some(symbols) = query.symbol_list() else {
        warn!("Data request without symbols");
        return Err(ApiError::BadRequest(
            "Must provide either `symbol` or `symbols` query parameter.".to_string(),
        ));
    };

    let parsed = method.parse::<TickerMethod>();
    let outcomes = join_all(symbols.iter().map(|symbol| {
        let provider = provider.clone();
        let parsed = parsed.clone();
        async move {
            match parsed {
                Ok(method) => provider
                    .fetch(symbol, method)
                    .await
                    .unwrap_or_else(|e| json!({ "error": e.to_string() })),
                Err(unknown) => json!({ "error": unknown.to_string() }),
            }
        }
    }))
    .await;

    let mut results = Map::new();
    let mut failed = 0usize;
    for (symbol, outcome) in symbols.into_iter().zip(outcomes) {
        if outcome.get("error").is_some() {
            failed += 1;
        }
        results.insert(symbol, outcome);
    }

    info!(requested = results.len(), failed, "Returning data results");
    Ok(Json(results))
}

#[instrument(skip(node))]
pub async fn root_handler(State(node): State<NodeName>) -> impl IntoResponse {
    let methods: Vec<&str> = TickerMethod::ALL.iter().map(TickerMethod::as_str).collect();

    (
        StatusCode::OK,
        Json(json!({
            "status": "YFinance Dynamic API is live",
            "dynamic_endpoint": "/data/{method}?symbols=... or &symbol=...",
            "note": "`method` corresponds to any yfinance.Ticker property or zero-arg method",
            "node": node.0.as_ref(),
            "quote_endpoint": "/quote/{symbol}",
            "methods": methods,
        })),
    )
}

pub async fn require_api_key(
    State(expected): State<SharedApiKey>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    // No configured key rejects everything
    let provided = headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok());
    if expected.is_none() || provided != expected.as_deref() {
        warn!(path = %request.uri().path(), has_key = provided.is_some(), "Rejected request with bad API key");
        return ApiError::Forbidden("Invalid or missing API Key".to_string()).into_response();
    }

    next.run(request).await
}
