use crate::provider::TickerProvider;
use axum::extract::FromRef;
use std::sync::Arc;

// --- Type Aliases for Shared State ---

// Provider client shared by every request
pub type SharedProvider = Arc<dyn TickerProvider>;

// Expected X-API-KEY value, `None` disables the guard
pub type SharedApiKey = Option<Arc<str>>;

// Name reported by the status endpoint
#[derive(Clone, Debug)]
pub struct NodeName(pub Arc<str>);

#[derive(Clone)]
pub struct AppState {
    pub provider: SharedProvider,
    pub api_key: SharedApiKey,
    pub node_name: NodeName,
}

impl AppState {
    pub fn new(provider: SharedProvider, api_key: Option<&str>, node_name: &str) -> Self {
        Self {
            provider,
            api_key: api_key.map(Arc::from),
            node_name: NodeName(Arc::from(node_name)),
        }
    }
}

impl FromRef<AppState> for SharedProvider {
    fn from_ref(app_state: &AppState) -> SharedProvider {
        app_state.provider.clone()
    }
}

impl FromRef<AppState> for SharedApiKey {
    fn from_ref(app_state: &AppState) -> SharedApiKey {
        app_state.api_key.clone()
    }
}

impl FromRef<AppState> for NodeName {
    fn from_ref(app_state: &AppState) -> NodeName {
        app_state.node_name.clone()
    }
}
