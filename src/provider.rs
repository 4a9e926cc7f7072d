use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Provider-shaped informational snapshot. Field names and types belong to the provider.
pub type QuoteInfo = Map<String, Value>;

/// Operations reachable through `/data/{method}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TickerMethod {
    Info,
    FastInfo,
    History,
    Dividends,
    Splits,
    Recommendations,
    Calendar,
    MajorHolders,
    InstitutionalHolders,
    News,
}

impl TickerMethod {
    pub const ALL: [TickerMethod; 10] = [
        TickerMethod::Info,
        TickerMethod::FastInfo,
        TickerMethod::History,
        TickerMethod::Dividends,
        TickerMethod::Splits,
        TickerMethod::Recommendations,
        TickerMethod::Calendar,
        TickerMethod::MajorHolders,
        TickerMethod::InstitutionalHolders,
        TickerMethod::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TickerMethod::Info => "info",
            TickerMethod::FastInfo => "fast_info",
            TickerMethod::History => "history",
            TickerMethod::Dividends => "dividends",
            TickerMethod::Splits => "splits",
            TickerMethod::Recommendations => "recommendations",
            TickerMethod::Calendar => "calendar",
            TickerMethod::MajorHolders => "major_holders",
            TickerMethod::InstitutionalHolders => "institutional_holders",
            TickerMethod::News => "news",
        }
    }
}

impl fmt::Display for TickerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticker has no attribute '{}'", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for TickerMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TickerMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Data-provider seam used by the HTTP layer.
///
/// Implementations receive the symbol exactly as the caller sent it.
#[async_trait]
pub trait TickerProvider: Send + Sync {
    /// Current informational snapshot for `symbol`.
    async fn info(&self, symbol: &str) -> Result<QuoteInfo, ProviderError>;

    /// Runs one of the dynamic operations for `symbol`.
    async fn fetch(&self, symbol: &str, method: TickerMethod) -> Result<Value, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_round_trip() {
        for method in TickerMethod::ALL {
            assert_eq!(method.as_str().parse::<TickerMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_unknown_method_message() {
        let err = "dividend_yield".parse::<TickerMethod>().unwrap_err();
        assert_eq!(err.to_string(), "Ticker has no attribute 'dividend_yield'");
        // Names are case-sensitive
        assert!("Info".parse::<TickerMethod>().is_err());
    }
}
