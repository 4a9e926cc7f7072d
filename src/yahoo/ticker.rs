use super::{YahooClient, format};
use crate::error::ProviderError;
use crate::provider::{QuoteInfo, TickerMethod};
use serde_json::Value;
use tracing::{instrument, warn};

const INFO_MODULES: [&str; 5] = [
    "financialData",
    "quoteType",
    "defaultKeyStatistics",
    "assetProfile",
    "summaryDetail",
];

const HISTORY_RANGE: &str = "1mo";
const HISTORY_INTERVAL: &str = "1d";

/// A client handle scoped to a single symbol.
pub struct Ticker<'a> {
    client: &'a YahooClient,
    symbol: String,
}

impl<'a> Ticker<'a> {
    pub(super) fn new(client: &'a YahooClient, symbol: &str) -> Self {
        Self {
            client,
            symbol: symbol.to_string(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Full informational snapshot: summary modules plus live quote fields.
    #[instrument(skip(self), fields(symbol = %self.symbol))]
    pub async fn info(&self) -> Result<QuoteInfo, ProviderError> {
        let summary = self.client.quote_summary(&self.symbol, &INFO_MODULES).await?;
        let mut info = format::flatten_summary(&summary);

        match self.client.quote(&self.symbol).await {
            Ok(quote) => format::merge_quote(&mut info, &quote),
            Err(e) => warn!(error = %e, "Live quote unavailable, returning summary fields only"),
        }

        Ok(info)
    }

    pub async fn fast_info(&self) -> Result<QuoteInfo, ProviderError> {
        let quote = self.client.quote(&self.symbol).await?;
        Ok(format::fast_info(&quote))
    }

    pub async fn history(&self, range: &str, interval: &str) -> Result<Vec<Value>, ProviderError> {
        let chart = self.client.chart(&self.symbol, range, interval, "div,splits").await?;
        Ok(format::history_records(&chart, interval))
    }

    pub async fn dividends(&self) -> Result<QuoteInfo, ProviderError> {
        let chart = self.client.chart(&self.symbol, "max", "1d", "div").await?;
        Ok(format::dividends(&chart))
    }

    pub async fn splits(&self) -> Result<QuoteInfo, ProviderError> {
        let chart = self.client.chart(&self.symbol, "max", "1d", "split").await?;
        Ok(format::splits(&chart))
    }

    pub async fn recommendations(&self) -> Result<Vec<Value>, ProviderError> {
        let summary = self.client.quote_summary(&self.symbol, &["recommendationTrend"]).await?;
        Ok(format::recommendation_records(&summary))
    }

    pub async fn calendar(&self) -> Result<QuoteInfo, ProviderError> {
        let summary = self.client.quote_summary(&self.symbol, &["calendarEvents"]).await?;
        Ok(format::calendar(&summary))
    }

    pub async fn major_holders(&self) -> Result<Vec<Value>, ProviderError> {
        let summary = self.client.quote_summary(&self.symbol, &["majorHoldersBreakdown"]).await?;
        Ok(format::major_holders(&summary))
    }

    pub async fn institutional_holders(&self) -> Result<Vec<Value>, ProviderError> {
        let summary = self.client.quote_summary(&self.symbol, &["institutionOwnership"]).await?;
        Ok(format::institutional_holders(&summary))
    }

    pub async fn news(&self) -> Result<Value, ProviderError> {
        let search = self.client.search(&self.symbol).await?;
        Ok(search.get("news").cloned().unwrap_or_else(|| Value::Array(Vec::new())))
    }

    /// Runs `method` and returns its result as JSON.
    #[instrument(skip(self), fields(symbol = %self.symbol))]
    pub async fn fetch(&self, method: TickerMethod) -> Result<Value, ProviderError> {
        let value = match method {
            TickerMethod::Info => Value::Object(self.info().await?),
            TickerMethod::FastInfo => Value::Object(self.fast_info().await?),
            TickerMethod::History => {
                Value::Array(self.history(HISTORY_RANGE, HISTORY_INTERVAL).await?)
            }
            TickerMethod::Dividends => Value::Object(self.dividends().await?),
            TickerMethod::Splits => Value::Object(self.splits().await?),
            TickerMethod::Recommendations => Value::Array(self.recommendations().await?),
            TickerMethod::Calendar => Value::Object(self.calendar().await?),
            TickerMethod::MajorHolders => Value::Array(self.major_holders().await?),
            TickerMethod::InstitutionalHolders => Value::Array(self.institutional_holders().await?),
            TickerMethod::News => self.news().await?,
        };
        Ok(value)
    }
}
