//! Shaping of Yahoo payloads into key/value and record structures.
//!
//! Everything here is pure: it takes the already-unwrapped `result[0]` object of
//! an upstream response and never performs I/O.

use crate::provider::QuoteInfo;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};

// Fields Yahoo ships as {raw, fmt} where the formatted text is the useful one
const FMT_FIELDS: [&str; 2] = ["regularMarketTime", "postMarketTime"];

const MAJOR_HOLDER_FIELDS: [&str; 4] = [
    "insidersPercentHeld",
    "institutionsPercentHeld",
    "institutionsFloatPercentHeld",
    "institutionsCount",
];

/// Unwraps `{raw, fmt}` pairs recursively and normalizes non-breaking spaces.
pub fn unwrap_value(key: Option<&str>, value: &Value) -> Value {
    match value {
        Value::Object(obj) if obj.contains_key("raw") && obj.contains_key("fmt") => {
            let pick = if key.is_some_and(|k| FMT_FIELDS.contains(&k)) {
                "fmt"
            } else {
                "raw"
            };
            obj.get(pick).cloned().unwrap_or(Value::Null)
        }
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), unwrap_value(Some(k), v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| unwrap_value(None, v)).collect()),
        Value::String(s) => Value::String(s.replace('\u{a0}', " ")),
        other => other.clone(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

/// Flattens a `quoteSummary` result (module name -> module fields) into one map.
pub fn flatten_summary(summary: &Value) -> QuoteInfo {
    let mut info = QuoteInfo::new();
    let Some(modules) = summary.as_object() else {
        return info;
    };

    for (module, fields) in modules {
        match fields {
            Value::Object(fields) => {
                for (key, value) in fields {
                    if key == "maxAge" {
                        continue;
                    }
                    let value = unwrap_value(Some(key), value);
                    if !is_blank(&value) {
                        info.insert(key.clone(), value);
                    }
                }
            }
            other if !is_blank(other) => {
                info.insert(module.clone(), unwrap_value(Some(module), other));
            }
            _ => {}
        }
    }

    info
}

/// Merges fields of a `v7/finance/quote` result on top of the snapshot.
pub fn merge_quote(info: &mut QuoteInfo, quote: &Value) {
    let Some(fields) = quote.as_object() else {
        return;
    };
    for (key, value) in fields {
        let value = unwrap_value(Some(key), value);
        if !is_blank(&value) {
            info.insert(key.clone(), value);
        }
    }
}

fn field(quote: &Value, key: &str) -> Option<Value> {
    quote.get(key).filter(|v| !v.is_null()).cloned()
}

/// Compact price summary built from a `v7/finance/quote` result.
pub fn fast_info(quote: &Value) -> QuoteInfo {
    let pairs: [(&str, Option<Value>); 20] = [
        ("symbol", field(quote, "symbol")),
        (
            "lastPrice",
            field(quote, "regularMarketPrice").or_else(|| field(quote, "regularMarketPreviousClose")),
        ),
        ("previousClose", field(quote, "regularMarketPreviousClose")),
        ("open", field(quote, "regularMarketOpen")),
        ("dayHigh", field(quote, "regularMarketDayHigh")),
        ("dayLow", field(quote, "regularMarketDayLow")),
        ("currency", field(quote, "currency")),
        (
            "exchange",
            field(quote, "fullExchangeName").or_else(|| field(quote, "exchange")),
        ),
        ("quoteType", field(quote, "quoteType")),
        ("timezone", field(quote, "exchangeTimezoneName")),
        ("marketState", field(quote, "marketState")),
        ("marketCap", field(quote, "marketCap")),
        ("shares", field(quote, "sharesOutstanding")),
        ("lastVolume", field(quote, "regularMarketVolume")),
        ("yearHigh", field(quote, "fiftyTwoWeekHigh")),
        ("yearLow", field(quote, "fiftyTwoWeekLow")),
        ("fiftyDayAverage", field(quote, "fiftyDayAverage")),
        ("twoHundredDayAverage", field(quote, "twoHundredDayAverage")),
        ("tenDayAverageVolume", field(quote, "averageDailyVolume10Day")),
        ("threeMonthAverageVolume", field(quote, "averageDailyVolume3Month")),
    ];

    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.unwrap_or(Value::Null)))
        .collect()
}

// --- Chart shaping ---

fn exchange_tz(chart: &Value) -> Tz {
    chart
        .pointer("/meta/exchangeTimezoneName")
        .and_then(Value::as_str)
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC)
}

fn local_time(ts: i64, tz: Tz) -> Option<DateTime<Tz>> {
    tz.timestamp_opt(ts, 0).single()
}

// Daily and longer bars are stamped at local midnight of their trading day
fn local_day_start(ts: i64, tz: Tz) -> Option<DateTime<Tz>> {
    let day = local_time(ts, tz)?.date_naive();
    tz.from_local_datetime(&day.and_hms_opt(0, 0, 0)?).earliest()
}

/// Minute and hour intervals keep their exact bar timestamps.
pub fn is_intraday(interval: &str) -> bool {
    interval.ends_with('m') || interval.ends_with('h')
}

fn number_at(series: Option<&Value>, i: usize) -> Option<f64> {
    series.and_then(|s| s.get(i)).and_then(Value::as_f64)
}

fn events<'a>(chart: &'a Value, kind: &str) -> impl Iterator<Item = &'a Value> {
    chart
        .pointer(&format!("/events/{kind}"))
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|events| events.values())
}

fn dividend_events(chart: &Value) -> BTreeMap<i64, f64> {
    events(chart, "dividends")
        .filter_map(|e| Some((e.get("date")?.as_i64()?, e.get("amount")?.as_f64()?)))
        .collect()
}

fn split_events(chart: &Value) -> BTreeMap<i64, f64> {
    events(chart, "splits")
        .filter_map(|e| {
            let date = e.get("date")?.as_i64()?;
            let numerator = e.get("numerator")?.as_f64()?;
            let denominator = e.get("denominator")?.as_f64()?;
            (denominator != 0.0).then_some((date, numerator / denominator))
        })
        .collect()
}

fn by_local_day(events: &BTreeMap<i64, f64>, tz: Tz) -> HashMap<NaiveDate, f64> {
    events
        .iter()
        .filter_map(|(ts, v)| Some((local_time(*ts, tz)?.date_naive(), *v)))
        .collect()
}

fn dated_series(events: BTreeMap<i64, f64>, tz: Tz) -> QuoteInfo {
    events
        .into_iter()
        .filter_map(|(ts, v)| Some((local_day_start(ts, tz)?.to_rfc3339(), json!(v))))
        .collect()
}

/// Bars as records, auto-adjusted by the adjusted-close ratio.
pub fn history_records(chart: &Value, interval: &str) -> Vec<Value> {
    let intraday = is_intraday(interval);
    let tz = exchange_tz(chart);
    let Some(timestamps) = chart.get("timestamp").and_then(Value::as_array) else {
        return Vec::new();
    };

    let quote = chart.pointer("/indicators/quote/0");
    let opens = quote.and_then(|q| q.get("open"));
    let highs = quote.and_then(|q| q.get("high"));
    let lows = quote.and_then(|q| q.get("low"));
    let closes = quote.and_then(|q| q.get("close"));
    let volumes = quote.and_then(|q| q.get("volume"));
    let adjcloses = chart.pointer("/indicators/adjclose/0/adjclose");

    let dividends = by_local_day(&dividend_events(chart), tz);
    let splits = by_local_day(&split_events(chart), tz);

    let mut records = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(time) = ts.as_i64().and_then(|secs| {
            if intraday {
                local_time(secs, tz)
            } else {
                local_day_start(secs, tz)
            }
        }) else {
            continue;
        };

        let open = number_at(opens, i);
        let high = number_at(highs, i);
        let low = number_at(lows, i);
        let close = number_at(closes, i);
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
            continue;
        }

        let adjclose = number_at(adjcloses, i);
        let ratio = match (adjclose, close) {
            (Some(adj), Some(c)) if c != 0.0 => adj / c,
            _ => 1.0,
        };
        let volume = volumes.and_then(|v| v.get(i)).and_then(Value::as_u64);
        let day = time.date_naive();

        records.push(json!({
            "Date": time.to_rfc3339(),
            "Open": open.map(|v| v * ratio),
            "High": high.map(|v| v * ratio),
            "Low": low.map(|v| v * ratio),
            "Close": adjclose.or(close),
            "Volume": volume,
            "Dividends": dividends.get(&day).copied().unwrap_or(0.0),
            "Stock Splits": splits.get(&day).copied().unwrap_or(0.0),
        }));
    }

    records
}

/// Dividend amounts keyed by ex-date, ascending.
pub fn dividends(chart: &Value) -> QuoteInfo {
    dated_series(dividend_events(chart), exchange_tz(chart))
}

/// Split ratios keyed by date, ascending.
pub fn splits(chart: &Value) -> QuoteInfo {
    dated_series(split_events(chart), exchange_tz(chart))
}

// --- quoteSummary module shaping ---

fn raw(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::Object(obj) => obj.get("raw").cloned(),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn date_of(value: Option<&Value>) -> Option<String> {
    let ts = raw(value)?.as_i64()?;
    DateTime::<Utc>::from_timestamp(ts, 0).map(|t| t.date_naive().to_string())
}

pub fn recommendation_records(summary: &Value) -> Vec<Value> {
    summary
        .pointer("/recommendationTrend/trend")
        .and_then(Value::as_array)
        .map(|trend| {
            trend
                .iter()
                .map(|row| {
                    json!({
                        "period": raw(row.get("period")),
                        "strongBuy": raw(row.get("strongBuy")),
                        "buy": raw(row.get("buy")),
                        "hold": raw(row.get("hold")),
                        "sell": raw(row.get("sell")),
                        "strongSell": raw(row.get("strongSell")),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn calendar(summary: &Value) -> QuoteInfo {
    let mut out = Map::new();
    let Some(events) = summary.get("calendarEvents") else {
        return out;
    };

    if let Some(date) = date_of(events.get("dividendDate")) {
        out.insert("Dividend Date".to_string(), json!(date));
    }
    if let Some(date) = date_of(events.get("exDividendDate")) {
        out.insert("Ex-Dividend Date".to_string(), json!(date));
    }

    if let Some(earnings) = events.get("earnings") {
        if let Some(dates) = earnings.get("earningsDate").and_then(Value::as_array) {
            let dates: Vec<String> = dates.iter().filter_map(|d| date_of(Some(d))).collect();
            out.insert("Earnings Date".to_string(), json!(dates));
        }
        for (key, label) in [
            ("earningsHigh", "Earnings High"),
            ("earningsLow", "Earnings Low"),
            ("earningsAverage", "Earnings Average"),
            ("revenueHigh", "Revenue High"),
            ("revenueLow", "Revenue Low"),
            ("revenueAverage", "Revenue Average"),
        ] {
            if let Some(value) = raw(earnings.get(key)) {
                out.insert(label.to_string(), value);
            }
        }
    }

    out
}

pub fn major_holders(summary: &Value) -> Vec<Value> {
    let Some(breakdown) = summary.get("majorHoldersBreakdown") else {
        return Vec::new();
    };
    MAJOR_HOLDER_FIELDS
        .iter()
        .filter_map(|key| {
            raw(breakdown.get(*key)).map(|value| json!({ "Breakdown": key, "Value": value }))
        })
        .collect()
}

pub fn institutional_holders(summary: &Value) -> Vec<Value> {
    summary
        .pointer("/institutionOwnership/ownershipList")
        .and_then(Value::as_array)
        .map(|holders| {
            holders
                .iter()
                .map(|h| {
                    json!({
                        "Date Reported": date_of(h.get("reportDate")),
                        "Holder": raw(h.get("organization")),
                        "pctHeld": raw(h.get("pctHeld")),
                        "Shares": raw(h.get("position")),
                        "Value": raw(h.get("value")),
                        "pctChange": raw(h.get("pctChange")),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
