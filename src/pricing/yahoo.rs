use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{Ohlc, PriceLookup, PriceSource};
use crate::error::SummaryError;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Yahoo Finance chart response
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Meta {
    /// Exchange offset from UTC in seconds, used to date each bar
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

/// Daily OHLC from the Yahoo Finance chart API (unadjusted prices)
pub struct YahooPriceSource {
    client: Client,
    base_url: String,
}

impl YahooPriceSource {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Point the client at another chart API host (mirrors, local stubs)
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; PortfolioSummary/1.0)")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<String> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid start date"))?
            .and_utc()
            .timestamp();
        let period2 = end
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid end date"))?
            .and_utc()
            .timestamp();

        Ok(format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            encode_symbol(symbol),
            period1,
            period2
        ))
    }
}

impl PriceSource for YahooPriceSource {
    fn fetch_ohlc(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceLookup> {
        let url = self.chart_url(symbol, start, end)?;
        info!("Fetching prices for {} from {} to {}", symbol, start, end);

        let response = self
            .client
            .get(&url)
            .send()
            .context("Failed to send request to Yahoo Finance")?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Yahoo Finance has no chart for {}", symbol);
            return Ok(PriceLookup::NoData);
        }
        if !status.is_success() {
            return Err(SummaryError::Pricing(format!(
                "Yahoo Finance returned error status {} for {}",
                status, symbol
            ))
            .into());
        }

        let body = response
            .text()
            .context("Failed to read Yahoo Finance response")?;

        parse_chart_response(&body, start, end)
    }
}

/// Percent-encode the characters Yahoo symbols use that are not URL-safe
fn encode_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .map(|c| match c {
            '^' => "%5E".to_string(),
            '=' => "%3D".to_string(),
            '&' => "%26".to_string(),
            ' ' => "%20".to_string(),
            '$' => "%24".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Extract the first complete daily bar dated inside `[start, end)`
fn parse_chart_response(body: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceLookup> {
    let data: YahooChartResponse =
        serde_json::from_str(body).context("Failed to parse Yahoo Finance response")?;

    if let Some(error) = data.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Ok(PriceLookup::NoData);
        }
        return Err(SummaryError::Pricing(format!(
            "Yahoo Finance API error: {} - {}",
            error.code, error.description
        ))
        .into());
    }

    let Some(result) = data.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceLookup::NoData);
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(PriceLookup::NoData);
    };

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();

    let value_at = |series: &[Option<f64>], i: usize| -> Option<Decimal> {
        series
            .get(i)
            .copied()
            .flatten()
            .and_then(|v| Decimal::try_from(v).ok())
    };

    for (i, &timestamp) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(timestamp + result.meta.gmtoffset, 0)
            .ok_or_else(|| anyhow!("Invalid timestamp {}", timestamp))?
            .date_naive();

        if date < start || date >= end {
            continue;
        }

        let bar = (
            value_at(&opens, i),
            value_at(&highs, i),
            value_at(&lows, i),
            value_at(&closes, i),
        );
        if let (Some(open), Some(high), Some(low), Some(close)) = bar {
            return Ok(PriceLookup::Priced(Ohlc {
                open,
                high,
                low,
                close,
            }));
        }
        debug!("Skipping incomplete bar on {}", date);
    }

    Ok(PriceLookup::NoData)
}
