// Pricing module - market data source abstraction and Yahoo Finance client

pub mod yahoo;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub use yahoo::YahooPriceSource;

/// Open/high/low/close prices of an instrument for one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ohlc {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Ohlc {
    /// Apply `f` to each of the four prices
    pub fn map(self, f: impl Fn(Decimal) -> Decimal) -> Self {
        Self {
            open: f(self.open),
            high: f(self.high),
            low: f(self.low),
            close: f(self.close),
        }
    }
}

/// Outcome of a price lookup that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceLookup {
    Priced(Ohlc),
    /// The source has no trading data for the symbol in the requested range
    NoData,
}

/// A provider of daily OHLC data
///
/// `start` is inclusive and `end` exclusive. An empty range result is
/// `PriceLookup::NoData`, not an error.
pub trait PriceSource {
    fn fetch_ohlc(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceLookup>;
}

impl<S: PriceSource + ?Sized> PriceSource for &S {
    fn fetch_ohlc(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceLookup> {
        (**self).fetch_ohlc(symbol, start, end)
    }
}

impl<S: PriceSource + ?Sized> PriceSource for Box<S> {
    fn fetch_ohlc(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceLookup> {
        (**self).fetch_ohlc(symbol, start, end)
    }
}

type CacheKey = (String, NaiveDate, NaiveDate);

/// Price fetcher that remembers every answer for the lifetime of a run.
///
/// The quote update, the report line build and the trading-day check all ask
/// for the same (symbol, day) pairs; only the first ask reaches the source.
/// Failures are not cached.
pub struct PriceFetcher<S> {
    source: S,
    cache: Arc<Mutex<HashMap<CacheKey, PriceLookup>>>,
}

impl<S: PriceSource> PriceFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CacheKey, PriceLookup>>> {
        self.cache
            .lock()
            .map_err(|_| anyhow!("price cache lock poisoned"))
    }
}

impl<S: PriceSource> PriceSource for PriceFetcher<S> {
    fn fetch_ohlc(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceLookup> {
        let key = (symbol.to_string(), start, end);

        if let Some(hit) = self.lock_cache()?.get(&key) {
            debug!("Using cached prices for {} [{}, {})", symbol, start, end);
            return Ok(*hit);
        }

        let lookup = self.source.fetch_ohlc(symbol, start, end)?;
        self.lock_cache()?.insert(key, lookup);
        Ok(lookup)
    }
}
