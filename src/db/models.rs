use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reserved symbol for the cash position. Never priced.
pub const CASH_SYMBOL: &str = "$$$$";

/// Instrument held in the portfolio (row of `stocks`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub name: String,
}

impl Stock {
    pub fn is_cash(&self) -> bool {
        self.symbol == CASH_SYMBOL
    }
}

/// Signed quantity change for a stock on a date (row of `portfolio`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub date: NaiveDate,
    pub stock_id: i64,
    pub quantity: Decimal,
}

/// Aggregated position of one stock as of a date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    pub quantity: Decimal,
}

impl Holding {
    pub fn is_cash(&self) -> bool {
        self.symbol == CASH_SYMBOL
    }
}

/// Per-share prices of a stock on a date (row of `quotes`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub date: NaiveDate,
    pub stock_id: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Valuation of one holding on a date (row of `report_lines`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportLine {
    pub date: NaiveDate,
    pub stock_name: String,
    pub stock_symbol: String,
    pub quantity: Decimal,
    pub open_value: Decimal,
    pub high_value: Decimal,
    pub low_value: Decimal,
    pub close_value: Decimal,
}

/// Total valuation of the portfolio on a date (row of `report_summary`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSummary {
    pub date: NaiveDate,
    pub open_value: Decimal,
    pub high_value: Decimal,
    pub low_value: Decimal,
    pub close_value: Decimal,
}
