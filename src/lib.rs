//! Portfolio Summary - daily investment portfolio valuation
//!
//! For each report date this library stores the market quote of every held
//! instrument, values each open position (quantity x price, cash at face
//! value) and writes the portfolio total, all in a SQLite database.

pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod pricing;
pub mod reports;
pub mod trading_day;
pub mod utils;
