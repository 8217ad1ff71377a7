//! Utility functions for rounding and formatting money values
//!
//! Every price and value persisted by a run goes through [`round_money`], and
//! the CLI renders stored values with [`format_money`].

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for prices and values
pub const MONEY_DP: u32 = 2;

/// Round to two decimal places, ties to even.
///
/// # Examples
/// ```
/// use portfolio_summary::utils::round_money;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round_money(dec!(61.2349)), dec!(61.23));
/// assert_eq!(round_money(dec!(0.125)), dec!(0.12));
/// assert_eq!(round_money(dec!(0.135)), dec!(0.14));
/// ```
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointNearestEven)
}

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "$" prefix
    Dollar,
    /// No currency symbol (for table cells)
    None,
}

/// Core formatting function with full control over output.
///
/// Uses `,` as thousands separator and `.` as decimal separator, with the
/// value rounded to two places. `width` right-aligns the result (0 disables
/// padding).
///
/// # Examples
/// ```
/// use portfolio_summary::utils::{format_money_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_money_with_width(dec!(1234.56), 0, CurrencySymbol::Dollar),
///     "$1,234.56"
/// );
///
/// assert_eq!(
///     format_money_with_width(dec!(1234), 12, CurrencySymbol::None),
///     "    1,234.00"
/// );
/// ```
pub fn format_money_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = format!("{:.2}", round_money(value.abs()));
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let digits: Vec<char> = integer_part.chars().collect();
    let mut with_separators = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            with_separators.push(',');
        }
        with_separators.push(*c);
    }

    let sign = if is_negative { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::Dollar => "$",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{}{}.{}", sign, prefix, with_separators, decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format with dollar sign: "$1,234.56"
///
/// # Examples
/// ```
/// use portfolio_summary::utils::format_money;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_money(dec!(1234.56)), "$1,234.56");
/// assert_eq!(format_money(dec!(-500)), "-$500.00");
/// ```
pub fn format_money(value: Decimal) -> String {
    format_money_with_width(value, 0, CurrencySymbol::Dollar)
}

/// Format number only (no symbol): "1,234.56"
pub fn format_decimal(value: Decimal) -> String {
    format_money_with_width(value, 0, CurrencySymbol::None)
}
