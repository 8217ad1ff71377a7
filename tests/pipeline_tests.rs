//! End-to-end tests of the daily summary pipeline
//!
//! These run the full trading-day check + quotes + report lines + summary
//! sequence against a temporary SQLite database and an in-memory market:
//! - Held quantity as the running sum of transactions
//! - Cash valued at face value
//! - Invalid trading days leave the store untouched
//! - Missing and failing instruments are skipped without blocking others
//! - Re-runs overwrite instead of duplicating
//! - Summary equals the sum of the lines


use anyhow::Result;
use portfolio_summary::db::{self, Table, CASH_SYMBOL};
use portfolio_summary::pipeline::{DateStatus, Pipeline};
use portfolio_summary::pricing::{Ohlc, PriceFetcher};
use portfolio_summary::reports::ItemOutcome;
use rust_decimal_macros::dec;
use sqlite_helpers::{add_transaction, create_test_db, date, FakeMarket};

#[test]
fn test_position_of_seven_valued_at_seventy() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    add_transaction(&conn, "2023-01-03", abc, dec!(10))?;
    add_transaction(&conn, "2023-01-10", abc, dec!(-3))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-13", dec!(60))
        .with_price("ABC", "2023-01-13", dec!(10.00));

    Pipeline::new(&conn, &market, "KO").run_date(date("2023-01-13"))?;

    let lines = db::get_report_lines(&conn, date("2023-01-13"))?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].stock_symbol, "ABC");
    assert_eq!(lines[0].quantity, dec!(7));
    assert_eq!(lines[0].open_value, dec!(70.00));
    assert_eq!(lines[0].high_value, dec!(77.00));
    assert_eq!(lines[0].low_value, dec!(63.00));

    let quotes = db::get_quotes_on(&conn, date("2023-01-13"))?;
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].open, dec!(10.00));
    Ok(())
}

#[test]
fn test_cash_line_equals_quantity() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let cash = db::insert_stock(&conn, CASH_SYMBOL, "Cash")?;
    add_transaction(&conn, "2023-01-01", cash, dec!(1000))?;

    let market = FakeMarket::new().with_price("KO", "2023-02-01", dec!(60));
    Pipeline::new(&conn, &market, "KO").run_date(date("2023-02-01"))?;

    let lines = db::get_report_lines(&conn, date("2023-02-01"))?;
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line.quantity, dec!(1000));
    assert_eq!(line.open_value, dec!(1000));
    assert_eq!(line.high_value, dec!(1000));
    assert_eq!(line.low_value, dec!(1000));
    assert_eq!(line.close_value, dec!(1000));

    // Cash is never sent to the price source
    assert_eq!(market.lookups_of(CASH_SYMBOL), 0);
    Ok(())
}

#[test]
fn test_cash_with_sub_cent_balance_keeps_full_precision() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let cash = db::insert_stock(&conn, CASH_SYMBOL, "Cash")?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    add_transaction(&conn, "2023-01-02", cash, dec!(100.125))?;
    add_transaction(&conn, "2023-01-02", abc, dec!(2))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-03", dec!(60))
        .with_price("ABC", "2023-01-03", dec!(10.00));
    Pipeline::new(&conn, &market, "KO").run_date(date("2023-01-03"))?;

    let lines = db::get_report_lines(&conn, date("2023-01-03"))?;
    let cash_line = lines
        .iter()
        .find(|l| l.stock_symbol == CASH_SYMBOL)
        .expect("cash line");
    assert_eq!(cash_line.quantity, dec!(100.125));
    for value in [
        cash_line.open_value,
        cash_line.high_value,
        cash_line.low_value,
        cash_line.close_value,
    ] {
        assert_eq!(value, cash_line.quantity);
    }

    let summary = db::get_report_summary(&conn, date("2023-01-03"))?.expect("summary row");
    assert_eq!(summary.open_value, dec!(120.125));
    assert_eq!(summary.close_value, dec!(120.125));
    Ok(())
}

#[test]
fn test_rerun_after_position_closed_drops_its_line() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    add_transaction(&conn, "2023-01-02", abc, dec!(5))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-03", dec!(60))
        .with_price("ABC", "2023-01-03", dec!(10));
    let pipeline = Pipeline::new(&conn, &market, "KO");

    pipeline.run_date(date("2023-01-03"))?;
    assert_eq!(db::get_report_lines(&conn, date("2023-01-03"))?.len(), 1);
    assert!(db::get_report_summary(&conn, date("2023-01-03"))?.is_some());

    // Sale recorded late for the same day
    add_transaction(&conn, "2023-01-03", abc, dec!(-5))?;
    let report = pipeline.run_date(date("2023-01-03"))?;

    assert!(db::get_holdings_as_of(&conn, date("2023-01-03"))?.is_empty());
    assert!(db::get_report_lines(&conn, date("2023-01-03"))?.is_empty());
    assert!(db::get_report_summary(&conn, date("2023-01-03"))?.is_none());
    assert!(!report.report_lines.has_rows());
    assert!(!report.report_summary.has_rows());
    Ok(())
}

#[test]
fn test_weekend_writes_nothing() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    add_transaction(&conn, "2023-01-03", abc, dec!(10))?;

    // ABC has a (bogus) bar on Saturday, KO does not
    let market = FakeMarket::new().with_price("ABC", "2023-01-07", dec!(10));
    let outcome = Pipeline::new(&conn, &market, "KO").run_batch(&["2023-01-07".to_string()]);

    assert!(matches!(outcome.runs[0].status, DateStatus::InvalidTradingDay));
    for table in [Table::Quotes, Table::ReportLines, Table::ReportSummary] {
        assert_eq!(db::count_rows_on(&conn, table, date("2023-01-07"))?, 0);
    }
    assert_eq!(market.lookups_of("ABC"), 0);
    Ok(())
}

#[test]
fn test_unpriced_stock_absent_while_others_processed() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    let gone = db::insert_stock(&conn, "GONE", "Delisted Inc")?;
    let flaky = db::insert_stock(&conn, "FLKY", "Flaky Ltd")?;
    add_transaction(&conn, "2023-01-02", abc, dec!(1))?;
    add_transaction(&conn, "2023-01-02", gone, dec!(5))?;
    add_transaction(&conn, "2023-01-02", flaky, dec!(5))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-03", dec!(60))
        .with_price("ABC", "2023-01-03", dec!(25.5))
        .failing("FLKY");

    let report = Pipeline::new(&conn, &market, "KO").run_date(date("2023-01-03"))?;

    assert_eq!(report.quotes.skipped_symbols(), vec!["GONE"]);
    assert_eq!(report.quotes.failed_symbols(), vec!["FLKY"]);
    assert_eq!(report.report_lines.skipped_symbols(), vec!["GONE"]);
    assert!(matches!(
        report.report_lines.items.iter().find(|(s, _)| s == "FLKY"),
        Some((_, ItemOutcome::Failed(_)))
    ));

    let quotes = db::get_quotes_on(&conn, date("2023-01-03"))?;
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].stock_id, abc);

    let symbols: Vec<String> = db::get_report_lines(&conn, date("2023-01-03"))?
        .into_iter()
        .map(|l| l.stock_symbol)
        .collect();
    assert_eq!(symbols, vec!["ABC"]);

    let summary = db::get_report_summary(&conn, date("2023-01-03"))?.expect("summary row");
    assert_eq!(summary.open_value, dec!(25.50));
    Ok(())
}

#[test]
fn test_closed_positions_are_excluded() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    let short = db::insert_stock(&conn, "SHRT", "Short Co")?;
    add_transaction(&conn, "2023-01-02", abc, dec!(4))?;
    add_transaction(&conn, "2023-01-03", abc, dec!(-4))?;
    add_transaction(&conn, "2023-01-02", short, dec!(-2))?;
    // After the report date, must not count
    add_transaction(&conn, "2023-01-05", abc, dec!(9))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-04", dec!(60))
        .with_price("ABC", "2023-01-04", dec!(10))
        .with_price("SHRT", "2023-01-04", dec!(10));

    let report = Pipeline::new(&conn, &market, "KO").run_date(date("2023-01-04"))?;

    assert!(db::get_report_lines(&conn, date("2023-01-04"))?.is_empty());
    assert!(!report.report_lines.has_rows());
    // Quotes are still stored for every listed stock
    assert_eq!(report.quotes.rows_on_date, 2);
    // Nothing to sum: no summary row
    assert!(!report.report_summary.has_rows());
    assert!(db::get_report_summary(&conn, date("2023-01-04"))?.is_none());
    Ok(())
}

#[test]
fn test_rerun_is_idempotent() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    let cash = db::insert_stock(&conn, CASH_SYMBOL, "Cash")?;
    add_transaction(&conn, "2023-01-02", abc, dec!(3))?;
    add_transaction(&conn, "2023-01-02", cash, dec!(250.75))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-03", dec!(60))
        .with_price("ABC", "2023-01-03", dec!(33.333));
    let pipeline = Pipeline::new(&conn, &market, "KO");

    pipeline.run_date(date("2023-01-03"))?;
    let quotes = db::list_quotes(&conn)?;
    let lines = db::get_report_lines(&conn, date("2023-01-03"))?;
    let summary = db::get_report_summary(&conn, date("2023-01-03"))?;

    let second = pipeline.run_date(date("2023-01-03"))?;

    assert_eq!(db::list_quotes(&conn)?, quotes);
    assert_eq!(db::get_report_lines(&conn, date("2023-01-03"))?, lines);
    assert_eq!(db::get_report_summary(&conn, date("2023-01-03"))?, summary);
    assert_eq!(second.quotes.rows_on_date, 1);
    assert_eq!(second.report_lines.rows_on_date, 2);
    assert_eq!(second.report_summary.rows_on_date, 1);
    Ok(())
}

#[test]
fn test_summary_is_sum_of_lines_and_values_are_rounded() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let a = db::insert_stock(&conn, "AAA", "Alpha")?;
    let b = db::insert_stock(&conn, "BBB", "Beta")?;
    let cash = db::insert_stock(&conn, CASH_SYMBOL, "Cash")?;
    add_transaction(&conn, "2023-01-02", a, dec!(3))?;
    add_transaction(&conn, "2023-01-02", b, dec!(0.5))?;
    add_transaction(&conn, "2023-01-02", cash, dec!(99.99))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-03", dec!(60))
        .with_bar(
            "AAA",
            "2023-01-03",
            Ohlc {
                open: dec!(12.3456),
                high: dec!(12.9999),
                low: dec!(12.001),
                close: dec!(12.5),
            },
        )
        .with_bar(
            "BBB",
            "2023-01-03",
            Ohlc {
                open: dec!(201.01),
                high: dec!(205.55),
                low: dec!(199.99),
                close: dec!(204.03),
            },
        );

    Pipeline::new(&conn, &market, "KO").run_date(date("2023-01-03"))?;

    let lines = db::get_report_lines(&conn, date("2023-01-03"))?;
    assert_eq!(lines.len(), 3);
    for line in &lines {
        for value in [line.open_value, line.high_value, line.low_value, line.close_value] {
            assert!(value.round_dp(2) == value, "{} not rounded", value);
        }
    }

    let aaa = lines.iter().find(|l| l.stock_symbol == "AAA").expect("AAA line");
    assert_eq!(aaa.open_value, dec!(37.04));
    assert_eq!(aaa.high_value, dec!(39.00));

    let summary = db::get_report_summary(&conn, date("2023-01-03"))?.expect("summary row");
    let sum = |f: fn(&portfolio_summary::db::ReportLine) -> rust_decimal::Decimal| {
        lines.iter().map(f).sum::<rust_decimal::Decimal>()
    };
    assert_eq!(summary.open_value, sum(|l| l.open_value));
    assert_eq!(summary.high_value, sum(|l| l.high_value));
    assert_eq!(summary.low_value, sum(|l| l.low_value));
    assert_eq!(summary.close_value, sum(|l| l.close_value));
    assert_eq!(summary.open_value, dec!(37.04) + dec!(100.50) + dec!(99.99));

    let quotes = db::get_quotes_on(&conn, date("2023-01-03"))?;
    let aaa_quote = quotes.iter().find(|q| q.stock_id == a).expect("AAA quote");
    assert_eq!(aaa_quote.open, dec!(12.35));
    assert_eq!(aaa_quote.high, dec!(13.00));
    assert_eq!(aaa_quote.low, dec!(12.00));
    Ok(())
}

#[test]
fn test_fetcher_reuses_prices_across_steps() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    let ko = db::insert_stock(&conn, "KO", "Coca-Cola")?;
    add_transaction(&conn, "2023-01-02", abc, dec!(1))?;
    add_transaction(&conn, "2023-01-02", ko, dec!(2))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-03", dec!(60))
        .with_price("ABC", "2023-01-03", dec!(10));
    let fetcher = PriceFetcher::new(&market);

    Pipeline::new(&conn, &fetcher, "KO").run_date(date("2023-01-03"))?;

    assert_eq!(market.lookups_of("ABC"), 1);
    // Reference check, quote update and report line all share one lookup
    assert_eq!(market.lookups_of("KO"), 1);
    assert_eq!(db::get_report_lines(&conn, date("2023-01-03"))?.len(), 2);
    Ok(())
}

#[test]
fn test_batch_runs_every_date_in_order() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    add_transaction(&conn, "2023-01-02", abc, dec!(2))?;
    add_transaction(&conn, "2023-01-04", abc, dec!(1))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-03", dec!(60))
        .with_price("KO", "2023-01-04", dec!(61))
        .with_price("ABC", "2023-01-03", dec!(10))
        .with_price("ABC", "2023-01-04", dec!(11));
    let dates: Vec<String> = ["2023-01-03", "2023-01-08", "2023-1-x", "2023-01-04"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let outcome = Pipeline::new(&conn, &market, "KO").run_batch(&dates);

    let inputs: Vec<&str> = outcome.runs.iter().map(|r| r.input.as_str()).collect();
    assert_eq!(inputs, vec!["2023-01-03", "2023-01-08", "2023-1-x", "2023-01-04"]);
    assert_eq!(outcome.completed_count(), 2);
    assert!(!outcome.all_completed());

    let first = db::get_report_summary(&conn, date("2023-01-03"))?.expect("first summary");
    let last = db::get_report_summary(&conn, date("2023-01-04"))?.expect("last summary");
    assert_eq!(first.close_value, dec!(20));
    assert_eq!(last.close_value, dec!(33));
    Ok(())
}

#[test]
fn test_rebuild_after_runs_keeps_quotes() -> Result<()> {
    let (dir, conn) = create_test_db()?;
    let abc = db::insert_stock(&conn, "ABC", "Abc Corp")?;
    let xyz = db::insert_stock(&conn, "XYZ", "Xyz Corp")?;
    add_transaction(&conn, "2023-01-02", abc, dec!(1))?;
    add_transaction(&conn, "2023-01-02", xyz, dec!(1))?;

    let market = FakeMarket::new()
        .with_price("KO", "2023-01-03", dec!(60))
        .with_price("KO", "2023-01-04", dec!(60))
        .with_price("ABC", "2023-01-03", dec!(1))
        .with_price("ABC", "2023-01-04", dec!(2))
        .with_price("XYZ", "2023-01-03", dec!(3))
        .with_price("XYZ", "2023-01-04", dec!(4));
    let pipeline = Pipeline::new(&conn, &market, "KO");
    pipeline.run_date(date("2023-01-04"))?;
    pipeline.run_date(date("2023-01-03"))?;

    let before = db::list_quotes(&conn)?;
    drop(pipeline);
    drop(conn);

    let mut conn = db::open_db(Some(dir.path().join("test.db")))?;
    assert_eq!(db::rebuild_quotes(&mut conn)?, 4);
    assert_eq!(db::list_quotes(&conn)?, before);
    Ok(())
}
