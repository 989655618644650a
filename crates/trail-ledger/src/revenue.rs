//! Append-only revenue log.
//!
//! One fixed-column CSV row per closed trail; the header row is written
//! once when the file is first created.

use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::info;

/// Which closed trails get logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueSides {
    /// Only completed sells (the rows that carry realized revenue).
    #[default]
    Sell,
    /// Buys as well, with zero revenue.
    Both,
}

/// One revenue log row.
#[derive(Debug, Clone, Serialize)]
pub struct RevenueRecord {
    /// Wall-clock time the trail closed (RFC 3339, UTC).
    pub utc_time: String,
    /// Order creation time (Unix ms).
    pub created_time: i64,
    pub order_id: String,
    pub order_link_id: String,
    pub side: String,
    pub symbol: String,
    pub base_coin: String,
    pub quote_coin: String,
    pub order_type: String,
    pub order_status: String,
    pub avg_price: Decimal,
    pub qty: Decimal,
    /// Trigger price when the trail started.
    pub trigger_initial: Decimal,
    /// Trigger price when the order fired.
    pub trigger_final: Decimal,
    pub cum_exec_fee: Decimal,
    pub cum_exec_qty: Decimal,
    pub cum_exec_value: Decimal,
    /// Realized revenue in quote units; zero for buy rows.
    pub revenue: Decimal,
}

const HEADER: [&str; 18] = [
    "utcTime",
    "createdTime",
    "orderId",
    "orderLinkId",
    "side",
    "symbol",
    "baseCoin",
    "quoteCoin",
    "orderType",
    "orderStatus",
    "avgPrice",
    "qty",
    "triggerInitial",
    "triggerFinal",
    "cumExecFee",
    "cumExecQty",
    "cumExecValue",
    "revenue",
];

/// Append-only revenue log file.
#[derive(Debug)]
pub struct RevenueLog {
    path: PathBuf,
    pub sides: RevenueSides,
}

impl RevenueLog {
    /// Open the log, creating the file with its header row when absent.
    pub fn init(path: impl Into<PathBuf>, sides: RevenueSides) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(HEADER)?;
            writer.flush()?;
            info!(path = %path.display(), "Revenue log created");
        }
        Ok(Self { path, sides })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row.
    pub fn append(&self, record: &RevenueRecord) -> Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_record(revenue: Decimal) -> RevenueRecord {
        RevenueRecord {
            utc_time: "2024-01-01T00:00:00Z".to_string(),
            created_time: 1_704_067_200_000,
            order_id: "oid-1".to_string(),
            order_link_id: "link-1".to_string(),
            side: "Sell".to_string(),
            symbol: "BTC_USDC".to_string(),
            base_coin: "BTC".to_string(),
            quote_coin: "USDC".to_string(),
            order_type: "StopMarket".to_string(),
            order_status: "Filled".to_string(),
            avg_price: dec!(42000),
            qty: dec!(0.002),
            trigger_initial: dec!(41900),
            trigger_final: dec!(41990),
            cum_exec_fee: dec!(0.1),
            cum_exec_qty: dec!(0.002),
            cum_exec_value: dec!(84),
            revenue,
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revenue.csv");

        let log = RevenueLog::init(&path, RevenueSides::Sell).unwrap();
        log.append(&sample_record(dec!(1.5))).unwrap();

        // Re-init must not write a second header.
        let log = RevenueLog::init(&path, RevenueSides::Sell).unwrap();
        log.append(&sample_record(dec!(2.5))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("utcTime,createdTime,orderId"));
        assert!(lines[1].ends_with(",1.5"));
        assert!(lines[2].ends_with(",2.5"));
    }

    #[test]
    fn test_row_has_all_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revenue.csv");
        let log = RevenueLog::init(&path, RevenueSides::Both).unwrap();
        log.append(&sample_record(dec!(98))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert_eq!(row.split(',').count(), HEADER.len());
    }
}
