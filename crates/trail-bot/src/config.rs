//! Application configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use trail_engine::{BuySignalConfig, TrailConfig};
use trail_feed::{DepthConfig, FlowConfig};
use trail_ledger::RevenueSides;

/// Compounding configuration; the live `now` value is derived from
/// wallet reports at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Bot value in quote units when compounding started.
    #[serde(default)]
    pub start: Decimal,
}

impl Default for CompoundingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: Decimal::ZERO,
        }
    }
}

/// Websocket tuning subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Fixed delay before reconnecting (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Heartbeat ping interval (ms).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

/// Uptime ping and staleness watchdog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Interval between uptime pings (ms).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Ticker age past which the feed counts as stale (ms).
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: i64,
}

fn default_ping_interval_ms() -> u64 {
    10_000
}

fn default_stale_after_ms() -> i64 {
    1_000_000
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Instrument the bot trades, e.g. `BTC_USDC`.
    pub symbol: String,
    /// Websocket endpoint URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable holding the API client id.
    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,
    /// Environment variable holding the API client secret.
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,

    /// Kline intervals in minutes; zero entries are ignored.
    #[serde(default = "default_intervals")]
    pub intervals: Vec<u32>,
    /// Bars kept per interval for indicator evaluation.
    #[serde(default = "default_kline_limit")]
    pub kline_limit: usize,
    /// Minimum-order-size multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
    /// Rolling price window horizon (ms).
    #[serde(default = "default_price_window_ms")]
    pub price_window_ms: i64,

    /// Trailing engine configuration.
    #[serde(default)]
    pub trail: TrailConfig,
    /// Buy signal configuration.
    #[serde(default)]
    pub signals: BuySignalConfig,
    /// Order-book depth tracking.
    #[serde(default)]
    pub depth: DepthConfig,
    /// Trade-flow tracking.
    #[serde(default)]
    pub flow: FlowConfig,
    /// Compounding.
    #[serde(default)]
    pub compounding: CompoundingConfig,
    /// Report wallet holdings after fills and at startup.
    #[serde(default = "default_wallet_report")]
    pub wallet_report: bool,
    /// Rebalance the ledger against the wallet at startup.
    #[serde(default = "default_rebalance_at_start")]
    pub rebalance_at_start: bool,
    /// Only re-query non-closed lots during startup verification.
    #[serde(default = "default_quick_check")]
    pub quick_check: bool,

    /// Ledger file path.
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,
    /// Revenue log path; empty disables the log.
    #[serde(default = "default_revenue_file")]
    pub revenue_file: String,
    /// Which closed trails get revenue rows.
    #[serde(default)]
    pub revenue_sides: RevenueSides,
    /// Audit log path.
    #[serde(default = "default_audit_file")]
    pub audit_file: String,

    /// Websocket tuning.
    #[serde(default)]
    pub websocket: WsConfig,
    /// Uptime ping and staleness watchdog.
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// Periodic housekeeping interval (ms); refreshes instrument info.
    #[serde(default = "default_periodic_interval_ms")]
    pub periodic_interval_ms: u64,
    /// Subscribe to the order-book channel.
    #[serde(default)]
    pub subscribe_book: bool,
    /// Subscribe to the public trade channel.
    #[serde(default)]
    pub subscribe_trades: bool,
}

fn default_ws_url() -> String {
    "wss://www.deribit.com/ws/api/v2".to_string()
}

fn default_api_url() -> String {
    "https://www.deribit.com/api/v2".to_string()
}

fn default_client_id_env() -> String {
    "TRAILBOT_CLIENT_ID".to_string()
}

fn default_client_secret_env() -> String {
    "TRAILBOT_CLIENT_SECRET".to_string()
}

fn default_intervals() -> Vec<u32> {
    vec![1]
}

fn default_kline_limit() -> usize {
    250
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}

fn default_price_window_ms() -> i64 {
    3_600_000
}

fn default_wallet_report() -> bool {
    true
}

fn default_rebalance_at_start() -> bool {
    true
}

fn default_quick_check() -> bool {
    true
}

fn default_ledger_file() -> String {
    "data/buys.json".to_string()
}

fn default_revenue_file() -> String {
    "data/revenue.csv".to_string()
}

fn default_audit_file() -> String {
    "data/errors.log".to_string()
}

fn default_periodic_interval_ms() -> u64 {
    3_600_000
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Kline intervals actually in use.
    pub fn active_intervals(&self) -> Vec<u32> {
        if self.signals.indicators.enabled {
            self.intervals.iter().copied().filter(|&i| i > 0).collect()
        } else {
            Vec::new()
        }
    }

    /// Consistency checks that must hold before the bot starts.
    pub fn precheck(&self) -> AppResult<()> {
        if !self.signals.spread.enabled && !self.signals.indicators.enabled {
            return Err(AppError::Precheck(
                "at least one of the spread or indicator signals must be enabled to ever buy"
                    .to_string(),
            ));
        }
        if self.signals.indicators.enabled && self.active_intervals().is_empty() {
            return Err(AppError::Precheck(
                "indicator signal enabled but no kline interval configured".to_string(),
            ));
        }
        if self.compounding.enabled && !self.wallet_report {
            return Err(AppError::Precheck(
                "compounding requires wallet_report so the bot value can be tracked".to_string(),
            ));
        }
        if self.symbol.is_empty() {
            return Err(AppError::Precheck("symbol must be set".to_string()));
        }
        Ok(())
    }

    /// Credentials from the configured environment variables.
    pub fn credentials(&self) -> AppResult<(String, String)> {
        let client_id = std::env::var(&self.client_id_env).map_err(|_| {
            AppError::Config(format!("missing credential env var {}", self.client_id_env))
        })?;
        let client_secret = std::env::var(&self.client_secret_env).map_err(|_| {
            AppError::Config(format!(
                "missing credential env var {}",
                self.client_secret_env
            ))
        })?;
        Ok((client_id, client_secret))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC_USDC".to_string(),
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            client_id_env: default_client_id_env(),
            client_secret_env: default_client_secret_env(),
            intervals: default_intervals(),
            kline_limit: default_kline_limit(),
            multiplier: default_multiplier(),
            price_window_ms: default_price_window_ms(),
            trail: TrailConfig::default(),
            signals: BuySignalConfig::default(),
            depth: DepthConfig::default(),
            flow: FlowConfig::default(),
            compounding: CompoundingConfig::default(),
            wallet_report: default_wallet_report(),
            rebalance_at_start: default_rebalance_at_start(),
            quick_check: default_quick_check(),
            ledger_file: default_ledger_file(),
            revenue_file: default_revenue_file(),
            revenue_sides: RevenueSides::default(),
            audit_file: default_audit_file(),
            websocket: WsConfig::default(),
            watchdog: WatchdogConfig::default(),
            periodic_interval_ms: default_periodic_interval_ms(),
            subscribe_book: false,
            subscribe_trades: false,
        }
    }
}
