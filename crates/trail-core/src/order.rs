//! Trading enums and order identifiers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Lowercase label for log lines ("buy" / "sell").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

/// Order type as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Limit,
    Market,
    StopLimit,
    /// Trigger order resting off-book until the index price crosses
    /// the trigger. The only kind the trailing engine places.
    #[default]
    StopMarket,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "Limit"),
            Self::Market => write!(f, "Market"),
            Self::StopLimit => write!(f, "StopLimit"),
            Self::StopMarket => write!(f, "StopMarket"),
        }
    }
}

/// Remote order state as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Filled,
    Rejected,
    Cancelled,
    /// Stop order resting, trigger not yet crossed.
    Untriggered,
}

impl OrderStatus {
    /// Parse the exchange's lowercase state string.
    pub fn from_exchange(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "filled" => Some(Self::Filled),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "untriggered" => Some(Self::Untriggered),
            _ => None,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Filled => write!(f, "Filled"),
            Self::Rejected => write!(f, "Rejected"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Untriggered => write!(f, "Untriggered"),
        }
    }
}

/// Closed taxonomy of exchange-reported outcomes for privileged order calls.
///
/// Every remote response is reduced to one of these codes at the gateway
/// boundary; transport failures degrade to `Other` with the underlying
/// message preserved for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeCode {
    /// Call succeeded.
    Ok,
    /// Order no longer live: already filled, cancelled, or unknown to the
    /// matching engine.
    NotFoundOrClosed,
    /// Order disappeared entirely: not found by id and the label lookup
    /// returned nothing. The exchange occasionally loses stop orders.
    NotFoundLive,
    /// Order exists but does not support modification.
    ModificationNotAllowed,
    /// Requested trigger price above the allowed band.
    TriggerTooHigh,
    /// Requested trigger price below the allowed band.
    TriggerTooLow,
    /// Anything else, including transport failures.
    Other,
}

impl ExchangeCode {
    /// Numeric wire code used in audit records.
    pub fn wire_code(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::NotFoundOrClosed => 1,
            Self::NotFoundLive => 2,
            Self::ModificationNotAllowed => 10,
            Self::TriggerTooHigh => 11,
            Self::TriggerTooLow => 12,
            Self::Other => 100,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ExchangeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.wire_code())
    }
}

/// Client-generated order identifier (the exchange calls it a label).
///
/// Correlates local state with a remote order independently of the
/// exchange-assigned order id, which can repeat across retries and
/// label lookups. Unique per order attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOrderId(String);

/// Exchange-imposed maximum label length.
const MAX_LABEL_LEN: usize = 64;

impl ClientOrderId {
    /// Generate a fresh id: `trailbot_<timestamp>_<uuid>` truncated to the
    /// exchange's label limit.
    pub fn generate() -> Self {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let label = format!("trailbot_{}_{}", stamp, Uuid::new_v4().simple());
        Self(label.chars().take(MAX_LABEL_LEN).collect())
    }

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
