//! JSON-RPC response envelope validation.
//!
//! Every REST response is checked here before any payload is trusted.
//! Exchange error messages are reduced to the closed [`ExchangeCode`]
//! taxonomy; rate-limit pressure is surfaced as a warning.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use trail_core::ExchangeCode;

/// JSON-RPC error code the exchange uses for rate limiting.
const RATE_LIMIT_CODE: i64 = 10028;

/// Raw JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
    /// Server-side processing time in microseconds, logged for slow calls.
    #[serde(rename = "usDiff", default)]
    pub us_diff: Option<u64>,
}

/// JSON-RPC error member.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcEnvelope {
    /// Parse an envelope from a raw response body.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Validate the envelope, returning the result payload or the
    /// mapped error.
    pub fn check(self, endpoint: &str) -> Result<Value, (ExchangeCode, String)> {
        if let Some(err) = self.error {
            if err.code == RATE_LIMIT_CODE {
                warn!(endpoint, "Exchange rate limit hit, backing off");
            }
            let code = map_error_message(&err.message);
            return Err((code, format!("{} ({})", err.message, err.code)));
        }

        match self.result {
            Some(result) => Ok(result),
            None => Err((
                ExchangeCode::Other,
                format!("{endpoint}: envelope carried neither result nor error"),
            )),
        }
    }
}

/// Map an exchange error message to the closed code taxonomy.
pub fn map_error_message(message: &str) -> ExchangeCode {
    match message {
        "order_not_found" | "already_closed" => ExchangeCode::NotFoundOrClosed,
        "modification_not_allowed" => ExchangeCode::ModificationNotAllowed,
        "trigger_price_too_high" => ExchangeCode::TriggerTooHigh,
        "trigger_price_too_low" => ExchangeCode::TriggerTooLow,
        _ => ExchangeCode::Other,
    }
}
