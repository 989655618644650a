//! Scripted in-memory gateway for tests.
//!
//! Records every call and replays queued outcomes, so state-machine
//! tests can drive fills, lost orders, and amend rejections without a
//! network.

use crate::decode::OrderSnapshot;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{
    AmendOutcome, CancelOutcome, FetchOutcome, OrderGateway, PlaceOrder, PlacedOrder,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use trail_core::{ClientOrderId, ExchangeCode, OrderKind, OrderStatus, Price, Qty};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Place {
        side: trail_core::OrderSide,
        qty: Qty,
        trigger: Price,
        link_id: ClientOrderId,
    },
    Cancel {
        order_id: String,
        link_id: ClientOrderId,
    },
    AmendTrigger {
        order_id: String,
        qty: Qty,
        trigger: Price,
    },
    AmendQuantity {
        order_id: String,
        qty: Qty,
    },
    Fetch {
        order_id: String,
        link_id: ClientOrderId,
    },
    WalletBalance {
        coin: String,
    },
}

/// Scripted gateway. Queued outcomes are consumed front to back; when a
/// queue is empty a benign default is returned.
#[derive(Default)]
pub struct ScriptedGateway {
    calls: Mutex<Vec<GatewayCall>>,
    place_errors: Mutex<VecDeque<String>>,
    cancel_outcomes: Mutex<VecDeque<CancelOutcome>>,
    amend_trigger_outcomes: Mutex<VecDeque<AmendOutcome>>,
    amend_qty_outcomes: Mutex<VecDeque<AmendOutcome>>,
    fetch_outcomes: Mutex<VecDeque<FetchOutcome>>,
    wallet: Mutex<Decimal>,
    placed: Mutex<u64>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot the way the exchange would echo a fresh order.
    pub fn snapshot_for(req: &PlaceOrder, order_id: &str, status: OrderStatus) -> OrderSnapshot {
        OrderSnapshot {
            order_id: order_id.to_string(),
            order_link_id: req.link_id.clone(),
            created_time: 1_700_000_000_000,
            updated_time: 1_700_000_000_000,
            symbol: req.symbol.clone(),
            side: req.side,
            order_type: OrderKind::StopMarket,
            status,
            price: Price::ZERO,
            avg_price: Price::ZERO,
            qty: req.qty,
            cum_exec_qty: Qty::ZERO,
            cum_exec_value: Decimal::ZERO,
            cum_exec_fee: Decimal::ZERO,
            trigger_price: req.trigger,
        }
    }

    pub fn script_place_error(&self, message: impl Into<String>) {
        self.place_errors.lock().push_back(message.into());
    }

    pub fn script_cancel(&self, outcome: CancelOutcome) {
        self.cancel_outcomes.lock().push_back(outcome);
    }

    pub fn script_amend_trigger(&self, outcome: AmendOutcome) {
        self.amend_trigger_outcomes.lock().push_back(outcome);
    }

    pub fn script_amend_quantity(&self, outcome: AmendOutcome) {
        self.amend_qty_outcomes.lock().push_back(outcome);
    }

    pub fn script_fetch(&self, outcome: FetchOutcome) {
        self.fetch_outcomes.lock().push_back(outcome);
    }

    pub fn set_wallet(&self, balance: Decimal) {
        *self.wallet.lock() = balance;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl OrderGateway for ScriptedGateway {
    async fn place(&self, req: &PlaceOrder) -> GatewayResult<PlacedOrder> {
        self.calls.lock().push(GatewayCall::Place {
            side: req.side,
            qty: req.qty,
            trigger: req.trigger,
            link_id: req.link_id.clone(),
        });
        if let Some(message) = self.place_errors.lock().pop_front() {
            return Err(GatewayError::Rejected { message });
        }
        let n = {
            let mut placed = self.placed.lock();
            *placed += 1;
            *placed
        };
        let order_id = format!("scripted-{n}");
        Ok(PlacedOrder {
            order_id: order_id.clone(),
            snapshot: Self::snapshot_for(req, &order_id, OrderStatus::Untriggered),
        })
    }

    async fn cancel(
        &self,
        order_id: &str,
        link_id: &ClientOrderId,
    ) -> GatewayResult<CancelOutcome> {
        self.calls.lock().push(GatewayCall::Cancel {
            order_id: order_id.to_string(),
            link_id: link_id.clone(),
        });
        Ok(self
            .cancel_outcomes
            .lock()
            .pop_front()
            .unwrap_or(CancelOutcome::Cancelled))
    }

    async fn amend_trigger(&self, order_id: &str, qty: Qty, trigger: Price) -> AmendOutcome {
        self.calls.lock().push(GatewayCall::AmendTrigger {
            order_id: order_id.to_string(),
            qty,
            trigger,
        });
        self.amend_trigger_outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(AmendOutcome::ok)
    }

    async fn amend_quantity(&self, order_id: &str, qty: Qty) -> AmendOutcome {
        self.calls.lock().push(GatewayCall::AmendQuantity {
            order_id: order_id.to_string(),
            qty,
        });
        self.amend_qty_outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(AmendOutcome::ok)
    }

    async fn fetch_order(&self, order_id: &str, link_id: &ClientOrderId) -> FetchOutcome {
        self.calls.lock().push(GatewayCall::Fetch {
            order_id: order_id.to_string(),
            link_id: link_id.clone(),
        });
        self.fetch_outcomes.lock().pop_front().unwrap_or(FetchOutcome {
            snapshot: None,
            code: ExchangeCode::NotFoundLive,
        })
    }

    async fn wallet_balance(&self, coin: &str) -> GatewayResult<Decimal> {
        self.calls.lock().push(GatewayCall::WalletBalance {
            coin: coin.to_string(),
        });
        Ok(*self.wallet.lock())
    }
}
