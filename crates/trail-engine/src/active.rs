//! The single in-flight trailing order.

use rust_decimal::Decimal;
use trail_core::{ClientOrderId, OrderSide, Price, Qty};

/// Transient state of the one trailing order the bot may have in flight.
///
/// `active == false` means idle; exactly one instance exists and it is
/// only ever mutated from the dispatcher's single-flight tick handling.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOrder {
    pub side: OrderSide,
    pub active: bool,
    /// Spot when the trail began.
    pub start: Price,
    /// Spot at the previous tick.
    pub previous: Price,
    /// Spot at the current tick.
    pub current: Price,
    pub link_id: ClientOrderId,
    pub order_id: String,
    /// Trigger price currently resting on the exchange.
    pub trigger: Price,
    /// Candidate trigger computed from the current tick.
    pub trigger_new: Price,
    /// Trigger price the trail started with, kept for the revenue log.
    pub trigger_initial: Price,
    pub qty: Qty,
    /// Candidate quantity from the latest sell scan.
    pub qty_new: Qty,
    /// Trigger distance in percent currently in effect.
    pub fluctuation_pct: Decimal,
}

impl ActiveOrder {
    /// Idle state.
    pub fn idle() -> Self {
        Self {
            side: OrderSide::Buy,
            active: false,
            start: Price::ZERO,
            previous: Price::ZERO,
            current: Price::ZERO,
            link_id: ClientOrderId::new(""),
            order_id: String::new(),
            trigger: Price::ZERO,
            trigger_new: Price::ZERO,
            trigger_initial: Price::ZERO,
            qty: Qty::ZERO,
            qty_new: Qty::ZERO,
            fluctuation_pct: Decimal::ZERO,
        }
    }

    /// Arm a fresh trail at `spot` with a newly generated link id.
    pub fn arm(&mut self, side: OrderSide, spot: Price, fluctuation_pct: Decimal) {
        self.side = side;
        self.active = true;
        self.start = spot;
        self.previous = spot;
        self.current = spot;
        self.link_id = ClientOrderId::generate();
        self.order_id = String::new();
        self.trigger = Price::ZERO;
        self.trigger_new = Price::ZERO;
        self.trigger_initial = Price::ZERO;
        self.qty = Qty::ZERO;
        self.qty_new = Qty::ZERO;
        self.fluctuation_pct = fluctuation_pct;
    }

    /// Deactivate, keeping the last-known fields for inspection.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Whether `spot` has crossed the trigger in the firing direction.
    pub fn trigger_crossed(&self, spot: Price) -> bool {
        match self.side {
            OrderSide::Sell => spot <= self.trigger,
            OrderSide::Buy => spot >= self.trigger,
        }
    }
}

impl Default for ActiveOrder {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_arm_generates_fresh_link_id() {
        let mut order = ActiveOrder::idle();
        order.arm(OrderSide::Buy, Price::new(dec!(100)), dec!(0.2));
        let first = order.link_id.clone();
        order.arm(OrderSide::Sell, Price::new(dec!(100)), dec!(0.2));
        assert_ne!(first, order.link_id);
        assert!(order.active);
    }

    #[test]
    fn test_trigger_crossed_directions() {
        let mut order = ActiveOrder::idle();
        order.arm(OrderSide::Sell, Price::new(dec!(100)), dec!(0.2));
        order.trigger = Price::new(dec!(99));
        assert!(order.trigger_crossed(Price::new(dec!(99))));
        assert!(order.trigger_crossed(Price::new(dec!(98))));
        assert!(!order.trigger_crossed(Price::new(dec!(100))));

        order.side = OrderSide::Buy;
        order.trigger = Price::new(dec!(101));
        assert!(order.trigger_crossed(Price::new(dec!(101))));
        assert!(!order.trigger_crossed(Price::new(dec!(100))));
    }
}
