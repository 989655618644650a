//! Market data tracking for trailbot.
//!
//! Bounded, append-only views over the streaming feed: the rolling
//! price window, per-interval kline series, order-book depth advice and
//! trade-flow advice. Indicator mathematics live behind the
//! [`IndicatorEvaluator`] boundary.

pub mod depth;
pub mod error;
pub mod flow;
pub mod indicator;
pub mod klines;
pub mod window;

pub use depth::{BookLevel, DepthAdvice, DepthConfig, DepthTracker};
pub use error::{FeedError, Result};
pub use flow::{FlowAdvice, FlowConfig, FlowTracker, Trade};
pub use indicator::{IndicatorAdvice, IndicatorEvaluator, NeutralIndicator};
pub use klines::KlineSeries;
pub use window::PriceWindow;
