//! trailbot application crate.
//!
//! Wires the gateway, ledger, feeds, engine and stream together and
//! runs the dispatcher event loop.

pub mod app;
pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use app::Application;
pub use audit::AuditLog;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use logging::init_logging;
pub use session::Session;
