//! electrotrack - Hydration and electrolyte recommendations for athletes
//!
//! Features are extracted from profile, workout observations, conditions and
//! history, then scored by deterministic rules blended with a regression
//! model once one has been trained on reported outcomes.

pub mod config;
pub mod db;
pub mod error;
pub mod ml;
pub mod models;
pub mod session;
pub mod store;
pub mod suggestions;

pub use config::EngineConfig;
pub use db::Database;
pub use error::{HydrationError, Result};
pub use ml::{HydrationEngine, PredictionMode};
pub use session::{SessionId, SessionManager, SessionState};
pub use store::{AthleteRegistry, HistoryStore, MemoryStore};
