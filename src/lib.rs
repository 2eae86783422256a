// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod assistant;
pub mod catalog;
pub mod client;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod model;
pub mod session;
pub mod view;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::client::{HttpPageSource, PageRequest, PageSource};
pub use crate::fetch::{fetch_collection, FetchOptions, FetchOutcome, FetchReport, LivenessToken};
pub use crate::model::{Collection, Record, RecordId, ScoreOrigin};
