//! Community Pulse: a deterministic scoring engine for community posts.
//!
//! Posts are scored for sentiment, misinformation risk and priority, stored,
//! checked against alert rules and folded into trend and health aggregates.
//! The `routes` module exposes all of it as a JSON API.

pub mod aggregate;
pub mod alerts;
pub mod analyzer;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod misinformation;
pub mod models;
pub mod pipeline;
pub mod priority;
pub mod report;
pub mod routes;
pub mod sentiment;
pub mod store;

pub use config::{Config, ScoringConfig};
pub use error::{Error, Result};
pub use pipeline::{Engine, Ingestor};
pub use routes::{router, AppState};
