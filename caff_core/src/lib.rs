#![forbid(unsafe_code)]

//! Core domain model and business logic for the Sip caffeine planner.
//!
//! This crate provides:
//! - Domain types (doses, profiles, beverages, samples)
//! - Decay model and curve sampling
//! - Scheduling engine
//! - Beverage catalog
//! - Persistence (WAL, CSV, sleep signal)

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod wal;
pub mod csv_rollup;
pub mod sleep_signal;
pub mod history;
pub mod decay;
pub mod curve;
pub mod engine;

// Convenience re-exports
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::Config;
pub use wal::{DoseSink, JsonlSink};
pub use sleep_signal::{load_sleep_signal, SleepSignal};
pub use history::load_recent_doses;
pub use decay::level_at;
pub use curve::{peak_in_window, sample_curve};
pub use engine::{recommend_next_dose, NoDoseReason, Recommendation, RecommendedDose};
