//! # Oracle Module
//!
//! Time-weighted averages over cumulative observation series.

pub mod twap;

pub use twap::{Observation, TwapSeries};
