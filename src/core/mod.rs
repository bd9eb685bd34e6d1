//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod expectations;
pub mod frame;
pub mod glossary;
pub mod log;
pub mod market;
pub mod rates;
pub mod series;

// Re-export main types for cleaner imports
pub use expectations::ExpectationsProvider;
pub use frame::{Frame, JoinKind};
pub use series::{Indicator, Series, SeriesProvider};
