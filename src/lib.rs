pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod execution;
pub mod filters;
pub mod heuristics;
pub mod query;
pub mod rows;
pub mod security;
pub mod views;

pub use error::{InsightsError, Result};
