//! Monitoring data model and bounded sample history.

mod history;
mod models;
mod stats;

#[cfg(test)]
pub(crate) mod fixtures;

pub use history::*;
pub use models::*;
pub use stats::*;
