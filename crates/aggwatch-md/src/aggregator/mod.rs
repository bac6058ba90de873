//! Sliding-window trade aggregation.

pub mod registry;
pub mod stat;

pub use registry::StatRegistry;
pub use stat::{Stat, StatKey, WindowAlerts};
