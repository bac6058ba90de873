//! Core data types shared by the connector and the aggregation engine.

pub mod enums;
pub mod market_data;
pub mod symbol;

pub use enums::*;
pub use market_data::*;
pub use symbol::*;
