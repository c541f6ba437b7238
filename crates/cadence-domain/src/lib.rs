//! cadence-domain
//!
//! Pure domain models (Plan, PeriodWindow, goals, transactions, summaries).
//! No I/O, no timezone math, no storage. Only data types and core enums.

pub mod common;
pub mod currency;
pub mod plan;
pub mod summary;
pub mod transaction;
pub mod window;

pub use common::*;
pub use currency::*;
pub use plan::*;
pub use summary::*;
pub use transaction::*;
pub use window::*;
