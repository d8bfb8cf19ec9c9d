//! In-memory tables for the three workbook sheets and the naming rule built
//! on top of them.

pub mod naming;
pub mod types;

pub use naming::*;
pub use types::*;
