//! The propagation engine: pure planning over the tables, plus the one
//! all-or-nothing apply step.

pub mod apply;
pub mod error;
pub mod filter;
pub mod plan;

pub use apply::*;
pub use error::*;
pub use filter::*;
pub use plan::*;

#[cfg(test)]
mod tests;
