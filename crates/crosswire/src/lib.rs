//! Crosswire: rename and propagate model-configuration records across the
//! supplier workbook.
//!
//! The pipeline is load → plan → apply → save: [`store`] reads the three
//! sheets, [`session`] holds them for one run, [`engine`] plans and applies
//! the renames/clones, [`audit`] records every mutation, and [`store`] writes
//! the results and the review bundle back out.

pub mod audit;
pub mod config;
pub mod engine;
pub mod job;
pub mod session;
pub mod store;
pub mod table;
