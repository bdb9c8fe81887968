//! Database query operations.
//!
//! Queries are grouped by table. All functions take a borrowed connection
//! and return `stillbox_common::Result`.

pub mod entries;
pub mod images;
