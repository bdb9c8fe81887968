//! Storage accounting and pruning.

pub mod accountant;

pub use accountant::{format_bytes, StorageAccountant, StorageSummary};
