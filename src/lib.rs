//! Stillbox - Image upload, validation, transcoding, and storage service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod server;
pub mod storage;
pub mod uploads;
