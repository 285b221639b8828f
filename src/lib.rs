//! Rent Desk Backend Library
//!
//! This library exposes modules for testing and external use.
//! The main binary is in `src/main.rs`.

pub mod api;
/// Chat proxy: widget protocol, conversation store and agent runtime
pub mod chat;
pub mod config;
pub mod error;
/// Shared application state
pub mod state;
/// Rent workbook export: payload schema, data sources and template filling
pub mod workbook;
