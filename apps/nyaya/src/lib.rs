//! # Nyaya Library
//!
//! This library exposes the Nyaya command and HTTP modules for testing and
//! integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;

// Re-export nyaya_core for convenience
pub use nyaya_core;
