//! Core types and trait definitions for the Roost ingestion engine.
//!
//! Everything here is plain data and traits; HTTP and database
//! dependencies live in the crates that implement these interfaces.

pub mod analyzer;
pub mod clock;
pub mod content;
pub mod error;
pub mod job;
pub mod page;
pub mod retry;
pub mod store;

pub use error::{Error, Result};
