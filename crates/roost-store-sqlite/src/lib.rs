//! SQLite backend for the Roost job queue and content store.
//!
//! All database access goes through [`tokio_rusqlite`], which runs the
//! blocking SQLite calls on their own thread away from the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
