//! SQLite database driver implementation.
//!
//! Addresses are file paths resolved under the backend's base directory, or
//! `:memory:` for a private in-memory database.

mod connection;
mod types;

pub use connection::{IN_MEMORY, SqliteConnection};
pub use types::SqliteValueConverter;
