//! Shared `SQLite` infrastructure for storage backends.
//!
//! ## Module Structure
//!
//! - [`connection`]: opening, configuring, and locking `Mutex<Connection>`
//! - [`sql`]: placeholder building, LIKE escaping, JSON columns, error wrapping
//! - [`metrics`]: shared metrics recording helpers
//!
//! Each backend keeps its own connection; WAL mode lets separate connections
//! to the same file read concurrently.

mod connection;
mod metrics;
mod sql;

pub use connection::{acquire_lock, configure_connection, open_file, open_in_memory};
pub use metrics::{record_operation_metrics, status_label};
pub use sql::{escape_like_wildcards, json_column, numbered_placeholders, sql_error};
