//! Record stores for executions, behavioral sessions, progress events, and
//! successful patterns.
//!
//! # Available Backends
//!
//! | Backend | Use Case |
//! |---------|----------|
//! | [`SqliteLearningStore`] | Default; one embedded database for every record trait |

mod sqlite;

pub use sqlite::SqliteLearningStore;
