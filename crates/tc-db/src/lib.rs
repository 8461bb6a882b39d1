//! tc-db: the persistent cache ledger.
//!
//! A small SQLite database maps a source's content fingerprint to its cached
//! artifact id and completion state. The ledger is deliberately dumb: it
//! stores rows and never inspects the disk — trusting a row is the caller's
//! decision (see the cache index in tc-server).

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use pool::{get_conn, DbPool};
