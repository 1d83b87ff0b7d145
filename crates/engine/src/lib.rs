//! Record engine for pvdatabase
//!
//! This crate manages records built on `pvdatabase-core` field trees:
//! - Record: locking, cross-record lock ordering, field tree and offset index
//! - Change fan-out: `post_put` to ancestors, the field and its subtree
//! - Group put: nested transactions announced once per outermost bracket
//! - Subscriptions: weakly held listeners and clients, teardown
//! - Projection: where listeners get registered
//! - PvDatabase: registry of records by name
//! - Config: `pvdatabase.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod database;
pub mod error;
pub mod projection;
pub mod record;

pub use config::{DatabaseConfig, RecordOptions, CONFIG_FILE_NAME};
pub use database::PvDatabase;
pub use error::{RecordError, RecordResult};
pub use projection::{FieldSelection, Projection};
pub use record::{
    NodeId, ProcessHook, Record, RecordBuilder, RecordClient, RecordField, RecordGuard,
    RecordListener,
};
