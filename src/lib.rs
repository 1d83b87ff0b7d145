//! pvdatabase - in-process record database for control-system servers
//!
//! Each named record holds a typed, nested field tree and broadcasts
//! fine-grained change notifications to weakly held subscribers.
//!
//! # Quick Start
//!
//! ```
//! use pvdatabase::{standard, FieldSelection, PvDatabase, PvStructure, ScalarType};
//!
//! let db = PvDatabase::new();
//! let record = db
//!     .create_record("ps:voltage", PvStructure::new(&standard::scalar(ScalarType::Double, "alarm,timeStamp")))
//!     .unwrap();
//!
//! let value = record.field_by_name("value").unwrap().id();
//! let mut guard = record.lock();
//! guard.put(value, 12.5).unwrap();
//! guard.process().unwrap();
//! ```
//!
//! # Architecture
//!
//! Field types and values come from `pvdatabase-core`; records, locking,
//! notification and the database registry from `pvdatabase-engine`. Both are
//! re-exported here.

pub use pvdatabase_core::{
    standard, Error, FieldMut, FieldType, FieldValue, PvField, PvStructure, Scalar, ScalarType,
    StructureBuilder, StructureType, TimeStamp,
};
pub use pvdatabase_engine::{
    DatabaseConfig, FieldSelection, NodeId, ProcessHook, Projection, PvDatabase, Record,
    RecordBuilder, RecordClient, RecordError, RecordField, RecordGuard, RecordListener,
    RecordOptions, RecordResult, CONFIG_FILE_NAME,
};
