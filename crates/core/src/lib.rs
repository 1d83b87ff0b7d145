//! Core types for pvdatabase
//!
//! This crate defines the typed field trees that records are built on:
//! - ScalarType / Scalar: leaf element types and values
//! - FieldType / StructureType: type descriptors
//! - PvField / PvStructure: value trees with preorder offsets
//! - FieldMut: value-level write access that keeps the layout fixed
//! - standard: the usual alarm/timeStamp/display/control layouts
//! - TimeStamp: time stamp value and its field binding
//! - Error: error type for building and mutating field trees

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod field;
pub mod standard;
pub mod time_stamp;

pub use error::{Error, Result};
pub use field::{
    FieldMut, FieldType, FieldValue, PvField, PvStructure, Scalar, ScalarType, StructureBuilder,
    StructureType,
};
pub use time_stamp::TimeStamp;
