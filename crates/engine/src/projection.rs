//! Projections of a record onto a subscriber's view
//!
//! A projection maps a subset of a record's fields into a subscriber-specific
//! structure. The record only needs one thing from it: the list of master
//! fields the subset covers, which is where listeners get registered.

use crate::error::{RecordError, RecordResult};
use crate::record::Record;

/// Source of master field offsets for listener placement
pub trait Projection {
    /// Call `visit` with the offset of every master field this projection
    /// maps, stopping at the first error
    fn traverse_master(
        &self,
        visit: &mut dyn FnMut(usize) -> RecordResult<()>,
    ) -> RecordResult<()>;
}

/// Projection that selects record fields by dotted name
///
/// ```
/// use pvdatabase_core::{standard, PvStructure, ScalarType};
/// use pvdatabase_engine::{FieldSelection, Record};
///
/// let record = Record::create(
///     "rec",
///     PvStructure::new(&standard::scalar(ScalarType::Double, "alarm")),
/// )
/// .unwrap();
/// let selection = FieldSelection::new(&record, &["value", "alarm.severity"]).unwrap();
/// assert_eq!(selection.offsets(), &[1, 3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    offsets: Vec<usize>,
}

impl FieldSelection {
    /// Resolve `fields` against `record`; an empty list selects the whole
    /// record
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] for a name the record lacks.
    pub fn new(record: &Record, fields: &[&str]) -> RecordResult<Self> {
        if fields.is_empty() {
            return Ok(Self::whole_record());
        }
        let offsets = fields
            .iter()
            .map(|name| {
                record
                    .field_by_name(name)
                    .map(|node| node.offset())
                    .ok_or_else(|| RecordError::UnknownField {
                        record: record.name().to_string(),
                        field: name.to_string(),
                    })
            })
            .collect::<RecordResult<Vec<_>>>()?;
        Ok(Self { offsets })
    }

    /// Selection of the root structure
    pub fn whole_record() -> Self {
        Self { offsets: vec![0] }
    }

    /// Selection of raw master offsets, unchecked until used
    pub fn from_offsets(offsets: Vec<usize>) -> Self {
        Self { offsets }
    }

    /// Selected master offsets in selection order
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }
}

impl Projection for FieldSelection {
    fn traverse_master(
        &self,
        visit: &mut dyn FnMut(usize) -> RecordResult<()>,
    ) -> RecordResult<()> {
        for &offset in &self.offsets {
            visit(offset)?;
        }
        Ok(())
    }
}
