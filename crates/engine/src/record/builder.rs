//! Record builder for fluent configuration

use super::tree::FieldTree;
use super::{ProcessHook, Record, TRACE_SUBSCRIPTION};
use crate::config::RecordOptions;
use crate::error::{RecordError, RecordResult};
use pvdatabase_core::{PvStructure, TimeStamp};
use std::sync::Arc;
use tracing::debug;

/// Builder for [`Record`]
///
/// ```
/// use pvdatabase_core::{standard, PvStructure, ScalarType};
/// use pvdatabase_engine::Record;
///
/// let record = Record::builder("pump:speed")
///     .trace_level(0)
///     .create(PvStructure::new(&standard::scalar(ScalarType::Double, "timeStamp")))
///     .unwrap();
/// assert_eq!(record.name(), "pump:speed");
/// ```
pub struct RecordBuilder {
    name: String,
    options: RecordOptions,
    process_hook: Option<Box<dyn ProcessHook>>,
}

impl RecordBuilder {
    /// Create a builder with default options
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: RecordOptions::default(),
            process_hook: None,
        }
    }

    /// Replace all options
    pub fn options(mut self, options: RecordOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the initial trace level
    pub fn trace_level(mut self, level: u8) -> Self {
        self.options.trace_level = level;
        self
    }

    /// Bind a different field as the time stamp, or none
    pub fn time_stamp_field(mut self, field: Option<&str>) -> Self {
        self.options.time_stamp_field = field.map(str::to_string);
        self
    }

    /// Install record-specific processing
    pub fn process_hook(mut self, hook: impl ProcessHook + 'static) -> Self {
        self.process_hook = Some(Box::new(hook));
        self
    }

    /// Build the field tree, initialize it and return the record
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Initialization`] if the name is empty or the
    /// tree does not mirror `data`; nothing is returned in that case.
    pub fn create(self, data: PvStructure) -> RecordResult<Arc<Record>> {
        if self.name.is_empty() {
            return Err(RecordError::Initialization {
                record: self.name,
                reason: "record name is empty".to_string(),
            });
        }

        let seq = Record::next_sequence();
        let mut tree = FieldTree::build(&data, seq);
        if tree.len() != data.field_count() {
            return Err(RecordError::Initialization {
                record: self.name,
                reason: format!(
                    "field tree has {} nodes for {} fields",
                    tree.len(),
                    data.field_count()
                ),
            });
        }
        tree.init(&self.name);

        let time_stamp = self
            .options
            .time_stamp_field
            .as_deref()
            .and_then(|path| data.sub_field(path))
            .filter(|field| TimeStamp::is_time_stamp_field(field))
            .and_then(|field| tree.find_node(field.offset()))
            .map(|node| node.id());

        if self.options.trace_level > TRACE_SUBSCRIPTION {
            debug!(
                record = %self.name,
                fields = tree.len(),
                time_stamp = time_stamp.is_some(),
                "record created"
            );
        }

        Ok(Record::from_parts(
            self.name,
            seq,
            data,
            tree,
            time_stamp,
            self.options.trace_level,
            self.process_hook,
        ))
    }
}
