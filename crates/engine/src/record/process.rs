//! Record processing
//!
//! `process` runs the record's own logic, if it was created with a
//! [`ProcessHook`], then stamps the bound time stamp field with the current
//! time and posts that change.

use super::{RecordGuard, TRACE_LOCKING};
use crate::error::{RecordError, RecordResult};
use pvdatabase_core::TimeStamp;
use tracing::trace;

/// Record-specific processing
///
/// Runs with the record locked. Use the guard to read and write fields;
/// writes made through [`RecordGuard::put`] are posted as usual.
pub trait ProcessHook: Send + Sync {
    /// Compute and write new values
    fn process(&self, guard: &mut RecordGuard<'_>) -> RecordResult<()>;
}

impl RecordGuard<'_> {
    /// Process the record
    ///
    /// # Errors
    ///
    /// Propagates errors from the hook; the time stamp is not updated in
    /// that case.
    pub fn process(&mut self) -> RecordResult<()> {
        let record = self.record;
        if record.traces(TRACE_LOCKING) {
            trace!(record = %record.name, "process");
        }
        if let Some(hook) = record.process_hook.as_deref() {
            hook.process(self)?;
        }
        let Some(node) = self.state.time_stamp else {
            return Ok(());
        };
        self.update(node, |field| {
            let user_tag = TimeStamp::from_field(&**field)?.user_tag();
            TimeStamp::now().with_user_tag(user_tag).write_to(field)
        })
    }

    /// Time stamp currently stored in the bound field, if one is bound
    pub fn time_stamp(&self) -> RecordResult<Option<TimeStamp>> {
        let Some(node) = self.state.time_stamp else {
            return Ok(None);
        };
        let offset = self.record.node_or_err(node)?.offset();
        let field = self
            .state
            .data
            .field_at(offset)
            .ok_or_else(|| RecordError::FieldNotInRecord {
                record: self.record.name.clone(),
                offset,
            })?;
        Ok(Some(TimeStamp::from_field(field)?))
    }
}

#[cfg(test)]
mod tests {
    use super::super::Record;
    use super::*;
    use pvdatabase_core::{standard, PvStructure, Scalar, ScalarType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter {
        runs: Arc<AtomicUsize>,
    }

    impl ProcessHook for Counter {
        fn process(&self, guard: &mut RecordGuard<'_>) -> RecordResult<()> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            let value = guard.record().field_by_name("value").map(|f| f.id());
            match value {
                Some(id) => guard.put(id, n as f64),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn test_process_stamps_time() {
        let record = Record::create(
            "rec",
            PvStructure::new(&standard::scalar(ScalarType::Double, "timeStamp")),
        )
        .unwrap();
        let mut guard = record.lock();
        assert_eq!(guard.time_stamp().unwrap().unwrap().seconds_past_epoch(), 0);
        guard.process().unwrap();
        assert!(guard.time_stamp().unwrap().unwrap().seconds_past_epoch() > 0);
    }

    #[test]
    fn test_process_without_time_stamp_field() {
        let record = Record::create(
            "rec",
            PvStructure::new(&standard::scalar(ScalarType::Double, "alarm")),
        )
        .unwrap();
        let mut guard = record.lock();
        guard.process().unwrap();
        assert_eq!(guard.time_stamp().unwrap(), None);
    }

    #[test]
    fn test_process_runs_hook() {
        let runs = Arc::new(AtomicUsize::new(0));
        let record = Record::builder("rec")
            .process_hook(Counter { runs: runs.clone() })
            .create(PvStructure::new(&standard::scalar(ScalarType::Double, "timeStamp")))
            .unwrap();
        let mut guard = record.lock();
        guard.process().unwrap();
        guard.process().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(
            guard.data().sub_field("value").unwrap().scalar(),
            Some(&Scalar::Double(2.0))
        );
    }

    #[test]
    fn test_direct_writes_keep_bindings() {
        let record = Record::create(
            "rec",
            PvStructure::new(&standard::scalar(ScalarType::Double, "alarm,timeStamp")),
        )
        .unwrap();
        let value = record.field_by_name("value").unwrap().id();
        let mut guard = record.lock();

        {
            let mut data = guard.data_mut();
            data.sub_field_mut("value").unwrap().set_scalar(3.0).unwrap();
            data.sub_field_mut("alarm.message").unwrap().set_scalar("high").unwrap();
            assert!(data.sub_field_mut("timeStamp").unwrap().set_scalar(1.0).is_err());
        }
        guard.post_put(value).unwrap();

        guard.process().unwrap();
        assert!(guard.time_stamp().unwrap().unwrap().seconds_past_epoch() > 0);
        guard.put(value, 4.0).unwrap();
        assert_eq!(
            guard.data().sub_field("value").unwrap().scalar(),
            Some(&Scalar::Double(4.0))
        );
        let stamp = guard.data().sub_field("timeStamp").unwrap().offset();
        assert_eq!(record.find_node(stamp).unwrap().full_field_name(), "timeStamp");
    }

    #[test]
    fn test_time_stamp_binding_can_be_disabled() {
        let record = Record::builder("rec")
            .time_stamp_field(None)
            .create(PvStructure::new(&standard::scalar(ScalarType::Double, "timeStamp")))
            .unwrap();
        assert_eq!(record.lock().time_stamp().unwrap(), None);
    }
}
