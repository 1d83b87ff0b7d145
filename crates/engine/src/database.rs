//! Database of named records
//!
//! [`PvDatabase`] maps record names to records. Records removed from the
//! database, or still registered when the database is dropped, are torn
//! down so their listeners and clients are released.
//!
//! A process-wide instance is available through [`PvDatabase::master`].

use crate::config::DatabaseConfig;
use crate::error::{RecordError, RecordResult};
use crate::record::Record;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use pvdatabase_core::PvStructure;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Global master database
// =============================================================================
//
// Channel providers look records up by name without being handed a database,
// so one shared instance lives for the whole process.

static MASTER: Lazy<PvDatabase> = Lazy::new(PvDatabase::new);

/// Registry of records keyed by name
pub struct PvDatabase {
    records: RwLock<BTreeMap<String, Arc<Record>>>,
    config: DatabaseConfig,
}

impl PvDatabase {
    /// Empty database with default config
    pub fn new() -> Self {
        Self::with_config(DatabaseConfig::default())
    }

    /// Empty database whose created records follow `config`
    pub fn with_config(config: DatabaseConfig) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// Process-wide database
    pub fn master() -> &'static PvDatabase {
        &MASTER
    }

    /// Config applied by [`create_record`](PvDatabase::create_record)
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Create a record with this database's options and register it
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::DuplicateRecord`] if the name is taken, or the
    /// record's initialization error.
    pub fn create_record(
        &self,
        name: impl Into<String>,
        data: PvStructure,
    ) -> RecordResult<Arc<Record>> {
        let name = name.into();
        if self.records.read().contains_key(&name) {
            return Err(RecordError::DuplicateRecord(name));
        }
        let record = Record::builder(name)
            .options(self.config.record_options())
            .create(data)?;
        self.add_record(Arc::clone(&record))?;
        Ok(record)
    }

    /// Register an existing record
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::DuplicateRecord`] if a record with the same name
    /// is already registered.
    pub fn add_record(&self, record: Arc<Record>) -> RecordResult<()> {
        let mut records = self.records.write();
        if records.contains_key(record.name()) {
            return Err(RecordError::DuplicateRecord(record.name().to_string()));
        }
        debug!(record = %record.name(), "add_record");
        records.insert(record.name().to_string(), record);
        Ok(())
    }

    /// Record by name
    pub fn find_record(&self, name: &str) -> Option<Arc<Record>> {
        self.records.read().get(name).cloned()
    }

    /// Unregister and tear down a record
    ///
    /// Returns `false` if no record has that name.
    pub fn remove_record(&self, name: &str) -> bool {
        let removed = self.records.write().remove(name);
        match removed {
            Some(record) => {
                debug!(record = %name, "remove_record");
                record.teardown();
                true
            }
            None => false,
        }
    }

    /// Registered names in sorted order
    pub fn record_names(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    /// Number of registered records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no records are registered
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for PvDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PvDatabase {
    fn drop(&mut self) {
        let records = std::mem::take(self.records.get_mut());
        if !records.is_empty() {
            info!(records = records.len(), "tearing down database");
        }
        for record in records.values() {
            record.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordClient;
    use pvdatabase_core::{standard, ScalarType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn structure() -> PvStructure {
        PvStructure::new(&standard::scalar(ScalarType::Double, "alarm,timeStamp"))
    }

    #[derive(Default)]
    struct Detacher {
        detached: AtomicUsize,
    }

    impl RecordClient for Detacher {
        fn on_detach(&self, _record: &Record) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_create_and_find() {
        let db = PvDatabase::new();
        let record = db.create_record("a", structure()).unwrap();
        let found = db.find_record("a").unwrap();
        assert!(Arc::ptr_eq(&record, &found));
        assert!(db.find_record("b").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let db = PvDatabase::new();
        db.create_record("a", structure()).unwrap();
        let err = db.create_record("a", structure()).unwrap_err();
        assert!(matches!(err, RecordError::DuplicateRecord(_)));

        let other = Record::create("a", structure()).unwrap();
        assert!(db.add_record(other).is_err());
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let db = PvDatabase::new();
        for name in ["c", "a", "b"] {
            db.create_record(name, structure()).unwrap();
        }
        assert_eq!(db.record_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_tears_down() {
        let db = PvDatabase::new();
        let record = db.create_record("a", structure()).unwrap();
        let client = Arc::new(Detacher::default());
        record.add_client(&client).unwrap();

        assert!(db.remove_record("a"));
        assert!(!db.remove_record("a"));
        assert!(record.is_torn_down());
        assert_eq!(client.detached.load(Ordering::SeqCst), 1);
        assert!(db.is_empty());
    }

    #[test]
    fn test_drop_tears_down_records() {
        let client = Arc::new(Detacher::default());
        let record = {
            let db = PvDatabase::new();
            let record = db.create_record("a", structure()).unwrap();
            record.add_client(&client).unwrap();
            record
        };
        assert!(record.is_torn_down());
        assert_eq!(client.detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_applied_to_created_records() {
        let db = PvDatabase::with_config(DatabaseConfig {
            trace_level: 2,
            time_stamp_field: String::new(),
        });
        let record = db.create_record("a", structure()).unwrap();
        assert_eq!(record.trace_level(), 2);
        assert_eq!(record.lock().time_stamp().unwrap(), None);
    }

    #[test]
    fn test_master_is_shared() {
        let name = "database::tests::master";
        PvDatabase::master().create_record(name, structure()).unwrap();
        assert!(PvDatabase::master().find_record(name).is_some());
        assert!(PvDatabase::master().remove_record(name));
    }
}
