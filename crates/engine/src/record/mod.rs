//! Record: a named, independently lockable field tree
//!
//! A [`Record`] owns its value tree ([`PvStructure`]), a mirror tree of
//! [`RecordField`] nodes used for indexing and notification, and one mutex
//! guarding all mutable state:
//! - the field values
//! - the record-level listener and client registries
//! - per-node listener lists
//! - the group-put depth
//! - the time stamp binding
//!
//! ## Locking
//!
//! [`Record::lock`] returns a [`RecordGuard`]; dropping the guard unlocks.
//! Value mutation, `post_put`, group put and `process` are guard methods, so
//! they can only run with the lock held. Holding two record locks at once is
//! only sanctioned through [`RecordGuard::lock_other_record`], which acquires
//! them in ascending sequence-number order.
//!
//! Listener callbacks made from guard methods run with the lock held and
//! must not lock the same record again. Teardown callbacks run unlocked.

mod builder;
mod notify;
mod process;
mod subscription;
mod tree;

pub use builder::RecordBuilder;
pub use process::ProcessHook;
pub use subscription::{RecordClient, RecordListener};
pub use tree::{NodeId, RecordField};

use crate::error::{RecordError, RecordResult};
use parking_lot::{Mutex, MutexGuard};
use pvdatabase_core::{FieldMut, PvField, PvStructure};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;
use tree::FieldTree;

/// Source of record sequence numbers; gives every record a stable rank in
/// the global lock order.
static NEXT_RECORD_SEQ: AtomicU64 = AtomicU64::new(1);

/// Trace level at which teardown is logged
pub(crate) const TRACE_TEARDOWN: u8 = 0;
/// Trace level at which subscription changes are logged
pub(crate) const TRACE_SUBSCRIPTION: u8 = 1;
/// Trace level at which locking, process and group put are logged
pub(crate) const TRACE_LOCKING: u8 = 2;

/// Mutable state guarded by the record lock
pub(crate) struct RecordState {
    pub(crate) data: PvStructure,
    pub(crate) depth_group_put: usize,
    pub(crate) listeners: Vec<Weak<dyn RecordListener>>,
    pub(crate) clients: Vec<Weak<dyn RecordClient>>,
    /// Listener lists indexed by [`NodeId`]
    pub(crate) field_listeners: Vec<Vec<Weak<dyn RecordListener>>>,
    pub(crate) time_stamp: Option<NodeId>,
    pub(crate) torn_down: bool,
}

/// A named process-variable record
pub struct Record {
    name: String,
    seq: u64,
    tree: FieldTree,
    state: Mutex<RecordState>,
    trace_level: AtomicU8,
    process_hook: Option<Box<dyn ProcessHook>>,
}

impl Record {
    /// Create a record with default options
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Initialization`] if the record cannot be
    /// initialized; no record is created in that case.
    pub fn create(name: impl Into<String>, data: PvStructure) -> RecordResult<Arc<Record>> {
        Record::builder(name).create(data)
    }

    /// Start building a record with custom options or a process hook
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder::new(name)
    }

    /// Claim the next position in the global lock order
    pub(crate) fn next_sequence() -> u64 {
        NEXT_RECORD_SEQ.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn from_parts(
        name: String,
        seq: u64,
        data: PvStructure,
        mut tree: FieldTree,
        time_stamp: Option<NodeId>,
        trace_level: u8,
        process_hook: Option<Box<dyn ProcessHook>>,
    ) -> Arc<Record> {
        let node_count = tree.len();
        Arc::new_cyclic(|weak| {
            tree.bind(weak);
            Record {
                name,
                seq,
                tree,
                state: Mutex::new(RecordState {
                    data,
                    depth_group_put: 0,
                    listeners: Vec::new(),
                    clients: Vec::new(),
                    field_listeners: vec![Vec::new(); node_count],
                    time_stamp,
                    torn_down: false,
                }),
                trace_level: AtomicU8::new(trace_level),
                process_hook,
            }
        })
    }

    /// Record name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of this record in the global lock order
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Current trace level
    pub fn trace_level(&self) -> u8 {
        self.trace_level.load(Ordering::Relaxed)
    }

    /// Change the trace level
    pub fn set_trace_level(&self, level: u8) {
        self.trace_level.store(level, Ordering::Relaxed);
    }

    pub(crate) fn traces(&self, above: u8) -> bool {
        self.trace_level() > above
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Acquire the record lock, blocking until it is available
    pub fn lock(&self) -> RecordGuard<'_> {
        if self.traces(TRACE_LOCKING) {
            trace!(record = %self.name, "lock");
        }
        RecordGuard {
            record: self,
            state: self.state.lock(),
        }
    }

    /// Acquire the record lock only if it is free right now
    pub fn try_lock(&self) -> Option<RecordGuard<'_>> {
        if self.traces(TRACE_LOCKING) {
            trace!(record = %self.name, "try_lock");
        }
        self.state.try_lock().map(|state| RecordGuard {
            record: self,
            state,
        })
    }

    // =========================================================================
    // Field tree
    // =========================================================================

    /// Root structure node
    pub fn root(&self) -> &RecordField {
        self.tree.root()
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&RecordField> {
        self.tree.get(id)
    }

    /// All nodes in preorder
    pub fn fields(&self) -> impl Iterator<Item = &RecordField> {
        self.tree.iter()
    }

    /// Number of nodes in the field tree
    pub fn field_count(&self) -> usize {
        self.tree.len()
    }

    /// Node whose underlying field has exactly this offset
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::FieldNotInRecord`] if the offset is not part of
    /// this record's field tree.
    pub fn find_node(&self, offset: usize) -> RecordResult<&RecordField> {
        self.tree
            .find_node(offset)
            .ok_or_else(|| RecordError::FieldNotInRecord {
                record: self.name.clone(),
                offset,
            })
    }

    /// Node mirroring `field`
    pub fn find_field(&self, field: &PvField) -> RecordResult<&RecordField> {
        self.find_node(field.offset())
    }

    /// Node by dotted path relative to the root (`""` is the root)
    pub fn field_by_name(&self, path: &str) -> Option<&RecordField> {
        self.tree.iter().find(|n| n.full_field_name() == path)
    }

    pub(crate) fn node_or_err(&self, id: NodeId) -> RecordResult<&RecordField> {
        self.tree
            .get(id)
            .ok_or_else(|| RecordError::NodeNotInRecord {
                record: self.name.clone(),
                node: id,
            })
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("name", &self.name)
            .field("seq", &self.seq)
            .field("fields", &self.tree.len())
            .finish()
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        if self.traces(TRACE_TEARDOWN) {
            trace!(record = %self.name, "drop");
        }
        self.teardown();
    }
}

// =============================================================================
// RecordGuard
// =============================================================================

/// Exclusive access to a record's mutable state
///
/// The lock is released when the guard is dropped.
pub struct RecordGuard<'a> {
    record: &'a Record,
    state: MutexGuard<'a, RecordState>,
}

impl<'a> RecordGuard<'a> {
    /// Record this guard locks
    pub fn record(&self) -> &'a Record {
        self.record
    }

    /// Current field values
    pub fn data(&self) -> &PvStructure {
        &self.state.data
    }

    /// Write access to the field values
    ///
    /// Only leaf values can be changed; the layout the field tree mirrors
    /// stays fixed:
    ///
    /// ```compile_fail
    /// use pvdatabase_core::{standard, PvField, PvStructure};
    /// use pvdatabase_engine::Record;
    ///
    /// let record = Record::create("rec", PvStructure::new(&standard::alarm())).unwrap();
    /// let other: PvField = PvStructure::new(&standard::time_stamp()).as_field().clone();
    /// let mut guard = record.lock();
    /// *guard.data_mut() = other;
    /// ```
    ///
    /// Changes made here are not announced; call
    /// [`post_put`](RecordGuard::post_put) for every changed field, or use
    /// [`put`](RecordGuard::put) / [`update`](RecordGuard::update) which do it
    /// for you.
    pub fn data_mut(&mut self) -> FieldMut<'_> {
        self.state.data.root_mut()
    }

    /// Current group-put nesting depth
    pub fn group_put_depth(&self) -> usize {
        self.state.depth_group_put
    }

    /// Release the lock
    pub fn unlock(self) {
        if self.record.traces(TRACE_LOCKING) {
            trace!(record = %self.record.name, "unlock");
        }
    }

    /// Lock `other` while this record is locked
    ///
    /// Both locks are always taken in ascending sequence order. If `other`
    /// ranks below this record, this record's lock is released, `other` is
    /// locked, and this record is locked again; state observed before the
    /// call may have changed in that window.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SameRecord`] if `other` is this record. The
    /// guard is released in that case.
    pub fn lock_other_record<'b>(
        self,
        other: &'b Record,
    ) -> RecordResult<(RecordGuard<'a>, RecordGuard<'b>)> {
        let record = self.record;
        if std::ptr::eq(record, other) {
            return Err(RecordError::SameRecord(record.name.clone()));
        }
        if record.traces(TRACE_LOCKING) {
            trace!(record = %record.name, other = %other.name, "lock_other_record");
        }
        if record.seq < other.seq {
            let other_guard = other.lock();
            return Ok((self, other_guard));
        }
        drop(self);
        let other_guard = other.lock();
        let guard = record.lock();
        Ok((guard, other_guard))
    }
}

impl fmt::Debug for RecordGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordGuard")
            .field("record", &self.record.name)
            .field("depth_group_put", &self.state.depth_group_put)
            .finish()
    }
}

impl fmt::Display for RecordGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "record {}", self.record.name)?;
        for line in self.state.data.to_string().lines() {
            writeln!(f, "    {}", line)?;
        }
        Ok(())
    }
}
