//! Listener and client registration and record teardown
//!
//! Records and nodes only observe their subscribers: every registry holds
//! `Weak` handles, so dropping the last `Arc` to a listener or client is
//! enough to unsubscribe it. Dead handles are skipped during notification
//! and pruned lazily.

use super::{NodeId, Record, RecordField, TRACE_SUBSCRIPTION, TRACE_TEARDOWN};
use crate::error::{RecordError, RecordResult};
use crate::projection::Projection;
use pvdatabase_core::PvStructure;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Subscriber for field changes and record-level events
///
/// Field and group-put callbacks are made while the writer holds the record
/// lock: read what you need from the arguments and do not lock the record
/// from inside them. `on_unlink` is called without the lock.
pub trait RecordListener: Send + Sync {
    /// A field this listener is registered on changed
    fn on_field_changed(&self, field: &RecordField, data: &PvStructure);

    /// A field below a structure this listener is registered on changed
    fn on_sub_field_changed(&self, structure: &RecordField, changed: &RecordField, data: &PvStructure);

    /// The outermost group put on `record` started
    fn on_group_put_begin(&self, _record: &Record) {}

    /// The outermost group put on `record` finished
    fn on_group_put_end(&self, _record: &Record) {}

    /// The record is being torn down; the listener is no longer registered
    fn on_unlink(&self, record: &Record);
}

/// Attachment that must let go of a record when it is torn down
pub trait RecordClient: Send + Sync {
    /// The record is being torn down
    fn on_detach(&self, record: &Record);
}

/// Compare a weak handle against a strong one by address
fn same_target<T: ?Sized, U: ?Sized>(weak: &Weak<T>, target: &Arc<U>) -> bool {
    std::ptr::eq(weak.as_ptr() as *const (), Arc::as_ptr(target) as *const ())
}

impl Record {
    /// Register a client to be detached at teardown
    ///
    /// Clients that have already been dropped are pruned first. Adding a
    /// client twice registers it once.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::TornDown`] if the record was already torn down.
    pub fn add_client<C: RecordClient + 'static>(&self, client: &Arc<C>) -> RecordResult<()> {
        if self.traces(TRACE_SUBSCRIPTION) {
            debug!(record = %self.name, "add_client");
        }
        let weak: Weak<C> = Arc::downgrade(client);
        let weak: Weak<dyn RecordClient> = weak;
        let mut state = self.state.lock();
        if state.torn_down {
            return Err(RecordError::TornDown(self.name.clone()));
        }
        state.clients.retain(|c| c.strong_count() > 0);
        if !state.clients.iter().any(|c| same_target(c, client)) {
            state.clients.push(weak);
        }
        Ok(())
    }

    /// Register `listener` on every record field `projection` maps onto
    ///
    /// The listener is also recorded at record level so it sees group-put
    /// and unlink events. A listener is held at most once per node and once
    /// at record level, however many projections it registers through. All
    /// master fields are resolved before anything is registered, so a failure
    /// leaves no partial registration.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::FieldNotInRecord`] if the projection names a
    /// field outside this record, or [`RecordError::TornDown`].
    pub fn add_listener<L: RecordListener + 'static>(
        &self,
        listener: &Arc<L>,
        projection: &dyn Projection,
    ) -> RecordResult<()> {
        if self.traces(TRACE_SUBSCRIPTION) {
            debug!(record = %self.name, "add_listener");
        }
        let nodes = self.resolve(projection)?;
        let weak: Weak<L> = Arc::downgrade(listener);
        let weak: Weak<dyn RecordListener> = weak;
        let mut state = self.state.lock();
        if state.torn_down {
            return Err(RecordError::TornDown(self.name.clone()));
        }
        state.listeners.retain(|l| l.strong_count() > 0);
        if !state.listeners.iter().any(|l| same_target(l, listener)) {
            state.listeners.push(weak.clone());
        }
        for id in nodes {
            let list = &mut state.field_listeners[id.index()];
            list.retain(|l| l.strong_count() > 0);
            if !list.iter().any(|l| same_target(l, listener)) {
                list.push(weak.clone());
            }
        }
        Ok(())
    }

    /// Unregister `listener` from every field `projection` maps onto
    ///
    /// The listener stays registered at record level while it is still on
    /// some field through another projection. Returns `false` if the listener
    /// was not registered on this record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::FieldNotInRecord`] if the projection names a
    /// field outside this record.
    pub fn remove_listener<L: RecordListener + 'static>(
        &self,
        listener: &Arc<L>,
        projection: &dyn Projection,
    ) -> RecordResult<bool> {
        if self.traces(TRACE_SUBSCRIPTION) {
            debug!(record = %self.name, "remove_listener");
        }
        let nodes = self.resolve(projection)?;
        let mut state = self.state.lock();
        if !state.listeners.iter().any(|l| same_target(l, listener)) {
            return Ok(false);
        }
        for id in nodes {
            state.field_listeners[id.index()].retain(|l| !same_target(l, listener));
        }
        let still_listening = state
            .field_listeners
            .iter()
            .flatten()
            .any(|l| same_target(l, listener));
        if !still_listening {
            state.listeners.retain(|l| !same_target(l, listener));
        }
        Ok(true)
    }

    fn resolve(&self, projection: &dyn Projection) -> RecordResult<Vec<NodeId>> {
        let mut nodes = Vec::new();
        projection.traverse_master(&mut |offset: usize| -> RecordResult<()> {
            nodes.push(self.find_node(offset)?.id());
            Ok(())
        })?;
        Ok(nodes)
    }

    /// Number of live listeners registered at record level
    pub fn listener_count(&self) -> usize {
        let state = self.state.lock();
        state.listeners.iter().filter(|l| l.strong_count() > 0).count()
    }

    /// Number of live clients
    pub fn client_count(&self) -> usize {
        let state = self.state.lock();
        state.clients.iter().filter(|c| c.strong_count() > 0).count()
    }

    /// Whether [`teardown`](Record::teardown) has run
    pub fn is_torn_down(&self) -> bool {
        self.state.lock().torn_down
    }

    /// Unlink every listener and detach every client
    ///
    /// The registries are snapshotted and cleared under the lock, the time
    /// stamp binding is dropped and the record is marked torn down; the
    /// callbacks then run with the lock released. Calling this again is a
    /// no-op. Also runs when the record is dropped.
    pub fn teardown(&self) {
        let (listeners, clients) = {
            let mut state = self.state.lock();
            state.time_stamp = None;
            state.torn_down = true;
            state.field_listeners.iter_mut().for_each(Vec::clear);
            (
                std::mem::take(&mut state.listeners),
                std::mem::take(&mut state.clients),
            )
        };
        if listeners.is_empty() && clients.is_empty() {
            return;
        }
        if self.traces(TRACE_TEARDOWN) {
            debug!(
                record = %self.name,
                listeners = listeners.len(),
                clients = clients.len(),
                "teardown"
            );
        }
        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.on_unlink(self);
        }
        for client in clients.iter().filter_map(Weak::upgrade) {
            client.on_detach(self);
        }
    }
}
