//! Change propagation and group put
//!
//! `post_put` on a node notifies three populations, each exactly once:
//! 1. listeners on every ancestor structure, root included, with the
//!    ancestor and the originating node
//! 2. listeners on the node itself
//! 3. listeners on every descendant when the node is a structure
//!
//! Ancestors are visited first, nearest first; then the node and its
//! subtree depth-first in offset order.

use super::{NodeId, RecordGuard, RecordListener, TRACE_LOCKING};
use crate::error::{RecordError, RecordResult};
use pvdatabase_core::{FieldMut, Scalar};
use std::sync::{Arc, Weak};
use tracing::trace;

fn live(list: &[Weak<dyn RecordListener>]) -> impl Iterator<Item = Arc<dyn RecordListener>> + '_ {
    list.iter().filter_map(Weak::upgrade)
}

impl RecordGuard<'_> {
    fn ensure_live(&self) -> RecordResult<()> {
        if self.state.torn_down {
            return Err(RecordError::TornDown(self.record.name.clone()));
        }
        Ok(())
    }

    /// Announce that the value of `field` changed
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NodeNotInRecord`] for a node id from another
    /// record, or [`RecordError::TornDown`].
    pub fn post_put(&self, field: NodeId) -> RecordResult<()> {
        self.ensure_live()?;
        let record = self.record;
        let origin = record.node_or_err(field)?;
        let state = &*self.state;

        let mut parent = origin.parent();
        while let Some(id) = parent {
            let structure = record.node_or_err(id)?;
            for listener in live(&state.field_listeners[id.index()]) {
                listener.on_sub_field_changed(structure, origin, &state.data);
            }
            parent = structure.parent();
        }

        let mut pending = vec![field];
        while let Some(id) = pending.pop() {
            let node = record.node_or_err(id)?;
            for listener in live(&state.field_listeners[id.index()]) {
                listener.on_field_changed(node, &state.data);
            }
            pending.extend(node.children().iter().rev().copied());
        }
        Ok(())
    }

    /// Change the values behind `field`, then post the change
    ///
    /// `f` gets value-level write access to the field and its descendants.
    /// Nothing is posted if `f` fails.
    pub fn update<F>(&mut self, field: NodeId, f: F) -> RecordResult<()>
    where
        F: FnOnce(&mut FieldMut<'_>) -> pvdatabase_core::Result<()>,
    {
        self.ensure_live()?;
        let record = self.record;
        let offset = record.node_or_err(field)?.offset();
        let mut target = self
            .state
            .data
            .field_at_mut(offset)
            .ok_or_else(|| RecordError::FieldNotInRecord {
                record: record.name.clone(),
                offset,
            })?;
        f(&mut target)?;
        self.post_put(field)
    }

    /// Write a scalar and post the change
    pub fn put(&mut self, field: NodeId, value: impl Into<Scalar>) -> RecordResult<()> {
        let value = value.into();
        self.update(field, move |f| f.set_scalar(value))
    }

    /// Replace an array's elements and post the change
    pub fn put_array(&mut self, field: NodeId, values: Vec<Scalar>) -> RecordResult<()> {
        self.update(field, move |f| f.set_array(values))
    }

    /// Open a group put
    ///
    /// Only the outermost call notifies record-level listeners.
    pub fn begin_group_put(&mut self) {
        self.state.depth_group_put += 1;
        if self.state.depth_group_put > 1 {
            return;
        }
        if self.record.traces(TRACE_LOCKING) {
            trace!(record = %self.record.name, "begin_group_put");
        }
        for listener in live(&self.state.listeners) {
            listener.on_group_put_begin(self.record);
        }
    }

    /// Close a group put
    ///
    /// Only the call that closes the outermost group put notifies.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::GroupPutUnderflow`] if no group put is open.
    pub fn end_group_put(&mut self) -> RecordResult<()> {
        if self.state.depth_group_put == 0 {
            return Err(RecordError::GroupPutUnderflow(self.record.name.clone()));
        }
        self.state.depth_group_put -= 1;
        if self.state.depth_group_put > 0 {
            return Ok(());
        }
        if self.record.traces(TRACE_LOCKING) {
            trace!(record = %self.record.name, "end_group_put");
        }
        for listener in live(&self.state.listeners) {
            listener.on_group_put_end(self.record);
        }
        Ok(())
    }

    /// Run `f` inside a group put
    ///
    /// The group put is closed whether `f` succeeds or fails.
    pub fn group_put<T, F>(&mut self, f: F) -> RecordResult<T>
    where
        F: FnOnce(&mut Self) -> RecordResult<T>,
    {
        self.begin_group_put();
        let result = f(self);
        self.end_group_put()?;
        result
    }
}
