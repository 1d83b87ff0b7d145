//! Multi-threaded record tests
//!
//! These tests verify record locking under real concurrent execution:
//!
//! 1. **Cross-record locking** - opposite acquisition orders never deadlock
//! 2. **Serialized fan-out** - notifications of concurrent puts never interleave
//! 3. **Teardown races** - subscribers added during teardown are either
//!    unlinked or rejected, never leaked
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test concurrency_tests
//! ```

use parking_lot::Mutex;
use pvdatabase_core::{standard, PvStructure, ScalarType};
use pvdatabase_engine::{
    FieldSelection, Record, RecordClient, RecordError, RecordField, RecordListener,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(30);

fn scalar_record(name: &str) -> Arc<Record> {
    Record::create(
        name,
        PvStructure::new(&standard::scalar(ScalarType::Long, "alarm,timeStamp")),
    )
    .unwrap()
}

/// Run `f` on a worker thread and fail the test if it does not finish in time
fn within_timeout<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        f();
        let _ = tx.send(());
    });
    rx.recv_timeout(DEADLOCK_TIMEOUT)
        .expect("workers did not finish: possible deadlock");
    handle.join().unwrap();
}

// ============================================================================
// SECTION 1: Cross-record locking
// ============================================================================

mod cross_record_locking {
    use super::*;

    /// Two threads each hold their own record and ask for the other one.
    /// Without ordered acquisition this is the classic AB-BA deadlock.
    #[test]
    fn test_opposite_order_does_not_deadlock() {
        let a = scalar_record("a");
        let b = scalar_record("b");
        let iterations = 2_000;

        within_timeout(move || {
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = [(a.clone(), b.clone()), (b, a)]
                .into_iter()
                .map(|(first, second)| {
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        for _ in 0..iterations {
                            let guard = first.lock();
                            let (g1, g2) = guard.lock_other_record(&second).unwrap();
                            assert_eq!(g1.record().name(), first.name());
                            assert_eq!(g2.record().name(), second.name());
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    }

    /// Many threads shuffle across a ring of records, each pairing a record
    /// with its neighbour in both directions.
    #[test]
    fn test_ring_of_records_stress() {
        let records: Vec<_> = (0..6).map(|i| scalar_record(&format!("ring{}", i))).collect();
        let records = Arc::new(records);
        let transfers = Arc::new(AtomicUsize::new(0));

        let transfers_in = Arc::clone(&transfers);
        within_timeout(move || {
            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let records = Arc::clone(&records);
                    let transfers = Arc::clone(&transfers_in);
                    thread::spawn(move || {
                        let n = records.len();
                        for i in 0..500 {
                            let here = &records[(t + i) % n];
                            let there = if t % 2 == 0 {
                                &records[(t + i + 1) % n]
                            } else {
                                &records[(t + i + n - 1) % n]
                            };
                            let value = here.field_by_name("value").unwrap().id();
                            let (mut g1, mut g2) = here.lock().lock_other_record(there).unwrap();
                            g1.put(value, 1i64).unwrap();
                            g2.put(value, -1i64).unwrap();
                            transfers.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });

        assert_eq!(transfers.load(Ordering::SeqCst), 8 * 500);
    }

    #[test]
    fn test_same_record_is_rejected() {
        let a = scalar_record("a");
        let err = a.lock().lock_other_record(&a).unwrap_err();
        assert!(matches!(err, RecordError::SameRecord(_)));
    }
}

// ============================================================================
// SECTION 2: Serialized fan-out
// ============================================================================

mod serialized_fan_out {
    use super::*;

    /// Records the thread that produced each group-put bracket and every
    /// change seen in between.
    #[derive(Default)]
    struct BracketChecker {
        open: Mutex<Option<thread::ThreadId>>,
        violations: AtomicUsize,
        changes: AtomicUsize,
    }

    impl RecordListener for BracketChecker {
        fn on_field_changed(&self, _field: &RecordField, _data: &PvStructure) {
            if *self.open.lock() != Some(thread::current().id()) {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
            self.changes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_sub_field_changed(&self, _s: &RecordField, _c: &RecordField, _data: &PvStructure) {}

        fn on_group_put_begin(&self, _record: &Record) {
            let mut open = self.open.lock();
            if open.is_some() {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
            *open = Some(thread::current().id());
        }

        fn on_group_put_end(&self, _record: &Record) {
            *self.open.lock() = None;
        }

        fn on_unlink(&self, _record: &Record) {}
    }

    #[test]
    fn test_concurrent_group_puts_do_not_interleave() {
        let record = scalar_record("rec");
        let checker = Arc::new(BracketChecker::default());
        let selection = FieldSelection::new(&record, &["value"]).unwrap();
        record.add_listener(&checker, &selection).unwrap();
        let value = record.field_by_name("value").unwrap().id();

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let record = Arc::clone(&record);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..250 {
                        let mut guard = record.lock();
                        guard
                            .group_put(|g| {
                                g.put(value, (t * 1_000 + i) as i64)?;
                                g.put(value, (t * 1_000 + i + 1) as i64)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(checker.violations.load(Ordering::SeqCst), 0);
        assert_eq!(checker.changes.load(Ordering::SeqCst), 4 * 250 * 2);
    }
}

// ============================================================================
// SECTION 3: Teardown races
// ============================================================================

mod teardown_races {
    use super::*;

    #[derive(Default)]
    struct Counting {
        unlinked: AtomicUsize,
        detached: AtomicUsize,
    }

    impl RecordListener for Counting {
        fn on_field_changed(&self, _field: &RecordField, _data: &PvStructure) {}

        fn on_sub_field_changed(&self, _s: &RecordField, _c: &RecordField, _data: &PvStructure) {}

        fn on_unlink(&self, _record: &Record) {
            self.unlinked.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl RecordClient for Counting {
        fn on_detach(&self, _record: &Record) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Every subscriber that was accepted is told exactly once; every one
    /// that was not accepted got `TornDown`.
    #[test]
    fn test_subscribe_during_teardown() {
        for round in 0..50 {
            let record = scalar_record(&format!("race{}", round));
            let barrier = Arc::new(Barrier::new(3));

            let subscribers: Vec<_> = (0..2)
                .map(|_| {
                    let record = Arc::clone(&record);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let mut accepted = Vec::new();
                        for _ in 0..20 {
                            let sub = Arc::new(Counting::default());
                            let listened = record
                                .add_listener(&sub, &FieldSelection::whole_record())
                                .is_ok();
                            let attached = record.add_client(&sub).is_ok();
                            accepted.push((sub, listened, attached));
                        }
                        accepted
                    })
                })
                .collect();

            let tearer = {
                let record = Arc::clone(&record);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    record.teardown();
                })
            };

            tearer.join().unwrap();
            for handle in subscribers {
                for (sub, listened, attached) in handle.join().unwrap() {
                    let unlinked = sub.unlinked.load(Ordering::SeqCst);
                    let detached = sub.detached.load(Ordering::SeqCst);
                    assert_eq!(unlinked, usize::from(listened));
                    assert_eq!(detached, usize::from(attached));
                }
            }
            assert!(record.is_torn_down());
        }
    }
}
