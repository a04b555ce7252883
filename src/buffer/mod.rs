//! Location buffering for before/after event analytics.
//!
//! Two structures are mutated from more than one call path: the ring of recent raw
//! locations (written by location delivery) and the set of pending event windows
//! (written by location delivery, by event handlers opening windows, and by session
//! stop flushing them). Both live behind a single lock in [`LocationBuffers`] so a
//! window never snapshots a half-updated ring and no location is fed twice or lost.
//!
//! Completion callbacks always run after the lock is released, so a callback may
//! read [`LocationBuffers::last_location`] or open another window without deadlock.

mod ring;
mod window;

pub use ring::RingBuffer;
pub use window::{EventWindow, PendingWindows, WindowCallback};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::types::LocationSample;

/// Default number of locations kept before and after an event.
pub const LOCATION_BUFFER_MAX_SIZE: usize = 20;

#[derive(Debug)]
struct Buffers {
    recent: RingBuffer<LocationSample>,
    pending: PendingWindows,
}

/// Ring of recent locations plus the pending event windows, under one lock.
#[derive(Debug)]
pub struct LocationBuffers {
    inner: Mutex<Buffers>,
    capacity: usize,
}

impl Default for LocationBuffers {
    fn default() -> Self {
        Self::new(LOCATION_BUFFER_MAX_SIZE)
    }
}

impl LocationBuffers {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Buffers {
                recent: RingBuffer::new(capacity),
                pending: PendingWindows::new(capacity),
            }),
            capacity,
        }
    }

    /// Capacity of both the ring and each window's post-event half.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a raw location and feed it to every open window.
    ///
    /// Windows that reach capacity are completed before this returns.
    pub fn record(&self, sample: LocationSample) {
        let full = {
            let mut buffers = self.inner.lock();
            let full = buffers.pending.feed(&sample);
            buffers.recent.push(sample);
            full
        };

        if !full.is_empty() {
            trace!(completed = full.len(), "event windows filled");
        }
        full.into_iter().for_each(EventWindow::complete);
    }

    /// Open a window whose pre-event half is the current ring contents.
    pub fn open_window(&self, on_complete: WindowCallback) {
        let mut buffers = self.inner.lock();
        let pre_event = buffers.recent.snapshot();
        trace!(pre_event = pre_event.len(), "opening event window");
        buffers.pending.open(EventWindow::new(pre_event, on_complete));
    }

    /// Complete every open window with whatever it has collected so far.
    pub fn flush(&self) {
        let windows = self.inner.lock().pending.drain();
        debug!(pending = windows.len(), "flushing event location windows");
        windows.into_iter().for_each(EventWindow::complete);
    }

    /// Copy of the recent locations, oldest first.
    pub fn snapshot(&self) -> Vec<LocationSample> {
        self.inner.lock().recent.snapshot()
    }

    pub fn last_location(&self) -> Option<LocationSample> {
        self.inner.lock().recent.last().cloned()
    }

    pub fn pending_windows(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Captured = Arc<Mutex<Vec<(usize, Vec<i64>, Vec<i64>)>>>;

    fn sample(i: i64) -> LocationSample {
        LocationSample::new(i, 0.0, 0.0)
    }

    fn capture(id: usize, into: &Captured) -> WindowCallback {
        let into = Arc::clone(into);
        Box::new(move |pre, post| {
            let ids = |v: Vec<LocationSample>| -> Vec<i64> {
                v.into_iter().map(|s| s.timestamp_ms).collect()
            };
            into.lock().push((id, ids(pre), ids(post)));
        })
    }

    #[test]
    fn feeding_capacity_completes_exactly_once() {
        let buffers = LocationBuffers::new(20);
        let captured = Captured::default();

        buffers.open_window(capture(0, &captured));
        for i in 0..20 {
            buffers.record(sample(i));
        }
        for i in 20..30 {
            buffers.record(sample(i));
        }
        buffers.flush();

        let captured = captured.lock();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].2.len(), 20);
        assert_eq!(buffers.pending_windows(), 0);
    }

    #[test]
    fn flush_completes_partial_window_once() {
        let buffers = LocationBuffers::new(20);
        let captured = Captured::default();

        buffers.record(sample(0));
        buffers.open_window(capture(0, &captured));
        for i in 1..6 {
            buffers.record(sample(i));
        }
        buffers.flush();
        buffers.flush();

        let captured = captured.lock();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].1, vec![0]);
        assert_eq!(captured[0].2, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn pre_and_post_windows_cap_at_capacity() {
        let buffers = LocationBuffers::new(20);
        let captured = Captured::default();

        buffers.open_window(capture(0, &captured));
        for i in 0..5 {
            buffers.record(sample(i));
        }
        buffers.open_window(capture(1, &captured));
        for i in 5..17 {
            buffers.record(sample(i));
        }
        buffers.open_window(capture(2, &captured));
        for i in 17..29 {
            buffers.record(sample(i));
        }
        buffers.open_window(capture(3, &captured));
        for i in 29..42 {
            buffers.record(sample(i));
        }
        buffers.open_window(capture(4, &captured));
        buffers.flush();

        let mut captured = captured.lock().clone();
        captured.sort_by_key(|(id, _, _)| *id);
        let range = |r: std::ops::Range<i64>| r.collect::<Vec<_>>();

        assert_eq!(captured.len(), 5);
        assert_eq!(captured[0].1, range(0..0));
        assert_eq!(captured[0].2, range(0..20));
        assert_eq!(captured[1].1, range(0..5));
        assert_eq!(captured[1].2, range(5..25));
        assert_eq!(captured[2].1, range(0..17));
        assert_eq!(captured[2].2, range(17..37));
        assert_eq!(captured[3].1, range(9..29));
        assert_eq!(captured[3].2, range(29..42));
        assert_eq!(captured[4].1, range(22..42));
        assert_eq!(captured[4].2, range(0..0));

        let pre: Vec<_> = captured.iter().map(|(_, pre, _)| pre.len()).collect();
        let post: Vec<_> = captured.iter().map(|(_, _, post)| post.len()).collect();
        assert_eq!(pre, vec![0, 5, 17, 20, 20]);
        assert_eq!(post, vec![20, 20, 20, 13, 0]);
    }

    #[test]
    fn callback_may_reenter_buffers() {
        let buffers = Arc::new(LocationBuffers::new(2));
        let observed = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&buffers);
        let slot = Arc::clone(&observed);
        buffers.open_window(Box::new(move |_, _| {
            *slot.lock() = inner.last_location().map(|s| s.timestamp_ms);
            inner.open_window(Box::new(|_, _| {}));
        }));
        buffers.record(sample(1));
        buffers.record(sample(2));

        assert_eq!(*observed.lock(), Some(2));
        assert_eq!(buffers.pending_windows(), 1);
    }

    #[test]
    fn concurrent_record_and_open() {
        let buffers = Arc::new(LocationBuffers::new(20));
        let captured = Captured::default();

        let writer = {
            let buffers = Arc::clone(&buffers);
            std::thread::spawn(move || {
                for i in 0..500 {
                    buffers.record(sample(i));
                }
            })
        };
        for id in 0..50 {
            buffers.open_window(capture(id, &captured));
        }
        writer.join().unwrap();
        buffers.flush();

        let captured = captured.lock();
        assert_eq!(captured.len(), 50);
        for (_, pre, post) in captured.iter() {
            assert!(pre.len() <= 20);
            assert!(post.len() <= 20);
            // each half is a contiguous run of arrivals
            for half in [pre, post] {
                assert!(half.windows(2).all(|w| w[1] == w[0] + 1));
            }
            if let (Some(last_pre), Some(first_post)) = (pre.last(), post.first()) {
                assert_eq!(*first_post, last_pre + 1);
            }
        }
    }
}
