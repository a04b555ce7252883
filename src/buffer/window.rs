//! Before/after location windows around point-in-time events

use crate::types::LocationSample;

/// Completion callback receiving `(pre_event, post_event)` locations.
pub type WindowCallback = Box<dyn FnOnce(Vec<LocationSample>, Vec<LocationSample>) + Send>;

/// Locations captured around one event.
///
/// The pre-event half is fixed at creation; the post-event half grows until the
/// window is completed. Completing consumes the window, so the callback runs once.
pub struct EventWindow {
    pre_event: Vec<LocationSample>,
    post_event: Vec<LocationSample>,
    on_complete: WindowCallback,
}

impl EventWindow {
    pub fn new(pre_event: Vec<LocationSample>, on_complete: WindowCallback) -> Self {
        Self { pre_event, post_event: Vec::new(), on_complete }
    }

    pub fn push_post_event(&mut self, sample: LocationSample) {
        self.post_event.push(sample);
    }

    pub fn pre_event_len(&self) -> usize {
        self.pre_event.len()
    }

    pub fn post_event_len(&self) -> usize {
        self.post_event.len()
    }

    /// Hand both halves to the completion callback.
    pub fn complete(self) {
        (self.on_complete)(self.pre_event, self.post_event);
    }
}

impl std::fmt::Debug for EventWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWindow")
            .field("pre_event", &self.pre_event.len())
            .field("post_event", &self.post_event.len())
            .finish_non_exhaustive()
    }
}

/// Set of windows still collecting post-event locations.
///
/// Does not run callbacks itself: full windows are handed back to the caller so
/// they can be completed outside whatever lock guards this set.
#[derive(Debug)]
pub struct PendingWindows {
    windows: Vec<EventWindow>,
    capacity: usize,
}

impl PendingWindows {
    pub fn new(capacity: usize) -> Self {
        Self { windows: Vec::new(), capacity: capacity.max(1) }
    }

    pub fn open(&mut self, window: EventWindow) {
        self.windows.push(window);
    }

    /// Append `sample` to every open window and remove the ones that reached capacity.
    pub fn feed(&mut self, sample: &LocationSample) -> Vec<EventWindow> {
        let mut full = Vec::new();
        let mut still_open = Vec::with_capacity(self.windows.len());
        for mut window in self.windows.drain(..) {
            window.push_post_event(sample.clone());
            if window.post_event_len() >= self.capacity {
                full.push(window);
            } else {
                still_open.push(window);
            }
        }
        self.windows = still_open;
        full
    }

    /// Remove every window regardless of fill level, in opening order.
    pub fn drain(&mut self) -> Vec<EventWindow> {
        std::mem::take(&mut self.windows)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
