use std::collections::VecDeque;
use std::fmt;

/// Identifies one in-flight call to `process_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(u64);

impl RequestHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll-{}", self.0)
    }
}

/// Blocked requests of one session, newest first.
///
/// Only the newest entry may be released. Older entries belong to polls the
/// client has already replaced and must return as rescinded.
#[derive(Debug, Default)]
pub struct RequestTracker {
    requests: VecDeque<RequestHandle>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, handle: RequestHandle) {
        self.requests.push_front(handle);
    }

    pub fn deactivate(&mut self, handle: RequestHandle) {
        if let Some(index) = self.requests.iter().position(|tracked| *tracked == handle) {
            self.requests.remove(index);
        }
    }

    pub fn is_active(&self, handle: RequestHandle) -> bool {
        self.requests.front() == Some(&handle)
    }

    pub fn no_active_request_tracked(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_request_wins() {
        let mut tracker = RequestTracker::new();
        let first = RequestHandle::new(1);
        let second = RequestHandle::new(2);

        tracker.activate(first);
        assert!(tracker.is_active(first));

        tracker.activate(second);
        assert!(tracker.is_active(second));
        assert!(!tracker.is_active(first));
    }

    #[test]
    fn removing_the_head_does_not_reactivate_older_entries_out_of_order() {
        let mut tracker = RequestTracker::new();
        let (a, b, c) = (RequestHandle::new(1), RequestHandle::new(2), RequestHandle::new(3));
        tracker.activate(a);
        tracker.activate(b);
        tracker.activate(c);

        tracker.deactivate(b);
        assert!(tracker.is_active(c));
        assert_eq!(tracker.len(), 2);

        tracker.deactivate(c);
        assert!(tracker.is_active(a));
    }

    #[test]
    fn empty_tracker_reports_nothing_tracked() {
        let mut tracker = RequestTracker::new();
        let handle = RequestHandle::new(7);
        assert!(tracker.no_active_request_tracked());
        assert!(!tracker.is_active(handle));

        tracker.activate(handle);
        assert!(!tracker.no_active_request_tracked());

        tracker.deactivate(handle);
        assert!(tracker.no_active_request_tracked());
    }

    #[test]
    fn deactivating_unknown_handle_is_harmless() {
        let mut tracker = RequestTracker::new();
        tracker.activate(RequestHandle::new(1));
        tracker.deactivate(RequestHandle::new(99));
        assert_eq!(tracker.len(), 1);
    }
}
