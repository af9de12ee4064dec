use std::collections::VecDeque;

use super::time::SampleTime;

// -------------------------------------------------------------------------------------------------

/// A sample time tagged event.
pub(crate) trait Event {
    fn sample_time(&self) -> SampleTime;
}

// -------------------------------------------------------------------------------------------------

/// Manage processing of sample time tagged events, e.g. pending grains in the renderer.
///
/// Note: When adding events via `insert_event`, events will be sorted ascending by time, which
/// is necessary for the ordered event processing. If events are added in other ways, ensure
/// that the sorting doesn't get broken!
pub(crate) trait EventProcessor {
    /// The sample time tagged event.
    type Event: Event;

    /// Determine in how many sample times the next event is due. Returns 0 for overdue events
    /// and `usize::MAX` when there are no pending events.
    fn time_until_next_event(&self, current_time: SampleTime) -> usize {
        self.events().front().map_or(usize::MAX, |e| {
            e.sample_time().saturating_sub(current_time) as usize
        })
    }

    /// Add a new event for processing while keeping event list sorted by ascending sample time.
    /// Events with equal sample times keep their insertion order.
    fn insert_event(&mut self, event: Self::Event) {
        let events = self.events_mut();
        let sample_time = event.sample_time();
        // fast path: batches usually arrive in order
        if events.back().is_none_or(|e| e.sample_time() <= sample_time) {
            events.push_back(event);
            return;
        }
        let insert_pos = events
            .make_contiguous()
            .partition_point(|e| e.sample_time() <= sample_time);
        events.insert(insert_pos, event);
    }

    /// Process all pending events that are due up to the given time.
    fn process_events(&mut self, current_time: SampleTime) {
        while self
            .events()
            .front()
            .is_some_and(|e| e.sample_time() <= current_time)
        {
            if let Some(event) = self.events_mut().pop_front() {
                self.process_event(event);
            }
        }
    }

    /// Access to the event deque.
    fn events(&self) -> &VecDeque<Self::Event>;
    /// Mutable access to the event deque.
    fn events_mut(&mut self) -> &mut VecDeque<Self::Event>;

    /// Process a single due event.
    fn process_event(&mut self, event: Self::Event);
}

// -------------------------------------------------------------------------------------------------
