//! Rate-limited backlog of chat events
//!
//! Chat arrives in bursts. The queue keeps only the most recent events and
//! releases a slice of the backlog proportional to the time elapsed since
//! the last release, so a full backlog drains over `rate` seconds.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::message::ChatEvent;

/// Bounded, time-proportional release queue
///
/// Owned by the poll loop; never shared.
#[derive(Debug)]
pub struct RateLimitedQueue {
    backlog: VecDeque<ChatEvent>,
    max_len: usize,
    rate: Duration,
    last_drain: Instant,
}

impl RateLimitedQueue {
    /// Create an empty queue
    ///
    /// `rate` is the time a full backlog takes to drain; zero releases
    /// everything on every tick.
    pub fn new(max_len: usize, rate: Duration) -> Self {
        Self {
            backlog: VecDeque::with_capacity(max_len),
            max_len,
            rate,
            last_drain: Instant::now(),
        }
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// Iterate queued events, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ChatEvent> {
        self.backlog.iter()
    }

    /// Append events, then drop the oldest until at most `max_len` remain
    ///
    /// Returns how many events were discarded.
    pub fn enqueue(&mut self, events: impl IntoIterator<Item = ChatEvent>) -> usize {
        self.backlog.extend(events);

        let excess = self.backlog.len().saturating_sub(self.max_len);
        if excess > 0 {
            self.backlog.drain(..excess);
            debug!("Backlog full, discarded {} oldest messages", excess);
        }
        excess
    }

    /// Release the slice of the backlog that is due at `now`, oldest first
    ///
    /// An empty backlog just resets the drain clock. When the computed count
    /// rounds down to zero the clock is left alone so the time carries over.
    pub fn drain_tick(&mut self, now: Instant) -> Vec<ChatEvent> {
        if self.backlog.is_empty() {
            self.last_drain = now;
            return Vec::new();
        }

        let fraction = if self.rate.is_zero() {
            1.0
        } else {
            now.saturating_duration_since(self.last_drain).as_secs_f64() / self.rate.as_secs_f64()
        };

        let len = self.backlog.len();
        let count = ((fraction * len as f64).floor() as usize).min(len);
        if count == 0 {
            return Vec::new();
        }

        self.last_drain = now;
        self.backlog.drain(..count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(range: std::ops::Range<usize>) -> Vec<ChatEvent> {
        range
            .map(|i| ChatEvent::new(&format!("viewer{}", i), &format!("msg{}", i)))
            .collect()
    }

    fn messages<'a>(events: impl IntoIterator<Item = &'a ChatEvent>) -> Vec<String> {
        events.into_iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_enqueue_keeps_most_recent() {
        let mut queue = RateLimitedQueue::new(20, Duration::from_millis(500));

        let discarded = queue.enqueue(events(0..25));

        assert_eq!(discarded, 5);
        assert_eq!(queue.len(), 20);
        assert_eq!(messages(queue.iter()), messages(&events(5..25)));
    }

    #[test]
    fn test_enqueue_under_limit() {
        let mut queue = RateLimitedQueue::new(20, Duration::from_millis(500));
        assert_eq!(queue.enqueue(events(0..3)), 0);
        assert_eq!(queue.enqueue(events(3..5)), 0);
        assert_eq!(messages(queue.iter()), messages(&events(0..5)));
    }

    #[test]
    fn test_drain_proportional_to_elapsed_time() {
        let start = Instant::now();
        let mut queue = RateLimitedQueue::new(20, Duration::from_secs(1));
        queue.drain_tick(start);
        queue.enqueue(events(0..10));

        // 0.25s of a 1s rate over 10 events releases floor(2.5) = 2
        let released = queue.drain_tick(start + Duration::from_millis(250));
        assert_eq!(messages(&released), vec!["msg0", "msg1"]);
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn test_zero_count_preserves_clock() {
        let start = Instant::now();
        let mut queue = RateLimitedQueue::new(20, Duration::from_secs(1));
        queue.drain_tick(start);
        queue.enqueue(events(0..4));

        // 0.1 * 4 = 0.4 -> nothing yet, clock not advanced
        assert!(queue.drain_tick(start + Duration::from_millis(100)).is_empty());

        // 0.5 * 4 = 2 measured from the original start
        let released = queue.drain_tick(start + Duration::from_millis(500));
        assert_eq!(released.len(), 2);

        // Clock now at start + 500ms: 0.5 * 2 = 1
        let released = queue.drain_tick(start + Duration::from_millis(1000));
        assert_eq!(messages(&released), vec!["msg2"]);
    }

    #[test]
    fn test_zero_rate_releases_everything() {
        let start = Instant::now();
        let mut queue = RateLimitedQueue::new(20, Duration::ZERO);
        queue.enqueue(events(0..7));

        let released = queue.drain_tick(start);
        assert_eq!(released.len(), 7);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_long_gap_is_capped_at_backlog() {
        let start = Instant::now();
        let mut queue = RateLimitedQueue::new(20, Duration::from_millis(500));
        queue.drain_tick(start);
        queue.enqueue(events(0..3));

        let released = queue.drain_tick(start + Duration::from_secs(10));
        assert_eq!(released.len(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_drain_resets_clock() {
        let start = Instant::now();
        let mut queue = RateLimitedQueue::new(20, Duration::from_secs(1));
        queue.drain_tick(start + Duration::from_secs(5));
        queue.enqueue(events(0..10));

        // Only 0.15s since the empty tick, not 5.15s since creation
        let released = queue.drain_tick(start + Duration::from_millis(5150));
        assert_eq!(released.len(), 1);
    }
}
