//! CVE-2023-44487 mitigation (spec.md §4.6): a peer that opens streams only
//! to reset them before any data arrives is trying to make the server do
//! stream-setup work for free. Track the pattern and ban peers that cross
//! any of three ceilings.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const DEFAULT_RAPID_RESET_THRESHOLD: Duration = Duration::from_millis(100);
const CREATION_RATE_WINDOW: Duration = Duration::from_secs(1);
const DEFAULT_RESET_RATE_WINDOW: Duration = Duration::from_secs(60);
const BAN_DURATION: Duration = Duration::from_secs(5 * 60);

const MAX_STREAM_CREATIONS_PER_SEC: usize = 100;
const MAX_RAPID_RESETS_PER_MINUTE: usize = 50;
const MAX_PENDING_STREAMS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Ban,
}

/// Per-connection tracker. One instance per peer; a banned peer's
/// connection engine should refuse new streams (and new connections, at
/// whatever layer owns the listener) until `banned_until` passes.
#[derive(Debug)]
pub struct RapidResetTracker {
    creations: VecDeque<Instant>,
    resets: VecDeque<Instant>,
    pending: usize,
    banned_until: Option<Instant>,
    /// Below this age (since creation), a reset with no data counts as
    /// "rapid" (spec.md §4.6); configurable via `Config::rapid_reset_threshold_ms`.
    rapid_reset_threshold: Duration,
    /// Sliding window the rapid-reset-count ceiling is evaluated over;
    /// configurable via `Config::rapid_reset_window`.
    reset_rate_window: Duration,
}

impl Default for RapidResetTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RAPID_RESET_THRESHOLD, DEFAULT_RESET_RATE_WINDOW)
    }
}

impl RapidResetTracker {
    pub fn new(rapid_reset_threshold: Duration, reset_rate_window: Duration) -> Self {
        Self {
            creations: VecDeque::new(),
            resets: VecDeque::new(),
            pending: 0,
            banned_until: None,
            rapid_reset_threshold,
            reset_rate_window,
        }
    }

    pub fn is_banned(&self, now: Instant) -> bool {
        self.banned_until.map(|until| now < until).unwrap_or(false)
    }

    /// Call when a new stream is opened by the peer (HEADERS received on an
    /// idle stream). Returns [`Verdict::Ban`] if this creation pushed any
    /// ceiling over its limit.
    pub fn on_stream_created(&mut self, now: Instant) -> Verdict {
        self.creations.push_back(now);
        prune(&mut self.creations, now, CREATION_RATE_WINDOW);
        self.pending += 1;

        if self.creations.len() > MAX_STREAM_CREATIONS_PER_SEC || self.pending > MAX_PENDING_STREAMS {
            self.ban(now);
            return Verdict::Ban;
        }
        Verdict::Ok
    }

    /// Call once a stream's header block is fully received (end_headers),
    /// taking it out of the "pending" bucket.
    pub fn on_headers_complete(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// Call on RST_STREAM, whichever end sent it. `created_at` and
    /// `any_data_received` describe the stream being reset.
    pub fn on_stream_reset(
        &mut self,
        now: Instant,
        created_at: Instant,
        any_data_received: bool,
    ) -> Verdict {
        if now.saturating_duration_since(created_at) < self.rapid_reset_threshold && !any_data_received {
            self.resets.push_back(now);
            prune(&mut self.resets, now, self.reset_rate_window);
            if self.resets.len() > MAX_RAPID_RESETS_PER_MINUTE {
                self.ban(now);
                return Verdict::Ban;
            }
        }
        Verdict::Ok
    }

    fn ban(&mut self, now: Instant) {
        self.banned_until = Some(now + BAN_DURATION);
    }
}

fn prune(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.saturating_duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_reset_pattern_bans_after_fifty_one_in_a_minute() {
        let mut tracker = RapidResetTracker::default();
        let base = Instant::now();
        for i in 0..51 {
            let created = base + Duration::from_secs(i);
            let reset = created + Duration::from_millis(10);
            let verdict = tracker.on_stream_reset(reset, created, false);
            if i < 50 {
                assert_eq!(verdict, Verdict::Ok, "iteration {i}");
            } else {
                assert_eq!(verdict, Verdict::Ban);
            }
        }
        assert!(tracker.is_banned(base + Duration::from_secs(51)));
    }

    #[test]
    fn reset_with_data_received_does_not_count() {
        let mut tracker = RapidResetTracker::default();
        let created = Instant::now();
        let reset = created + Duration::from_millis(10);
        for _ in 0..100 {
            assert_eq!(tracker.on_stream_reset(reset, created, true), Verdict::Ok);
        }
        assert!(!tracker.is_banned(reset));
    }

    #[test]
    fn reset_after_threshold_does_not_count() {
        let mut tracker = RapidResetTracker::default();
        let created = Instant::now();
        let reset = created + Duration::from_millis(200);
        for _ in 0..100 {
            assert_eq!(tracker.on_stream_reset(reset, created, false), Verdict::Ok);
        }
    }

    #[test]
    fn creation_rate_ceiling_bans() {
        let mut tracker = RapidResetTracker::default();
        let base = Instant::now();
        let mut last = Verdict::Ok;
        for _ in 0..101 {
            last = tracker.on_stream_created(base);
        }
        assert_eq!(last, Verdict::Ban);
    }

    #[test]
    fn ban_expires_after_five_minutes() {
        let mut tracker = RapidResetTracker::default();
        let base = Instant::now();
        for _ in 0..101 {
            tracker.on_stream_created(base);
        }
        assert!(tracker.is_banned(base + Duration::from_secs(60)));
        assert!(!tracker.is_banned(base + Duration::from_secs(301)));
    }
}
