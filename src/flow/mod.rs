//! Flow control (spec.md §4.5 / RFC 9113 §6.9): signed per-connection and
//! per-stream windows, with an adaptive policy for how eagerly the receive
//! side gives credit back via WINDOW_UPDATE.

use crate::frame::{ErrorCode, MAX_WINDOW_SIZE};
use std::time::{Duration, Instant};

/// One side of one window — used for both the connection-wide window and
/// each stream's window, on both the send and receive sides.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    size: i64,
    initial: i64,
}

impl Window {
    pub fn new(initial: i64) -> Self {
        Self { size: initial, initial }
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    /// Charges `n` bytes against the window — called when we send data, or
    /// when we account for data we've received. Receiving *more* than the
    /// window allows is the peer's fault and the caller should already have
    /// turned that into a flow-control error before calling this.
    pub fn charge(&mut self, n: u32) {
        self.size -= i64::from(n);
    }

    /// Applies a WINDOW_UPDATE increment, rejecting one that would push the
    /// window above the 2^31-1 ceiling (§6.9.1).
    pub fn credit(&mut self, increment: u32) -> Result<(), ErrorCode> {
        let new_size = self.size + i64::from(increment);
        if new_size > MAX_WINDOW_SIZE {
            return Err(ErrorCode::FlowControlError);
        }
        self.size = new_size;
        Ok(())
    }

    /// Applies a signed INITIAL_WINDOW_SIZE delta from a SETTINGS change
    /// (§6.9.2). The result may legitimately go negative.
    pub fn apply_initial_delta(&mut self, delta: i64) -> Result<(), ErrorCode> {
        let new_size = self.size + delta;
        if new_size > MAX_WINDOW_SIZE {
            return Err(ErrorCode::FlowControlError);
        }
        self.size = new_size;
        Ok(())
    }

    pub fn initial(&self) -> i64 {
        self.initial
    }

    pub fn set_initial(&mut self, initial: i64) {
        self.initial = initial;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdStrategy {
    Conservative,
    Moderate,
    Aggressive,
    Dynamic,
}

impl ThresholdStrategy {
    fn base_ratio(self) -> f64 {
        match self {
            ThresholdStrategy::Conservative => 0.25,
            ThresholdStrategy::Moderate => 0.5,
            ThresholdStrategy::Aggressive => 0.75,
            ThresholdStrategy::Dynamic => 0.5,
        }
    }
}

/// The receive-side half of a window, plus the bookkeeping needed to decide
/// when to emit a WINDOW_UPDATE and (for [`ThresholdStrategy::Dynamic`])
/// how aggressively.
#[derive(Debug, Clone)]
pub struct ReceiveWindow {
    window: Window,
    strategy: ThresholdStrategy,
    dynamic_ratio: f64,
    last_update_at: Option<Instant>,
    bytes_since_update: u64,
    smoothed_rate: f64,
}

impl ReceiveWindow {
    pub fn new(initial: i64, strategy: ThresholdStrategy) -> Self {
        Self {
            window: Window::new(initial),
            strategy,
            dynamic_ratio: strategy.base_ratio(),
            last_update_at: None,
            bytes_since_update: 0,
            smoothed_rate: 0.0,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Accounts for `n` received bytes and, if the window has drained past
    /// threshold, returns the WINDOW_UPDATE increment to send — restoring
    /// the window to its initial value. The first element of the returned
    /// pair is `true` if this charge alone drove the window negative, i.e.
    /// the peer sent more than it was entitled to — the caller must check
    /// this *before* any credit below masks it back to a healthy size.
    pub fn on_receive(&mut self, n: u32, now: Instant) -> (bool, Option<u32>) {
        self.window.charge(n);
        self.bytes_since_update += u64::from(n);
        let exceeded = self.window.size() < 0;

        let threshold = match self.strategy {
            ThresholdStrategy::Dynamic => self.update_dynamic_ratio(now),
            other => other.base_ratio(),
        };

        let floor = (self.window.initial() as f64 * threshold) as i64;
        if self.window.size() > floor {
            return (exceeded, None);
        }

        let target = self.window.initial();
        let increment = (target - self.window.size()).clamp(0, u32::MAX as i64) as u32;
        if increment == 0 {
            return (exceeded, None);
        }
        if self.window.credit(increment).is_err() {
            return (exceeded, None);
        }
        self.last_update_at = Some(now);
        self.bytes_since_update = 0;
        (exceeded, Some(increment))
    }

    fn update_dynamic_ratio(&mut self, now: Instant) -> f64 {
        if let Some(last) = self.last_update_at {
            let elapsed = now.saturating_duration_since(last).as_secs_f64().max(1e-6);
            let rate = self.bytes_since_update as f64 / elapsed;
            let stalled = elapsed > 1.0 && self.bytes_since_update == 0;
            let bursting =
                rate >= 3.0 * self.smoothed_rate.max(1.0) && rate >= 1.5 * self.window.initial() as f64;
            self.smoothed_rate = 0.8 * self.smoothed_rate + 0.2 * rate;

            if stalled || bursting {
                self.dynamic_ratio = (self.dynamic_ratio + 0.1).min(0.9);
            } else {
                self.dynamic_ratio = (self.dynamic_ratio - 0.05).max(0.25);
            }
        }
        self.dynamic_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_then_credit_round_trips() {
        let mut w = Window::new(100);
        w.charge(40);
        assert_eq!(w.size(), 60);
        w.credit(40).unwrap();
        assert_eq!(w.size(), 100);
    }

    #[test]
    fn credit_past_ceiling_is_flow_control_error() {
        let mut w = Window::new(MAX_WINDOW_SIZE);
        assert_eq!(w.credit(1), Err(ErrorCode::FlowControlError));
    }

    #[test]
    fn negative_window_after_shrink_then_recovers() {
        // scenario from spec.md §8: send_window=10, send 8 -> 2, then a
        // SETTINGS shrink delta of -5 -> -3, then +4 -> 1.
        let mut w = Window::new(10);
        w.charge(8);
        assert_eq!(w.size(), 2);
        w.apply_initial_delta(-5).unwrap();
        assert_eq!(w.size(), -3);
        w.credit(4).unwrap();
        assert_eq!(w.size(), 1);
    }

    #[test]
    fn conservative_threshold_triggers_update_at_quarter_drained() {
        let mut rw = ReceiveWindow::new(100, ThresholdStrategy::Conservative);
        let now = Instant::now();
        assert_eq!(rw.on_receive(70, now), (false, None)); // window=30, floor=25, 30>25
        assert_eq!(rw.on_receive(10, now), (false, Some(80))); // window=20<=25, restore to 100
        assert_eq!(rw.window().size(), 100);
    }

    #[test]
    fn moderate_threshold_triggers_earlier_than_conservative() {
        let mut rw = ReceiveWindow::new(100, ThresholdStrategy::Moderate);
        let now = Instant::now();
        assert_eq!(rw.on_receive(51, now), (false, Some(51)));
    }

    #[test]
    fn overrunning_the_window_is_flagged_even_though_credit_would_mask_it() {
        let mut rw = ReceiveWindow::new(100, ThresholdStrategy::Moderate);
        let now = Instant::now();
        let (exceeded, increment) = rw.on_receive(150, now);
        assert!(exceeded);
        assert!(increment.is_some());
        assert_eq!(rw.window().size(), 100);
    }
}
