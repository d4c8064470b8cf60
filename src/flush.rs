use core::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};

use crate::transport::{Direction, TransferObserver};

/// Outcome of consuming the write total on a refresh tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Too little was written to bother committing.
    Idle { written: u64 },
    /// Enough was written that buffered state should be committed.
    Commit { written: u64 },
}

/// Write volume accounting behind the idle flush.
#[derive(Debug)]
pub struct FlushPolicy {
    threshold: u64,
    written: u64,
}

impl FlushPolicy {
    pub const fn new(threshold: u64) -> Self {
        FlushPolicy {
            threshold,
            written: 0,
        }
    }

    /// Bytes written since the last refresh tick.
    pub fn pending(&self) -> u64 {
        self.written
    }

    pub fn record(&mut self, direction: Direction, num_bytes: u32) {
        if direction == Direction::HostToDevice {
            self.written = self.written.saturating_add(num_bytes as u64);
            trace!("write total: {}", self.written);
        }
    }

    /// Take the write total, resetting it whatever the decision.
    pub fn consume(&mut self) -> FlushDecision {
        let written = core::mem::replace(&mut self.written, 0);
        let decision = if written < self.threshold {
            FlushDecision::Idle { written }
        } else {
            FlushDecision::Commit { written }
        };
        debug!("flush policy: {:?}", decision);
        decision
    }
}

impl TransferObserver for FlushPolicy {
    fn on_transfer(&mut self, direction: Direction, num_bytes: u32) {
        self.record(direction, num_bytes);
    }
}

/// Refresh tick raised by a periodic timer.
#[derive(Debug, Default)]
pub struct RefreshSignal(AtomicBool);

impl RefreshSignal {
    pub const fn new() -> Self {
        RefreshSignal(AtomicBool::new(false))
    }

    /// Safe to call from interrupt context.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear the tick, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FLUSH_THRESHOLD;

    #[test]
    fn test_reads_are_not_counted() {
        let mut policy = FlushPolicy::new(FLUSH_THRESHOLD);
        policy.record(Direction::DeviceToHost, 4096);
        assert_eq!(policy.pending(), 0);
        policy.record(Direction::HostToDevice, 4096);
        policy.record(Direction::HostToDevice, 512);
        assert_eq!(policy.pending(), 4608);
    }

    #[test]
    fn test_below_threshold_is_idle() {
        let mut policy = FlushPolicy::new(FLUSH_THRESHOLD);
        policy.on_transfer(Direction::HostToDevice, 49_999);
        assert_eq!(policy.consume(), FlushDecision::Idle { written: 49_999 });
        assert_eq!(policy.pending(), 0);
    }

    #[test]
    fn test_threshold_commits() {
        let mut policy = FlushPolicy::new(FLUSH_THRESHOLD);
        policy.on_transfer(Direction::HostToDevice, 50_000);
        assert_eq!(policy.consume(), FlushDecision::Commit { written: 50_000 });
        assert_eq!(policy.pending(), 0);

        policy.on_transfer(Direction::HostToDevice, 50_001);
        assert_eq!(policy.consume(), FlushDecision::Commit { written: 50_001 });
        assert_eq!(policy.pending(), 0);
    }

    #[test]
    fn test_empty_consume() {
        let mut policy = FlushPolicy::new(FLUSH_THRESHOLD);
        assert_eq!(policy.consume(), FlushDecision::Idle { written: 0 });
    }

    #[test]
    fn test_refresh_signal() {
        let signal = RefreshSignal::new();
        assert!(!signal.take());
        signal.raise();
        signal.raise();
        assert!(signal.take());
        assert!(!signal.take());
    }

    use proptest::prelude::*;
    proptest! {
        #[test]
        fn test_consume_always_resets(writes in proptest::collection::vec(0u32..200_000, 0..16)) {
            let mut policy = FlushPolicy::new(FLUSH_THRESHOLD);
            for w in &writes {
                policy.record(Direction::HostToDevice, *w);
            }
            let total: u64 = writes.iter().map(|w| *w as u64).sum();
            let decision = policy.consume();
            if total < FLUSH_THRESHOLD {
                prop_assert_eq!(decision, FlushDecision::Idle { written: total });
            } else {
                prop_assert_eq!(decision, FlushDecision::Commit { written: total });
            }
            prop_assert_eq!(policy.pending(), 0);
        }
    }
}
