//! Debounced reads of the live timer counter
//!
//! TBxR is clocked by the timer's own clock source, which runs asynchronously to MCLK. A single
//! read of the register can land on an increment or reload edge and return a stale or corrupted
//! count. Instead of stopping the timer, the value is sampled repeatedly until two consecutive
//! samples differ by no more than a threshold, and the later sample of that pair is returned.
//!
//! The threshold is a tolerance in counter ticks. A threshold of 0 only accepts bit-identical
//! samples, which is the strictest setting and takes the most reads when the counter is moving
//! quickly relative to the CPU. Samples are compared as plain magnitudes, so a pair straddling a
//! counter rollover is treated as far apart and another sample is taken.
//!
//! **Latency hazard**: [`read_debounced`] has no iteration limit. If the counter runs so fast
//! that no two consecutive reads ever land within the threshold, it spins forever. Callers with
//! latency requirements should use [`try_read_debounced`] or [`Counter::try_read`], which give up
//! after a fixed number of comparisons.

use crate::hw_traits::timerb::{TimerB, TimerB7};

/// Threshold used by [`Counter::read`]. Consecutive samples this close together are accepted.
pub const DEFAULT_THRESHOLD: u16 = 50;

/// Error returned when no two consecutive samples agreed within the allowed number of
/// comparisons. Holds the most recent sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoConsensus(pub u16);

#[inline(always)]
fn within(previous: u16, next: u16, threshold: u16) -> bool {
    let delta = if next >= previous {
        next - previous
    } else {
        previous - next
    };
    delta <= threshold
}

/// Sample the counter through `read` until two consecutive samples differ by at most
/// `threshold`, then return the later one.
///
/// Never fails, but may never return if the samples keep disagreeing. See the
/// [module documentation](self) for the latency hazard.
#[inline]
pub fn read_debounced<F: FnMut() -> u16>(threshold: u16, mut read: F) -> u16 {
    let mut previous = read();
    loop {
        let next = read();
        if within(previous, next, threshold) {
            return next;
        }
        previous = next;
    }
}

/// Same vote as [`read_debounced`], but gives up after `max_comparisons` disagreeing pairs.
///
/// At most `max_comparisons + 1` samples are taken. With `max_comparisons == 0` a single sample
/// is taken and the read fails immediately.
#[inline]
pub fn try_read_debounced<F: FnMut() -> u16>(
    threshold: u16,
    max_comparisons: u16,
    mut read: F,
) -> Result<u16, NoConsensus> {
    let mut previous = read();
    for _ in 0..max_comparisons {
        let next = read();
        if within(previous, next, threshold) {
            return Ok(next);
        }
        previous = next;
    }
    Err(NoConsensus(previous))
}

/// Read-only handle to the live counter of a timer
pub struct Counter {
    periph: TimerB7,
}

impl Counter {
    pub(crate) fn new(periph: TimerB7) -> Self {
        Counter { periph }
    }

    /// Read the counter, accepting samples within [`DEFAULT_THRESHOLD`] ticks of each other
    #[inline]
    pub fn read(&self) -> u16 {
        self.read_with_threshold(DEFAULT_THRESHOLD)
    }

    /// Read the counter, accepting samples within `threshold` ticks of each other
    #[inline]
    pub fn read_with_threshold(&self, threshold: u16) -> u16 {
        read_debounced(threshold, || self.periph.tbxr_rd())
    }

    /// Read the counter, giving up after `max_comparisons` disagreeing sample pairs
    #[inline]
    pub fn try_read(&self, threshold: u16, max_comparisons: u16) -> Result<u16, NoConsensus> {
        try_read_debounced(threshold, max_comparisons, || self.periph.tbxr_rd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_traits::timerb::{fake::FakeBlock, TBXR};
    use core::cell::Cell;

    // Feeds `samples` in order and counts how many were taken
    fn samples<'a>(values: &'a [u16], taken: &'a Cell<usize>) -> impl FnMut() -> u16 + 'a {
        move || {
            let i = taken.get();
            taken.set(i + 1);
            values[i]
        }
    }

    #[test]
    fn stable_counter_takes_two_reads() {
        for &threshold in &[0, 1, DEFAULT_THRESHOLD, u16::MAX] {
            let taken = Cell::new(0);
            let value = read_debounced(threshold, samples(&[777, 777, 777], &taken));
            assert_eq!(value, 777);
            assert_eq!(taken.get(), 2);
        }
    }

    #[test]
    fn drift_within_threshold_is_accepted() {
        let taken = Cell::new(0);
        let value = read_debounced(3, samples(&[10, 13, 16], &taken));
        assert_eq!(value, 13);
        assert_eq!(taken.get(), 2);
    }

    #[test]
    fn drift_above_threshold_is_rejected_until_convergence() {
        let taken = Cell::new(0);
        let value = read_debounced(4, samples(&[0, 10, 20, 30, 33, 34], &taken));
        assert_eq!(value, 33);
        assert_eq!(taken.get(), 5);
    }

    #[test]
    fn downward_step_uses_magnitude() {
        let taken = Cell::new(0);
        let value = read_debounced(2, samples(&[500, 499], &taken));
        assert_eq!(value, 499);
    }

    #[test]
    fn rollover_is_not_treated_as_small() {
        assert!(!within(5, 65530, 65524));
        assert!(within(5, 65530, 65525));
        assert!(!within(65530, 5, 65524));
        assert!(within(65530, 5, 65525));

        let taken = Cell::new(0);
        let value = read_debounced(DEFAULT_THRESHOLD, samples(&[65530, 5, 6], &taken));
        assert_eq!(value, 6);
        assert_eq!(taken.get(), 3);
    }

    #[test]
    fn zero_threshold_requires_exact_match() {
        let taken = Cell::new(0);
        let value = read_debounced(0, samples(&[1, 2, 3, 3], &taken));
        assert_eq!(value, 3);
        assert_eq!(taken.get(), 4);
    }

    #[test]
    fn worked_scenario() {
        let taken = Cell::new(0);
        let value = read_debounced(2, samples(&[100, 105, 106, 107], &taken));
        assert_eq!(value, 106);
        assert_eq!(taken.get(), 3);
    }

    #[test]
    fn bounded_read_converges() {
        let taken = Cell::new(0);
        let value = try_read_debounced(2, 5, samples(&[100, 105, 106], &taken));
        assert_eq!(value, Ok(106));
        assert_eq!(taken.get(), 3);
    }

    #[test]
    fn bounded_read_gives_up_with_last_sample() {
        let taken = Cell::new(0);
        let value = try_read_debounced(1, 3, samples(&[0, 100, 200, 300, 300], &taken));
        assert_eq!(value, Err(NoConsensus(300)));
        assert_eq!(taken.get(), 4);
    }

    #[test]
    fn bounded_read_without_comparisons() {
        let taken = Cell::new(0);
        let value = try_read_debounced(u16::MAX, 0, samples(&[42], &taken));
        assert_eq!(value, Err(NoConsensus(42)));
        assert_eq!(taken.get(), 1);
    }

    #[test]
    fn counter_handle_reads_tbxr() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        tb.write(TBXR, 0xBEEF);
        let counter = Counter::new(tb);

        assert_eq!(counter.read(), 0xBEEF);
        assert_eq!(counter.read_with_threshold(0), 0xBEEF);
        assert_eq!(counter.try_read(0, 1), Ok(0xBEEF));
    }
}
