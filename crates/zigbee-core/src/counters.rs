//! Monotonic 8-bit counters for ZCL transaction ids and APS counters
//!
//! Each increment is a single atomic fetch-add; wraparound at 256 is
//! correct and expected, not an error condition.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Default)]
pub struct Counter(AtomicU8);

impl Counter {
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Allocates and returns the next value, wrapping modulo 256.
    pub fn next(&self) -> u8 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_at_256() {
        let counter = Counter::new();
        for expected in 0..255u8 {
            assert_eq!(counter.next(), expected);
        }
        assert_eq!(counter.next(), 255);
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn sequential_allocations_are_contiguous() {
        let counter = Counter::new();
        let start = counter.next();
        for i in 1..10u8 {
            assert_eq!(counter.next(), start.wrapping_add(i));
        }
    }
}
