// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Monotonic microsecond clock and the achieved-throughput FPS tracker.

/// Current monotonic time in microseconds.
///
/// Uses `CLOCK_MONOTONIC`, the same domain the encoder PTS values live in,
/// so capture timestamps are unaffected by wall-clock adjustments.
pub fn monotonic_us() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // clock_gettime cannot fail for CLOCK_MONOTONIC with a valid pointer.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000_000 + ts.tv_nsec as u64 / 1_000
}

/// Frames-per-second from the wall-clock spacing of successful encode
/// iterations.
///
/// The tracker is fed only on iterations that produced a packet, so the
/// value reflects achieved end-to-end throughput rather than the raw
/// capture rate. The first tick establishes the reference point and
/// reports 0.0.
#[derive(Debug, Default)]
pub struct FpsTracker {
    prev_us: Option<u64>,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful iteration at `now_us` and return the FPS since
    /// the previous one.
    pub fn tick(&mut self, now_us: u64) -> f32 {
        let fps = match self.prev_us {
            Some(prev) if now_us > prev => 1_000_000.0 / (now_us - prev) as f32,
            _ => 0.0,
        };
        self.prev_us = Some(now_us);
        fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_us_is_nondecreasing() {
        let a = monotonic_us();
        let b = monotonic_us();
        assert!(b >= a);
    }

    #[test]
    fn fps_one_second_apart() {
        let mut fps = FpsTracker::new();
        assert_eq!(fps.tick(5_000_000), 0.0);
        assert_eq!(fps.tick(6_000_000), 1.0);
    }

    #[test]
    fn fps_thirty_hz() {
        let mut fps = FpsTracker::new();
        fps.tick(1_000_000);
        let value = fps.tick(1_033_333);
        assert!((value - 30.0).abs() < 0.1, "got {value}");
    }

    #[test]
    fn fps_clock_went_backwards() {
        let mut fps = FpsTracker::new();
        fps.tick(2_000_000);
        assert_eq!(fps.tick(2_000_000), 0.0);
        assert_eq!(fps.tick(1_000_000), 0.0);
    }
}
