//! [`TickClock`] – `dt` sanitiser for the tick loop.
//!
//! The firmware expresses every wait as a timer decremented by the caller's
//! `dt`.  A single NaN would poison every timer for good, and a host that
//! stalls for several seconds would otherwise skip whole manoeuvres in one
//! tick.  Pass every `dt` through [`TickClock::sanitize`] before use.

use tracing::warn;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// What [`TickClock::sanitize`] had to do to a `dt` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtCorrection {
    /// Used as given.
    None,
    /// NaN, infinite or negative; replaced by zero.
    Invalid,
    /// Larger than the configured maximum; clamped.
    Stalled,
}

// ────────────────────────────────────────────────────────────────────────────
// TickClock
// ────────────────────────────────────────────────────────────────────────────

/// Tracks simulated time and corrects abnormal tick lengths.
///
/// # Example
///
/// ```
/// use docent_kernel::clock::{DtCorrection, TickClock};
///
/// let mut clock = TickClock::new(0.25);
/// assert_eq!(clock.sanitize(0.05), (0.05, DtCorrection::None));
/// assert_eq!(clock.sanitize(f64::NAN), (0.0, DtCorrection::Invalid));
/// assert_eq!(clock.sanitize(3.0), (0.25, DtCorrection::Stalled));
/// assert_eq!(clock.corrected_ticks(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct TickClock {
    max_dt_s: f64,
    elapsed_s: f64,
    ticks: u64,
    invalid_ticks: u64,
    stalled_ticks: u64,
}

impl TickClock {
    /// Create a clock that clamps `dt` to at most `max_dt_s`.
    pub fn new(max_dt_s: f64) -> Self {
        Self {
            max_dt_s,
            elapsed_s: 0.0,
            ticks: 0,
            invalid_ticks: 0,
            stalled_ticks: 0,
        }
    }

    /// Return the `dt` to use for this tick together with the correction
    /// applied, and advance the clock by it.
    pub fn sanitize(&mut self, dt: f64) -> (f64, DtCorrection) {
        self.ticks += 1;
        let (clean, correction) = if !dt.is_finite() || dt < 0.0 {
            self.invalid_ticks += 1;
            warn!(dt, "invalid dt replaced by zero");
            (0.0, DtCorrection::Invalid)
        } else if dt > self.max_dt_s {
            self.stalled_ticks += 1;
            warn!(dt, max_dt_s = self.max_dt_s, "stalled tick clamped");
            (self.max_dt_s, DtCorrection::Stalled)
        } else {
            (dt, DtCorrection::None)
        };
        self.elapsed_s += clean;
        (clean, correction)
    }

    pub fn max_dt_s(&self) -> f64 {
        self.max_dt_s
    }

    /// Simulated seconds accumulated from sanitised `dt` values.
    pub fn elapsed_s(&self) -> f64 {
        self.elapsed_s
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn invalid_ticks(&self) -> u64 {
        self.invalid_ticks
    }

    pub fn stalled_ticks(&self) -> u64 {
        self.stalled_ticks
    }

    /// Ticks whose `dt` was replaced or clamped.
    pub fn corrected_ticks(&self) -> u64 {
        self.invalid_ticks + self.stalled_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_dt_passes_through() {
        let mut clock = TickClock::new(0.25);
        assert_eq!(clock.sanitize(0.1), (0.1, DtCorrection::None));
        assert_eq!(clock.sanitize(0.25), (0.25, DtCorrection::None));
        assert_eq!(clock.sanitize(0.0), (0.0, DtCorrection::None));
        assert_eq!(clock.corrected_ticks(), 0);
        assert_eq!(clock.ticks(), 3);
    }

    #[test]
    fn non_finite_and_negative_become_zero() {
        let mut clock = TickClock::new(0.25);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.1] {
            assert_eq!(clock.sanitize(bad), (0.0, DtCorrection::Invalid));
        }
        assert_eq!(clock.invalid_ticks(), 4);
        assert_eq!(clock.elapsed_s(), 0.0);
    }

    #[test]
    fn stalled_host_is_clamped() {
        let mut clock = TickClock::new(0.25);
        assert_eq!(clock.sanitize(10.0), (0.25, DtCorrection::Stalled));
        assert_eq!(clock.stalled_ticks(), 1);
        assert!((clock.elapsed_s() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn elapsed_accumulates_clean_values_only() {
        let mut clock = TickClock::new(0.5);
        clock.sanitize(0.2);
        clock.sanitize(f64::NAN);
        clock.sanitize(2.0);
        assert!((clock.elapsed_s() - 0.7).abs() < 1e-12);
        assert_eq!(clock.corrected_ticks(), 2);
    }
}
