//! [`SignalClassifier`] – wall vs. local-object discrimination.
//!
//! A completed sweep is a sequence of [`ScanSample`]s, each carrying one
//! reading per channel.  A wall returns a near-constant range across
//! neighbouring channels and over a wide arc; a narrow object ("legs", a bag
//! on the floor) makes the channels disagree sharply because one ray grazes
//! past while another hits, and it only shows up over a short arc.
//!
//! The classifier reduces the buffer to [`ScanStats`] and applies a fixed
//! decision order:
//!
//! 1. fewer than `min_samples` samples → [`ClassificationResult::Unknown`]
//! 2. no hits at all → [`ClassificationResult::None`]
//! 3. local-object test (asymmetry, narrow span, high spread, few flat hits)
//! 4. wall test (flat dominance, or no asymmetry plus a wall-like shape)
//! 5. anything else → [`ClassificationResult::Unknown`]
//!
//! Dropouts are read as `max_range_mm`, never as an obstacle.
//!
//! # Example
//!
//! ```rust
//! use docent_perception::classifier::SignalClassifier;
//! use docent_types::{ClassificationResult, ClassifierConfig, ScanSample, SensorReadings};
//!
//! let classifier = SignalClassifier::new(ClassifierConfig::default(), 2000.0);
//! let offsets = [0.5, 0.0, -0.5];
//!
//! let buffer: Vec<ScanSample> = (0..10)
//!     .map(|i| ScanSample {
//!         theta: i as f64 * 0.1,
//!         readings: SensorReadings::mm(600.0, 602.0, 598.0).to_readings(&offsets, i),
//!     })
//!     .collect();
//!
//! assert_eq!(classifier.classify(&buffer), ClassificationResult::Wall);
//! ```

use docent_types::{ClassificationResult, ClassifierConfig, FirmwareConfig, ScanSample};
use tracing::trace;

// ────────────────────────────────────────────────────────────────────────────
// Per-sample summary
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SampleSummary {
    theta: f64,
    d_min: f64,
    spread: f64,
    /// Mounting offset of the channel that produced `d_min`.
    nearest_offset: f64,
    hit: bool,
    open: bool,
    flat: bool,
    asymmetric: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Running aggregate
// ────────────────────────────────────────────────────────────────────────────

/// Counters accumulated sample by sample.  Hit distances use Welford's
/// update so the variance needs no second pass.
#[derive(Debug, Clone, Copy, Default)]
struct SweepFold {
    samples: usize,
    hits: usize,
    opens: usize,
    flats: usize,
    asymmetric: usize,
    first_hit_theta: Option<f64>,
    last_hit_theta: f64,
    hit_mean_mm: f64,
    hit_m2: f64,
    spread_sum_mm: f64,
    spread_max_mm: f64,
    /// Closest asymmetric sample; the earliest wins a tie.
    best: Option<SampleSummary>,
}

impl SweepFold {
    fn push(&mut self, s: &SampleSummary) {
        self.samples += 1;
        self.opens += usize::from(s.open);
        self.flats += usize::from(s.flat);

        if s.asymmetric {
            self.asymmetric += 1;
            if self.best.is_none_or(|b| s.d_min < b.d_min) {
                self.best = Some(*s);
            }
        }

        if s.hit {
            self.hits += 1;
            self.first_hit_theta.get_or_insert(s.theta);
            self.last_hit_theta = s.theta;
            let delta = s.d_min - self.hit_mean_mm;
            self.hit_mean_mm += delta / self.hits as f64;
            self.hit_m2 += delta * (s.d_min - self.hit_mean_mm);
            self.spread_sum_mm += s.spread;
            self.spread_max_mm = self.spread_max_mm.max(s.spread);
        }
    }

    fn finish(&self) -> ScanStats {
        if self.samples == 0 {
            return ScanStats::default();
        }
        let total = self.samples as f64;
        let mut stats = ScanStats {
            samples: self.samples,
            hits: self.hits,
            opens: self.opens,
            flats: self.flats,
            asymmetric: self.asymmetric,
            hit_fraction: self.hits as f64 / total,
            open_fraction: self.opens as f64 / total,
            flat_fraction: self.flats as f64 / total,
            ..ScanStats::default()
        };
        if let Some(first) = self.first_hit_theta {
            let n = self.hits as f64;
            stats.hit_span_rad = (self.last_hit_theta - first).abs();
            stats.hit_std_mm = (self.hit_m2 / n).max(0.0).sqrt();
            stats.max_hit_spread_mm = self.spread_max_mm;
            stats.mean_hit_spread_mm = self.spread_sum_mm / n;
        }
        stats
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScanStats
// ────────────────────────────────────────────────────────────────────────────

/// Aggregate statistics of one sweep.
///
/// Fractions are relative to the total sample count.  Hit-only statistics
/// (`hit_span_rad`, `hit_std_mm`, spreads) are zero when there are no hits.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScanStats {
    pub samples: usize,
    pub hits: usize,
    pub opens: usize,
    pub flats: usize,
    pub asymmetric: usize,
    pub hit_fraction: f64,
    pub open_fraction: f64,
    pub flat_fraction: f64,
    /// Angle between the first and last hit sample.
    pub hit_span_rad: f64,
    /// Population standard deviation of the per-sample `d_min` over hits.
    pub hit_std_mm: f64,
    pub max_hit_spread_mm: f64,
    pub mean_hit_spread_mm: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// SignalClassifier
// ────────────────────────────────────────────────────────────────────────────

/// Pure sweep classifier.  Holds only its thresholds; every call to
/// [`classify`][Self::classify] depends on nothing but its input.
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    config: ClassifierConfig,
    max_range_mm: f64,
}

impl SignalClassifier {
    /// `max_range_mm` is the value dropouts are read as.
    pub fn new(config: ClassifierConfig, max_range_mm: f64) -> Self {
        Self {
            config,
            max_range_mm,
        }
    }

    pub fn from_config(config: &FirmwareConfig) -> Self {
        Self::new(config.classifier.clone(), config.sensor.max_range_mm)
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn summarize(&self, sample: &ScanSample) -> SampleSummary {
        let cfg = &self.config;
        let mut d_min = self.max_range_mm;
        let mut d_max = if sample.readings.is_empty() {
            self.max_range_mm
        } else {
            f64::NEG_INFINITY
        };
        let mut nearest_offset = 0.0;
        let mut any_open = false;

        for (i, reading) in sample.readings.iter().enumerate() {
            let d = reading.effective_mm(self.max_range_mm);
            if i == 0 || d < d_min {
                d_min = d;
                nearest_offset = reading.angle_offset;
            }
            d_max = d_max.max(d);
            any_open |= d > cfg.far_mm;
        }

        let spread = d_max - d_min;
        let hit = d_min < cfg.hit_mm;
        SampleSummary {
            theta: sample.theta,
            d_min,
            spread,
            nearest_offset,
            hit,
            open: d_min > cfg.far_mm,
            flat: hit && spread < cfg.flat_spread_mm,
            asymmetric: hit && any_open && spread >= cfg.asym_min_spread_mm,
        }
    }

    /// Reduce a sweep to its statistics.
    pub fn stats(&self, samples: &[ScanSample]) -> ScanStats {
        self.fold(samples).finish()
    }

    /// Single pass over the sweep; nothing is buffered besides the input.
    fn fold(&self, samples: &[ScanSample]) -> SweepFold {
        samples
            .iter()
            .fold(SweepFold::default(), |mut acc, sample| {
                acc.push(&self.summarize(sample));
                acc
            })
    }

    /// Classify a completed sweep.
    pub fn classify(&self, samples: &[ScanSample]) -> ClassificationResult {
        let cfg = &self.config;
        if samples.len() < cfg.min_samples {
            trace!(samples = samples.len(), "sweep starved");
            return ClassificationResult::Unknown;
        }

        let fold = self.fold(samples);
        let stats = fold.finish();
        trace!(?stats, "sweep statistics");

        if stats.hits == 0 {
            return ClassificationResult::None;
        }

        // Local object first: walls rarely fake an asymmetric signature.
        if self.is_local_object(&stats)
            && let Some(best) = fold.best
        {
            return ClassificationResult::LocalObject {
                bearing: best.theta + best.nearest_offset,
                distance_mm: best.d_min,
            };
        }

        if self.is_wall(&stats) {
            return ClassificationResult::Wall;
        }
        ClassificationResult::Unknown
    }

    fn is_local_object(&self, stats: &ScanStats) -> bool {
        let cfg = &self.config;
        stats.asymmetric >= 1
            && stats.hit_span_rad < cfg.object_max_span_rad
            && stats.max_hit_spread_mm >= cfg.object_min_spread_mm
            && stats.flat_fraction < cfg.object_max_flat_fraction
    }

    fn is_wall(&self, stats: &ScanStats) -> bool {
        let cfg = &self.config;
        if stats.flat_fraction >= cfg.wall_flat_fraction {
            return true;
        }
        if stats.asymmetric > 0 {
            return false;
        }
        let high_hits = stats.hit_fraction >= cfg.wall_hit_fraction;
        let wide = stats.hit_span_rad >= cfg.wall_min_span_rad;
        let steady = stats.hits > 0
            && stats.mean_hit_spread_mm < cfg.wall_low_spread_mm
            && stats.hit_std_mm < cfg.wall_low_std_mm;
        let enclosed = stats.open_fraction < cfg.wall_low_open_fraction
            && stats.hit_fraction >= cfg.wall_moderate_hit_fraction
            && stats.mean_hit_spread_mm < cfg.object_min_spread_mm;
        high_hits || wide || steady || enclosed
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use docent_types::SensorReadings;
    use std::f64::consts::FRAC_PI_3;

    const OFFSETS: [f64; 3] = [0.5, 0.0, -0.5];

    // ------------------------------------------------------------------ helpers

    fn classifier() -> SignalClassifier {
        SignalClassifier::new(ClassifierConfig::default(), 2000.0)
    }

    fn sample(theta: f64, readings: SensorReadings) -> ScanSample {
        ScanSample {
            theta,
            readings: readings.to_readings(&OFFSETS, 0),
        }
    }

    fn sweep(readings: &[SensorReadings], step: f64) -> Vec<ScanSample> {
        readings
            .iter()
            .enumerate()
            .map(|(i, r)| sample(i as f64 * step, *r))
            .collect()
    }

    fn open() -> SensorReadings {
        SensorReadings::mm(1800.0, 1800.0, 1800.0)
    }

    // ------------------------------------------------------------------ verdicts

    #[test]
    fn uniform_near_range_is_wall() {
        let jitter = [-5.0, 0.0, 5.0, 2.0, -3.0];
        let readings: Vec<SensorReadings> = (0..10)
            .map(|i| {
                let j = jitter[i % jitter.len()];
                SensorReadings::mm(600.0 + j, 600.0 - j, 600.0 + j / 2.0)
            })
            .collect();
        let buffer = sweep(&readings, FRAC_PI_3 / 9.0);
        assert_eq!(classifier().classify(&buffer), ClassificationResult::Wall);
    }

    #[test]
    fn single_asymmetric_sample_is_local_object() {
        let mut readings = vec![open(); 10];
        readings[5] = SensorReadings::mm(300.0, 1800.0, 1800.0);
        let buffer = sweep(&readings, 0.1);

        match classifier().classify(&buffer) {
            ClassificationResult::LocalObject {
                bearing,
                distance_mm,
            } => {
                // θ of sample 5 plus the left channel's mounting offset.
                assert!((bearing - 1.0).abs() < 1e-9);
                assert_eq!(distance_mm, 300.0);
            }
            other => panic!("expected LocalObject, got {other:?}"),
        }
    }

    #[test]
    fn closest_asymmetric_sample_sets_bearing() {
        let mut readings = vec![open(); 10];
        readings[3] = SensorReadings::mm(1800.0, 1800.0, 450.0);
        readings[4] = SensorReadings::mm(1800.0, 350.0, 1800.0);
        let buffer = sweep(&readings, 0.1);

        match classifier().classify(&buffer) {
            ClassificationResult::LocalObject {
                bearing,
                distance_mm,
            } => {
                assert!((bearing - 0.4).abs() < 1e-9);
                assert_eq!(distance_mm, 350.0);
            }
            other => panic!("expected LocalObject, got {other:?}"),
        }
    }

    #[test]
    fn equidistant_asymmetric_samples_keep_the_earliest() {
        let mut readings = vec![open(); 10];
        readings[3] = SensorReadings::mm(1800.0, 400.0, 1800.0);
        readings[5] = SensorReadings::mm(1800.0, 400.0, 1800.0);
        let buffer = sweep(&readings, 0.1);

        match classifier().classify(&buffer) {
            ClassificationResult::LocalObject { bearing, .. } => {
                assert!((bearing - 0.3).abs() < 1e-9, "bearing {bearing}");
            }
            other => panic!("expected LocalObject, got {other:?}"),
        }
    }

    #[test]
    fn flat_dominated_sweep_with_grazing_ray_stays_wall() {
        let mut readings = vec![SensorReadings::mm(600.0, 610.0, 605.0); 10];
        readings[9] = SensorReadings::mm(500.0, 1800.0, 1800.0);
        let buffer = sweep(&readings, 0.05);
        assert_eq!(classifier().classify(&buffer), ClassificationResult::Wall);
    }

    #[test]
    fn oblique_corner_with_full_hits_is_wall() {
        let readings = vec![SensorReadings::mm(900.0, 1000.0, 1100.0); 10];
        let buffer = sweep(&readings, 0.1);
        assert_eq!(classifier().classify(&buffer), ClassificationResult::Wall);
    }

    #[test]
    fn open_space_is_none() {
        let buffer = sweep(&vec![open(); 8], 0.1);
        assert_eq!(classifier().classify(&buffer), ClassificationResult::None);
    }

    #[test]
    fn dropouts_read_as_max_range_not_obstacle() {
        let buffer = sweep(&vec![SensorReadings::dropout(); 8], 0.1);
        assert_eq!(classifier().classify(&buffer), ClassificationResult::None);
    }

    #[test]
    fn starved_buffer_is_unknown() {
        let buffer = sweep(&vec![SensorReadings::mm(600.0, 600.0, 600.0); 5], 0.1);
        assert_eq!(classifier().classify(&buffer), ClassificationResult::Unknown);
        assert_eq!(classifier().classify(&[]), ClassificationResult::Unknown);
    }

    #[test]
    fn ambiguous_partial_hits_are_unknown() {
        let mut readings = vec![open(); 10];
        for r in readings.iter_mut().skip(4).take(3) {
            *r = SensorReadings::mm(1000.0, 1300.0, 1500.0);
        }
        let buffer = sweep(&readings, 0.1);
        assert_eq!(classifier().classify(&buffer), ClassificationResult::Unknown);
    }

    #[test]
    fn wide_asymmetric_span_is_not_local_object() {
        // Two far-apart asymmetric hits: span exceeds the object limit.
        let mut readings = vec![open(); 10];
        readings[0] = SensorReadings::mm(300.0, 1800.0, 1800.0);
        readings[9] = SensorReadings::mm(1800.0, 1800.0, 300.0);
        let buffer = sweep(&readings, 0.1);
        assert_eq!(classifier().classify(&buffer), ClassificationResult::Unknown);
    }

    #[test]
    fn classification_is_deterministic() {
        let mut readings = vec![open(); 10];
        readings[2] = SensorReadings::mm(1800.0, 420.0, 1800.0);
        let buffer = sweep(&readings, 0.1);
        let c = classifier();
        assert_eq!(c.classify(&buffer), c.classify(&buffer));
    }

    // ------------------------------------------------------------------ stats

    #[test]
    fn stats_report_fractions_and_span() {
        let mut readings = vec![open(); 10];
        readings[2] = SensorReadings::mm(600.0, 610.0, 605.0);
        readings[6] = SensorReadings::mm(300.0, 1800.0, 1800.0);
        let stats = classifier().stats(&sweep(&readings, 0.1));

        assert_eq!(stats.samples, 10);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.opens, 8);
        assert_eq!(stats.flats, 1);
        assert_eq!(stats.asymmetric, 1);
        assert!((stats.hit_fraction - 0.2).abs() < 1e-12);
        assert!((stats.hit_span_rad - 0.4).abs() < 1e-9);
        assert!((stats.hit_std_mm - 150.0).abs() < 1e-9);
        assert_eq!(stats.max_hit_spread_mm, 1500.0);
    }

    #[test]
    fn empty_buffer_has_zero_stats() {
        assert_eq!(classifier().stats(&[]), ScanStats::default());
    }
}
