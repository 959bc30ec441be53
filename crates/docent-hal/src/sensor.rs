//! Distance Sensor Model.
//!
//! Converts ground-truth geometry into the kind of reading a cheap ranging
//! sensor actually delivers.  For every refresh:
//!
//! 1. With probability `dropout_prob` the echo is lost and the reading is
//!    `None`, whatever the geometry says.
//! 2. Otherwise the ground truth is converted to millimetres (a miss reads as
//!    `max_range_mm`), zero-mean Gaussian noise is added, and with probability
//!    `outlier_prob` a spike of `±outlier_mm` is added on top.
//! 3. The result is clamped into `[min_range_mm, max_range_mm]`.
//!
//! Refreshes happen at `sample_rate_hz`, independent of how often the caller
//! ticks; between refreshes the cached reading is returned.
//!
//! A [`ConeSensor`] samples several rays across its field of view and feeds
//! the nearest hit into its model.  A [`SensorArray`] bundles one cone per
//! [`Channel`] and produces the [`SensorReadings`] the firmware consumes.
//!
//! # Example
//!
//! ```rust
//! use docent_hal::sensor::SensorModel;
//! use docent_types::SensorConfig;
//! use rand::{SeedableRng, rngs::StdRng};
//!
//! let config = SensorConfig {
//!     noise_sigma_mm: 0.0,
//!     dropout_prob: 0.0,
//!     outlier_prob: 0.0,
//!     ..SensorConfig::default()
//! };
//! let mut model = SensorModel::new(config).expect("valid sensor config");
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! assert_eq!(model.sample(Some(1.25), 0.05, &mut rng), Some(1250.0));
//! ```

use docent_types::{Channel, DocentError, Pose, SensorConfig, SensorReadings};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::query::DistanceQuery;

/// Slack on the refresh-period comparison so accumulated `dt` round-off does
/// not skip a refresh.
const PERIOD_EPSILON_S: f64 = 1e-9;

// ────────────────────────────────────────────────────────────────────────────
// SensorModel
// ────────────────────────────────────────────────────────────────────────────

/// Noise, dropout and refresh-rate model of one ranging channel.
///
/// The only mutable state is the refresh timer and the cached reading;
/// randomness is supplied by the caller on every refresh.
#[derive(Debug, Clone)]
pub struct SensorModel {
    config: SensorConfig,
    noise: Normal<f64>,
    since_refresh_s: f64,
    /// `None` until the first refresh; the inner `Option` is the reading.
    cached: Option<Option<f64>>,
}

impl SensorModel {
    /// Build a model from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::InvalidConfig`] if the sensor section fails
    /// validation.
    pub fn new(config: SensorConfig) -> Result<Self, DocentError> {
        config.validate()?;
        let noise =
            Normal::new(0.0, config.noise_sigma_mm).map_err(|e| DocentError::InvalidConfig {
                field: "sensor.noise_sigma_mm".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            config,
            noise,
            since_refresh_s: 0.0,
            cached: None,
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Rate-limited reading.
    ///
    /// `ground_truth_m` is the nearest-surface distance in metres (`None` for
    /// no hit within range).  A fresh reading is drawn only when a refresh is
    /// due; otherwise the cached one is returned.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        ground_truth_m: Option<f64>,
        dt: f64,
        rng: &mut R,
    ) -> Option<f64> {
        if self.advance(dt) {
            self.refresh(ground_truth_m, rng)
        } else {
            self.last()
        }
    }

    /// Advance the refresh timer by `dt` and report whether a refresh is due.
    ///
    /// Non-finite or negative `dt` does not advance the timer.  The first call
    /// always reports a refresh.
    pub fn advance(&mut self, dt: f64) -> bool {
        if self.cached.is_none() {
            self.since_refresh_s = 0.0;
            return true;
        }
        if dt.is_finite() && dt > 0.0 {
            self.since_refresh_s += dt;
        }
        let period = self.config.sample_period_s();
        if self.since_refresh_s + PERIOD_EPSILON_S >= period {
            // Keep the phase but never bank more than one period of backlog.
            self.since_refresh_s = (self.since_refresh_s - period).clamp(0.0, period);
            true
        } else {
            false
        }
    }

    /// Draw a new reading from `ground_truth_m` and cache it.
    pub fn refresh<R: Rng + ?Sized>(&mut self, ground_truth_m: Option<f64>, rng: &mut R) -> Option<f64> {
        let reading = self.measure(ground_truth_m, rng);
        self.cached = Some(reading);
        reading
    }

    /// The cached reading (`None` before the first refresh or after a
    /// dropout).
    pub fn last(&self) -> Option<f64> {
        self.cached.flatten()
    }

    /// Apply dropout, noise, outliers and clamping to one ground-truth value,
    /// ignoring the refresh timer.
    pub fn measure<R: Rng + ?Sized>(&self, ground_truth_m: Option<f64>, rng: &mut R) -> Option<f64> {
        let cfg = &self.config;
        if cfg.dropout_prob > 0.0 && rng.gen_bool(cfg.dropout_prob) {
            return None;
        }

        let truth_mm = ground_truth_m
            .filter(|m| m.is_finite())
            .map(|m| (m * 1000.0).min(cfg.max_range_mm))
            .unwrap_or(cfg.max_range_mm);

        let mut reading = truth_mm + self.noise.sample(rng);
        if cfg.outlier_prob > 0.0 && rng.gen_bool(cfg.outlier_prob) {
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            reading += sign * cfg.outlier_mm;
        }

        Some(reading.clamp(cfg.min_range_mm, cfg.max_range_mm))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ConeSensor
// ────────────────────────────────────────────────────────────────────────────

/// A sensor with an angular field of view.
///
/// Casts `cone_rays` rays spread evenly over `cone_width_rad` around its
/// mounting angle and reports the nearest hit, before noise is applied.
#[derive(Debug, Clone)]
pub struct ConeSensor {
    channel: Channel,
    offset_rad: f64,
    width_rad: f64,
    rays: usize,
    model: SensorModel,
}

impl ConeSensor {
    /// Build the cone for `channel`, taking its mounting angle and geometry
    /// from `config`.
    ///
    /// # Errors
    ///
    /// Propagates [`SensorModel::new`] validation errors.
    pub fn new(channel: Channel, config: SensorConfig) -> Result<Self, DocentError> {
        let offset_rad = config.channel_offsets_rad[channel.index()];
        let width_rad = config.cone_width_rad;
        let rays = config.cone_rays.max(1);
        Ok(Self {
            channel,
            offset_rad,
            width_rad,
            rays,
            model: SensorModel::new(config)?,
        })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// World angles of every ray for a robot at `heading`.
    pub fn ray_angles(&self, heading: f64) -> impl Iterator<Item = f64> + '_ {
        let center = heading + self.offset_rad;
        let rays = self.rays;
        let width = self.width_rad;
        (0..rays).map(move |i| {
            if rays == 1 {
                center
            } else {
                center - width / 2.0 + width * i as f64 / (rays - 1) as f64
            }
        })
    }

    /// Nearest hit (metres) among the cone's rays, or `None` if every ray
    /// misses.
    pub fn ground_truth<Q: DistanceQuery + ?Sized>(&self, query: &Q, pose: &Pose) -> Option<f64> {
        let origin = pose.position();
        self.ray_angles(pose.heading)
            .filter_map(|angle| query.cast(origin, angle))
            .filter(|d| d.is_finite())
            .min_by(f64::total_cmp)
    }

    /// Rate-limited reading for a robot at `pose`.  Rays are only cast when
    /// a refresh is due.
    pub fn read<Q: DistanceQuery + ?Sized, R: Rng + ?Sized>(
        &mut self,
        query: &Q,
        pose: &Pose,
        dt: f64,
        rng: &mut R,
    ) -> Option<f64> {
        if self.model.advance(dt) {
            let truth = self.ground_truth(query, pose);
            self.model.refresh(truth, rng)
        } else {
            self.model.last()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SensorArray
// ────────────────────────────────────────────────────────────────────────────

/// One [`ConeSensor`] per [`Channel`].
#[derive(Debug, Clone)]
pub struct SensorArray {
    sensors: [ConeSensor; 3],
}

impl SensorArray {
    /// # Errors
    ///
    /// Returns [`DocentError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: &SensorConfig) -> Result<Self, DocentError> {
        Ok(Self {
            sensors: [
                ConeSensor::new(Channel::Left, config.clone())?,
                ConeSensor::new(Channel::Front, config.clone())?,
                ConeSensor::new(Channel::Right, config.clone())?,
            ],
        })
    }

    /// Read every channel for a robot at `pose`.
    pub fn read_all<Q: DistanceQuery + ?Sized, R: Rng + ?Sized>(
        &mut self,
        query: &Q,
        pose: &Pose,
        dt: f64,
        rng: &mut R,
    ) -> SensorReadings {
        let mut readings = SensorReadings::dropout();
        for sensor in &mut self.sensors {
            let value = sensor.read(query, pose, dt, rng);
            readings.set(sensor.channel(), value);
        }
        readings
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use docent_types::Point2;
    use rand::{SeedableRng, rngs::StdRng};

    fn quiet_config() -> SensorConfig {
        SensorConfig {
            noise_sigma_mm: 0.0,
            dropout_prob: 0.0,
            outlier_prob: 0.0,
            ..SensorConfig::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xD0C3)
    }

    /// Rays pointing left of +X hit at 0.5 m, everything else at 1.5 m.
    struct SplitQuery;

    impl DistanceQuery for SplitQuery {
        fn cast(&self, _origin: Point2, angle: f64) -> Option<f64> {
            if angle > 0.01 { Some(0.5) } else { Some(1.5) }
        }
    }

    struct EmptyRoom;

    impl DistanceQuery for EmptyRoom {
        fn cast(&self, _origin: Point2, _angle: f64) -> Option<f64> {
            None
        }
    }

    #[test]
    fn noiseless_reading_converts_to_millimetres() {
        let model = SensorModel::new(quiet_config()).unwrap();
        assert_eq!(model.measure(Some(0.8), &mut rng()), Some(800.0));
    }

    #[test]
    fn miss_reads_as_max_range_not_dropout() {
        let model = SensorModel::new(quiet_config()).unwrap();
        assert_eq!(model.measure(None, &mut rng()), Some(2000.0));
        assert_eq!(model.measure(Some(9.0), &mut rng()), Some(2000.0));
    }

    #[test]
    fn certain_dropout_always_returns_none() {
        let cfg = SensorConfig {
            dropout_prob: 1.0,
            ..quiet_config()
        };
        let model = SensorModel::new(cfg).unwrap();
        let mut rng = rng();
        assert!((0..50).all(|_| model.measure(Some(0.5), &mut rng).is_none()));
    }

    #[test]
    fn readings_are_clamped_into_range() {
        let cfg = SensorConfig {
            noise_sigma_mm: 500.0,
            ..quiet_config()
        };
        let model = SensorModel::new(cfg).unwrap();
        let mut rng = rng();
        for _ in 0..500 {
            let d = model.measure(Some(0.03), &mut rng).unwrap();
            assert!((20.0..=2000.0).contains(&d));
        }
    }

    #[test]
    fn certain_outlier_shifts_by_fixed_amplitude() {
        let cfg = SensorConfig {
            outlier_prob: 1.0,
            outlier_mm: 250.0,
            ..quiet_config()
        };
        let model = SensorModel::new(cfg).unwrap();
        let mut rng = rng();
        let mut saw_up = false;
        let mut saw_down = false;
        for _ in 0..100 {
            let d = model.measure(Some(1.0), &mut rng).unwrap();
            if (d - 1250.0).abs() < 1e-9 {
                saw_up = true;
            } else if (d - 750.0).abs() < 1e-9 {
                saw_down = true;
            } else {
                panic!("unexpected outlier value {d}");
            }
        }
        assert!(saw_up && saw_down, "outlier sign must be random");
    }

    #[test]
    fn gaussian_noise_is_zero_mean_with_configured_sigma() {
        let cfg = SensorConfig {
            noise_sigma_mm: 10.0,
            ..quiet_config()
        };
        let model = SensorModel::new(cfg).unwrap();
        let mut rng = rng();
        let samples: Vec<f64> = (0..4000)
            .map(|_| model.measure(Some(1.0), &mut rng).unwrap())
            .collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var = samples.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert!((mean - 1000.0).abs() < 1.0, "mean {mean}");
        assert!((var.sqrt() - 10.0).abs() < 1.0, "sigma {}", var.sqrt());
    }

    #[test]
    fn readings_are_cached_between_refreshes() {
        let mut model = SensorModel::new(quiet_config()).unwrap();
        let mut rng = rng();
        // 20 Hz → 50 ms period.
        assert_eq!(model.sample(Some(1.0), 0.01, &mut rng), Some(1000.0));
        assert_eq!(model.sample(Some(0.5), 0.01, &mut rng), Some(1000.0));
        assert_eq!(model.sample(Some(0.5), 0.02, &mut rng), Some(1000.0));
        // Accumulated 0.05 s → refresh.
        assert_eq!(model.sample(Some(0.5), 0.02, &mut rng), Some(500.0));
    }

    #[test]
    fn refresh_rate_is_independent_of_tick_rate() {
        let mut model = SensorModel::new(quiet_config()).unwrap();
        let mut refreshes = 0;
        // First call always refreshes; then 1 s of 100 Hz ticks.
        if model.advance(0.01) {
            refreshes += 1;
            model.refresh(Some(1.0), &mut rng());
        }
        for _ in 0..100 {
            if model.advance(0.01) {
                refreshes += 1;
            }
        }
        assert_eq!(refreshes, 21);
    }

    #[test]
    fn non_finite_dt_does_not_advance_timer() {
        let mut model = SensorModel::new(quiet_config()).unwrap();
        let mut rng = rng();
        model.sample(Some(1.0), 0.0, &mut rng);
        assert_eq!(model.sample(Some(0.3), f64::NAN, &mut rng), Some(1000.0));
        assert_eq!(model.sample(Some(0.3), -5.0, &mut rng), Some(1000.0));
    }

    #[test]
    fn cone_reports_nearest_ray() {
        let cone = ConeSensor::new(Channel::Front, quiet_config()).unwrap();
        // Front cone spans ±0.13 rad, so its left-most rays see 0.5 m.
        let truth = cone.ground_truth(&SplitQuery, &Pose::default());
        assert_eq!(truth, Some(0.5));
    }

    #[test]
    fn single_ray_cone_uses_mounting_angle() {
        let cfg = SensorConfig {
            cone_rays: 1,
            ..quiet_config()
        };
        let cone = ConeSensor::new(Channel::Front, cfg).unwrap();
        let angles: Vec<f64> = cone.ray_angles(0.0).collect();
        assert_eq!(angles, vec![0.0]);
        assert_eq!(cone.ground_truth(&SplitQuery, &Pose::default()), Some(1.5));
    }

    #[test]
    fn cone_miss_becomes_max_range_reading() {
        let mut cone = ConeSensor::new(Channel::Left, quiet_config()).unwrap();
        let reading = cone.read(&EmptyRoom, &Pose::default(), 0.05, &mut rng());
        assert_eq!(reading, Some(2000.0));
    }

    #[test]
    fn array_reads_every_channel() {
        let mut array = SensorArray::new(&quiet_config()).unwrap();
        let readings = array.read_all(&SplitQuery, &Pose::default(), 0.05, &mut rng());
        // Left cone is centred at +0.5 rad → all rays hit at 0.5 m.
        assert_eq!(readings.left, Some(500.0));
        assert_eq!(readings.front, Some(500.0));
        // Right cone is centred at −0.5 rad → 1.5 m.
        assert_eq!(readings.right, Some(1500.0));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = SensorConfig {
            sample_rate_hz: 0.0,
            ..SensorConfig::default()
        };
        assert!(SensorModel::new(cfg).is_err());
    }
}
