//! Tunable firmware configuration.
//!
//! Every threshold the firmware consults lives here rather than in code, so
//! retuning for new sensor hardware is a config edit.  All structs
//! deserialise with per-field defaults, which lets a TOML file override only
//! the values it cares about.
//!
//! Units: distances in millimetres (`_mm`), durations in seconds (`_s`),
//! angles in radians (`_rad`), speeds in metres per second.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::DocentError;

// ────────────────────────────────────────────────────────────────────────────
// Top level
// ────────────────────────────────────────────────────────────────────────────

/// Immutable configuration bundle handed to every component constructor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FirmwareConfig {
    pub sensor: SensorConfig,
    pub classifier: ClassifierConfig,
    pub behavior: BehaviorConfig,
    pub escape: EscapeConfig,
    pub drive: DriveConfig,
}

impl FirmwareConfig {
    /// Check ranges and orderings across every section.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), DocentError> {
        self.sensor.validate()?;
        self.classifier.validate()?;
        self.behavior.validate()?;
        self.escape.validate()?;
        self.drive.validate()?;

        ensure(
            self.classifier.far_mm < self.sensor.max_range_mm,
            "classifier.far_mm",
            "must be below sensor.max_range_mm",
        )?;
        ensure(
            self.behavior.lost_locked_mm <= self.sensor.max_range_mm,
            "behavior.lost_locked_mm",
            "must not exceed sensor.max_range_mm",
        )?;

        // Every set-point a state sends must clear the interlock speed cap.
        let cap = self.drive.max_wheel_speed;
        ensure(
            self.drive.cruise_speed + self.behavior.wander_wobble <= cap,
            "behavior.wander_wobble",
            "cruise_speed + wander_wobble must not exceed drive.max_wheel_speed",
        )?;
        within_cap(self.drive.scan_turn_speed, cap, "drive.scan_turn_speed")?;
        within_cap(self.drive.approach_speed, cap, "drive.approach_speed")?;
        within_cap(self.drive.verify_speed, cap, "drive.verify_speed")?;
        within_cap(self.escape.reverse_speed, cap, "escape.reverse_speed")?;
        within_cap(self.escape.turn_speed, cap, "escape.turn_speed")
    }
}

fn within_cap(speed: f64, cap: f64, field: &str) -> Result<(), DocentError> {
    ensure(speed <= cap, field, "must not exceed drive.max_wheel_speed")
}

fn ensure(condition: bool, field: &str, reason: &str) -> Result<(), DocentError> {
    if condition {
        Ok(())
    } else {
        Err(DocentError::InvalidConfig {
            field: field.to_string(),
            reason: reason.to_string(),
        })
    }
}

fn probability(value: f64, field: &str) -> Result<(), DocentError> {
    ensure((0.0..=1.0).contains(&value), field, "must lie in [0, 1]")
}

fn non_negative(value: f64, field: &str) -> Result<(), DocentError> {
    ensure(value.is_finite() && value >= 0.0, field, "must be finite and >= 0")
}

fn positive(value: f64, field: &str) -> Result<(), DocentError> {
    ensure(value.is_finite() && value > 0.0, field, "must be finite and > 0")
}

// ────────────────────────────────────────────────────────────────────────────
// Sensors
// ────────────────────────────────────────────────────────────────────────────

/// Noise and geometry model of the distance sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SensorConfig {
    pub min_range_mm: f64,
    pub max_range_mm: f64,
    /// Standard deviation of the zero-mean Gaussian noise.
    pub noise_sigma_mm: f64,
    pub dropout_prob: f64,
    pub outlier_prob: f64,
    /// Magnitude of an outlier spike (sign is random).
    pub outlier_mm: f64,
    /// Hardware refresh rate; readings are cached between refreshes.
    pub sample_rate_hz: f64,
    /// Angular width of each sensor cone.  `0` means a single ray.
    pub cone_width_rad: f64,
    pub cone_rays: usize,
    /// Mounting angle per channel, indexed left/front/right.
    pub channel_offsets_rad: [f64; 3],
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            min_range_mm: 20.0,
            max_range_mm: 2000.0,
            noise_sigma_mm: 8.0,
            dropout_prob: 0.02,
            outlier_prob: 0.01,
            outlier_mm: 250.0,
            sample_rate_hz: 20.0,
            cone_width_rad: 0.26,
            cone_rays: 5,
            channel_offsets_rad: [0.5, 0.0, -0.5],
        }
    }
}

impl SensorConfig {
    pub fn validate(&self) -> Result<(), DocentError> {
        non_negative(self.min_range_mm, "sensor.min_range_mm")?;
        ensure(
            self.max_range_mm.is_finite() && self.max_range_mm > self.min_range_mm,
            "sensor.max_range_mm",
            "must exceed min_range_mm",
        )?;
        non_negative(self.noise_sigma_mm, "sensor.noise_sigma_mm")?;
        probability(self.dropout_prob, "sensor.dropout_prob")?;
        probability(self.outlier_prob, "sensor.outlier_prob")?;
        non_negative(self.outlier_mm, "sensor.outlier_mm")?;
        positive(self.sample_rate_hz, "sensor.sample_rate_hz")?;
        non_negative(self.cone_width_rad, "sensor.cone_width_rad")?;
        ensure(self.cone_rays >= 1, "sensor.cone_rays", "must be at least 1")
    }

    /// Seconds between hardware refreshes.
    pub fn sample_period_s(&self) -> f64 {
        1.0 / self.sample_rate_hz
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Classifier
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds of the wall / local-object discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Below this many samples the verdict is always `Unknown`.
    pub min_samples: usize,
    /// A sample is a hit when its nearest channel is below this.
    pub hit_mm: f64,
    /// A sample (or channel) is open when it reads beyond this.
    pub far_mm: f64,
    /// Hits whose channel spread is below this count as flat.
    pub flat_spread_mm: f64,
    /// Minimum channel spread for a hit/open pair to count as asymmetric.
    pub asym_min_spread_mm: f64,
    pub object_max_span_rad: f64,
    pub object_min_spread_mm: f64,
    pub object_max_flat_fraction: f64,
    pub wall_flat_fraction: f64,
    pub wall_hit_fraction: f64,
    pub wall_min_span_rad: f64,
    pub wall_low_spread_mm: f64,
    pub wall_low_std_mm: f64,
    pub wall_low_open_fraction: f64,
    pub wall_moderate_hit_fraction: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_samples: 6,
            hit_mm: 1400.0,
            far_mm: 1600.0,
            flat_spread_mm: 80.0,
            asym_min_spread_mm: 600.0,
            object_max_span_rad: 0.7,
            object_min_spread_mm: 600.0,
            object_max_flat_fraction: 0.3,
            wall_flat_fraction: 0.6,
            wall_hit_fraction: 0.7,
            wall_min_span_rad: 0.9,
            wall_low_spread_mm: 100.0,
            wall_low_std_mm: 40.0,
            wall_low_open_fraction: 0.2,
            wall_moderate_hit_fraction: 0.4,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), DocentError> {
        ensure(self.min_samples >= 1, "classifier.min_samples", "must be at least 1")?;
        positive(self.hit_mm, "classifier.hit_mm")?;
        ensure(
            self.far_mm >= self.hit_mm,
            "classifier.far_mm",
            "must not be below hit_mm",
        )?;
        non_negative(self.flat_spread_mm, "classifier.flat_spread_mm")?;
        non_negative(self.asym_min_spread_mm, "classifier.asym_min_spread_mm")?;
        positive(self.object_max_span_rad, "classifier.object_max_span_rad")?;
        non_negative(self.object_min_spread_mm, "classifier.object_min_spread_mm")?;
        probability(self.object_max_flat_fraction, "classifier.object_max_flat_fraction")?;
        probability(self.wall_flat_fraction, "classifier.wall_flat_fraction")?;
        probability(self.wall_hit_fraction, "classifier.wall_hit_fraction")?;
        non_negative(self.wall_min_span_rad, "classifier.wall_min_span_rad")?;
        non_negative(self.wall_low_spread_mm, "classifier.wall_low_spread_mm")?;
        non_negative(self.wall_low_std_mm, "classifier.wall_low_std_mm")?;
        probability(self.wall_low_open_fraction, "classifier.wall_low_open_fraction")?;
        probability(
            self.wall_moderate_hit_fraction,
            "classifier.wall_moderate_hit_fraction",
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Behaviour
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds, timers and cooldowns of the behaviour state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Any channel below this starts a scan.
    pub detect_mm: f64,
    /// Every channel below this means the robot is touching a wall.
    pub contact_mm: f64,
    /// Front channel below this is treated as a bumper hit.
    pub bumper_mm: f64,
    /// Upper bound for the uniform "wall-like" pattern during pursuit.
    pub wall_like_mm: f64,
    /// Maximum channel spread for the uniform "wall-like" pattern.
    pub wall_like_spread_mm: f64,
    /// Left/right readings closer than this are treated as symmetric.
    pub symmetric_tolerance_mm: f64,
    pub stop_mm: f64,
    /// Target-lost threshold while unlocked.
    pub lost_mm: f64,
    /// Target-lost threshold once the target is locked.
    pub lost_locked_mm: f64,
    pub scan_sweep_rad: f64,
    /// Hard cap on a sweep regardless of the angle reached.
    pub scan_max_s: f64,
    pub scan_sample_interval_s: f64,
    pub recenter_tolerance_rad: f64,
    pub recenter_max_s: f64,
    pub verify_enabled: bool,
    pub verify_s: f64,
    /// Grace period for re-acquiring a lost target.
    pub reacquire_s: f64,
    pub approach_max_s: f64,
    pub deposit_pause_min_s: f64,
    pub deposit_pause_max_s: f64,
    pub wall_cooldown_s: f64,
    pub retry_cooldown_s: f64,
    /// Scan suppression after a deposit; longer than the other cooldowns.
    pub deposit_cooldown_s: f64,
    /// Suppresses a second deposit after the previous one.
    pub action_cooldown_s: f64,
    /// Peak wheel-speed differential of the wander wobble.
    pub wander_wobble: f64,
    pub wobble_interval_s: f64,
    pub payload_capacity: u32,
    /// Larger `dt` values are clamped to this.
    pub max_dt_s: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            detect_mm: 1400.0,
            contact_mm: 250.0,
            bumper_mm: 150.0,
            wall_like_mm: 700.0,
            wall_like_spread_mm: 150.0,
            symmetric_tolerance_mm: 40.0,
            stop_mm: 350.0,
            lost_mm: 1500.0,
            lost_locked_mm: 1900.0,
            scan_sweep_rad: std::f64::consts::FRAC_PI_3,
            scan_max_s: 3.0,
            scan_sample_interval_s: 0.05,
            recenter_tolerance_rad: 0.15,
            recenter_max_s: 2.0,
            verify_enabled: false,
            verify_s: 0.6,
            reacquire_s: 0.8,
            approach_max_s: 12.0,
            deposit_pause_min_s: 0.5,
            deposit_pause_max_s: 1.0,
            wall_cooldown_s: 4.0,
            retry_cooldown_s: 1.5,
            deposit_cooldown_s: 8.0,
            action_cooldown_s: 10.0,
            wander_wobble: 0.03,
            wobble_interval_s: 1.0,
            payload_capacity: 8,
            max_dt_s: 0.25,
        }
    }
}

impl BehaviorConfig {
    pub fn validate(&self) -> Result<(), DocentError> {
        positive(self.detect_mm, "behavior.detect_mm")?;
        non_negative(self.contact_mm, "behavior.contact_mm")?;
        non_negative(self.bumper_mm, "behavior.bumper_mm")?;
        ensure(
            self.contact_mm < self.detect_mm,
            "behavior.contact_mm",
            "must be below detect_mm",
        )?;
        non_negative(self.wall_like_mm, "behavior.wall_like_mm")?;
        non_negative(self.wall_like_spread_mm, "behavior.wall_like_spread_mm")?;
        non_negative(self.symmetric_tolerance_mm, "behavior.symmetric_tolerance_mm")?;
        positive(self.stop_mm, "behavior.stop_mm")?;
        ensure(
            self.lost_mm > self.stop_mm,
            "behavior.lost_mm",
            "must exceed stop_mm",
        )?;
        ensure(
            self.lost_locked_mm >= self.lost_mm,
            "behavior.lost_locked_mm",
            "must not be below lost_mm",
        )?;
        positive(self.scan_sweep_rad, "behavior.scan_sweep_rad")?;
        positive(self.scan_max_s, "behavior.scan_max_s")?;
        positive(self.scan_sample_interval_s, "behavior.scan_sample_interval_s")?;
        non_negative(self.recenter_tolerance_rad, "behavior.recenter_tolerance_rad")?;
        non_negative(self.recenter_max_s, "behavior.recenter_max_s")?;
        non_negative(self.verify_s, "behavior.verify_s")?;
        non_negative(self.reacquire_s, "behavior.reacquire_s")?;
        positive(self.approach_max_s, "behavior.approach_max_s")?;
        non_negative(self.deposit_pause_min_s, "behavior.deposit_pause_min_s")?;
        ensure(
            self.deposit_pause_max_s.is_finite()
                && self.deposit_pause_max_s >= self.deposit_pause_min_s,
            "behavior.deposit_pause_max_s",
            "must not be below deposit_pause_min_s",
        )?;
        non_negative(self.wall_cooldown_s, "behavior.wall_cooldown_s")?;
        non_negative(self.retry_cooldown_s, "behavior.retry_cooldown_s")?;
        ensure(
            self.deposit_cooldown_s.is_finite()
                && self.deposit_cooldown_s >= self.wall_cooldown_s
                && self.deposit_cooldown_s >= self.retry_cooldown_s,
            "behavior.deposit_cooldown_s",
            "must be at least as long as the other scan cooldowns",
        )?;
        non_negative(self.action_cooldown_s, "behavior.action_cooldown_s")?;
        non_negative(self.wander_wobble, "behavior.wander_wobble")?;
        positive(self.wobble_interval_s, "behavior.wobble_interval_s")?;
        positive(self.max_dt_s, "behavior.max_dt_s")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Escape
// ────────────────────────────────────────────────────────────────────────────

/// Reverse duration and turn-duration range of one escape reason.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EscapeTiming {
    pub back_s: f64,
    pub turn_min_s: f64,
    pub turn_max_s: f64,
}

impl EscapeTiming {
    fn validate(&self, section: &str) -> Result<(), DocentError> {
        non_negative(self.back_s, &format!("escape.{section}.back_s"))?;
        non_negative(self.turn_min_s, &format!("escape.{section}.turn_min_s"))?;
        ensure(
            self.turn_max_s.is_finite() && self.turn_max_s >= self.turn_min_s,
            &format!("escape.{section}.turn_max_s"),
            "must not be below turn_min_s",
        )
    }
}

/// Reason-keyed table of escape choreographies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EscapeConfig {
    pub reverse_speed: f64,
    pub turn_speed: f64,
    pub wall: EscapeTiming,
    /// Post-deposit escape; turns further than the others.
    pub deposit: EscapeTiming,
    pub abort: EscapeTiming,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            reverse_speed: 0.12,
            turn_speed: 0.15,
            wall: EscapeTiming {
                back_s: 0.6,
                turn_min_s: 0.5,
                turn_max_s: 0.9,
            },
            deposit: EscapeTiming {
                back_s: 0.8,
                turn_min_s: 1.2,
                turn_max_s: 1.8,
            },
            abort: EscapeTiming {
                back_s: 0.4,
                turn_min_s: 0.3,
                turn_max_s: 0.6,
            },
        }
    }
}

impl EscapeConfig {
    pub fn validate(&self) -> Result<(), DocentError> {
        non_negative(self.reverse_speed, "escape.reverse_speed")?;
        non_negative(self.turn_speed, "escape.turn_speed")?;
        self.wall.validate("wall")?;
        self.deposit.validate("deposit")?;
        self.abort.validate("abort")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drive
// ────────────────────────────────────────────────────────────────────────────

/// Drive-train geometry and speed set-points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DriveConfig {
    pub wheel_base_m: f64,
    pub max_wheel_speed: f64,
    pub cruise_speed: f64,
    pub scan_turn_speed: f64,
    pub approach_speed: f64,
    pub verify_speed: f64,
    /// Wheel-speed differential per radian of heading error.
    pub steering_gain: f64,
    /// Steering differential cap as a fraction of forward speed.
    pub max_turn_fraction: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            wheel_base_m: 0.3,
            max_wheel_speed: 0.3,
            cruise_speed: 0.18,
            scan_turn_speed: 0.15,
            approach_speed: 0.14,
            verify_speed: 0.06,
            steering_gain: 0.25,
            max_turn_fraction: 0.8,
        }
    }
}

impl DriveConfig {
    pub fn validate(&self) -> Result<(), DocentError> {
        positive(self.wheel_base_m, "drive.wheel_base_m")?;
        positive(self.max_wheel_speed, "drive.max_wheel_speed")?;
        non_negative(self.cruise_speed, "drive.cruise_speed")?;
        positive(self.scan_turn_speed, "drive.scan_turn_speed")?;
        non_negative(self.approach_speed, "drive.approach_speed")?;
        non_negative(self.verify_speed, "drive.verify_speed")?;
        non_negative(self.steering_gain, "drive.steering_gain")?;
        non_negative(self.max_turn_fraction, "drive.max_turn_fraction")
    }
}
