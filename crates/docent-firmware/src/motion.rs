//! Motion helpers used by the behaviour states.
//!
//! All functions here are stateless: steering toward a bearing, estimating
//! the rotation achieved by a wheel command, and choosing an escape
//! choreography.

use std::f64::consts::FRAC_PI_2;

use docent_types::{
    Channel, DriveConfig, EscapeConfig, EscapeProfile, EscapeReason, SensorReadings,
    TurnDirection, WheelCommand, wrap_angle,
};
use rand::Rng;

// ────────────────────────────────────────────────────────────────────────────
// Steering
// ────────────────────────────────────────────────────────────────────────────

/// Gains and limits for [`steer_toward`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringParams {
    /// Wheel-speed differential per radian of heading error.
    pub gain: f64,
    /// Differential cap as a fraction of the forward speed.
    pub max_turn_fraction: f64,
    pub max_wheel_speed: f64,
}

impl SteeringParams {
    pub fn from_drive(drive: &DriveConfig) -> Self {
        Self {
            gain: drive.steering_gain,
            max_turn_fraction: drive.max_turn_fraction,
            max_wheel_speed: drive.max_wheel_speed,
        }
    }
}

/// Proportional steering toward `target_bearing` (world frame).
///
/// The forward component shrinks linearly with the heading error and reaches
/// zero at a right angle, so sharp corrections turn in place instead of
/// overshooting.  The differential is clamped to
/// `max_turn_fraction × forward_speed`, and both wheels are scaled down
/// together if either would exceed `max_wheel_speed`.
///
/// ```
/// use docent_firmware::motion::{SteeringParams, steer_toward};
///
/// let params = SteeringParams { gain: 0.25, max_turn_fraction: 0.8, max_wheel_speed: 0.3 };
/// let cmd = steer_toward(0.0, 0.3, 0.14, &params);
/// assert!(cmd.right > cmd.left); // target is to the left (CCW)
/// ```
pub fn steer_toward(
    current_heading: f64,
    target_bearing: f64,
    forward_speed: f64,
    params: &SteeringParams,
) -> WheelCommand {
    let error = wrap_angle(target_bearing - current_heading);
    let scale = (1.0 - error.abs() / FRAC_PI_2).clamp(0.0, 1.0);
    let forward = forward_speed * scale;
    let turn_cap = params.max_turn_fraction * forward_speed.abs();
    let turn = (params.gain * error).clamp(-turn_cap, turn_cap);

    let left = forward - turn;
    let right = forward + turn;
    let peak = left.abs().max(right.abs());
    if peak > params.max_wheel_speed && peak > 0.0 {
        let k = params.max_wheel_speed / peak;
        WheelCommand::new(left * k, right * k)
    } else {
        WheelCommand::new(left, right)
    }
}

/// Rotation (radians, CCW positive) produced by `command` over `dt`.
pub fn integrate_sweep_angle(command: WheelCommand, wheel_base_m: f64, dt: f64) -> f64 {
    if wheel_base_m <= 0.0 {
        return 0.0;
    }
    (command.right - command.left) / wheel_base_m * dt
}

// ────────────────────────────────────────────────────────────────────────────
// Escape choreography
// ────────────────────────────────────────────────────────────────────────────

/// Which side reported the closer reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideBias {
    LeftCloser,
    RightCloser,
    /// Left and right within the symmetry tolerance.
    Symmetric,
}

impl SideBias {
    /// Compare the side channels, reading dropouts as `max_range_mm`.
    pub fn from_readings(readings: &SensorReadings, max_range_mm: f64, tolerance_mm: f64) -> Self {
        let left = readings.effective(Channel::Left, max_range_mm);
        let right = readings.effective(Channel::Right, max_range_mm);
        if (left - right).abs() <= tolerance_mm {
            SideBias::Symmetric
        } else if left < right {
            SideBias::LeftCloser
        } else {
            SideBias::RightCloser
        }
    }

    /// Turn direction pointing away from the closer side; a coin flip when
    /// symmetric.
    pub fn away<R: Rng + ?Sized>(self, rng: &mut R) -> TurnDirection {
        match self {
            SideBias::LeftCloser => TurnDirection::Right,
            SideBias::RightCloser => TurnDirection::Left,
            SideBias::Symmetric => random_direction(rng),
        }
    }

    /// Turn direction pointing toward the closer side; a coin flip when
    /// symmetric.
    pub fn toward<R: Rng + ?Sized>(self, rng: &mut R) -> TurnDirection {
        match self {
            SideBias::LeftCloser => TurnDirection::Left,
            SideBias::RightCloser => TurnDirection::Right,
            SideBias::Symmetric => random_direction(rng),
        }
    }
}

pub fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> TurnDirection {
    if rng.gen_bool(0.5) {
        TurnDirection::Left
    } else {
        TurnDirection::Right
    }
}

/// Uniform draw from `[min, max]`, or `min` when the range is empty.
pub(crate) fn draw_between<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max > min { rng.gen_range(min..=max) } else { min }
}

/// Pick the reverse-then-turn profile for `reason`.
///
/// The back-up time is fixed per reason and the turn time is drawn from the
/// reason's range; every reason turns away from the closer side.
pub fn compute_escape_profile<R: Rng + ?Sized>(
    reason: EscapeReason,
    side_bias: SideBias,
    config: &EscapeConfig,
    rng: &mut R,
) -> EscapeProfile {
    let timing = match reason {
        EscapeReason::Wall => &config.wall,
        EscapeReason::Deposit => &config.deposit,
        EscapeReason::Abort => &config.abort,
    };
    EscapeProfile {
        reason,
        back_s: timing.back_s,
        turn_s: draw_between(rng, timing.turn_min_s, timing.turn_max_s),
        direction: side_bias.away(rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn params() -> SteeringParams {
        SteeringParams::from_drive(&DriveConfig::default())
    }

    // ------------------------------------------------------------------ steer_toward

    #[test]
    fn on_heading_drives_straight() {
        let cmd = steer_toward(0.4, 0.4, 0.14, &params());
        assert!((cmd.left - 0.14).abs() < 1e-12);
        assert!((cmd.right - 0.14).abs() < 1e-12);
    }

    #[test]
    fn target_to_the_right_slows_the_right_wheel() {
        let cmd = steer_toward(0.0, -0.2, 0.14, &params());
        assert!(cmd.left > cmd.right);
    }

    #[test]
    fn forward_speed_drops_with_error() {
        let small = steer_toward(0.0, 0.1, 0.14, &params());
        let large = steer_toward(0.0, 1.0, 0.14, &params());
        let fwd = |c: WheelCommand| (c.left + c.right) / 2.0;
        assert!(fwd(large) < fwd(small));
    }

    #[test]
    fn error_past_right_angle_turns_in_place() {
        let cmd = steer_toward(0.0, 2.5, 0.14, &params());
        assert!((cmd.left + cmd.right).abs() < 1e-12);
        assert!(cmd.right > 0.0);
    }

    #[test]
    fn turn_is_clamped_to_fraction_of_forward() {
        let p = SteeringParams {
            gain: 100.0,
            max_turn_fraction: 0.5,
            max_wheel_speed: 1.0,
        };
        let cmd = steer_toward(0.0, 0.5, 0.2, &p);
        assert!(((cmd.right - cmd.left) / 2.0 - 0.1).abs() < 1e-12);
    }

    #[test]
    fn output_respects_max_wheel_speed() {
        let p = SteeringParams {
            gain: 1.0,
            max_turn_fraction: 1.0,
            max_wheel_speed: 0.2,
        };
        let cmd = steer_toward(0.0, 0.3, 0.2, &p);
        assert!(cmd.left.abs() <= 0.2 + 1e-12);
        assert!(cmd.right.abs() <= 0.2 + 1e-12);
        assert!(cmd.right > cmd.left);
    }

    #[test]
    fn error_wraps_across_pi() {
        // Heading just below +π, target just above −π: a small CCW turn.
        let cmd = steer_toward(3.1, -3.1, 0.14, &params());
        assert!(cmd.right > cmd.left);
    }

    // ------------------------------------------------------------------ integrate_sweep_angle

    #[test]
    fn sweep_angle_from_differential() {
        let d = integrate_sweep_angle(WheelCommand::rotate(0.15, 1.0), 0.3, 0.1);
        assert!((d - 0.1).abs() < 1e-12);
        let d = integrate_sweep_angle(WheelCommand::rotate(0.15, -1.0), 0.3, 0.1);
        assert!((d + 0.1).abs() < 1e-12);
        assert_eq!(integrate_sweep_angle(WheelCommand::straight(0.2), 0.3, 1.0), 0.0);
        assert_eq!(integrate_sweep_angle(WheelCommand::rotate(0.2, 1.0), 0.0, 1.0), 0.0);
    }

    // ------------------------------------------------------------------ escape profile

    #[test]
    fn side_bias_respects_tolerance() {
        let r = SensorReadings::mm(500.0, 900.0, 530.0);
        assert_eq!(SideBias::from_readings(&r, 2000.0, 40.0), SideBias::Symmetric);
        let r = SensorReadings::mm(400.0, 900.0, 800.0);
        assert_eq!(SideBias::from_readings(&r, 2000.0, 40.0), SideBias::LeftCloser);
        let r = SensorReadings::new(None, Some(900.0), Some(800.0));
        assert_eq!(SideBias::from_readings(&r, 2000.0, 40.0), SideBias::RightCloser);
    }

    #[test]
    fn escape_turns_away_from_closer_side() {
        let mut rng = StdRng::seed_from_u64(7);
        let cfg = EscapeConfig::default();
        let p = compute_escape_profile(EscapeReason::Wall, SideBias::LeftCloser, &cfg, &mut rng);
        assert_eq!(p.direction, TurnDirection::Right);
        let p = compute_escape_profile(EscapeReason::Wall, SideBias::RightCloser, &cfg, &mut rng);
        assert_eq!(p.direction, TurnDirection::Left);
    }

    #[test]
    fn escape_durations_follow_reason_table() {
        let mut rng = StdRng::seed_from_u64(11);
        let cfg = EscapeConfig::default();
        for _ in 0..50 {
            for reason in [EscapeReason::Wall, EscapeReason::Deposit, EscapeReason::Abort] {
                let timing = match reason {
                    EscapeReason::Wall => cfg.wall,
                    EscapeReason::Deposit => cfg.deposit,
                    EscapeReason::Abort => cfg.abort,
                };
                let p = compute_escape_profile(reason, SideBias::Symmetric, &cfg, &mut rng);
                assert_eq!(p.back_s, timing.back_s);
                assert!(p.turn_s >= timing.turn_min_s && p.turn_s <= timing.turn_max_s);
            }
        }
    }

    #[test]
    fn deposit_turn_is_longer_than_wall_turn() {
        let cfg = EscapeConfig::default();
        assert!(cfg.deposit.turn_min_s > cfg.wall.turn_max_s);
    }

    #[test]
    fn symmetric_bias_uses_both_directions() {
        let mut rng = StdRng::seed_from_u64(3);
        let dirs: Vec<TurnDirection> = (0..64).map(|_| SideBias::Symmetric.away(&mut rng)).collect();
        assert!(dirs.contains(&TurnDirection::Left));
        assert!(dirs.contains(&TurnDirection::Right));
    }

    #[test]
    fn empty_range_draws_minimum() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(draw_between(&mut rng, 0.5, 0.5), 0.5);
        assert_eq!(draw_between(&mut rng, 0.7, 0.2), 0.7);
    }
}
