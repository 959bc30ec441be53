//! Behaviour states.
//!
//! [`FirmwareState`] is a sum type: every variant owns its private timers and
//! buffers, so nothing outlives the visit that created it.  A state's
//! `step` inspects the tick's readings, produces a wheel command, and may
//! request a transition.  Only
//! [`BehaviorEngine`][crate::engine::BehaviorEngine] acts on that request,
//! building the next variant from scratch.
//!
//! # States
//!
//! | State | Leaves to |
//! |---|---|
//! | [`Wander`] | `Scan` on detection, `Escape(wall)` on contact |
//! | [`Scan`] | `Approach`/`Verify` on a local object, `Escape(wall)` on a wall, `Wander` otherwise |
//! | [`Verify`] | `Approach` after the dwell, `Escape(wall)` or `Wander` |
//! | [`Approach`] | `Deposit` at the stop distance, `Escape` or `Wander` |
//! | [`Deposit`] | `Escape(deposit)` after the action |
//! | [`Escape`] | `Wander` when the profile completes |

use docent_perception::SignalClassifier;
use docent_types::{
    BehaviorConfig, Channel, ClassificationResult, EscapeProfile, EscapeReason, FirmwareConfig,
    ScanBuffer, ScanSample, SensorReadings, StateKind, WheelCommand,
};
use rand::Rng;

use crate::context::RobotContext;
use crate::motion::{
    SideBias, SteeringParams, draw_between, integrate_sweep_angle, steer_toward,
};

/// Timer comparisons tolerate this much float error.
const TIMER_EPSILON: f64 = 1e-9;

// ────────────────────────────────────────────────────────────────────────────
// Tick plumbing
// ────────────────────────────────────────────────────────────────────────────

/// Everything a state may read or write during one tick.
pub(crate) struct Tick<'a, R: Rng + ?Sized> {
    pub config: &'a FirmwareConfig,
    pub classifier: &'a SignalClassifier,
    pub rng: &'a mut R,
    pub ctx: &'a mut RobotContext,
    pub readings: &'a SensorReadings,
    pub dt: f64,
    pub tick: u64,
    pub target_locked: bool,
}

impl<R: Rng + ?Sized> Tick<'_, R> {
    fn max_mm(&self) -> f64 {
        self.config.sensor.max_range_mm
    }

    fn behavior(&self) -> &BehaviorConfig {
        &self.config.behavior
    }

    /// Every channel inside contact range, or the front inside bumper range.
    fn in_contact(&self) -> bool {
        let b = self.behavior();
        let max = self.max_mm();
        self.readings.farthest(max) < b.contact_mm
            || self.readings.effective(Channel::Front, max) < b.bumper_mm
    }

    /// Uniformly close across all channels.
    fn wall_like(&self) -> bool {
        let b = self.behavior();
        let max = self.max_mm();
        let far = self.readings.farthest(max);
        let near = self.readings.nearest(max).1;
        far < b.wall_like_mm && far - near < b.wall_like_spread_mm
    }

    fn side_bias(&self) -> SideBias {
        SideBias::from_readings(
            self.readings,
            self.max_mm(),
            self.behavior().symmetric_tolerance_mm,
        )
    }

    fn steering(&self) -> SteeringParams {
        SteeringParams::from_drive(&self.config.drive)
    }

    /// Mounting offset of the nearest channel and its distance.
    fn nearest_offset(&self) -> (f64, f64) {
        let (channel, d) = self.readings.nearest(self.max_mm());
        (self.config.sensor.channel_offsets_rad[channel.index()], d)
    }
}

/// Transition requested by a state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Next {
    Wander,
    /// `direction` is `+1.0` for CCW, `-1.0` for CW.
    Scan { direction: f64 },
    Verify,
    /// `side` is the sign of the expected target offset, used for
    /// reacquisition turns.
    Approach { side: f64 },
    Deposit,
    Escape(EscapeReason),
}

impl Next {
    pub(crate) fn kind(&self) -> StateKind {
        match self {
            Next::Wander => StateKind::Wander,
            Next::Scan { .. } => StateKind::Scan,
            Next::Verify => StateKind::Verify,
            Next::Approach { .. } => StateKind::Approach,
            Next::Deposit => StateKind::Deposit,
            Next::Escape(_) => StateKind::Escape,
        }
    }
}

/// Result of stepping the active state once.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Outcome {
    pub command: WheelCommand,
    pub next: Option<Next>,
    /// Set on the tick a sweep is classified, with its sample count.
    pub classification: Option<(ClassificationResult, usize)>,
    pub action: bool,
}

impl Outcome {
    fn drive(command: WheelCommand) -> Self {
        Self {
            command,
            next: None,
            classification: None,
            action: false,
        }
    }

    /// Stop and hand over to `next`.
    fn go(next: Next) -> Self {
        Self {
            command: WheelCommand::STOP,
            next: Some(next),
            classification: None,
            action: false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FirmwareState
// ────────────────────────────────────────────────────────────────────────────

/// The active behaviour and its private data.
#[derive(Debug, Clone, PartialEq)]
pub enum FirmwareState {
    Wander(Wander),
    Scan(Scan),
    Verify(Verify),
    Approach(Approach),
    Deposit(Deposit),
    Escape(Escape),
}

impl FirmwareState {
    pub fn kind(&self) -> StateKind {
        match self {
            FirmwareState::Wander(_) => StateKind::Wander,
            FirmwareState::Scan(_) => StateKind::Scan,
            FirmwareState::Verify(_) => StateKind::Verify,
            FirmwareState::Approach(_) => StateKind::Approach,
            FirmwareState::Deposit(_) => StateKind::Deposit,
            FirmwareState::Escape(_) => StateKind::Escape,
        }
    }

    /// Seconds spent in the current visit.
    pub fn elapsed_s(&self) -> f64 {
        match self {
            FirmwareState::Wander(s) => s.elapsed,
            FirmwareState::Scan(s) => s.elapsed,
            FirmwareState::Verify(s) => s.elapsed,
            FirmwareState::Approach(s) => s.elapsed,
            FirmwareState::Deposit(s) => s.elapsed,
            FirmwareState::Escape(s) => s.elapsed,
        }
    }

    /// The active escape choreography, if escaping.
    pub fn escape_profile(&self) -> Option<EscapeProfile> {
        match self {
            FirmwareState::Escape(s) => Some(s.profile),
            _ => None,
        }
    }

    /// Samples buffered so far in an active sweep.
    pub fn scan_samples(&self) -> Option<usize> {
        match self {
            FirmwareState::Scan(s) => Some(s.buffer.len()),
            _ => None,
        }
    }

    pub(crate) fn step<R: Rng + ?Sized>(&mut self, t: &mut Tick<'_, R>) -> Outcome {
        match self {
            FirmwareState::Wander(s) => s.step(t),
            FirmwareState::Scan(s) => s.step(t),
            FirmwareState::Verify(s) => s.step(t),
            FirmwareState::Approach(s) => s.step(t),
            FirmwareState::Deposit(s) => s.step(t),
            FirmwareState::Escape(s) => s.step(t),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wander
// ────────────────────────────────────────────────────────────────────────────

/// Cruise forward with a small random wobble until something comes close.
#[derive(Debug, Clone, PartialEq)]
pub struct Wander {
    elapsed: f64,
    wobble: f64,
    wobble_timer: f64,
}

impl Wander {
    pub(crate) fn enter<R: Rng + ?Sized>(config: &BehaviorConfig, rng: &mut R) -> Self {
        Self {
            elapsed: 0.0,
            wobble: draw_between(rng, -config.wander_wobble, config.wander_wobble),
            wobble_timer: config.wobble_interval_s,
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, t: &mut Tick<'_, R>) -> Outcome {
        self.elapsed += t.dt;

        if t.in_contact() {
            return Outcome::go(Next::Escape(EscapeReason::Wall));
        }

        let (_, nearest) = t.readings.nearest(t.max_mm());
        if nearest < t.behavior().detect_mm && t.ctx.scan_allowed() {
            let direction = t.side_bias().toward(t.rng).sign();
            return Outcome::go(Next::Scan { direction });
        }

        self.wobble_timer -= t.dt;
        if self.wobble_timer <= TIMER_EPSILON {
            let w = t.behavior().wander_wobble;
            self.wobble = draw_between(t.rng, -w, w);
            self.wobble_timer = t.behavior().wobble_interval_s;
        }
        let cruise = t.config.drive.cruise_speed;
        Outcome::drive(WheelCommand::new(cruise - self.wobble, cruise + self.wobble))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scan
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanPhase {
    Sweeping,
    /// Turning back toward a classified local object.
    Recentering { offset: f64, turned: f64, elapsed: f64 },
}

/// Turn-in-place sweep that buffers samples, then classifies them.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    direction: f64,
    phase: ScanPhase,
    elapsed: f64,
    swept: f64,
    sample_timer: f64,
    buffer: ScanBuffer,
}

impl Scan {
    pub(crate) fn enter(direction: f64) -> Self {
        Self {
            direction: if direction < 0.0 { -1.0 } else { 1.0 },
            phase: ScanPhase::Sweeping,
            elapsed: 0.0,
            swept: 0.0,
            sample_timer: 0.0,
            buffer: ScanBuffer::new(),
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, t: &mut Tick<'_, R>) -> Outcome {
        self.elapsed += t.dt;

        if t.in_contact() {
            return Outcome::go(Next::Escape(EscapeReason::Wall));
        }

        match self.phase {
            ScanPhase::Sweeping => self.sweep(t),
            ScanPhase::Recentering {
                offset,
                turned,
                elapsed,
            } => self.recenter(t, offset, turned, elapsed + t.dt),
        }
    }

    fn sweep<R: Rng + ?Sized>(&mut self, t: &mut Tick<'_, R>) -> Outcome {
        let b = &t.config.behavior;

        self.sample_timer -= t.dt;
        if self.sample_timer <= TIMER_EPSILON {
            self.buffer.push(ScanSample {
                theta: self.direction * self.swept,
                readings: t
                    .readings
                    .to_readings(&t.config.sensor.channel_offsets_rad, t.tick),
            });
            self.sample_timer = b.scan_sample_interval_s;
        }

        let finished = self.swept >= b.scan_sweep_rad - TIMER_EPSILON
            || self.elapsed >= b.scan_max_s - TIMER_EPSILON;
        if !finished {
            let command = WheelCommand::rotate(t.config.drive.scan_turn_speed, self.direction);
            self.swept +=
                integrate_sweep_angle(command, t.config.drive.wheel_base_m, t.dt).abs();
            return Outcome::drive(command);
        }

        let buffer = std::mem::take(&mut self.buffer);
        let result = t.classifier.classify(&buffer);
        let mut outcome = match result {
            ClassificationResult::Wall => {
                t.ctx.arm_scan_cooldown(b.wall_cooldown_s);
                Outcome::go(Next::Escape(EscapeReason::Wall))
            }
            ClassificationResult::LocalObject { bearing, .. } => {
                let offset = docent_types::wrap_angle(bearing - self.direction * self.swept);
                if offset.abs() <= b.recenter_tolerance_rad {
                    Outcome::go(Self::commit(b, offset))
                } else {
                    self.phase = ScanPhase::Recentering {
                        offset,
                        turned: 0.0,
                        elapsed: 0.0,
                    };
                    Outcome::drive(WheelCommand::STOP)
                }
            }
            ClassificationResult::None | ClassificationResult::Unknown => {
                t.ctx.arm_scan_cooldown(b.retry_cooldown_s);
                Outcome::go(Next::Wander)
            }
        };
        outcome.classification = Some((result, buffer.len()));
        outcome
    }

    fn recenter<R: Rng + ?Sized>(
        &mut self,
        t: &mut Tick<'_, R>,
        offset: f64,
        turned: f64,
        elapsed: f64,
    ) -> Outcome {
        let b = &t.config.behavior;
        if turned >= offset.abs() - b.recenter_tolerance_rad || elapsed >= b.recenter_max_s {
            return Outcome::go(Self::commit(b, offset));
        }
        let command = WheelCommand::rotate(t.config.drive.scan_turn_speed, offset);
        let delta = integrate_sweep_angle(command, t.config.drive.wheel_base_m, t.dt).abs();
        self.phase = ScanPhase::Recentering {
            offset,
            turned: turned + delta,
            elapsed,
        };
        Outcome::drive(command)
    }

    fn commit(b: &BehaviorConfig, offset: f64) -> Next {
        if b.verify_enabled {
            Next::Verify
        } else {
            Next::Approach {
                side: offset.signum(),
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Verify
// ────────────────────────────────────────────────────────────────────────────

/// Short forward creep that re-checks for a wall before committing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Verify {
    elapsed: f64,
}

impl Verify {
    fn step<R: Rng + ?Sized>(&mut self, t: &mut Tick<'_, R>) -> Outcome {
        self.elapsed += t.dt;
        let b = &t.config.behavior;

        if t.in_contact() || t.wall_like() {
            t.ctx.arm_scan_cooldown(b.wall_cooldown_s);
            return Outcome::go(Next::Escape(EscapeReason::Wall));
        }

        let (offset, nearest) = t.nearest_offset();
        if nearest > b.lost_mm {
            t.ctx.arm_scan_cooldown(b.retry_cooldown_s);
            return Outcome::go(Next::Wander);
        }
        if self.elapsed >= b.verify_s - TIMER_EPSILON {
            return Outcome::go(Next::Approach {
                side: offset.signum(),
            });
        }

        let heading = t.ctx.heading();
        Outcome::drive(steer_toward(
            heading,
            heading + offset,
            t.config.drive.verify_speed,
            &t.steering(),
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Approach
// ────────────────────────────────────────────────────────────────────────────

/// Pursuit toward the nearest channel until the stop distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Approach {
    elapsed: f64,
    lost_for: f64,
    /// Rotation sense for reacquisition turns.
    last_side: f64,
}

impl Approach {
    pub(crate) fn enter(side: f64) -> Self {
        Self {
            elapsed: 0.0,
            lost_for: 0.0,
            last_side: if side < 0.0 { -1.0 } else { 1.0 },
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, t: &mut Tick<'_, R>) -> Outcome {
        self.elapsed += t.dt;
        let b = &t.config.behavior;

        // Safety outranks pursuit.
        if t.in_contact() || t.wall_like() {
            t.ctx.arm_scan_cooldown(b.wall_cooldown_s);
            return Outcome::go(Next::Escape(EscapeReason::Wall));
        }

        let (offset, nearest) = t.nearest_offset();
        if nearest <= b.stop_mm {
            return if t.target_locked && t.ctx.action_allowed() {
                Outcome::go(Next::Deposit)
            } else {
                Outcome::go(Next::Escape(EscapeReason::Abort))
            };
        }

        if self.elapsed >= b.approach_max_s - TIMER_EPSILON {
            return Outcome::go(Next::Escape(EscapeReason::Abort));
        }

        let lost_mm = if t.target_locked {
            b.lost_locked_mm
        } else {
            b.lost_mm
        };
        if nearest > lost_mm {
            self.lost_for += t.dt;
            if self.lost_for >= b.reacquire_s - TIMER_EPSILON {
                t.ctx.arm_scan_cooldown(b.retry_cooldown_s);
                return Outcome::go(Next::Wander);
            }
            return Outcome::drive(WheelCommand::rotate(
                t.config.drive.scan_turn_speed,
                self.last_side,
            ));
        }

        self.lost_for = 0.0;
        if offset != 0.0 {
            self.last_side = offset.signum();
        }
        let heading = t.ctx.heading();
        Outcome::drive(steer_toward(
            heading,
            heading + offset,
            t.config.drive.approach_speed,
            &t.steering(),
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Deposit
// ────────────────────────────────────────────────────────────────────────────

/// Stand still for a random pause, then perform the payload action once.
#[derive(Debug, Clone, PartialEq)]
pub struct Deposit {
    elapsed: f64,
    pause_s: f64,
    fired: bool,
}

impl Deposit {
    pub(crate) fn enter<R: Rng + ?Sized>(config: &BehaviorConfig, rng: &mut R) -> Self {
        Self {
            elapsed: 0.0,
            pause_s: draw_between(rng, config.deposit_pause_min_s, config.deposit_pause_max_s),
            fired: false,
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, t: &mut Tick<'_, R>) -> Outcome {
        self.elapsed += t.dt;
        if self.fired || self.elapsed < self.pause_s - TIMER_EPSILON {
            return Outcome::drive(WheelCommand::STOP);
        }

        let b = &t.config.behavior;
        self.fired = true;
        t.ctx.trigger_action();
        t.ctx.arm_scan_cooldown(b.deposit_cooldown_s);
        t.ctx.arm_action_cooldown(b.action_cooldown_s);

        let mut outcome = Outcome::go(Next::Escape(EscapeReason::Deposit));
        outcome.action = true;
        outcome
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Escape
// ────────────────────────────────────────────────────────────────────────────

/// Reverse, then turn, following a fixed [`EscapeProfile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Escape {
    profile: EscapeProfile,
    elapsed: f64,
}

impl Escape {
    pub(crate) fn enter(profile: EscapeProfile) -> Self {
        Self {
            profile,
            elapsed: 0.0,
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, t: &mut Tick<'_, R>) -> Outcome {
        let phase_time = self.elapsed;
        self.elapsed += t.dt;
        if self.elapsed >= self.profile.total_s() - TIMER_EPSILON {
            return Outcome::go(Next::Wander);
        }

        let escape = &t.config.escape;
        if phase_time < self.profile.back_s {
            Outcome::drive(WheelCommand::straight(-escape.reverse_speed))
        } else {
            Outcome::drive(WheelCommand::rotate(
                escape.turn_speed,
                self.profile.direction.sign(),
            ))
        }
    }
}
