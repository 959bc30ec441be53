//! [`BehaviorEngine`] – the tick-driven firmware state machine.
//!
//! One call to [`BehaviorEngine::update`] per simulation step:
//!
//! 1. sanitise `dt` through the kernel [`TickClock`] and the readings into
//!    the sensor's range (non-finite values become dropouts);
//! 2. count every cooldown in the [`RobotContext`] down by `dt`;
//! 3. step the active [`FirmwareState`];
//! 4. pass the resulting command through the kernel [`CommandGuard`],
//!    replacing a rejected command with STOP;
//! 5. write the wheel speeds to the context and, if requested, `enter` the
//!    next state.
//!
//! `update` never fails and never blocks.  All randomness comes from the
//! injected [`Rng`], so a seeded engine fed the same `(dt, readings)`
//! sequence replays exactly.
//!
//! # Example
//!
//! ```rust
//! use docent_firmware::{BehaviorEngine, RobotContext};
//! use docent_types::{FirmwareConfig, SensorReadings, StateKind};
//!
//! let config = FirmwareConfig::default();
//! let mut ctx = RobotContext::from_config(&config.behavior);
//! let mut engine = BehaviorEngine::seeded(config, 7).unwrap();
//!
//! engine.update(&mut ctx, 0.05, &SensorReadings::mm(2000.0, 1200.0, 2000.0));
//! assert_eq!(engine.state_kind(), StateKind::Scan);
//! ```

use docent_kernel::{CommandGuard, CommandRule, DtCorrection, TickClock};
use docent_perception::SignalClassifier;
use docent_types::{
    ClassificationResult, DocentError, EscapeReason, FirmwareConfig, SensorReadings, StateKind,
    WheelCommand,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::context::RobotContext;
use crate::events::{EventSink, FirmwareEvent, NoopSink};
use crate::motion::{SideBias, compute_escape_profile};
use crate::state::{Approach, Deposit, Escape, FirmwareState, Next, Scan, Tick, Verify, Wander};

// ────────────────────────────────────────────────────────────────────────────
// BehaviorEngine
// ────────────────────────────────────────────────────────────────────────────

/// The firmware.  Owns the active state, the classifier and the interlocks;
/// borrows the [`RobotContext`] only for the duration of an update.
pub struct BehaviorEngine<R: Rng = StdRng> {
    config: FirmwareConfig,
    classifier: SignalClassifier,
    clock: TickClock,
    guard: CommandGuard,
    state: FirmwareState,
    rng: R,
    tick: u64,
    target_locked: bool,
    last_classification: Option<ClassificationResult>,
}

impl BehaviorEngine<StdRng> {
    /// Engine seeded from OS entropy.
    ///
    /// # Errors
    ///
    /// [`DocentError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: FirmwareConfig) -> Result<Self, DocentError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Engine with a fixed seed, for replayable runs.
    ///
    /// # Errors
    ///
    /// [`DocentError::InvalidConfig`] if `config` fails validation.
    pub fn seeded(config: FirmwareConfig, seed: u64) -> Result<Self, DocentError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> BehaviorEngine<R> {
    /// Engine drawing from a caller-supplied random source.
    ///
    /// # Errors
    ///
    /// [`DocentError::InvalidConfig`] if `config` fails validation.
    pub fn with_rng(config: FirmwareConfig, mut rng: R) -> Result<Self, DocentError> {
        config.validate()?;
        let state = FirmwareState::Wander(Wander::enter(&config.behavior, &mut rng));
        debug!(verify = config.behavior.verify_enabled, "behavior engine ready");
        Ok(Self {
            classifier: SignalClassifier::from_config(&config),
            clock: TickClock::new(config.behavior.max_dt_s),
            guard: CommandGuard::for_drive(&config.drive),
            state,
            rng,
            tick: 0,
            target_locked: false,
            last_classification: None,
            config,
        })
    }

    /// Append an interlock rule; it runs after the built-in ones.
    pub fn add_command_rule(&mut self, rule: Box<dyn CommandRule>) {
        self.guard.add_rule(rule);
    }

    // ── Observers ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &FirmwareConfig {
        &self.config
    }

    pub fn state(&self) -> &FirmwareState {
        &self.state
    }

    pub fn state_kind(&self) -> StateKind {
        self.state.kind()
    }

    pub fn state_name(&self) -> &'static str {
        self.state.kind().as_str()
    }

    pub fn last_classification(&self) -> Option<ClassificationResult> {
        self.last_classification
    }

    pub fn target_locked(&self) -> bool {
        self.target_locked
    }

    /// Number of completed updates.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    // ── Tick ──────────────────────────────────────────────────────────────

    /// Advance the firmware by `dt` seconds, discarding events.
    pub fn update(&mut self, ctx: &mut RobotContext, dt: f64, readings: &SensorReadings) {
        self.update_with_sink(ctx, dt, readings, &mut NoopSink);
    }

    /// Advance the firmware by `dt` seconds, reporting events to `sink`.
    pub fn update_with_sink<S: EventSink + ?Sized>(
        &mut self,
        ctx: &mut RobotContext,
        dt: f64,
        readings: &SensorReadings,
        sink: &mut S,
    ) {
        self.tick += 1;
        let tick = self.tick;

        let (dt, correction) = self.clock.sanitize(dt);
        if correction != DtCorrection::None {
            sink.record(&FirmwareEvent::DtCorrected {
                tick,
                stalled: correction == DtCorrection::Stalled,
                used_dt: dt,
            });
        }
        let sensor = &self.config.sensor;
        let readings = readings.sanitized(sensor.min_range_mm, sensor.max_range_mm);
        ctx.decay_cooldowns(dt);

        let outcome = {
            let mut t = Tick {
                config: &self.config,
                classifier: &self.classifier,
                rng: &mut self.rng,
                ctx: &mut *ctx,
                readings: &readings,
                dt,
                tick,
                target_locked: self.target_locked,
            };
            self.state.step(&mut t)
        };

        if let Some((result, samples)) = outcome.classification {
            self.last_classification = Some(result);
            sink.record(&FirmwareEvent::Classified {
                tick,
                result,
                samples,
            });
        }
        if outcome.action {
            sink.record(&FirmwareEvent::ActionTriggered {
                tick,
                payload_remaining: ctx.payload_remaining(),
            });
        }

        let command = match self.guard.verify(&outcome.command) {
            Ok(()) => outcome.command,
            Err(DocentError::CommandRejected { rule, details }) => {
                warn!(tick, rule = rule.as_str(), details = details.as_str(), "command rejected");
                sink.record(&FirmwareEvent::Fault {
                    tick,
                    rule,
                    details,
                });
                WheelCommand::STOP
            }
            Err(other) => {
                warn!(tick, error = %other, "command check failed");
                WheelCommand::STOP
            }
        };
        ctx.set_wheel_speeds(command.left, command.right);

        if let Some(next) = outcome.next {
            self.enter(next, &readings, sink);
        }
    }

    /// The only way to change state.  Builds a fresh variant, so every
    /// per-state timer starts from zero, and maintains the target lock.
    fn enter<S: EventSink + ?Sized>(&mut self, next: Next, readings: &SensorReadings, sink: &mut S) {
        let from = self.state.kind();
        let mut reason: Option<EscapeReason> = None;

        self.state = match next {
            Next::Wander => {
                self.target_locked = false;
                FirmwareState::Wander(Wander::enter(&self.config.behavior, &mut self.rng))
            }
            Next::Scan { direction } => FirmwareState::Scan(Scan::enter(direction)),
            Next::Verify => FirmwareState::Verify(Verify::default()),
            Next::Approach { side } => {
                self.target_locked = true;
                FirmwareState::Approach(Approach::enter(side))
            }
            Next::Deposit => {
                FirmwareState::Deposit(Deposit::enter(&self.config.behavior, &mut self.rng))
            }
            Next::Escape(why) => {
                self.target_locked = false;
                reason = Some(why);
                let bias = SideBias::from_readings(
                    readings,
                    self.config.sensor.max_range_mm,
                    self.config.behavior.symmetric_tolerance_mm,
                );
                let profile = compute_escape_profile(why, bias, &self.config.escape, &mut self.rng);
                FirmwareState::Escape(Escape::enter(profile))
            }
        };

        debug!(
            tick = self.tick,
            from = from.as_str(),
            to = next.kind().as_str(),
            locked = self.target_locked,
            "enter"
        );
        sink.record(&FirmwareEvent::Transition {
            tick: self.tick,
            from,
            to: next.kind(),
            reason,
        });
    }
}

impl<R: Rng> std::fmt::Debug for BehaviorEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorEngine")
            .field("state", &self.state.kind())
            .field("tick", &self.tick)
            .field("target_locked", &self.target_locked)
            .field("last_classification", &self.last_classification)
            .finish_non_exhaustive()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
