//! `docent-firmware` – the exhibition robot's behaviour firmware.
//!
//! A deterministic, tick-driven state machine that consumes noisy distance
//! readings and produces wheel commands: wander, scan and classify, verify,
//! approach, deposit, escape.
//!
//! # Modules
//!
//! - [`engine`] – [`BehaviorEngine`][engine::BehaviorEngine]: owns the
//!   active state, runs the kernel interlocks and is the single `enter`
//!   point for transitions.
//! - [`state`] – [`FirmwareState`][state::FirmwareState]: one variant per
//!   behaviour, each carrying its own timers.
//! - [`motion`] – steering, sweep-angle integration and escape profiles.
//! - [`context`] – [`RobotContext`][context::RobotContext]: heading, wheel
//!   outputs, payload and cross-state cooldowns.
//! - [`events`] – [`FirmwareEvent`][events::FirmwareEvent] and the
//!   [`EventSink`][events::EventSink] implementations.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod context;
pub mod engine;
pub mod events;
pub mod motion;
pub mod state;
pub mod telemetry;

pub use context::RobotContext;
pub use engine::BehaviorEngine;
pub use events::{EventSink, FirmwareEvent, NoopSink, RecordingSink, TracingSink};
pub use motion::{SideBias, SteeringParams, compute_escape_profile, integrate_sweep_angle, steer_toward};
pub use state::FirmwareState;
pub use telemetry::{TracerProviderGuard, init_tracing};
