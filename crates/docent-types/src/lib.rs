//! `docent-types` – shared data model for the docent exhibition robot.
//!
//! Every other crate in the workspace speaks in these types: raw per-channel
//! distance readings, the samples buffered during a scan sweep, the verdict
//! of the signal classifier, wheel commands, and the escape choreography.
//!
//! The tunable configuration surface lives in [`config`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;

pub use config::{
    BehaviorConfig, ClassifierConfig, DriveConfig, EscapeConfig, EscapeTiming, FirmwareConfig,
    SensorConfig,
};

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A point in the world plane (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Planar robot pose: position in metres, heading in radians measured
/// counter-clockwise from +X.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub const fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor channels and readings
// ────────────────────────────────────────────────────────────────────────────

/// One logical sensor direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Left,
    Front,
    Right,
}

impl Channel {
    /// All channels, in array-index order.
    pub const ALL: [Channel; 3] = [Channel::Left, Channel::Front, Channel::Right];

    /// Position of this channel in per-channel arrays such as
    /// [`SensorConfig::channel_offsets_rad`].
    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Front => 1,
            Channel::Right => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Left => "left",
            Channel::Front => "front",
            Channel::Right => "right",
        }
    }
}

/// A single channel's reading, stamped with its mounting angle and tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub channel: Channel,
    /// `None` means dropout / no echo.  When present the value lies in
    /// `[min_range_mm, max_range_mm]`.
    pub distance_mm: Option<f64>,
    /// Mounting angle relative to the robot heading (radians, CCW positive).
    pub angle_offset: f64,
    pub timestamp_tick: u64,
}

impl SensorReading {
    /// Distance with dropouts read as `max_range_mm`.
    pub fn effective_mm(&self, max_range_mm: f64) -> f64 {
        self.distance_mm.unwrap_or(max_range_mm)
    }
}

/// Fixed-size snapshot of every channel for one tick.
///
/// This is the input the behaviour engine consumes each `update()`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReadings {
    pub left: Option<f64>,
    pub front: Option<f64>,
    pub right: Option<f64>,
}

impl SensorReadings {
    pub const fn new(left: Option<f64>, front: Option<f64>, right: Option<f64>) -> Self {
        Self { left, front, right }
    }

    /// Convenience constructor for fully-populated readings in millimetres.
    pub const fn mm(left: f64, front: f64, right: f64) -> Self {
        Self::new(Some(left), Some(front), Some(right))
    }

    /// Every channel dropped out.
    pub const fn dropout() -> Self {
        Self::new(None, None, None)
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Left => self.left,
            Channel::Front => self.front,
            Channel::Right => self.right,
        }
    }

    pub fn set(&mut self, channel: Channel, distance_mm: Option<f64>) {
        match channel {
            Channel::Left => self.left = distance_mm,
            Channel::Front => self.front = distance_mm,
            Channel::Right => self.right = distance_mm,
        }
    }

    /// Distance of `channel` with a dropout read as `max_range_mm`.
    pub fn effective(&self, channel: Channel, max_range_mm: f64) -> f64 {
        self.get(channel).unwrap_or(max_range_mm)
    }

    /// Closest channel and its effective distance.
    ///
    /// Ties keep the front channel, then left, then right.
    pub fn nearest(&self, max_range_mm: f64) -> (Channel, f64) {
        let mut best = (Channel::Front, self.effective(Channel::Front, max_range_mm));
        for channel in [Channel::Left, Channel::Right] {
            let d = self.effective(channel, max_range_mm);
            if d < best.1 {
                best = (channel, d);
            }
        }
        best
    }

    /// Largest effective distance across channels.
    pub fn farthest(&self, max_range_mm: f64) -> f64 {
        Channel::ALL
            .iter()
            .map(|c| self.effective(*c, max_range_mm))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Replace non-finite values with dropouts and clamp the rest into
    /// `[min_range_mm, max_range_mm]`.
    pub fn sanitized(&self, min_range_mm: f64, max_range_mm: f64) -> Self {
        let clean = |v: Option<f64>| match v {
            Some(d) if d.is_finite() => Some(d.clamp(min_range_mm, max_range_mm)),
            _ => None,
        };
        Self::new(clean(self.left), clean(self.front), clean(self.right))
    }

    /// Expand into per-channel [`SensorReading`]s using the mounting angles
    /// in `offsets_rad` (indexed by [`Channel::index`]).
    pub fn to_readings(&self, offsets_rad: &[f64; 3], tick: u64) -> Vec<SensorReading> {
        Channel::ALL
            .iter()
            .map(|&channel| SensorReading {
                channel,
                distance_mm: self.get(channel),
                angle_offset: offsets_rad[channel.index()],
                timestamp_tick: tick,
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scan sweep data
// ────────────────────────────────────────────────────────────────────────────

/// One sample buffered during an active sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSample {
    /// Signed rotation since the sweep started (radians, CCW positive).
    pub theta: f64,
    pub readings: Vec<SensorReading>,
}

/// Samples collected over one sweep, consumed by the classifier.
pub type ScanBuffer = Vec<ScanSample>;

/// Verdict of the signal classifier for one completed sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationResult {
    /// Extended, near-constant surface.
    Wall,
    /// Narrow object ("legs").  `bearing` is relative to the heading at the
    /// start of the sweep.
    LocalObject { bearing: f64, distance_mm: f64 },
    /// Nothing within hit range.
    None,
    /// Ambiguous or starved buffer.
    Unknown,
}

impl ClassificationResult {
    pub fn label(&self) -> &'static str {
        match self {
            ClassificationResult::Wall => "wall",
            ClassificationResult::LocalObject { .. } => "local_object",
            ClassificationResult::None => "none",
            ClassificationResult::Unknown => "unknown",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Actuation
// ────────────────────────────────────────────────────────────────────────────

/// Differential-drive wheel speeds (m/s).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelCommand {
    pub left: f64,
    pub right: f64,
}

impl WheelCommand {
    pub const STOP: WheelCommand = WheelCommand {
        left: 0.0,
        right: 0.0,
    };

    pub const fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Both wheels at `speed`.
    pub const fn straight(speed: f64) -> Self {
        Self::new(speed, speed)
    }

    /// Turn in place.  Positive `direction` rotates counter-clockwise.
    pub fn rotate(speed: f64, direction: f64) -> Self {
        let s = speed * direction.signum();
        Self::new(-s, s)
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }
}

/// Why the robot is disengaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeReason {
    /// Wall contact or wall classification.
    Wall,
    /// Leaving after a payload deposit.
    Deposit,
    /// Any other abort (lost budget, blocked deposit, …).
    Abort,
}

impl EscapeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EscapeReason::Wall => "wall",
            EscapeReason::Deposit => "deposit",
            EscapeReason::Abort => "abort",
        }
    }
}

/// Rotation sense of an in-place turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    /// Counter-clockwise.
    Left,
    /// Clockwise.
    Right,
}

impl TurnDirection {
    /// `+1.0` for CCW, `-1.0` for CW.
    pub fn sign(self) -> f64 {
        match self {
            TurnDirection::Left => 1.0,
            TurnDirection::Right => -1.0,
        }
    }
}

/// Reverse-then-turn choreography, fixed when an escape starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscapeProfile {
    pub reason: EscapeReason,
    pub back_s: f64,
    pub turn_s: f64,
    pub direction: TurnDirection,
}

impl EscapeProfile {
    pub fn total_s(&self) -> f64 {
        self.back_s + self.turn_s
    }
}

/// Data-free tag of the active firmware state, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Wander,
    Scan,
    Verify,
    Approach,
    Deposit,
    Escape,
}

impl StateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StateKind::Wander => "wander",
            StateKind::Scan => "scan",
            StateKind::Verify => "verify",
            StateKind::Approach => "approach",
            StateKind::Deposit => "deposit",
            StateKind::Escape => "escape",
        }
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type.  Only configuration and I/O boundaries return
/// it; the per-tick firmware path never does.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum DocentError {
    #[error("Invalid configuration `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Command rejected by {rule}: {details}")]
    CommandRejected { rule: String, details: String },
}
