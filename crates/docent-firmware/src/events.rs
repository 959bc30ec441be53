//! Structured firmware events and the sinks that consume them.
//!
//! The engine never logs through a global.  Each
//! [`update_with_sink`][crate::engine::BehaviorEngine::update_with_sink] call
//! takes an [`EventSink`] by reference; [`NoopSink`] is what plain
//! [`update`][crate::engine::BehaviorEngine::update] uses.
//!
//! | Sink | Behaviour |
//! |---|---|
//! | [`NoopSink`] | Discards everything. |
//! | [`TracingSink`] | Forwards each event as a `tracing` event. |
//! | [`RecordingSink`] | Keeps events in memory; exports JSON lines. |

use std::io::Write;

use docent_types::{ClassificationResult, DocentError, EscapeReason, StateKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ────────────────────────────────────────────────────────────────────────────
// FirmwareEvent
// ────────────────────────────────────────────────────────────────────────────

/// Something observable happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FirmwareEvent {
    Transition {
        tick: u64,
        from: StateKind,
        to: StateKind,
        /// Set when `to` is [`StateKind::Escape`].
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<EscapeReason>,
    },
    Classified {
        tick: u64,
        result: ClassificationResult,
        samples: usize,
    },
    ActionTriggered {
        tick: u64,
        payload_remaining: u32,
    },
    /// The caller's `dt` was invalid (`stalled == false`) or too large.
    DtCorrected {
        tick: u64,
        stalled: bool,
        used_dt: f64,
    },
    /// A command was rejected by the interlock and replaced by STOP.
    Fault {
        tick: u64,
        rule: String,
        details: String,
    },
}

impl FirmwareEvent {
    pub fn tick(&self) -> u64 {
        match self {
            FirmwareEvent::Transition { tick, .. }
            | FirmwareEvent::Classified { tick, .. }
            | FirmwareEvent::ActionTriggered { tick, .. }
            | FirmwareEvent::DtCorrected { tick, .. }
            | FirmwareEvent::Fault { tick, .. } => *tick,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sinks
// ────────────────────────────────────────────────────────────────────────────

/// Receives firmware events.  Implementations must not block.
pub trait EventSink {
    fn record(&mut self, event: &FirmwareEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn record(&mut self, event: &FirmwareEvent) {
        (**self).record(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&mut self, _event: &FirmwareEvent) {}
}

/// Re-emits events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&mut self, event: &FirmwareEvent) {
        match event {
            FirmwareEvent::Transition {
                tick,
                from,
                to,
                reason,
            } => debug!(
                tick,
                from = from.as_str(),
                to = to.as_str(),
                reason = reason.map(EscapeReason::as_str),
                "state transition"
            ),
            FirmwareEvent::Classified {
                tick,
                result,
                samples,
            } => debug!(tick, result = result.label(), samples, "sweep classified"),
            FirmwareEvent::ActionTriggered {
                tick,
                payload_remaining,
            } => info!(tick, payload_remaining, "payload deposited"),
            FirmwareEvent::DtCorrected {
                tick,
                stalled,
                used_dt,
            } => debug!(tick, stalled, used_dt, "dt corrected"),
            FirmwareEvent::Fault {
                tick,
                rule,
                details,
            } => warn!(tick, rule = rule.as_str(), details = details.as_str(), "command rejected"),
        }
    }
}

/// In-memory event log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Vec<FirmwareEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[FirmwareEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Visited states in order, starting with the first transition's origin.
    pub fn state_path(&self) -> Vec<StateKind> {
        let mut path = Vec::new();
        for event in &self.events {
            if let FirmwareEvent::Transition { from, to, .. } = event {
                if path.is_empty() {
                    path.push(*from);
                }
                path.push(*to);
            }
        }
        path
    }

    pub fn actions(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, FirmwareEvent::ActionTriggered { .. }))
            .count()
    }

    /// Write one JSON object per line.
    ///
    /// # Errors
    ///
    /// [`DocentError::Serialization`] if an event fails to encode,
    /// [`DocentError::Config`] on I/O failure.
    pub fn write_json_lines<W: Write>(&self, mut writer: W) -> Result<(), DocentError> {
        for event in &self.events {
            let line = serde_json::to_string(event)
                .map_err(|e| DocentError::Serialization(e.to_string()))?;
            writeln!(writer, "{line}").map_err(|e| DocentError::Config(e.to_string()))?;
        }
        writer.flush().map_err(|e| DocentError::Config(e.to_string()))
    }
}

impl EventSink for RecordingSink {
    fn record(&mut self, event: &FirmwareEvent) {
        self.events.push(event.clone());
    }
}
