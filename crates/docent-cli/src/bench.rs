//! Headless bench: the firmware driving a simulated robot around a room.
//!
//! Each tick the [`SensorArray`] reads the [`SimWorld`] from the drive
//! base's pose, the [`BehaviorEngine`] updates the [`RobotContext`], and the
//! [`SimDriveBase`] integrates the resulting wheel command.

use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use docent_firmware::{BehaviorEngine, EventSink, FirmwareEvent, RecordingSink, RobotContext, TracingSink};
use docent_hal::{DriveBase, SensorArray, SimDriveBase, SimWorld};
use docent_types::{DocentError, Point2, Pose, StateKind};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::config::BenchConfig;

/// Tees every event into the in-memory trace and the `tracing` log.
#[derive(Debug, Default)]
struct BenchSink {
    recording: RecordingSink,
}

impl EventSink for BenchSink {
    fn record(&mut self, event: &FirmwareEvent) {
        TracingSink.record(event);
        self.recording.record(event);
    }
}

/// Result of one [`Bench::run`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub interrupted: bool,
    pub transitions: usize,
    pub actions: usize,
    pub faults: usize,
    pub final_state: StateKind,
}

/// Snapshot shown by `/status`.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchStatus {
    pub ticks: u64,
    pub sim_time_s: f64,
    pub state: StateKind,
    pub pose: Pose,
    pub target_locked: bool,
    pub payload_remaining: u32,
    pub actions_triggered: u32,
    pub events: usize,
    pub corrected_ticks: u64,
}

pub struct Bench {
    config: BenchConfig,
    world: SimWorld,
    sensors: SensorArray,
    base: SimDriveBase,
    engine: BehaviorEngine,
    ctx: RobotContext,
    noise: StdRng,
    sink: BenchSink,
}

impl Bench {
    /// Build a fresh bench from `config`.
    ///
    /// The firmware is seeded with `config.seed` and the sensor noise with
    /// the next seed, so runs replay exactly.
    ///
    /// # Errors
    ///
    /// [`DocentError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: BenchConfig) -> Result<Self, DocentError> {
        config.validate()?;
        let fw = &config.firmware;

        let mut builder = SimWorld::builder()
            .with_room(config.world.room_width_m, config.world.room_height_m)
            .with_max_range(fw.sensor.max_range_mm / 1000.0);
        for leg in &config.world.legs {
            builder = builder.with_moving_leg(Point2::new(leg.x, leg.y), leg.radius, (leg.vx, leg.vy));
        }
        let world = builder.build();

        let sensors = SensorArray::new(&fw.sensor)?;
        let base = SimDriveBase::new(
            config.world.start,
            fw.drive.wheel_base_m,
            fw.drive.max_wheel_speed,
        );
        let mut ctx = RobotContext::from_config(&fw.behavior);
        ctx.set_heading(config.world.start.heading);
        let engine = BehaviorEngine::seeded(fw.clone(), config.seed)?;
        let noise = StdRng::seed_from_u64(config.seed.wrapping_add(1));

        info!(
            seed = config.seed,
            tick_hz = config.tick_hz,
            legs = config.world.legs.len(),
            "bench ready"
        );

        Ok(Self {
            config,
            world,
            sensors,
            base,
            engine,
            ctx,
            noise,
            sink: BenchSink::default(),
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Discard all progress and rebuild from the current config.
    pub fn reset(&mut self) -> Result<(), DocentError> {
        *self = Bench::new(self.config.clone())?;
        Ok(())
    }

    /// Advance one tick.
    pub fn step(&mut self) {
        let dt = self.config.dt();
        let pose = self.base.pose();
        self.ctx.set_heading(pose.heading);
        let readings = self.sensors.read_all(&self.world, &pose, dt, &mut self.noise);
        self.engine
            .update_with_sink(&mut self.ctx, dt, &readings, &mut self.sink);
        self.base.apply(self.ctx.wheel_command(), dt);
        self.world.advance(dt);
    }

    /// Run up to `ticks` ticks, stopping early once `interrupt` is raised.
    /// The flag is cleared on return.
    pub fn run(&mut self, ticks: u64, interrupt: &AtomicBool) -> RunSummary {
        let before = self.sink.recording.len();
        let mut done = 0;
        let mut interrupted = false;
        while done < ticks {
            if interrupt.swap(false, Ordering::SeqCst) {
                interrupted = true;
                break;
            }
            self.step();
            done += 1;
        }

        let fresh = &self.sink.recording.events()[before..];
        let count = |pred: fn(&FirmwareEvent) -> bool| fresh.iter().filter(|e| pred(e)).count();
        let summary = RunSummary {
            ticks: done,
            interrupted,
            transitions: count(|e| matches!(e, FirmwareEvent::Transition { .. })),
            actions: count(|e| matches!(e, FirmwareEvent::ActionTriggered { .. })),
            faults: count(|e| matches!(e, FirmwareEvent::Fault { .. })),
            final_state: self.engine.state_kind(),
        };
        info!(
            ticks = summary.ticks,
            interrupted,
            transitions = summary.transitions,
            actions = summary.actions,
            "run finished"
        );
        summary
    }

    pub fn status(&self) -> BenchStatus {
        BenchStatus {
            ticks: self.engine.tick(),
            sim_time_s: self.engine.clock().elapsed_s(),
            state: self.engine.state_kind(),
            pose: self.base.pose(),
            target_locked: self.engine.target_locked(),
            payload_remaining: self.ctx.payload_remaining(),
            actions_triggered: self.ctx.actions_triggered(),
            events: self.sink.recording.len(),
            corrected_ticks: self.engine.clock().corrected_ticks(),
        }
    }

    /// States visited since the last reset.
    pub fn state_path(&self) -> Vec<StateKind> {
        self.sink.recording.state_path()
    }

    /// Write every recorded event to `path` as JSON lines.
    ///
    /// # Errors
    ///
    /// [`DocentError::Config`] if the file cannot be created or written.
    pub fn write_trace(&self, path: &Path) -> Result<usize, DocentError> {
        let file = std::fs::File::create(path).map_err(|e| {
            DocentError::Config(format!("Failed to create trace at {}: {}", path.display(), e))
        })?;
        self.sink.recording.write_json_lines(BufWriter::new(file))?;
        Ok(self.sink.recording.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench() -> Bench {
        Bench::new(BenchConfig::default()).expect("default bench is valid")
    }

    #[test]
    fn run_is_deterministic_for_a_seed() {
        let never = AtomicBool::new(false);
        let mut a = bench();
        let mut b = bench();
        let sa = a.run(400, &never);
        let sb = b.run(400, &never);
        assert_eq!(sa, sb);
        assert_eq!(a.status(), b.status());
        assert_eq!(a.state_path(), b.state_path());
    }

    #[test]
    fn long_run_explores_and_stays_safe() {
        let never = AtomicBool::new(false);
        let mut bench = bench();
        let summary = bench.run(3000, &never);
        assert_eq!(summary.ticks, 3000);
        assert!(!summary.interrupted);
        assert_eq!(summary.faults, 0);
        assert!(summary.transitions > 0);
        assert!(bench.state_path().contains(&StateKind::Scan));

        let status = bench.status();
        assert_eq!(status.ticks, 3000);
        assert!((status.sim_time_s - 150.0).abs() < 1e-6);
        assert_eq!(status.corrected_ticks, 0);
        assert_eq!(
            status.payload_remaining + status.actions_triggered,
            BenchConfig::default().firmware.behavior.payload_capacity
        );
    }

    #[test]
    fn raised_interrupt_stops_before_the_first_tick_and_is_cleared() {
        let mut bench = bench();
        let flag = AtomicBool::new(true);
        let summary = bench.run(100, &flag);
        assert!(summary.interrupted);
        assert_eq!(summary.ticks, 0);
        assert!(!flag.load(Ordering::SeqCst));

        let summary = bench.run(10, &flag);
        assert_eq!(summary.ticks, 10);
    }

    #[test]
    fn reset_returns_to_tick_zero() {
        let never = AtomicBool::new(false);
        let mut bench = bench();
        bench.run(50, &never);
        bench.reset().expect("reset");
        let status = bench.status();
        assert_eq!(status.ticks, 0);
        assert_eq!(status.events, 0);
        assert_eq!(status.state, StateKind::Wander);
        assert_eq!(status.pose, BenchConfig::default().world.start);
    }

    #[test]
    fn trace_file_has_one_line_per_event() {
        let never = AtomicBool::new(false);
        let mut bench = bench();
        bench.run(600, &never);

        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("trace.jsonl");
        let written = bench.write_trace(&path).expect("write trace");
        let text = std::fs::read_to_string(&path).expect("read trace");
        assert_eq!(text.lines().count(), written);
        assert_eq!(written, bench.status().events);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = BenchConfig::default();
        cfg.world.room_width_m = 0.0;
        assert!(matches!(Bench::new(cfg), Err(DocentError::InvalidConfig { .. })));
    }
}
