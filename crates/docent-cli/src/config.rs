//! Bench configuration – reads/writes `~/.docent/config.toml`.

use docent_types::{DocentError, FirmwareConfig, Pose};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A person's leg placed in the bench room.  Velocity is optional so a
/// config can describe a passer-by as well as a stationary visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegSpec {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_leg_radius")]
    pub radius: f64,
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
}

/// Rectangular room with legs standing in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldLayout {
    #[serde(default = "default_room_width")]
    pub room_width_m: f64,
    #[serde(default = "default_room_height")]
    pub room_height_m: f64,
    #[serde(default = "default_start")]
    pub start: Pose,
    #[serde(default = "default_legs")]
    pub legs: Vec<LegSpec>,
}

impl Default for WorldLayout {
    fn default() -> Self {
        Self {
            room_width_m: default_room_width(),
            room_height_m: default_room_height(),
            start: default_start(),
            legs: default_legs(),
        }
    }
}

/// Persisted bench configuration stored in `~/.docent/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Seeds both the firmware and the sensor-noise generators.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Simulation rate; each tick advances `1 / tick_hz` seconds.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f64,

    /// Ticks executed by a bare `/run`.
    #[serde(default = "default_ticks_per_run")]
    pub ticks_per_run: u64,

    #[serde(default)]
    pub world: WorldLayout,

    #[serde(default)]
    pub firmware: FirmwareConfig,
}

fn default_seed() -> u64 {
    7
}
fn default_tick_hz() -> f64 {
    20.0
}
fn default_ticks_per_run() -> u64 {
    600
}
fn default_room_width() -> f64 {
    6.0
}
fn default_room_height() -> f64 {
    4.0
}
fn default_start() -> Pose {
    Pose::new(1.0, 1.0, 0.3)
}
fn default_leg_radius() -> f64 {
    0.06
}
fn default_legs() -> Vec<LegSpec> {
    vec![
        LegSpec { x: 4.2, y: 2.2, radius: 0.06, vx: 0.0, vy: 0.0 },
        LegSpec { x: 4.4, y: 2.2, radius: 0.06, vx: 0.0, vy: 0.0 },
        LegSpec { x: 2.0, y: 3.0, radius: 0.05, vx: 0.04, vy: -0.02 },
    ]
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            tick_hz: default_tick_hz(),
            ticks_per_run: default_ticks_per_run(),
            world: WorldLayout::default(),
            firmware: FirmwareConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Seconds per bench tick.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_hz
    }

    /// # Errors
    ///
    /// [`DocentError::InvalidConfig`] for a non-positive tick rate, a
    /// degenerate room, or anything [`FirmwareConfig::validate`] rejects.
    pub fn validate(&self) -> Result<(), DocentError> {
        let invalid = |field: &str, reason: &str| DocentError::InvalidConfig {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        if !(self.tick_hz.is_finite() && self.tick_hz > 0.0) {
            return Err(invalid("tick_hz", "must be finite and > 0"));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.world.room_width_m) || !positive(self.world.room_height_m) {
            return Err(invalid("world", "room dimensions must be > 0"));
        }
        if self.world.legs.iter().any(|l| !positive(l.radius)) {
            return Err(invalid("world.legs.radius", "must be > 0"));
        }
        self.firmware.validate()
    }
}

/// Return the config path: `DOCENT_CONFIG` if set, else
/// `~/.docent/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("DOCENT_CONFIG") {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".docent").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<BenchConfig>, DocentError> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<BenchConfig>, DocentError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        DocentError::Config(format!("Failed to read config at {}: {}", path.display(), e))
    })?;
    let mut cfg: BenchConfig = toml::from_str(&raw)
        .map_err(|e| DocentError::Config(format!("Failed to parse config: {}", e)))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `DOCENT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DOCENT_SEED` | `seed` |
/// | `DOCENT_TICK_HZ` | `tick_hz` |
///
/// Unparseable values are ignored.  `DOCENT_CONFIG` is consumed by
/// [`config_path`] instead.
pub fn apply_env_overrides(cfg: &mut BenchConfig) {
    if let Ok(v) = std::env::var("DOCENT_SEED")
        && let Ok(seed) = v.parse::<u64>() {
            cfg.seed = seed;
        }
    if let Ok(v) = std::env::var("DOCENT_TICK_HZ")
        && let Ok(hz) = v.parse::<f64>()
        && hz.is_finite()
        && hz > 0.0 {
            cfg.tick_hz = hz;
        }
}

/// Save the config to disk, creating the parent directory if necessary.
pub fn save(cfg: &BenchConfig) -> Result<(), DocentError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &BenchConfig, path: &Path) -> Result<(), DocentError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            DocentError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| DocentError::Serialization(format!("Failed to serialize config: {}", e)))?;
    // Owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| {
                DocentError::Config(format!("Failed to write config at {}: {}", path.display(), e))
            })?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| {
        DocentError::Config(format!("Failed to write config at {}: {}", path.display(), e))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = BenchConfig::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.world, cfg.world);
        assert_eq!(loaded.firmware, cfg.firmware);
        assert_eq!(loaded.ticks_per_run, 600);
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&BenchConfig::default(), &path).expect("save");

        let mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "config file must have 0o600 permissions");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bench.toml");
        std::fs::write(
            &path,
            "ticks_per_run = 50\n\n[firmware.behavior]\nverify_enabled = true\n",
        )
        .expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.ticks_per_run, 50);
        assert!(loaded.firmware.behavior.verify_enabled);
        assert_eq!(loaded.firmware.behavior.detect_mm, 1400.0);
        assert_eq!(loaded.world.legs.len(), 3);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "tick_hz = \"fast\"").expect("write");
        assert!(matches!(load_from(&path), Err(DocentError::Config(_))));
    }

    #[test]
    fn config_path_points_to_docent_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".docent"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn validate_rejects_zero_tick_rate() {
        let cfg = BenchConfig { tick_hz: 0.0, ..BenchConfig::default() };
        assert!(matches!(
            cfg.validate(),
            Err(DocentError::InvalidConfig { ref field, .. }) if field == "tick_hz"
        ));
        assert!(BenchConfig::default().validate().is_ok());
    }

    #[test]
    fn apply_env_overrides_seed_and_tick_rate() {
        // One test owns both variables so parallel tests never race on them.
        // SAFETY: no other test in this crate reads or writes these env-vars.
        unsafe {
            std::env::set_var("DOCENT_SEED", "1234");
            std::env::set_var("DOCENT_TICK_HZ", "50");
        }
        let mut cfg = BenchConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.seed, 1234);
        assert_eq!(cfg.tick_hz, 50.0);

        // SAFETY: as above.
        unsafe {
            std::env::set_var("DOCENT_SEED", "not-a-seed");
            std::env::set_var("DOCENT_TICK_HZ", "-3");
        }
        let mut cfg = BenchConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.tick_hz, 20.0);

        // SAFETY: as above.
        unsafe {
            std::env::remove_var("DOCENT_SEED");
            std::env::remove_var("DOCENT_TICK_HZ");
        }
    }
}
