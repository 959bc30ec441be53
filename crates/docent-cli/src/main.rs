//! `docent-cli` – bench shell for the exhibition-robot firmware.
//!
//! This binary runs the firmware headless against a simulated room.  It:
//!
//! 1. Initialises logging (and OTLP export when configured).
//! 2. Loads `~/.docent/config.toml` (or `$DOCENT_CONFIG`), falling back to
//!    defaults and writing them out on first run.
//! 3. Drops the user into an **interactive REPL** with slash-commands
//!    (`/run`, `/status`, `/trace`, `/reset`, `/config`, `/help`).
//! 4. Intercepts **Ctrl-C**: a running bench stops at the next tick; at the
//!    prompt the CLI exits.

mod bench;
mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::warn;

use bench::Bench;
use config::BenchConfig;
use repl::Signals;

fn main() {
    // Console output stays on println!; tracing carries firmware events.
    let _telemetry = docent_firmware::init_tracing("docent");

    print_banner();

    let signals = Arc::new(Signals::default());
    let handler_signals = signals.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_signals.running.load(Ordering::SeqCst) {
            handler_signals.interrupt.store(true, Ordering::SeqCst);
        } else {
            println!();
            println!("{}", "  ✓ Exiting docent.".green());
            std::process::exit(0);
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; runs cannot be interrupted");
    }

    let cfg = load_or_create_config();
    let bench = match Bench::new(cfg) {
        Ok(b) => b,
        Err(e) => {
            println!("{}: {}", "Invalid config".red(), e);
            println!("  Using default configuration.");
            match Bench::new(BenchConfig::default()) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("{}: {}", "Default bench failed".red(), e);
                    std::process::exit(1);
                }
            }
        }
    };

    let status = bench.status();
    println!(
        "  Room {}×{} m, {} leg(s), seed {}, {} Hz",
        bench.config().world.room_width_m,
        bench.config().world.room_height_m,
        bench.config().world.legs.len(),
        bench.config().seed.to_string().bold(),
        bench.config().tick_hz
    );
    println!(
        "  Firmware in {} with {} payload(s).",
        status.state.as_str().cyan(),
        status.payload_remaining
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(bench, signals);
}

fn load_or_create_config() -> BenchConfig {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = BenchConfig::default();
            config::apply_env_overrides(&mut cfg);
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            BenchConfig::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"       __                      __ "#.bold().cyan());
    println!("{}", r#"  ____/ /___  ________  ____  / /_"#.bold().cyan());
    println!("{}", r#" / __  / __ \/ ___/ _ \/ __ \/ __/"#.bold().cyan());
    println!("{}", r#"/ /_/ / /_/ / /__/  __/ / / / /_  "#.bold().cyan());
    println!("{}", r#"\__,_/\____/\___/\___/_/ /_/\__/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "docent".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Exhibition robot firmware bench");
    println!();
}
