//! REPL – Read-Eval-Print Loop for the docent bench.
//!
//! Supported slash-commands:
//!   /run [ticks]      – advance the bench (default: `ticks_per_run`)
//!   /status           – firmware state, pose, inventory
//!   /trace <path>     – write recorded events as JSON lines
//!   /reset            – rebuild the bench from the current config
//!   /config [save|reload] – show, persist or re-read `~/.docent/config.toml`
//!   /schema           – print the firmware config JSON schema
//!   /help             – show this list
//!   /quit | /exit     – exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use docent_types::FirmwareConfig;

use crate::bench::Bench;
use crate::config::{self, BenchConfig};

/// Flags shared with the Ctrl-C handler.
#[derive(Debug, Default)]
pub struct Signals {
    /// Set while `/run` is executing.
    pub running: AtomicBool,
    /// Raised by Ctrl-C; polled by the bench every tick.
    pub interrupt: AtomicBool,
}

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Option<u64>),
    Status,
    Trace(PathBuf),
    Reset,
    ShowConfig,
    SaveConfig,
    ReloadConfig,
    Schema,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Parse one line of user input.
pub fn parse(line: &str) -> Command {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Command::Empty;
    };
    let arg = words.next();
    let extra = words.next().is_some();
    if extra {
        return Command::Invalid(format!("too many arguments for {head}"));
    }

    match (head, arg) {
        ("/run", None) => Command::Run(None),
        ("/run", Some(n)) => match n.parse::<u64>() {
            Ok(n) => Command::Run(Some(n)),
            Err(_) => Command::Invalid(format!("'{n}' is not a tick count")),
        },
        ("/status", None) => Command::Status,
        ("/trace", Some(p)) => Command::Trace(PathBuf::from(p)),
        ("/trace", None) => Command::Invalid("usage: /trace <path>".into()),
        ("/reset", None) => Command::Reset,
        ("/config", None) => Command::ShowConfig,
        ("/config", Some("save")) => Command::SaveConfig,
        ("/config", Some("reload")) => Command::ReloadConfig,
        ("/schema", None) => Command::Schema,
        ("/help", None) => Command::Help,
        ("/quit" | "/exit", None) => Command::Quit,
        (other, _) => Command::Invalid(format!("unknown command '{other}'")),
    }
}

/// Entry point for the interactive REPL.  Returns on `/quit` or EOF.
pub fn run(mut bench: Bench, signals: Arc<Signals>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", "docent>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        match parse(&line) {
            Command::Empty => {}
            Command::Run(ticks) => cmd_run(&mut bench, ticks, &signals),
            Command::Status => cmd_status(&bench),
            Command::Trace(path) => cmd_trace(&bench, &path),
            Command::Reset => match bench.reset() {
                Ok(()) => println!("{}", "✓ Bench reset.".green()),
                Err(e) => println!("{}: {}", "Reset failed".red(), e),
            },
            Command::ShowConfig => cmd_show_config(bench.config()),
            Command::SaveConfig => match config::save(bench.config()) {
                Ok(()) => println!(
                    "{} {}",
                    "✓ Config saved to".green(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            },
            Command::ReloadConfig => cmd_reload(&mut bench),
            Command::Schema => cmd_schema(),
            Command::Help => cmd_help(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Command::Invalid(msg) => {
                println!(
                    "{} {}. Type {} for available commands.",
                    "Error:".red(),
                    msg.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Docent Bench Commands".bold().underline());
    println!("  {}     – advance the simulation", "/run [ticks]".bold().cyan());
    println!("  {}           – firmware state, pose, payload", "/status".bold().cyan());
    println!("  {}     – export events as JSON lines", "/trace <path>".bold().cyan());
    println!("  {}            – rebuild the bench", "/reset".bold().cyan());
    println!("  {} – show, save or reload the config", "/config [save|reload]".bold().cyan());
    println!("  {}           – firmware config JSON schema", "/schema".bold().cyan());
    println!("  {}     – exit the CLI", "/quit  /exit".bold().cyan());
    println!("  Press {} during a run to interrupt it.", "Ctrl-C".bold());
    println!();
}

fn cmd_run(bench: &mut Bench, ticks: Option<u64>, signals: &Signals) {
    let ticks = ticks.unwrap_or(bench.config().ticks_per_run);
    signals.interrupt.store(false, Ordering::SeqCst);
    signals.running.store(true, Ordering::SeqCst);
    let summary = bench.run(ticks, &signals.interrupt);
    signals.running.store(false, Ordering::SeqCst);

    let headline = if summary.interrupted {
        "⚠  Run interrupted".yellow().bold()
    } else {
        "✓ Run complete".green().bold()
    };
    println!(
        "{} after {} tick(s) – now in {}",
        headline,
        summary.ticks.to_string().bold(),
        summary.final_state.as_str().cyan()
    );
    println!(
        "  transitions: {}  deposits: {}  faults: {}",
        summary.transitions,
        summary.actions,
        if summary.faults == 0 {
            "0".green()
        } else {
            summary.faults.to_string().red()
        }
    );
}

fn cmd_status(bench: &Bench) {
    let s = bench.status();
    println!("{}", "Bench Status".bold().underline());
    println!("  tick        : {} ({:.2} s)", s.ticks, s.sim_time_s);
    println!("  state       : {}", s.state.as_str().cyan());
    println!(
        "  pose        : x={:.2} y={:.2} θ={:.2}",
        s.pose.x, s.pose.y, s.pose.heading
    );
    println!(
        "  target lock : {}",
        if s.target_locked { "locked".green() } else { "none".dimmed() }
    );
    println!("  payload     : {} left, {} deposited", s.payload_remaining, s.actions_triggered);
    println!("  events      : {}", s.events);
    if s.corrected_ticks > 0 {
        println!("  dt fixes    : {}", s.corrected_ticks.to_string().yellow());
    }
    let path: Vec<&str> = bench.state_path().iter().map(|k| k.as_str()).collect();
    if !path.is_empty() {
        let tail = path.len().saturating_sub(12);
        println!("  recent path : {}", path[tail..].join(" → ").dimmed());
    }
}

fn cmd_trace(bench: &Bench, path: &std::path::Path) {
    match bench.write_trace(path) {
        Ok(n) => println!(
            "{} {} event(s) to {}",
            "✓ Wrote".green(),
            n,
            path.display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error writing trace".red(), e),
    }
}

fn cmd_show_config(cfg: &BenchConfig) {
    println!(
        "{} ({})",
        "Bench Config".bold().underline(),
        config::config_path().display().to_string().dimmed()
    );
    match toml::to_string_pretty(cfg) {
        Ok(raw) => println!("{raw}"),
        Err(e) => println!("{}: {}", "Error rendering config".red(), e),
    }
}

fn cmd_reload(bench: &mut Bench) {
    let cfg = match config::load() {
        Ok(Some(c)) => c,
        Ok(None) => {
            println!("{}", "No config file found – keeping current config.".yellow());
            return;
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return;
        }
    };
    match Bench::new(cfg) {
        Ok(fresh) => {
            *bench = fresh;
            println!("{}", "✓ Config reloaded; bench reset.".green());
        }
        Err(e) => println!("{}: {}", "Invalid config".red(), e),
    }
}

fn cmd_schema() {
    let schema = schemars::schema_for!(FirmwareConfig);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("{}: {}", "Error rendering schema".red(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_and_without_count() {
        assert_eq!(parse("/run"), Command::Run(None));
        assert_eq!(parse("  /run 250 \n"), Command::Run(Some(250)));
        assert!(matches!(parse("/run lots"), Command::Invalid(_)));
    }

    #[test]
    fn trace_requires_a_path() {
        assert_eq!(parse("/trace out.jsonl"), Command::Trace(PathBuf::from("out.jsonl")));
        assert!(matches!(parse("/trace"), Command::Invalid(_)));
    }

    #[test]
    fn config_subcommands() {
        assert_eq!(parse("/config"), Command::ShowConfig);
        assert_eq!(parse("/config save"), Command::SaveConfig);
        assert_eq!(parse("/config reload"), Command::ReloadConfig);
        assert!(matches!(parse("/config wipe"), Command::Invalid(_)));
    }

    #[test]
    fn quit_aliases_and_blank_lines() {
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/exit"), Command::Quit);
        assert_eq!(parse("   \n"), Command::Empty);
        assert!(matches!(parse("/status now please"), Command::Invalid(_)));
        assert!(matches!(parse("hello"), Command::Invalid(_)));
    }
}
