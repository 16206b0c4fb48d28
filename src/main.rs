use anyhow::{Context, Result};
use clap::Parser;
use obs_sim_lib::{config, Simulator, SimulatorHandle};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Line-oriented obs-websocket simulator.
///
/// Reads one JSON request per line on stdin and writes responses and events
/// as JSON lines on stdout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Password to connect with when the config sets one
    #[arg(short = 'p', long = "password", value_name = "PASSWORD")]
    password: Option<String>,

    /// Drive time manually: `{"advance": MS}` lines move the clock instead
    /// of the wall clock doing it
    #[arg(long = "manual-clock")]
    manual_clock: bool,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbosity: u8,
}

/// Either a live, self-advancing simulator or one stepped by input lines.
enum Driver {
    Live(SimulatorHandle),
    Manual(Simulator),
}

impl Driver {
    fn handle_line(&mut self, raw: Value) -> Option<Value> {
        match self {
            Driver::Live(handle) => Some(handle.send(raw)),
            Driver::Manual(sim) => match raw.get("advance").and_then(Value::as_u64) {
                Some(ms) => {
                    sim.advance(ms);
                    None
                }
                None => Some(sim.send(raw)),
            },
        }
    }
}

fn print_line(value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if writeln!(out, "{}", value).and_then(|_| out.flush()).is_err() {
        log::warn!("stdout closed");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
    log::debug!("Command-line args: {:?}", args);

    let config = config::load_config(args.config.as_deref())?;
    let mut sim = Simulator::new(config).context("Failed to build simulator")?;
    sim.on_any(|n| print_line(&n.to_json()));
    sim.connect(args.password.as_deref()).context("Failed to connect")?;

    let mut driver = if args.manual_clock {
        Driver::Manual(sim)
    } else {
        Driver::Live(SimulatorHandle::spawn(sim))
    };
    log::info!("obs-sim ready, reading requests from stdin");

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Value>(&line) {
            Ok(raw) => driver.handle_line(raw),
            Err(e) => Some(json!({"status": "error", "error": format!("invalid JSON: {}", e)})),
        };
        if let Some(response) = response {
            print_line(&response);
        }
    }

    match &mut driver {
        Driver::Live(handle) => handle.disconnect(),
        Driver::Manual(sim) => sim.disconnect(),
    }
    Ok(())
}
