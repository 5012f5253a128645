//! triggerd - Input trigger recognition engine
//!
//! Command line front end:
//! - **replay**: feed a JSON event script through the engine in real time
//!   and print every block decision, trigger step and emitted input as
//!   JSON lines
//! - **probe**: open an evdev node and print what the decoder detects

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use triggerd::config::Settings;
use triggerd::error::{log_error, TriggerResult};
use triggerd::replay::{Replay, Script};
use triggerd::timer::SystemClock;

static COMMANDS: &[&str] = &[
    "replay SCRIPT [--settings FILE] : Replay a JSON event script.",
    "probe DEVICE : Print the properties detected for an evdev node.",
];

/// How long timers keep running after the last event of a script
const SETTLE_TIME: Duration = Duration::from_secs(1);

fn init_logging(settings: Option<&Settings>) {
    let configured = settings.and_then(|settings| settings.log_filter.as_deref());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| configured.and_then(|filter| tracing_subscriber::EnvFilter::try_new(filter).ok()));
    // stdout carries the transcript
    if let Some(env_filter) = env_filter {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().compact().with_writer(std::io::stderr).init();
    }
}

fn usage() {
    #[allow(clippy::disallowed_macros)]
    {
        println!("USAGE: triggerd COMMAND");
        println!();
        println!("Possible commands are:");
        for command in COMMANDS {
            println!("\t{command}");
        }
    }
}

fn print_transcript(replay: &Replay) {
    for output in replay.transcript().drain() {
        if let Some(line) = log_error(serde_json::to_string(&output)) {
            #[allow(clippy::disallowed_macros)]
            {
                println!("{line}");
            }
        }
    }
}

async fn load_settings(path: Option<&Path>) -> TriggerResult<Settings> {
    match path {
        Some(path) => Settings::from_json(&tokio::fs::read_to_string(path).await?),
        None => Ok(Settings::default()),
    }
}

async fn replay(script_path: PathBuf, settings: Settings) -> TriggerResult<()> {
    let script = Script::from_json(&tokio::fs::read_to_string(&script_path).await?)?;
    tracing::info!(
        script = %script_path.display(),
        events = script.events.len(),
        duration = ?script.duration(),
        "Starting replay"
    );

    let mut replay = Replay::new(&script, &settings, Rc::new(SystemClock));
    for event in &script.events {
        let due = replay.due(event);
        while let Some(deadline) = replay.next_deadline().filter(|deadline| *deadline < due) {
            sleep_until(Instant::from_std(deadline)).await;
            replay.dispatch_timers();
            print_transcript(&replay);
        }
        sleep_until(Instant::from_std(due)).await;
        log_error(replay.apply(event));
        print_transcript(&replay);
    }

    let Some(last) = script.events.last() else {
        return Ok(());
    };
    let settle = replay.due(last) + SETTLE_TIME;
    while let Some(deadline) = replay.next_deadline().filter(|deadline| *deadline < settle) {
        sleep_until(Instant::from_std(deadline)).await;
        replay.dispatch_timers();
        print_transcript(&replay);
    }
    tracing::info!("Replay finished");
    Ok(())
}

fn probe(path: &str) -> TriggerResult<()> {
    let (device, decoder, properties) = triggerd::backend::evdev::probe(path)?;
    tracing::info!(name = device.name().unwrap_or_default(), "Probed {path}");
    tracing::debug!(?decoder, "decoder ready");
    let json = serde_json::to_string_pretty(&properties)?;
    #[allow(clippy::disallowed_macros)]
    {
        println!("{json}");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = ::std::env::args().collect();

    let mut settings_path = None;
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--settings" && i + 1 < args.len() {
            settings_path = Some(PathBuf::from(&args[i + 1]));
            i += 2;
        } else {
            i += 1;
        }
    }
    let settings = load_settings(settings_path.as_deref()).await;
    init_logging(settings.as_ref().ok());

    #[cfg(feature = "profile-with-tracy")]
    profiling::tracy_client::Client::start();

    profiling::register_thread!("Main Thread");

    #[cfg(feature = "profile-with-puffin")]
    let _server = log_error(puffin_http::Server::new(&format!(
        "0.0.0.0:{}",
        puffin_http::DEFAULT_PORT
    )));
    #[cfg(feature = "profile-with-puffin")]
    profiling::puffin::set_scopes_on(true);

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load settings: {e}");
            std::process::exit(1);
        }
    };

    let command = args.get(1).map(|s| &s[..]);
    let result = match (command, args.get(2)) {
        (Some("replay"), Some(script)) => replay(PathBuf::from(script), settings).await,
        (Some("probe"), Some(device)) => probe(device),
        (Some(other), _) if COMMANDS.iter().any(|c| c.starts_with(other)) => {
            tracing::error!("Missing argument for {other}");
            usage();
            std::process::exit(2);
        }
        (Some(other), _) => {
            tracing::error!("Unknown command: {other}");
            std::process::exit(2);
        }
        (None, _) => {
            usage();
            return;
        }
    };
    if let Err(e) = result {
        tracing::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
