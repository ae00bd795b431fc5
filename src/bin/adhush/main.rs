//! AdHush entrypoint: parse flags, load the reference images, wire the
//! collaborators, then hand off to the menu UI or run headless.

mod menu;
mod signal;

use adhush::actuate::{build_actuator, platform_backend};
use adhush::config::AppConfig;
use adhush::doctor::{append_snapshot, base_doctor_report, collect_snapshot};
use adhush::telemetry::init_tracing;
use adhush::vision::{FrameSource, PrimaryDisplay, ReferenceLibrary};
use adhush::{init_logging, log_debug, log_file_path, spawn_watcher, WatcherEvent};
use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

const EVENT_DRAIN_MS: u64 = 200;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);

    let library = Arc::new(ReferenceLibrary::load(&config.images_dir)?);
    let source: Arc<Mutex<dyn FrameSource + Send>> = Arc::new(Mutex::new(PrimaryDisplay::new()));

    if config.doctor {
        return run_doctor(&config, &library, &source);
    }

    log_debug("=== AdHush started ===");
    log_debug(&format!("log file: {:?}", log_file_path()));

    if config.no_menu {
        run_headless(&config, library, source)
    } else {
        menu::run(&config, library, source)
    }
}

fn run_doctor(
    config: &AppConfig,
    library: &ReferenceLibrary,
    source: &Arc<Mutex<dyn FrameSource + Send>>,
) -> Result<()> {
    let mut backend = platform_backend();
    let snapshot = {
        let mut source = source.lock().unwrap_or_else(PoisonError::into_inner);
        collect_snapshot(config, library, &mut *source, backend.as_mut())
    };
    if config.doctor_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        let mut report = base_doctor_report(config, "adhush");
        append_snapshot(&mut report, &snapshot);
        println!("{}", report.render());
    }
    Ok(())
}

fn run_headless(
    config: &AppConfig,
    library: Arc<ReferenceLibrary>,
    source: Arc<Mutex<dyn FrameSource + Send>>,
) -> Result<()> {
    signal::install_interrupt_handler()?;
    let watcher_config = config.watcher_config();
    let actuator = build_actuator(&watcher_config, library.clone(), source.clone());
    let handle = spawn_watcher(&watcher_config, library, source, actuator);
    eprintln!("adhush is watching (menu disabled); press Ctrl+C to stop");

    while !signal::interrupted() && !handle.is_finished() {
        while let Some(event) = handle.try_event() {
            print_event(&event);
        }
        thread::sleep(Duration::from_millis(EVENT_DRAIN_MS));
    }

    if let Some(metrics) = handle.join() {
        eprintln!(
            "stopped after {} cycle(s), {} ad edge(s)",
            metrics.cycles, metrics.ad_edges
        );
    }
    Ok(())
}

fn print_event(event: &WatcherEvent) {
    match event {
        WatcherEvent::AdStarted { reference } => eprintln!("ad detected ({reference})"),
        WatcherEvent::AdEnded => eprintln!("ad ended"),
        WatcherEvent::Actuated { muted } => {
            eprintln!("{}", if *muted { "muted" } else { "unmuted" })
        }
        WatcherEvent::ActuatorFailed { message } => eprintln!("actuator failed: {message}"),
        WatcherEvent::CaptureFailed => eprintln!("screen capture failed; cycle skipped"),
        WatcherEvent::ObservedState { state } => {
            eprintln!("on-screen state: {}", state.label())
        }
        WatcherEvent::Stopped { .. } => {}
    }
}
