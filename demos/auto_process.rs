mod common;

use analysis_batch::*;
use common::{bursts, PrintingHost, ProgressPrinter};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let host = Arc::new(PrintingHost::default());
    host.add_item(1, 0.0, bursts(8_000, 2.0, &[0.25, 0.5, 1.25]));

    let dir = tempfile::tempdir().unwrap();
    let mut session = AnalysisSession::new(
        HostContext::new(host.clone(), Arc::new(ProgressPrinter)),
        SchedulerConfig::default(),
    )
    .with_settings_path(dir.path().join("analysis.ini"));

    println!("settings restored: {}", session.load_settings().unwrap());
    session.set_auto_process(true);

    let range = session.registry().range(0).unwrap();
    let high_pass = range.global(8).unwrap();
    let min_slice = range.global(7).unwrap();

    // The first edit after load is treated as state restoration.
    session.set_parameter(high_pass, 0.0);

    // A burst of edits, like dragging a slider, runs the batch once.
    for length in [500.0, 1_000.0, 1_500.0, 2_500.0] {
        println!("min slice length -> {}", length);
        session.set_parameter(min_slice, length);
        session.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(10));
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        session.tick(Instant::now());
        if session.last_summary().is_some() && !session.is_processing() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    // Switching to the gate re-runs in take mode.
    session.select_algorithm(1);
    std::thread::sleep(Duration::from_millis(60));
    session.tick(Instant::now());
    while session.is_processing() {
        session.tick(Instant::now());
    }

    let saved = std::fs::read_to_string(session.settings_path().unwrap()).unwrap();
    println!("saved settings:\n{}", saved);
}
