mod common;

use analysis_batch::*;
use common::{bursts, PrintingHost, ProgressPrinter};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let rt = tokio::runtime::Runtime::new().unwrap();

    let host = Arc::new(PrintingHost::default());
    host.add_item(1, 0.0, bursts(8_000, 2.0, &[0.25, 1.0, 1.5]));
    host.add_item(2, 4.0, bursts(8_000, 1.0, &[0.5]));
    host.add_item(3, 6.0, bursts(8_000, 3.0, &[0.1, 0.9, 2.2]));

    let config = SchedulerConfig::builder()
        .with_concurrency_limit(2)
        .with_runtime(rt.handle().clone())
        .build();

    let mut session = AnalysisSession::new(
        HostContext::new(host.clone(), Arc::new(ProgressPrinter)),
        config,
    );

    // No high-pass: the bursts are plain DC.
    let range = session.registry().range(0).unwrap();
    session.set_parameter(range.global(8).unwrap(), 0.0);
    session.set_parameter(range.global(0).unwrap(), 1.0);

    println!("Amp Slice modes: {:?}", session.available_modes());
    session.process(ProcessingMode::Regions).unwrap();

    // Stand-in for the host's idle timer.
    while session.is_processing() {
        session.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(5));
    }

    if let Some(summary) = session.last_summary() {
        println!("{}", serde_json::to_string_pretty(summary).unwrap());
    }
}
