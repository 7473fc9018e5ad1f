use std::path::Path;
use std::sync::{Mutex, MutexGuard, Once};

use cubelink::engine::{Engine, EngineCall, EngineError, EngineOutcome, Execution, InvokerConfig};
use cubelink::{ByteOrder, EngineInvoker, Samples};
use log::{Level, LevelFilter, Log, Metadata, Record};

const STARTING: &str = "engine invocation starting";
const FINISHED: &str = "engine invocation finished";
const MARKER: &str = "mock engine running";

/// Keeps every record so tests can inspect the order of emission.
struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};
static INIT: Once = Once::new();
static SERIAL: Mutex<()> = Mutex::new(());

/// Install the logger and run one test at a time, so every captured record
/// belongs to the calling test.
fn capture() -> MutexGuard<'static, ()> {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    let guard = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    LOGGER.records.lock().unwrap().clear();
    guard
}

fn take_records() -> Vec<(Level, String)> {
    std::mem::take(&mut *LOGGER.records.lock().unwrap())
}

/// Logs a marker from inside the engine call.
struct MarkerEngine {
    fail: bool,
}

impl Engine for MarkerEngine {
    fn mainline(&self, call: EngineCall<'_>) -> Result<EngineOutcome, EngineError> {
        log::info!("{MARKER} with '{}'", call.parameter_file.display());
        if self.fail {
            return Err(EngineError::Failed("mock failure".into()));
        }
        Ok(EngineOutcome::new(0))
    }
}

fn run(config: InvokerConfig, fail: bool) {
    let invoker = EngineInvoker::new(MarkerEngine { fail }, config);
    let samples = Samples::from_values(&[1.0, 2.0, 3.0], ByteOrder::Big);
    let _ = invoker.invoke(samples, Path::new("run.par"), None);
}

/// Every start is followed directly by the engine marker and then the finish
/// record, with no record of any kind in between.
fn assert_bracketed(records: &[(Level, String)], invocations: usize) {
    let starts: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, (_, msg))| msg.starts_with(STARTING))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(starts.len(), invocations, "{records:#?}");

    for start in starts {
        let window = &records[start..start + 3];
        assert_eq!(window[0].0, Level::Info);
        assert!(window[1].1.starts_with(MARKER), "{records:#?}");
        assert_eq!(window[2].0, Level::Info);
        assert!(window[2].1.starts_with(FINISHED), "{records:#?}");
    }
    let finishes = records.iter().filter(|(_, msg)| msg.starts_with(FINISHED)).count();
    assert_eq!(finishes, invocations);
}

#[test]
fn inline_call_is_bracketed() {
    let _serial = capture();
    run(InvokerConfig::default(), false);
    assert_bracketed(&take_records(), 1);
}

#[test]
fn worker_call_is_bracketed() {
    let _serial = capture();
    let config = InvokerConfig {
        execution: Execution::Worker,
        ..InvokerConfig::default()
    };
    run(config, false);

    let records = take_records();
    assert_bracketed(&records, 1);
    // the task bookkeeping stays outside the pair
    assert!(records.iter().any(|(level, _)| *level == Level::Debug), "{records:#?}");
}

#[test]
fn worker_calls_never_interleave() {
    let _serial = capture();
    let config = InvokerConfig {
        execution: Execution::Worker,
        ..InvokerConfig::default()
    };
    let invoker = EngineInvoker::new(MarkerEngine { fail: false }, config);
    for _ in 0..200 {
        let samples = Samples::from_values(&[0.5], ByteOrder::Big);
        invoker.invoke(samples, Path::new("run.par"), None).unwrap();
    }
    assert_bracketed(&take_records(), 200);
}

#[test]
fn failing_call_is_still_bracketed() {
    let _serial = capture();
    run(InvokerConfig::default(), true);

    let records = take_records();
    assert_bracketed(&records, 1);
    assert!(records.iter().any(|(_, msg)| msg.starts_with(FINISHED) && msg.contains("mock failure")));
}

#[test]
fn repeated_invocations_do_not_nest() {
    let _serial = capture();
    let invoker = EngineInvoker::new(MarkerEngine { fail: false }, InvokerConfig::default());
    for _ in 0..3 {
        let samples = Samples::from_values(&[0.5], ByteOrder::Big);
        invoker.invoke(samples, Path::new("run.par"), None).unwrap();
    }

    let records = take_records();
    assert_eq!(records.len(), 9, "{records:#?}");
    assert_bracketed(&records, 3);
}

#[test]
fn disabled_checkpoints_emit_nothing() {
    let _serial = capture();
    let config = InvokerConfig {
        checkpoints: false,
        ..InvokerConfig::default()
    };
    run(config, false);

    let records = take_records();
    assert_eq!(records.len(), 1, "{records:#?}");
    assert!(records[0].1.starts_with(MARKER));
}
