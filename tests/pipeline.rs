use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use cubelink::data::writer::write_cube;
use cubelink::engine::{Engine, EngineCall, EngineError, EngineOutcome, Execution, InvokerConfig};
use cubelink::error::{Error, LoadError};
use cubelink::{pipeline, Header, HeaderValue};

/// Mock engine that records the samples and header keys it receives.
#[derive(Default)]
struct MockEngine {
    calls: AtomicUsize,
    samples: Mutex<Vec<f32>>,
    header_keys: Mutex<Vec<String>>,
    delay: Option<Duration>,
    sentinel: i32,
}

impl Engine for MockEngine {
    fn accepts_header(&self) -> bool {
        true
    }

    fn mainline(&self, call: EngineCall<'_>) -> Result<EngineOutcome, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        *self.samples.lock().unwrap() = call.samples.values();
        if let Some(header) = call.header {
            *self.header_keys.lock().unwrap() = header.keys().map(str::to_string).collect();
        }
        Ok(EngineOutcome::new(self.sentinel))
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cube_file(dir: &Path, axes: &[usize], values: &[f32]) -> PathBuf {
    let path = dir.join("cube.fits");
    let mut extra = Header::new();
    extra.insert("BUNIT", HeaderValue::Text("Jy/beam".into()));
    write_cube(&path, axes, values, &extra).unwrap();
    path
}

#[test]
fn small_cube_reaches_the_engine_in_row_major_order() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let values: Vec<f32> = (1..=8).map(|v| v as f32).collect();
    let path = cube_file(dir.path(), &[2, 2, 2], &values);
    let engine = MockEngine::default();

    pipeline::run(&path, Path::new("run.par"), InvokerConfig::default(), || Ok(&engine)).unwrap();

    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*engine.samples.lock().unwrap(), vec![1., 2., 3., 4., 5., 6., 7., 8.]);
    let keys = engine.header_keys.lock().unwrap();
    assert_eq!(&keys[..6], &["SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3"]);
    assert!(keys.iter().any(|k| k == "BUNIT"));
}

#[test]
fn sample_count_is_the_product_of_axis_sizes() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let axes = [5, 3, 4];
    let values: Vec<f32> = (0..60).map(|v| v as f32 * 0.5 - 7.25).collect();
    let path = cube_file(dir.path(), &axes, &values);
    let engine = MockEngine::default();

    pipeline::run(&path, Path::new("run.par"), InvokerConfig::default(), || Ok(&engine)).unwrap();

    let seen = engine.samples.lock().unwrap();
    assert_eq!(seen.len(), axes.iter().product::<usize>());
    for (got, want) in seen.iter().zip(&values) {
        assert_relative_eq!(*got, *want);
    }
}

#[test]
fn missing_file_never_reaches_the_engine() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let connects = AtomicUsize::new(0);
    let engine = MockEngine::default();

    let err = pipeline::run(
        &dir.path().join("absent.fits"),
        Path::new("run.par"),
        InvokerConfig::default(),
        || {
            connects.fetch_add(1, Ordering::SeqCst);
            Ok(&engine)
        },
    )
    .unwrap_err();

    assert!(matches!(err, Error::Load(LoadError::NotFound { .. })), "{err}");
    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn truncated_file_never_reaches_the_engine() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let values: Vec<f32> = (0..64).map(|v| v as f32).collect();
    let path = cube_file(dir.path(), &[4, 4, 4], &values);
    let bytes = std::fs::read(&path).unwrap();
    // Keep the header blocks and half of the data.
    std::fs::write(&path, &bytes[..bytes.len() - 2880 + 128]).unwrap();
    let connects = AtomicUsize::new(0);
    let engine = MockEngine::default();

    let err = pipeline::run(&path, Path::new("run.par"), InvokerConfig::default(), || {
        connects.fetch_add(1, Ordering::SeqCst);
        Ok(&engine)
    })
    .unwrap_err();

    assert!(matches!(err, Error::Load(LoadError::Format { .. })), "{err}");
    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn worker_execution_blocks_for_the_sentinel() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = cube_file(dir.path(), &[2, 2, 2], &[0.0; 8]);
    let engine = MockEngine {
        delay: Some(Duration::from_millis(100)),
        sentinel: 0x5EED,
        ..MockEngine::default()
    };
    let config = InvokerConfig {
        execution: Execution::Worker,
        ..InvokerConfig::default()
    };

    let started = Instant::now();
    let outcome = pipeline::run(&path, Path::new("run.par"), config, || Ok(&engine)).unwrap();

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(outcome.status(), 0x5EED);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn connect_failure_is_an_invoke_stage_error() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = cube_file(dir.path(), &[2, 2, 2], &[0.0; 8]);

    let err = pipeline::run(&path, Path::new("run.par"), InvokerConfig::default(), || {
        Err::<MockEngine, _>(EngineError::Failed("no engine".into()))
    })
    .unwrap_err();

    assert!(matches!(err, Error::Invoke(_)), "{err}");
    assert!(err.to_string().starts_with("invoke stage failed"));
}
