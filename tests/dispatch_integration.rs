//! Integration tests for dispatching work to a background worker.
//!
//! Each test drives the public API on a tokio runtime with a real worker
//! thread, guarded by a timeout so a lost notification fails fast.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::timeout;

use offload::compute::{SqrtSum, WorkloadError, sum_sqrt};
use offload::error::DispatchError;
use offload::liveness::LivenessLoop;
use offload::worker::{DispatchState, Dispatcher};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound small enough to keep tests quick.
const BOUND: u64 = 100_000;

/// Counts handler invocations.
#[derive(Clone, Default)]
struct Counters {
    results: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
    last_error: Arc<std::sync::Mutex<Option<DispatchError>>>,
}

impl Counters {
    fn attach(&self, dispatcher: Dispatcher) -> Dispatcher {
        let results = Arc::clone(&self.results);
        let errors = Arc::clone(&self.errors);
        let last_error = Arc::clone(&self.last_error);
        dispatcher
            .on_result(move |_| {
                results.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |err| {
                errors.fetch_add(1, Ordering::SeqCst);
                *last_error.lock().unwrap() = Some(err.clone());
            })
    }

    fn results(&self) -> usize {
        self.results.load(Ordering::SeqCst)
    }

    fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

/// Give trailing worker events (the exit notification) time to drain.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn dispatch_one_to_five_yields_single_result() {
    let counters = Counters::default();
    let mut dispatcher = counters.attach(Dispatcher::new(SqrtSum::new(BOUND)));

    let pending = dispatcher.dispatch(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let outcome = timeout(TEST_TIMEOUT, pending).await.unwrap().unwrap();

    assert_eq!(outcome.input, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(outcome.result, sum_sqrt(BOUND));

    settle().await;
    assert_eq!(counters.results(), 1);
    assert_eq!(counters.errors(), 0);
    assert_eq!(dispatcher.state(), DispatchState::Completed);
}

#[tokio::test]
async fn input_is_echoed_for_any_sequence() {
    let inputs = [
        vec![],
        vec![0.0],
        vec![-1.5, 2.25, 1e300],
        (0..1000).map(f64::from).collect::<Vec<_>>(),
    ];

    for input in inputs {
        let mut dispatcher = Dispatcher::new(SqrtSum::new(10));
        let outcome = timeout(TEST_TIMEOUT, dispatcher.dispatch(input.clone()).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.input, input);
        assert_eq!(outcome.result, sum_sqrt(10));
    }
}

#[tokio::test]
async fn worker_fault_reported_once_without_result() {
    let counters = Counters::default();
    let workload = |_: &[f64]| -> Result<f64, WorkloadError> {
        Err(WorkloadError::Fault("simulated failure".to_string()))
    };
    let mut dispatcher = counters.attach(Dispatcher::new(workload));

    let err = timeout(TEST_TIMEOUT, dispatcher.dispatch(vec![1.0]).unwrap())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, DispatchError::WorkerFault { .. }));

    settle().await;
    assert_eq!(counters.errors(), 1);
    assert_eq!(counters.results(), 0);
    assert_eq!(dispatcher.state(), DispatchState::Faulted);
}

#[tokio::test]
async fn panicking_worker_is_a_fault() {
    let counters = Counters::default();
    let workload = |input: &[f64]| -> Result<f64, WorkloadError> {
        if input.is_empty() {
            panic!("empty input");
        }
        Ok(0.0)
    };
    let mut dispatcher = counters.attach(Dispatcher::new(workload));

    let err = timeout(TEST_TIMEOUT, dispatcher.dispatch(vec![]).unwrap())
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::WorkerFault {
            reason: "empty input".to_string()
        }
    );

    settle().await;
    assert_eq!(counters.errors(), 1);
    assert_eq!(counters.results(), 0);
}

#[tokio::test]
async fn abnormal_exit_one_reports_termination() {
    let counters = Counters::default();
    let workload = |_: &[f64]| -> Result<f64, WorkloadError> { Err(WorkloadError::Exit(1)) };
    let mut dispatcher = counters.attach(Dispatcher::new(workload));

    let err = timeout(TEST_TIMEOUT, dispatcher.dispatch(vec![1.0, 2.0]).unwrap())
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(err, DispatchError::AbnormalTermination { code: 1 });

    settle().await;
    assert_eq!(counters.errors(), 1);
    assert_eq!(counters.results(), 0);
    assert_eq!(
        counters.last_error.lock().unwrap().as_ref().and_then(DispatchError::exit_code),
        Some(1)
    );
    assert_eq!(dispatcher.state(), DispatchState::Terminated);
}

#[tokio::test]
async fn liveness_ticks_while_worker_computes() {
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let workload = move |_: &[f64]| -> Result<f64, WorkloadError> {
        // Hold the worker busy until the host has ticked a few times.
        let _ = release_rx.recv();
        Ok(sum_sqrt(1_000))
    };

    let liveness = LivenessLoop::spawn(Duration::from_millis(10));
    let mut ticks = liveness.subscribe();

    let mut dispatcher = Dispatcher::new(workload);
    let pending = dispatcher.dispatch(vec![1.0]).unwrap();

    let mut previous = None;
    for _ in 0..3 {
        let tick = timeout(TEST_TIMEOUT, ticks.recv()).await.unwrap().unwrap();
        if let Some(previous) = previous {
            assert_eq!(tick, previous + 1);
        }
        previous = Some(tick);
    }
    assert_eq!(dispatcher.state(), DispatchState::Dispatched);

    release_tx.send(()).unwrap();
    let outcome = timeout(TEST_TIMEOUT, pending).await.unwrap().unwrap();
    assert_eq!(outcome.result, sum_sqrt(1_000));

    assert!(liveness.stop().is_some());
}
