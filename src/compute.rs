//! CPU-bound workloads run by the worker runtime.

use std::fmt;

/// Sum of `sqrt(i)` for `i` in `0..bound`, accumulated in ascending order.
pub fn sum_sqrt(bound: u64) -> f64 {
    let mut total = 0.0_f64;
    for i in 0..bound {
        total += (i as f64).sqrt();
    }
    total
}

/// Same sum as [`sum_sqrt`], yielding to the scheduler after every `chunk`
/// iterations so the calling runtime keeps serving other tasks.
pub async fn sum_sqrt_chunked(bound: u64, chunk: u64) -> f64 {
    let chunk = chunk.max(1);
    let mut total = 0.0_f64;
    let mut start = 0;
    while start < bound {
        let end = start.saturating_add(chunk).min(bound);
        for i in start..end {
            total += (i as f64).sqrt();
        }
        start = end;
        tokio::task::yield_now().await;
    }
    total
}

/// Why a workload did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadError {
    /// The computation failed; reported as a worker fault.
    Fault(String),
    /// The worker should exit immediately with this code.
    Exit(i32),
}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(reason) => write!(f, "{reason}"),
            Self::Exit(code) => write!(f, "exit({code})"),
        }
    }
}

/// A unit of blocking computation executed on a worker thread.
pub trait Workload: Send + 'static {
    fn run(&self, input: &[f64]) -> Result<f64, WorkloadError>;
}

impl<F> Workload for F
where
    F: Fn(&[f64]) -> Result<f64, WorkloadError> + Send + 'static,
{
    fn run(&self, input: &[f64]) -> Result<f64, WorkloadError> {
        self(input)
    }
}

/// The default workload: [`sum_sqrt`] over a fixed bound. The input is not
/// consulted; it is echoed back in the outcome by the runtime.
#[derive(Debug, Clone, Copy)]
pub struct SqrtSum {
    pub bound: u64,
}

impl SqrtSum {
    pub fn new(bound: u64) -> Self {
        Self { bound }
    }
}

impl Workload for SqrtSum {
    fn run(&self, _input: &[f64]) -> Result<f64, WorkloadError> {
        Ok(sum_sqrt(self.bound))
    }
}
