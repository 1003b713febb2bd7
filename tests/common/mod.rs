//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use visflow::pipeline::InPort;

/// Shared log the test components append to.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of the log entries so far.
pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Drain every queued value of a tap.
pub fn drain<T: Clone + Send + 'static>(port: &InPort<T>) -> Vec<T> {
    std::iter::from_fn(|| port.read().ok()).collect()
}

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
