//! Shared harness for the integration tests.
//!
//! Error accumulation is explicit state handed to each engine under test,
//! never process-wide, so tests stay parallel-safe.

#![allow(dead_code)]

use notifier::{DeliveryOutcome, ErrorCallback};
use std::sync::{Arc, Mutex, Once};

/// Initializes tracing output once per test binary; respects `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An error callback that appends every reported error to a shared list.
pub fn error_collector() -> (ErrorCallback, Arc<Mutex<Vec<String>>>) {
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let callback: ErrorCallback = Arc::new(move |e| sink.lock().unwrap().push(e.to_string()));
    (callback, errors)
}

/// A payload the memory channel delivers successfully.
pub fn outcome_payload() -> serde_json::Value {
    serde_json::to_value(DeliveryOutcome::ok()).unwrap()
}
