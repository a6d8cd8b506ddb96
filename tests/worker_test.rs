//! Behavior of the latest-request-wins refresh worker.

mod common;

use std::sync::{
    atomic::Ordering,
    mpsc::{channel, RecvTimeoutError},
};
use std::time::Duration;

use nestgraph_core::worker::RefreshWorker;

use common::init_logging;

#[test_log::test]
fn requests_are_processed_in_order() {
    init_logging();
    let (tx, rx) = channel();
    let worker = RefreshWorker::spawn(move |request: u32, _cancel| {
        tx.send(request).unwrap();
    });
    for i in 0..3 {
        worker.submit(i);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), i);
    }
    worker.shutdown().unwrap();
}

#[test_log::test]
fn newer_request_cancels_in_flight_work() {
    init_logging();
    let (started_tx, started_rx) = channel();
    let (done_tx, done_rx) = channel();
    let worker = RefreshWorker::spawn(move |request: u32, cancel| {
        started_tx.send(request).unwrap();
        if request == 0 {
            // Busy job: runs until superseded.
            while !cancel.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        done_tx.send(request).unwrap();
    });

    worker.submit(0);
    assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
    // The busy job is in flight; this submit raises its cancel flag.
    worker.submit(1);
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
    assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    worker.shutdown().unwrap();
}

#[test_log::test]
fn queued_request_is_superseded() {
    init_logging();
    let (started_tx, started_rx) = channel();
    let (done_tx, done_rx) = channel();
    let (gate_tx, gate_rx) = channel::<()>();
    let worker = RefreshWorker::spawn(move |request: u32, _cancel| {
        started_tx.send(request).unwrap();
        if request == 0 {
            // Hold the worker until the test has queued its replacements.
            gate_rx.recv().unwrap();
        }
        done_tx.send(request).unwrap();
    });

    worker.submit(0);
    assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
    // While the gated job runs, queue two more; only the newest survives.
    worker.submit(1);
    worker.submit(2);
    gate_tx.send(()).unwrap();
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
    assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
    assert_eq!(
        done_rx.recv_timeout(Duration::from_millis(100)),
        Err(RecvTimeoutError::Timeout),
        "request 1 was superseded before it ran"
    );
    worker.shutdown().unwrap();
}
