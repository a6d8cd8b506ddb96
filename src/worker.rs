//! Latest-request-wins background recomputation.
//!
//! Derived computations that are too heavy for the caller's thread (bulk
//! meta-edge rebuilds across views, statistics sweeps) go through a
//! [`RefreshWorker`]: one background thread, a one-slot queue. Submitting a
//! request replaces whatever is still queued and raises the cooperative
//! cancel flag for the request currently being processed — the newest request
//! always supersedes stale in-flight work. The engine's lock itself is never
//! held across a request, and is not interruptible; cancellation is purely
//! cooperative via the flag handed to the job.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use parking_lot::{Condvar, Mutex};

use crate::NestGraphError;

struct Shared<T> {
    queue: Mutex<Option<T>>,
    signal: Condvar,
    cancel: AtomicBool,
    shutdown: AtomicBool,
}

/// A single background worker processing requests of type `T` with a
/// latest-request-wins discipline.
pub struct RefreshWorker<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> RefreshWorker<T> {
    /// Spawn the worker thread. `job` receives each request together with the
    /// cancel flag; long-running jobs should poll the flag and bail out when
    /// it is raised.
    pub fn spawn<F>(mut job: F) -> RefreshWorker<T>
    where
        F: FnMut(T, &AtomicBool) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            queue: Mutex::new(None),
            signal: Condvar::new(),
            cancel: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || loop {
            let request = {
                let mut queue = thread_shared.queue.lock();
                while queue.is_none() && !thread_shared.shutdown.load(Ordering::Acquire) {
                    thread_shared.signal.wait(&mut queue);
                }
                if thread_shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                queue.take()
            };
            if let Some(request) = request {
                thread_shared.cancel.store(false, Ordering::Release);
                job(request, &thread_shared.cancel);
            }
        });
        RefreshWorker {
            shared,
            handle: Some(handle),
        }
    }

    /// Queue a request, superseding any queued one and cancelling in-flight
    /// work.
    pub fn submit(&self, request: T) {
        let mut queue = self.shared.queue.lock();
        if queue.replace(request).is_some() {
            tracing::debug!("superseding a queued refresh request");
        }
        self.shared.cancel.store(true, Ordering::Release);
        self.shared.signal.notify_one();
    }

    /// Stop the worker after the current request, discarding anything queued.
    pub fn shutdown(mut self) -> Result<(), NestGraphError> {
        self.stop();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| NestGraphError::Worker("refresh worker panicked".into())),
            None => Ok(()),
        }
    }

    fn stop(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.cancel.store(true, Ordering::Release);
        let mut queue = self.shared.queue.lock();
        queue.take();
        self.shared.signal.notify_one();
    }
}

impl<T: Send + 'static> Drop for RefreshWorker<T> {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}
