//! Fixed-size worker pool draining a bounded FIFO queue of closures.
//!
//! Workers pull from one shared `crossbeam_channel::bounded` queue, so with a
//! single worker tasks finish in submission order; with more workers only the
//! start order is FIFO. `graceful_shutdown` stops intake and blocks until every
//! task that was accepted has run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded};

/// A unit of work. Results travel through whatever the closure captures.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("invalid executor argument: {0}")]
    InvalidArgument(String),
    #[error("failed to spawn executor worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("executor has been shut down")]
    Rejected,
}

struct State {
    shutdown: bool,
    // queued + running tasks; incremented before the task is visible to workers
    pending: usize,
    sender: Option<Sender<Task>>,
}

struct Shared {
    state: Mutex<State>,
    drained: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // a poisoned lock only means a thread panicked while holding it; the
        // counters themselves are still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn task_finished(&self) {
        let mut st = self.lock();
        st.pending = st.pending.saturating_sub(1);
        if st.shutdown && st.pending == 0 {
            self.drained.notify_all();
        }
    }
}

pub struct Executor {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    max_concurrency: usize,
}

impl Executor {
    /// Start `max_concurrency` workers over a queue holding at most
    /// `buffer_size` waiting tasks.
    pub fn new(max_concurrency: usize, buffer_size: usize) -> Result<Self, ExecutorError> {
        if max_concurrency == 0 {
            return Err(ExecutorError::InvalidArgument(format!(
                "max_concurrency must be positive, got {}",
                max_concurrency
            )));
        }
        if buffer_size == 0 {
            return Err(ExecutorError::InvalidArgument(format!(
                "buffer_size must be positive, got {}",
                buffer_size
            )));
        }

        let (tx, rx) = bounded::<Task>(buffer_size);
        let shared = Arc::new(Shared {
            state: Mutex::new(State { shutdown: false, pending: 0, sender: Some(tx) }),
            drained: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(max_concurrency);
        for worker_id in 0..max_concurrency {
            let rx = rx.clone();
            let worker_shared = shared.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("upload-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, rx, worker_shared));
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => {
                    // 关闭队列并回收已启动的 worker
                    shared.lock().sender = None;
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(ExecutorError::Spawn(e));
                }
            }
        }
        tracing::debug!(
            "[executor] started workers={} buffer={}",
            max_concurrency,
            buffer_size
        );

        Ok(Self { shared, workers: Mutex::new(handles), max_concurrency })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Queue a task, blocking while the queue is full.
    ///
    /// Returns `Rejected` once `graceful_shutdown` has been called.
    pub fn submit<F>(&self, task: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = {
            let mut st = self.shared.lock();
            if st.shutdown {
                tracing::warn!("[executor] submit after shutdown rejected");
                return Err(SubmitError::Rejected);
            }
            let Some(tx) = st.sender.clone() else {
                return Err(SubmitError::Rejected);
            };
            st.pending += 1;
            tx
        };

        // Blocking send outside the lock: a concurrent shutdown already sees
        // this task in `pending` and waits for it.
        if tx.send(Box::new(task)).is_err() {
            self.shared.task_finished();
            return Err(SubmitError::Rejected);
        }
        Ok(())
    }

    /// Stop accepting tasks and wait for everything already accepted to finish.
    pub fn graceful_shutdown(&self) {
        {
            let mut st = self.shared.lock();
            if st.shutdown && st.sender.is_none() {
                return;
            }
            st.shutdown = true;
            if st.pending > 0 {
                tracing::debug!("[executor] shutdown waiting for {} task(s)", st.pending);
            }
            while st.pending > 0 {
                st = self.shared.drained.wait(st).unwrap_or_else(|e| e.into_inner());
            }
            // dropping the last sender disconnects the queue and lets workers exit
            st.sender = None;
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut w = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            w.drain(..).collect()
        };
        for h in handles {
            let _ = h.join();
        }
        tracing::debug!("[executor] shutdown complete");
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.graceful_shutdown();
    }
}

fn run_worker(worker_id: usize, rx: Receiver<Task>, shared: Arc<Shared>) {
    while let Ok(task) = rx.recv() {
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("[executor] worker_id={} task panicked", worker_id);
        }
        shared.task_finished();
    }
    tracing::debug!("[executor] worker_id={} exiting, queue closed", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn rejects_zero_sizes() {
        assert!(matches!(Executor::new(0, 1), Err(ExecutorError::InvalidArgument(_))));
        assert!(matches!(Executor::new(1, 0), Err(ExecutorError::InvalidArgument(_))));
    }

    #[test]
    fn tasks_run_on_named_workers() {
        let ex = Executor::new(3, 8).unwrap();
        assert_eq!(ex.max_concurrency(), 3);
        let names = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..12 {
            let names = names.clone();
            ex.submit(move || {
                let name = std::thread::current().name().unwrap_or_default().to_string();
                names.lock().unwrap().push(name);
            })
            .unwrap();
        }
        ex.graceful_shutdown();
        let names = names.lock().unwrap();
        assert_eq!(names.len(), 12);
        assert!(names.iter().all(|n| n.starts_with("upload-worker-")));
    }

    #[test]
    fn shutdown_without_tasks_returns_immediately() {
        let ex = Executor::new(2, 4).unwrap();
        ex.graceful_shutdown();
        // second call is a no-op
        ex.graceful_shutdown();
    }

    #[test]
    fn slow_task_finishes_before_shutdown_returns() {
        let ex = Executor::new(1, 1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        ex.submit(move || {
            std::thread::sleep(Duration::from_millis(150));
            d.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        ex.graceful_shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let ex = Executor::new(1, 4).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        ex.submit(|| panic!("boom")).unwrap();
        let d = done.clone();
        ex.submit(move || {
            d.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        ex.graceful_shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
