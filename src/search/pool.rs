use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of threads draining a shared job queue.
///
/// The pool lives as long as its owner. [`WorkerPool::terminate`] closes the
/// queue and joins every worker; dropping the pool does the same.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();

        let workers = (0..size)
            .map(|n| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("search-worker-{n}"))
                    .spawn(move || {
                        for job in receiver.iter() {
                            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                                error!("search worker {n}: job panicked");
                            }
                        }
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!("failed to spawn search worker: {e}");
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!("worker pool started with {} threads", workers.len());
        Self { sender: Some(sender), workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.sender.is_none()
    }

    /// Runs every job on the pool and returns their results in input order.
    /// A job that panicked yields `None`. Runs inline if the pool has no
    /// live workers.
    pub fn run_all<R>(&self, jobs: Vec<Box<dyn FnOnce() -> R + Send + 'static>>) -> Vec<Option<R>>
    where
        R: Send + 'static,
    {
        let count = jobs.len();
        let mut results: Vec<Option<R>> = (0..count).map(|_| None).collect();

        let sender = match &self.sender {
            Some(sender) if !self.workers.is_empty() => sender,
            _ => {
                for (slot, job) in results.iter_mut().zip(jobs) {
                    *slot = Some(job());
                }
                return results;
            }
        };

        let (result_tx, result_rx) = unbounded::<(usize, R)>();
        for (index, job) in jobs.into_iter().enumerate() {
            let result_tx = result_tx.clone();
            let task: Job = Box::new(move || {
                let _ = result_tx.send((index, job()));
            });
            if sender.send(task).is_err() {
                error!("job queue closed while dispatching");
            }
        }
        drop(result_tx);

        for (index, value) in result_rx.iter() {
            results[index] = Some(value);
        }
        results
    }

    /// Closes the queue and blocks until every worker has exited.
    pub fn terminate(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("search worker exited abnormally");
            }
        }
        debug!("worker pool terminated");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}
