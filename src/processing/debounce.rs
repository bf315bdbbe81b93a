//! Single-shot deferred task
//!
//! One worker thread waits on a command channel with `recv_timeout` until the
//! scheduled deadline passes, then runs the job. Scheduling again replaces the
//! pending job. The caller's thread never sleeps.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Command {
    Schedule { generation: u64, deadline: Instant },
    Shutdown,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    job: Option<Job>,
}

pub struct DeferredTask {
    slot: Arc<Mutex<Slot>>,
    sender: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeferredTask {
    pub fn new(name: &str) -> Self {
        let slot = Arc::new(Mutex::new(Slot::default()));
        let (sender, receiver) = mpsc::channel::<Command>();
        let worker_slot = Arc::clone(&slot);

        let worker = thread::Builder::new().name(name.to_string()).spawn(move || {
            let mut pending: Option<(u64, Instant)> = None;
            loop {
                let command = match pending {
                    Some((_, deadline)) => {
                        let wait = deadline.saturating_duration_since(Instant::now());
                        receiver.recv_timeout(wait)
                    }
                    None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match command {
                    Ok(Command::Schedule { generation, deadline }) => pending = Some((generation, deadline)),
                    Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some((generation, _)) = pending.take() {
                            let job = {
                                let mut slot = worker_slot.lock().unwrap_or_else(PoisonError::into_inner);
                                if slot.generation == generation {
                                    slot.job.take()
                                } else {
                                    None
                                }
                            };
                            if let Some(job) = job {
                                job();
                            }
                        }
                    }
                }
            }
        });

        let (sender, worker) = match worker {
            Ok(handle) => (Some(sender), Some(handle)),
            Err(e) => {
                warn!("Could not start deferred task worker '{}': {}", name, e);
                (None, None)
            }
        };

        Self {
            slot,
            sender: Mutex::new(sender),
            worker: Mutex::new(worker),
        }
    }

    /// Run `job` once after `delay`, replacing any job not yet run.
    ///
    /// Returns false when the worker is unavailable; the job is then dropped.
    pub fn schedule<F>(&self, delay: Duration, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.generation += 1;
            slot.job = Some(Box::new(job));
            slot.generation
        };
        let deadline = Instant::now() + delay;

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sent = sender
            .as_ref()
            .is_some_and(|s| s.send(Command::Schedule { generation, deadline }).is_ok());
        if !sent {
            self.cancel();
        }
        sent
    }

    /// Drop the pending job. Returns true if one was waiting to run.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        slot.job.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).job.is_some()
    }

    /// Stop the worker. Pending jobs are dropped without running.
    pub fn shutdown(&self) {
        self.cancel();
        if let Some(sender) = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = sender.send(Command::Shutdown);
        }
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = worker {
            // A job may drop the last owner of this task from the worker itself
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Deferred task worker panicked");
            }
            debug!("Deferred task worker stopped");
        }
    }
}

impl Drop for DeferredTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}
