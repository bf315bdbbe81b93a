//! Non-blocking front end for multi-producer callers
//!
//! Fixes from any number of threads are queued on a channel and applied to
//! the tracker by one worker thread, in arrival order. Senders never wait on
//! geometry or listener delivery.

use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::api::types::{NavError, NavResult};
use crate::core::Point;
use crate::processing::tracker::ProgressTracker;

enum Command {
    SetLocation(Point),
    SetGpsStatus(bool),
    MoveForward,
    MoveBackward,
    Shutdown,
}

/// Single-consumer command queue in front of a [`ProgressTracker`]
pub struct TrackerActor {
    tracker: ProgressTracker,
    sender: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<usize>>>,
}

impl TrackerActor {
    pub fn spawn(tracker: ProgressTracker) -> NavResult<Self> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let worker_tracker = tracker.clone();

        let worker = thread::Builder::new()
            .name("route-tracker".to_string())
            .spawn(move || {
                let mut processed = 0usize;
                for command in receiver {
                    match command {
                        Command::SetLocation(location) => worker_tracker.set_location(location),
                        Command::SetGpsStatus(found) => worker_tracker.set_gps_status(found),
                        Command::MoveForward => {
                            worker_tracker.move_objective_forward();
                        }
                        Command::MoveBackward => {
                            worker_tracker.move_objective_backward();
                        }
                        Command::Shutdown => break,
                    }
                    processed += 1;
                }
                debug!("Tracker worker exiting after {} commands", processed);
                processed
            })
            .map_err(|e| NavError::BuildFailed {
                reason: format!("could not start tracker worker: {}", e),
            })?;

        Ok(Self {
            tracker,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    fn send(&self, command: Command) -> NavResult<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send(command).map_err(|_| NavError::QueueClosed),
            None => Err(NavError::QueueClosed),
        }
    }

    pub fn set_location(&self, location: Point) -> NavResult<()> {
        self.send(Command::SetLocation(location))
    }

    pub fn set_gps_status(&self, found: bool) -> NavResult<()> {
        self.send(Command::SetGpsStatus(found))
    }

    pub fn move_objective_forward(&self) -> NavResult<()> {
        self.send(Command::MoveForward)
    }

    pub fn move_objective_backward(&self) -> NavResult<()> {
        self.send(Command::MoveBackward)
    }

    /// The tracker behind the queue, for queries and listener registration
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Drain queued commands and stop the worker.
    ///
    /// Returns the number of commands processed. Later sends fail with
    /// [`NavError::QueueClosed`].
    pub fn shutdown(&self) -> NavResult<usize> {
        if let Some(sender) = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = sender.send(Command::Shutdown);
        }
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        match worker {
            Some(handle) => handle.join().map_err(|_| {
                warn!("Tracker worker panicked");
                NavError::QueueClosed
            }),
            None => Err(NavError::QueueClosed),
        }
    }
}

impl Drop for TrackerActor {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::callback::EventCallback;
    use crate::api::types::NavigationEvent;
    use crate::core::{Path, PathPoint};
    use crate::utils::config::TrackerConfig;
    use std::sync::Arc;

    fn tracker() -> ProgressTracker {
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::waypoint("b", Point::new(0.0, 0.001)),
        ]);
        ProgressTracker::new_blocking(path, TrackerConfig::default()).unwrap()
    }

    #[test]
    fn test_commands_apply_in_order() {
        let actor = TrackerActor::spawn(tracker()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        actor.tracker().add_listener(Arc::new(EventCallback::new(move |e| {
            if let NavigationEvent::LocationChanged { new, .. } = e {
                sink.lock().unwrap().push(new.longitude);
            }
        })));

        for step in 0..20 {
            actor.set_location(Point::new(0.0, step as f64 * 0.00005)).unwrap();
        }
        assert_eq!(actor.shutdown().unwrap(), 20);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 20);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_many_producers_are_serialized() {
        let actor = Arc::new(TrackerActor::spawn(tracker()).unwrap());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let actor = Arc::clone(&actor);
                thread::spawn(move || {
                    for step in 0..25 {
                        let longitude = (p * 25 + step) as f64 * 0.00001;
                        actor.set_location(Point::new(0.0, longitude)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        actor.set_gps_status(true).unwrap();
        assert_eq!(actor.shutdown().unwrap(), 101);
        assert!(actor.tracker().location().is_some());
    }

    #[test]
    fn test_send_after_shutdown_fails() {
        let actor = TrackerActor::spawn(tracker()).unwrap();
        actor.shutdown().unwrap();
        assert_eq!(actor.set_location(Point::new(0.0, 0.0)), Err(NavError::QueueClosed));
        assert_eq!(actor.move_objective_forward(), Err(NavError::QueueClosed));
        assert_eq!(actor.shutdown(), Err(NavError::QueueClosed));
    }
}
