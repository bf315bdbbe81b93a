//! Navigation API and interfaces
//!
//! Listener callbacks, the owned event type, and a queued front end for
//! callers feeding fixes from several threads.

pub mod callback;
pub mod nonblocking;
pub mod types;

// Re-export commonly used API types
pub use callback::{EventCallback, ListenerHandle, ListenerRegistry, NavigationListener};
pub use nonblocking::TrackerActor;
pub use types::{NavError, NavResult, NavigationEvent, Objective, TrackerState};
