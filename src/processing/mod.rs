//! Progress tracking

pub mod debounce;
pub mod progress;
pub mod tracker;

pub use debounce::DeferredTask;
pub use progress::ProgressState;
pub use tracker::ProgressTracker;
