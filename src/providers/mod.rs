//! Signal provider implementations

pub mod replay;

pub use replay::{ReplayProvider, TimedSignal, TripRecording};
