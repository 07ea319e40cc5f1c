//! Outstanding-playback lifecycle engine
//!
//! Registry, per-playback cancellation channel, and the worker loop.

pub(crate) mod registry;
pub(crate) mod wake;
pub(crate) mod worker;

pub use registry::FinishCallback;
