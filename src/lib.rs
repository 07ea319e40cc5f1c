//! # soundcue
//!
//! Concurrency and device-negotiation core of a sound-event playback
//! backend: plays decoded audio sources asynchronously on a shared OSS
//! output device, supports cooperative cancellation of in-flight playbacks,
//! and guarantees an orderly, blocking shutdown that leaves no playback
//! thread running and no descriptor leaked.
//!
//! **Architecture:** one detached worker thread per in-flight playback, a
//! mutex-protected outstanding registry as the single source of truth, and a
//! per-playback pipe polled next to device writability as the cancellation
//! wake primitive.
//!
//! Decoding, theme/event-name lookup, and property storage are external
//! collaborators; sources enter the engine through the [`SoundSource`]
//! trait, devices through [`device::DeviceBackend`].

pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod playback;
pub mod source;

pub use config::DriverConfig;
pub use driver::Driver;
pub use error::{Error, Result};
pub use playback::FinishCallback;
pub use source::{SampleFormat, SoundSource};
