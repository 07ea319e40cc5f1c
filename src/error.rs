//! Error types for soundcue
//!
//! Defines the canonical error taxonomy of the playback backend using
//! thiserror, plus the translation of OS-level failure codes into it.
//!
//! Failures discovered before a playback worker starts are returned
//! synchronously from the facade; failures discovered afterwards reach the
//! caller exclusively through the completion callback.

use nix::errno::Errno;
use thiserror::Error;

/// Main error type for the playback backend
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed arguments (zero channels, zero sample rate, ...)
    #[error("Invalid argument: {0}")]
    Invalid(String),

    /// Operation invoked on an instance in the wrong lifecycle phase
    #[error("Invalid state: {0}")]
    State(String),

    /// Allocation or thread-creation failure
    #[error("Out of memory")]
    OutOfMemory,

    /// Device path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permission denied opening the device
    #[error("Access denied: {0}")]
    Access(String),

    /// Device busy
    #[error("Not available: {0}")]
    NotAvailable(String),

    /// Sample format, channel count, or rate outside negotiable bounds
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Unclassified device I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// OS primitive failure unrelated to the device itself
    #[error("System failure: {0}")]
    SystemFailure(String),

    /// Playback stopped via cancel()
    #[error("Playback cancelled")]
    Cancelled,

    /// Playback stopped because the driver instance was destroyed
    #[error("Driver destroyed")]
    Destroyed,
}

/// Convenience Result type using the soundcue Error
pub type Result<T> = std::result::Result<T, Error>;

/// Map an OS errno onto the canonical taxonomy.
///
/// Anything without a specific mapping is an unclassified device I/O error.
pub(crate) fn translate_errno(errno: Errno, what: &str) -> Error {
    match errno {
        Errno::ENODEV | Errno::ENOENT => Error::NotFound(format!("{what}: {errno}")),
        Errno::EACCES | Errno::EPERM => Error::Access(format!("{what}: {errno}")),
        Errno::ENOMEM => Error::OutOfMemory,
        Errno::EBUSY => Error::NotAvailable(format!("{what}: {errno}")),
        Errno::EINVAL => Error::Invalid(format!("{what}: {errno}")),
        Errno::ENOSYS => Error::NotSupported(format!("{what}: {errno}")),
        _ => Error::Io(format!("{what}: {errno}")),
    }
}

/// Translate a std::io::Error, falling back to `Io` when it carries no errno.
pub(crate) fn translate_io(err: &std::io::Error, what: &str) -> Error {
    match err.raw_os_error() {
        Some(code) => translate_errno(Errno::from_raw(code), what),
        None => Error::Io(format!("{what}: {err}")),
    }
}
