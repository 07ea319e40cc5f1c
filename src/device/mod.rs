//! Output device negotiation
//!
//! The device sits behind the `DeviceBackend`/`DeviceSession` seam so the
//! lifecycle engine can run against any pollable, writable endpoint. The
//! production backend is the OSS implementation in [`oss`].
//!
//! Negotiation policy: sample format and channel count must match exactly;
//! the accepted sample rate may deviate from the requested one by at most 5%.
//! The three checks run in that order and stop at the first failure.

use std::fmt::Debug;
use std::os::fd::BorrowedFd;

use crate::error::{Error, Result};
use crate::source::SampleFormat;

pub mod oss;

/// Stream parameters requested from (or granted by) an output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Sample format
    pub format: SampleFormat,
    /// Interleaved channel count (1 or 2)
    pub channels: u8,
    /// Sample rate in Hz
    pub rate: u32,
}

/// Maximum sample-rate deviation accepted by negotiation, in percent of the
/// requested rate.
pub const RATE_TOLERANCE_PERCENT: u32 = 5;

/// Exact-match negotiation check, used for sample format and channel count.
pub fn verify_exact<T: PartialEq + Debug>(what: &str, requested: T, granted: T) -> Result<()> {
    if granted == requested {
        Ok(())
    } else {
        Err(Error::NotSupported(format!(
            "{what}: requested {requested:?}, device granted {granted:?}"
        )))
    }
}

/// Tolerance-based negotiation check for the sample rate.
///
/// The granted rate is accepted as-is (no resampling) when it lies within
/// [`RATE_TOLERANCE_PERCENT`] of the requested rate.
pub fn verify_rate(requested: u32, granted: u32) -> Result<()> {
    let deviation = u64::from(granted.abs_diff(requested)) * 100;
    if deviation <= u64::from(requested) * u64::from(RATE_TOLERANCE_PERCENT) {
        Ok(())
    } else {
        Err(Error::NotSupported(format!(
            "sample rate: requested {requested} Hz, device granted {granted} Hz"
        )))
    }
}

/// An opened, negotiated device session.
///
/// Exclusively owned by one playback worker once that worker starts; the
/// session closes when it is dropped.
pub trait DeviceSession: Send {
    /// File descriptor that polls writable when the device can accept data.
    fn pollable_fd(&self) -> BorrowedFd<'_>;

    /// Write as much of `buf` as the device accepts in one call.
    ///
    /// # Returns
    /// Number of bytes the device took (never zero).
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
}

/// Factory that opens and negotiates device sessions.
pub trait DeviceBackend: Send + Sync {
    /// Open the device at `path` (backend default when `None`) and negotiate
    /// `spec` against it.
    fn open(&self, path: Option<&str>, spec: StreamSpec) -> Result<Box<dyn DeviceSession>>;
}
