//! Per-playback cancellation channel
//!
//! A pipe pair created at handle-construction time. The worker polls the
//! read end next to the device descriptor; the controller cancels by closing
//! the write end, which flips the read end to ready/hang-up. The worker
//! observes the request at its very next readiness check, so wake-up latency
//! never depends on a polling interval.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use crate::error::{Error, Result};

/// Wait end, held by the playback worker.
#[derive(Debug)]
pub(crate) struct WakeWait {
    fd: OwnedFd,
}

impl WakeWait {
    /// Descriptor that polls readable once the signal end is closed.
    pub(crate) fn pollable_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Signal end, held by the outstanding registry.
#[derive(Debug)]
pub(crate) struct WakeSignal {
    fd: Option<OwnedFd>,
}

impl WakeSignal {
    /// Wake the worker by closing the pipe's write end.
    ///
    /// Idempotent: the descriptor is taken out of the Option on the first
    /// call, so a second raise finds nothing left to close.
    pub(crate) fn raise(&mut self) {
        drop(self.fd.take());
    }
}

/// Create the two ends of a cancellation channel.
pub(crate) fn wake_channel() -> Result<(WakeWait, WakeSignal)> {
    let (read, write) =
        pipe2(OFlag::O_CLOEXEC).map_err(|e| Error::SystemFailure(format!("pipe: {e}")))?;
    Ok((WakeWait { fd: read }, WakeSignal { fd: Some(write) }))
}
