//! Per-playback worker
//!
//! One detached thread per in-flight sound event. The worker owns the device
//! session and the source; it streams decoded chunks to the device until end
//! of stream, a stop request, or an error, then fires the completion
//! callback if nobody else already has, and finally unlinks itself from the
//! registry. The callback runs while the entry is still linked, so a
//! draining destroy() cannot return before it has.
//!
//! The readiness wait multiplexes two conditions: the wait end of the
//! cancellation channel and device writability. Cancellation is cooperative;
//! a write already in progress finishes before the stop request is observed
//! at the next readiness check.

use std::sync::Arc;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::device::DeviceSession;
use crate::error::{Error, Result};
use crate::playback::registry::Registry;
use crate::playback::wake::WakeWait;
use crate::source::SoundSource;

/// Target chunk size, amortizing syscall overhead; rounded down per source
/// to a whole multiple of the frame size.
const CHUNK_BYTES: usize = 4 * 1024;

/// Read-buffer length for a given frame size: [`CHUNK_BYTES`] rounded down
/// to a frame multiple, but never less than one frame.
fn chunk_len(frame_size: usize) -> usize {
    (CHUNK_BYTES / frame_size).max(1) * frame_size
}

/// Everything one playback worker owns.
pub(crate) struct Worker {
    pub(crate) key: Uuid,
    pub(crate) id: u32,
    pub(crate) registry: Arc<Registry>,
    pub(crate) source: Box<dyn SoundSource>,
    pub(crate) session: Box<dyn DeviceSession>,
    pub(crate) wake: WakeWait,
}

/// Unlinks the worker's registry entry if the worker never got there itself.
///
/// A panicking worker (a misbehaving source or callback) would otherwise
/// leave its entry linked forever and destroy() would never stop waiting.
struct UnlinkGuard {
    registry: Arc<Registry>,
    key: Uuid,
    armed: bool,
}

impl Drop for UnlinkGuard {
    fn drop(&mut self) {
        if self.armed {
            self.registry.remove(self.key, || {});
        }
    }
}

impl Worker {
    /// Thread entry point: stream, report, then remove.
    pub(crate) fn run(self) {
        let mut guard = UnlinkGuard {
            registry: Arc::clone(&self.registry),
            key: self.key,
            armed: true,
        };
        let Worker {
            key,
            id,
            registry,
            mut source,
            mut session,
            wake,
        } = self;

        let outcome = stream(source.as_mut(), session.as_mut(), &wake);
        match &outcome {
            Ok(()) => debug!(id, %key, "playback finished"),
            Err(e) => warn!(id, %key, error = %e, "playback failed"),
        }

        // Claim and fire the callback while the entry is still linked:
        // destroy() observes an empty registry only after every completion
        // callback has returned.
        if let Some(cb) = registry.claim_completion(key) {
            cb(id, outcome);
        }

        // Unlink and release together, under the registry lock; once destroy
        // stops waiting, no descriptor of this playback is still open.
        guard.armed = false;
        registry.remove(key, move || {
            drop(session);
            drop(source);
            drop(wake);
        });
    }
}

/// The decode-and-write loop.
///
/// Returns Ok on end of stream and on a stop request (a stop request means
/// the canceller already claimed the callback, so the value is never seen).
fn stream(
    source: &mut dyn SoundSource,
    session: &mut dyn DeviceSession,
    wake: &WakeWait,
) -> Result<()> {
    let mut data = vec![0u8; chunk_len(source.frame_size())];
    let mut filled = 0usize;
    let mut offset = 0usize;

    loop {
        let (stopped, writable) = {
            let mut fds = [
                PollFd::new(wake.pollable_fd(), PollFlags::POLLIN),
                PollFd::new(session.pollable_fd(), PollFlags::POLLOUT),
            ];
            loop {
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => break,
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(Error::SystemFailure(format!("poll: {e}"))),
                }
            }
            (
                fds[0].revents().map_or(false, |r| !r.is_empty()),
                // Anything besides a clean POLLOUT (POLLERR, POLLHUP, or a
                // combination) counts as a device failure, not as writable
                fds[1].revents().map_or(false, |r| r == PollFlags::POLLOUT),
            )
        };

        // Stop request wins over pending device work
        if stopped {
            return Ok(());
        }

        if !writable {
            return Err(Error::Io("device left the writable state".to_string()));
        }

        if offset >= filled {
            filled = source.read_up_to(&mut data)?;
            if filled == 0 {
                // End of stream
                return Ok(());
            }
            offset = 0;
        }

        // Partial writes are expected; the remainder goes out on the next
        // writable cycle.
        offset += session.write(&data[offset..filled])?;
    }
}
