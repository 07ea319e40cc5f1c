//! Driver facade
//!
//! The entry points an embedding caller uses: open, play, cancel, destroy.
//! The facade owns the registry and the device backend and delegates
//! everything else; once a worker has started, the facade only reaches its
//! handle indirectly through cancel()/destroy().

use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DriverConfig;
use crate::device::oss::OssBackend;
use crate::device::{DeviceBackend, StreamSpec};
use crate::error::{Error, Result};
use crate::playback::registry::{Outstanding, Registry};
use crate::playback::wake::wake_channel;
use crate::playback::worker::Worker;
use crate::playback::FinishCallback;
use crate::source::SoundSource;

/// A sound-event playback driver instance.
///
/// `play` is asynchronous: it returns once the playback worker is running
/// and reports the eventual outcome through the completion callback. `cancel`
/// and `destroy` run synchronously on the caller's thread; `destroy` blocks
/// until every outstanding playback has wound down.
pub struct Driver {
    registry: Arc<Registry>,
    backend: Arc<dyn DeviceBackend>,
    config: DriverConfig,
}

impl Driver {
    /// Open a driver instance against the OSS backend.
    pub fn open(config: DriverConfig) -> Result<Self> {
        Self::open_with_backend(config, Arc::new(OssBackend))
    }

    /// Open a driver instance against a caller-supplied device backend.
    pub fn open_with_backend(
        config: DriverConfig,
        backend: Arc<dyn DeviceBackend>,
    ) -> Result<Self> {
        info!(
            device = config.device.as_deref().unwrap_or("default"),
            "opening sound-event driver"
        );
        Ok(Self {
            registry: Arc::new(Registry::new()),
            backend,
            config,
        })
    }

    /// Swap the configured device path.
    ///
    /// Applies to subsequent `play` calls only; in-flight playbacks keep the
    /// session they negotiated.
    pub fn change_device(&mut self, device: Option<String>) {
        debug!(device = device.as_deref().unwrap_or("default"), "device changed");
        self.config.device = device;
    }

    /// Pre-decoded sample caching is not supported by this backend.
    pub fn cache(&self) -> Result<()> {
        Err(Error::NotSupported("sample caching".to_string()))
    }

    /// Start playing `source`, correlated by the caller-assigned `id`.
    ///
    /// Ids need not be unique; `cancel(id)` affects every live playback with
    /// a matching id. Any failure before the worker starts is returned
    /// synchronously, the source is closed, and the callback is never
    /// invoked. Once this returns Ok, the outcome arrives exactly once
    /// through the callback (if one was supplied).
    pub fn play(
        &self,
        id: u32,
        source: Box<dyn SoundSource>,
        callback: Option<FinishCallback>,
    ) -> Result<()> {
        let spec = StreamSpec {
            format: source.sample_format(),
            channels: source.channel_count(),
            rate: source.sample_rate(),
        };
        if spec.channels == 0 || spec.rate == 0 || source.frame_size() == 0 {
            return Err(Error::Invalid(format!(
                "source described {} channels at {} Hz, {}-byte frames",
                spec.channels,
                spec.rate,
                source.frame_size()
            )));
        }
        // No channel mapping for multichannel streams; reject before a
        // device handle or thread exists.
        if spec.channels > 2 {
            return Err(Error::NotSupported(format!(
                "{} channels (at most 2)",
                spec.channels
            )));
        }

        let (wait, signal) = wake_channel()?;
        let session = self.backend.open(self.config.device.as_deref(), spec)?;

        let key = Uuid::new_v4();
        self.registry.insert(Outstanding {
            key,
            id,
            dead: false,
            callback,
            signal,
        })?;

        let worker = Worker {
            key,
            id,
            registry: Arc::clone(&self.registry),
            source,
            session,
            wake: wait,
        };

        let spawned = thread::Builder::new()
            .name(format!("soundcue-{id}"))
            .spawn(move || worker.run());

        if let Err(e) = spawned {
            // Unwind the registration; a play() that reports failure must
            // never also fire the callback.
            warn!(id, error = %e, "failed to spawn playback worker");
            self.registry.remove(key, || {});
            return Err(Error::OutOfMemory);
        }

        debug!(id, %key, ?spec, "playback started");
        Ok(())
    }

    /// Cancel every live playback whose id matches.
    ///
    /// Always succeeds; an id with no live handles is a no-op. Matching
    /// callbacks are invoked with [`Error::Cancelled`] before this returns;
    /// the workers terminate shortly after, at their next readiness check.
    pub fn cancel(&self, id: u32) {
        let claimed = self.registry.claim_matching(id);
        debug!(id, count = claimed.len(), "cancel requested");
        for cb in claimed {
            cb(id, Err(Error::Cancelled));
        }
    }

    /// Shut the instance down.
    ///
    /// Stops every outstanding playback, invokes its callback with
    /// [`Error::Destroyed`], and blocks until all workers have unlinked
    /// themselves and released their resources. Equivalent to dropping the
    /// driver; cannot fail, and returns immediately when nothing is playing.
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        let claimed = self.registry.begin_drain();
        info!(stopped = claimed.len(), "destroying sound-event driver");
        for (id, cb) in claimed {
            cb(id, Err(Error::Destroyed));
        }
        self.registry.wait_drained();
    }
}
