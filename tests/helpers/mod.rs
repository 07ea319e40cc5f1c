//! Shared helpers for integration tests
//!
//! A pipe-backed device backend (so the lifecycle engine runs against a real
//! pollable descriptor without audio hardware) and a few synthetic sound
//! sources.

#![allow(dead_code)]

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use soundcue::device::{verify_exact, verify_rate, DeviceBackend, DeviceSession, StreamSpec};
use soundcue::{Error, FinishCallback, Result, SampleFormat, SoundSource};

/// Install a test tracing subscriber (no-op when one is already set).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How the fake device behaves once opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceMode {
    /// A reader thread drains the pipe, so the device is always writable.
    Drained,
    /// Nobody reads: after the pipe's capacity fills, the device stops
    /// polling writable and the worker parks in its readiness wait.
    Backpressure,
}

/// Device backend over an OS pipe.
///
/// Negotiation follows the production policy (format and channels exact,
/// rate within tolerance) against configurable "granted" replies, so tests
/// can drive every rejection path.
pub struct PipeBackend {
    mode: DeviceMode,
    grant_format: Option<SampleFormat>,
    grant_channels: Option<u8>,
    grant_rate: Option<u32>,
    opens: AtomicUsize,
    // Read ends kept open in Backpressure mode
    parked_readers: Mutex<Vec<File>>,
}

impl PipeBackend {
    pub fn drained() -> Self {
        Self::new(DeviceMode::Drained)
    }

    pub fn backpressure() -> Self {
        Self::new(DeviceMode::Backpressure)
    }

    fn new(mode: DeviceMode) -> Self {
        Self {
            mode,
            grant_format: None,
            grant_channels: None,
            grant_rate: None,
            opens: AtomicUsize::new(0),
            parked_readers: Mutex::new(Vec::new()),
        }
    }

    /// Pretend the device granted this format regardless of the request.
    pub fn granting_format(mut self, format: SampleFormat) -> Self {
        self.grant_format = Some(format);
        self
    }

    /// Pretend the device granted this channel count.
    pub fn granting_channels(mut self, channels: u8) -> Self {
        self.grant_channels = Some(channels);
        self
    }

    /// Pretend the device granted this sample rate.
    pub fn granting_rate(mut self, rate: u32) -> Self {
        self.grant_rate = Some(rate);
        self
    }

    /// Number of open attempts that reached the backend.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Close every parked read end, erroring the open sessions' descriptors.
    pub fn drop_readers(&self) {
        self.parked_readers.lock().unwrap().clear();
    }
}

impl DeviceBackend for PipeBackend {
    fn open(&self, _path: Option<&str>, spec: StreamSpec) -> Result<Box<dyn DeviceSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        verify_exact(
            "sample format",
            spec.format,
            self.grant_format.unwrap_or(spec.format),
        )?;
        verify_exact(
            "channel count",
            spec.channels,
            self.grant_channels.unwrap_or(spec.channels),
        )?;
        verify_rate(spec.rate, self.grant_rate.unwrap_or(spec.rate))?;

        let (read, write) =
            pipe2(OFlag::O_CLOEXEC).map_err(|e| Error::SystemFailure(format!("pipe: {e}")))?;
        let mut reader = File::from(read);

        match self.mode {
            DeviceMode::Drained => {
                // Exits on EOF once the session's write end closes
                thread::spawn(move || {
                    let mut sink = [0u8; 8192];
                    while matches!(reader.read(&mut sink), Ok(n) if n > 0) {}
                });
            }
            DeviceMode::Backpressure => {
                self.parked_readers.lock().unwrap().push(reader);
            }
        }

        Ok(Box::new(PipeSession {
            file: File::from(write),
        }))
    }
}

struct PipeSession {
    file: File,
}

impl DeviceSession for PipeSession {
    fn pollable_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.file
            .write(buf)
            .map_err(|e| Error::Io(format!("pipe device: {e}")))
    }
}

/// Fixed-length source of silence.
pub struct MemorySource {
    format: SampleFormat,
    channels: u8,
    rate: u32,
    remaining: usize,
    chunk_delay: Duration,
    released: Option<Arc<AtomicBool>>,
}

impl MemorySource {
    /// Stereo signed-16 silence at 44.1 kHz, `frames` frames long.
    pub fn silence(frames: usize) -> Self {
        Self::new(SampleFormat::S16Ne, 2, 44100, frames)
    }

    pub fn new(format: SampleFormat, channels: u8, rate: u32, frames: usize) -> Self {
        Self {
            format,
            channels,
            rate,
            remaining: frames * format.sample_size() * channels as usize,
            chunk_delay: Duration::ZERO,
            released: None,
        }
    }

    /// Pace the stream: sleep this long inside every read.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Set `flag` when the source is dropped (closed by its worker).
    pub fn with_release_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.released = Some(flag);
        self
    }
}

impl SoundSource for MemorySource {
    fn sample_format(&self) -> SampleFormat {
        self.format
    }
    fn channel_count(&self) -> u8 {
        self.channels
    }
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.chunk_delay.is_zero() {
            thread::sleep(self.chunk_delay);
        }
        let n = buf.len().min(self.remaining);
        buf[..n].fill(0);
        self.remaining -= n;
        Ok(n)
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        if let Some(flag) = &self.released {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Source that never reaches end of stream; playback only ends via
/// cancel/destroy or a device error.
pub struct EndlessSource {
    released: Option<Arc<AtomicBool>>,
}

impl EndlessSource {
    pub fn new() -> Self {
        Self { released: None }
    }

    pub fn with_release_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.released = Some(flag);
        self
    }
}

impl SoundSource for EndlessSource {
    fn sample_format(&self) -> SampleFormat {
        SampleFormat::S16Ne
    }
    fn channel_count(&self) -> u8 {
        2
    }
    fn sample_rate(&self) -> u32 {
        44100
    }

    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }
}

impl Drop for EndlessSource {
    fn drop(&mut self) {
        if let Some(flag) = &self.released {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Source reporting a broken frame geometry (frame size of zero).
pub struct ZeroFrameSource;

impl SoundSource for ZeroFrameSource {
    fn sample_format(&self) -> SampleFormat {
        SampleFormat::S16Ne
    }
    fn channel_count(&self) -> u8 {
        2
    }
    fn sample_rate(&self) -> u32 {
        44100
    }
    fn frame_size(&self) -> usize {
        0
    }

    fn read_up_to(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }
}

/// Source whose first read panics, killing the worker thread mid-stream.
pub struct PanickingSource;

impl SoundSource for PanickingSource {
    fn sample_format(&self) -> SampleFormat {
        SampleFormat::S16Ne
    }
    fn channel_count(&self) -> u8 {
        2
    }
    fn sample_rate(&self) -> u32 {
        44100
    }

    fn read_up_to(&mut self, _buf: &mut [u8]) -> Result<usize> {
        panic!("simulated decoder crash");
    }
}

/// Source that produces one chunk, then fails the next read.
pub struct FailingSource {
    chunks_before_error: usize,
}

impl FailingSource {
    pub fn new(chunks_before_error: usize) -> Self {
        Self { chunks_before_error }
    }
}

impl SoundSource for FailingSource {
    fn sample_format(&self) -> SampleFormat {
        SampleFormat::S16Ne
    }
    fn channel_count(&self) -> u8 {
        2
    }
    fn sample_rate(&self) -> u32 {
        44100
    }

    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.chunks_before_error == 0 {
            return Err(Error::Io("simulated decode failure".to_string()));
        }
        self.chunks_before_error -= 1;
        buf.fill(0);
        Ok(buf.len())
    }
}

/// Outcome delivered to a completion callback.
pub type Outcome = (u32, Result<()>);

/// Callback that forwards its outcome onto a channel.
pub fn channel_callback(tx: mpsc::Sender<Outcome>) -> FinishCallback {
    Box::new(move |id, result| {
        let _ = tx.send((id, result));
    })
}

/// Callback that counts invocations.
pub fn counting_callback(counter: Arc<AtomicUsize>) -> FinishCallback {
    Box::new(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

/// Wait until `flag` becomes true, panicking after `timeout`.
pub fn wait_for_flag(flag: &AtomicBool, timeout: Duration, what: &str) {
    let deadline = Instant::now() + timeout;
    while !flag.load(Ordering::SeqCst) {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}
