//! Decoded sound source contract
//!
//! Decoding is an external collaborator; the playback engine only needs the
//! stream geometry and a read-up-to-N-bytes operation. A source is closed by
//! dropping it, which happens on the worker thread once playback ends, or on
//! the caller's thread when `play()` fails before a worker starts.

use crate::error::Result;

/// Sample formats the backend can request from an output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Unsigned 8-bit
    U8,
    /// Signed 16-bit, native endian
    S16Ne,
    /// Signed 16-bit, reversed endian
    S16Re,
}

impl SampleFormat {
    /// Bytes per sample for a single channel.
    pub fn sample_size(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16Ne | SampleFormat::S16Re => 2,
        }
    }
}

/// A decoded audio stream ready for playback.
///
/// `read_up_to` fills the buffer with as many whole bytes as it can produce
/// in one call; the engine always offers a buffer sized to a whole multiple
/// of the frame size.
pub trait SoundSource: Send + 'static {
    /// Sample format of the decoded data.
    fn sample_format(&self) -> SampleFormat;

    /// Number of interleaved channels.
    fn channel_count(&self) -> u8;

    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Fill `buf` with up to `buf.len()` bytes of decoded audio.
    ///
    /// # Returns
    /// Number of bytes produced; zero means end of stream.
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Bytes per frame (one sample per channel).
    fn frame_size(&self) -> usize {
        self.sample_format().sample_size() * self.channel_count() as usize
    }
}
