//! OSS device backend
//!
//! Opens the PCM device non-blocking so a busy device fails fast instead of
//! hanging, switches the descriptor back to blocking before use, then
//! negotiates sample format, channel count, and rate through the SNDCTL
//! ioctls.

use std::fs::File;
use std::io::Write;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use tracing::debug;

use crate::device::{verify_exact, verify_rate, DeviceBackend, DeviceSession, StreamSpec};
use crate::error::{translate_errno, translate_io, Error, Result};
use crate::source::SampleFormat;

/// Device path used when none is configured.
pub const DEFAULT_DEVICE: &str = "/dev/dsp";

const AFMT_U8: u32 = 0x0000_0008;
const AFMT_S16_LE: u32 = 0x0000_0010;
const AFMT_S16_BE: u32 = 0x0000_0020;

#[cfg(target_endian = "little")]
const AFMT_S16_NE: u32 = AFMT_S16_LE;
#[cfg(target_endian = "little")]
const AFMT_S16_RE: u32 = AFMT_S16_BE;
#[cfg(target_endian = "big")]
const AFMT_S16_NE: u32 = AFMT_S16_BE;
#[cfg(target_endian = "big")]
const AFMT_S16_RE: u32 = AFMT_S16_LE;

const SNDCTL_DSP_MAGIC: u8 = b'P';
const SNDCTL_DSP_SPEED: u8 = 2;
const SNDCTL_DSP_SETFMT: u8 = 5;
const SNDCTL_DSP_CHANNELS: u8 = 6;

nix::ioctl_readwrite!(dsp_set_format, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SETFMT, u32);
nix::ioctl_readwrite!(dsp_set_channels, SNDCTL_DSP_MAGIC, SNDCTL_DSP_CHANNELS, i32);
nix::ioctl_readwrite!(dsp_set_speed, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SPEED, i32);

fn afmt_code(format: SampleFormat) -> u32 {
    match format {
        SampleFormat::U8 => AFMT_U8,
        SampleFormat::S16Ne => AFMT_S16_NE,
        SampleFormat::S16Re => AFMT_S16_RE,
    }
}

/// OSS PCM output backend.
pub struct OssBackend;

impl DeviceBackend for OssBackend {
    fn open(&self, path: Option<&str>, spec: StreamSpec) -> Result<Box<dyn DeviceSession>> {
        let path = path.unwrap_or(DEFAULT_DEVICE);

        let file = File::options()
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(path)
            .map_err(|e| translate_io(&e, path))?;

        // Back to blocking: the worker relies on poll() for pacing and on
        // write() taking whatever the device currently has room for.
        let raw = file.as_raw_fd();
        let mode = unsafe { libc::fcntl(raw, libc::F_GETFL) };
        if mode < 0 {
            return Err(translate_errno(Errno::last(), path));
        }
        if unsafe { libc::fcntl(raw, libc::F_SETFL, mode & !libc::O_NONBLOCK) } < 0 {
            return Err(translate_errno(Errno::last(), path));
        }

        let requested_format = afmt_code(spec.format);
        let mut format = requested_format;
        unsafe { dsp_set_format(raw, &mut format) }
            .map_err(|e| translate_errno(e, "SNDCTL_DSP_SETFMT"))?;
        verify_exact("sample format", requested_format, format)?;

        let requested_channels = i32::from(spec.channels);
        let mut channels = requested_channels;
        unsafe { dsp_set_channels(raw, &mut channels) }
            .map_err(|e| translate_errno(e, "SNDCTL_DSP_CHANNELS"))?;
        verify_exact("channel count", requested_channels, channels)?;

        let mut rate = spec.rate as i32;
        unsafe { dsp_set_speed(raw, &mut rate) }
            .map_err(|e| translate_errno(e, "SNDCTL_DSP_SPEED"))?;
        verify_rate(spec.rate, rate as u32)?;

        debug!(path, granted_rate = rate, ?spec, "negotiated OSS device");

        Ok(Box::new(OssSession { file }))
    }
}

struct OssSession {
    file: File,
}

impl DeviceSession for OssSession {
    fn pollable_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self.file.write(buf) {
            Ok(0) => Err(Error::Io("device accepted no data".to_string())),
            Ok(n) => Ok(n),
            Err(e) => Err(translate_io(&e, "device write")),
        }
    }
}
