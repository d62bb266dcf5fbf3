//! Pen event sources
//!
//! [`TabletDevice`] reads a live tablet node through `evdev`: it opens the
//! node once, runs the diagnostic grab probe, switches the fd to
//! non-blocking and turns fetched events into [`RawEvent`]s.
//! [`CaptureReader`] replays a recorded `input_event` dump instead. Both
//! sit behind [`EventSource`] so the session loop does not care which one
//! it drives.

use crate::protocol::{RECORD_SIZE, RawEvent, RecordBuffer};
use evdev::Device;
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Records fetched per capture read
const READ_RECORDS: usize = 16;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Cannot open input device {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Input device {0:?} was disconnected")]
    Disconnected(PathBuf),

    #[error("Got EOF from input device {0:?}")]
    EndOfStream(PathBuf),

    #[error("Could not read from input device {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeviceError {
    /// Whether the session has to stop for good
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DeviceError::Read { .. })
    }
}

/// Result of a single read
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Events(Vec<RawEvent>),
    /// Nothing complete yet: would block, interrupted, or a partial record
    Pending,
}

/// Anything the session loop can pull pen events from
pub trait EventSource {
    fn path(&self) -> &Path;

    /// Read once without blocking
    fn read_events(&mut self) -> Result<ReadOutcome, DeviceError>;
}

/// Map a failed read to a retry or a device error
fn read_error(path: &Path, e: io::Error) -> Result<ReadOutcome, DeviceError> {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(ReadOutcome::Pending),
        _ if e.raw_os_error() == Some(libc::ENODEV) => {
            Err(DeviceError::Disconnected(path.to_path_buf()))
        }
        _ => Err(DeviceError::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// An open tablet event node
pub struct TabletDevice {
    path: PathBuf,
    device: Device,
}

impl TabletDevice {
    /// Open the device and make it non-blocking.
    ///
    /// Also checks whether another process holds an exclusive grab and logs
    /// the device name. Neither is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        info!("Using tablet device {:?}", path);

        let open_error = |source| DeviceError::Open {
            path: path.to_path_buf(),
            source,
        };
        let mut device = Device::open(path).map_err(open_error)?;
        set_nonblocking(&device).map_err(open_error)?;

        match device.name() {
            Some(name) => debug!("{:?}: device name: {}", path, name),
            None => debug!("{:?}: device has no name", path),
        }
        probe_grab(&mut device, path);

        Ok(Self {
            path: path.to_path_buf(),
            device,
        })
    }
}

impl EventSource for TabletDevice {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_events(&mut self) -> Result<ReadOutcome, DeviceError> {
        match self.device.fetch_events() {
            Ok(events) => {
                let events: Vec<RawEvent> = events.map(RawEvent::from).collect();
                if events.is_empty() {
                    Ok(ReadOutcome::Pending)
                } else {
                    Ok(ReadOutcome::Events(events))
                }
            }
            Err(e) => read_error(&self.path, e),
        }
    }
}

/// Grab and release at once, only to warn about a competing reader
fn probe_grab(device: &mut Device, path: &Path) {
    match device.grab() {
        Ok(()) => {
            if let Err(e) = device.ungrab() {
                warn!("{:?}: failed to release probe grab: {}", path, e);
            }
        }
        Err(_) => {
            warn!(
                "{:?}: The device is grabbed by another process. Events may be delivered twice.",
                path
            );
        }
    }
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let raw_fd = device.as_raw_fd();

    // Keep the existing flags, only add O_NONBLOCK.
    let current = unsafe { libc::fcntl(raw_fd, libc::F_GETFL) };
    if current < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { libc::fcntl(raw_fd, libc::F_SETFL, current | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Replays a byte stream of `input_event` records, e.g. a capture file
#[derive(Debug)]
pub struct CaptureReader<R> {
    path: PathBuf,
    reader: R,
    buffer: RecordBuffer,
}

impl<R: Read> CaptureReader<R> {
    pub fn new(path: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            path: path.into(),
            reader,
            buffer: RecordBuffer::new(),
        }
    }
}

impl<R: Read> EventSource for CaptureReader<R> {
    fn path(&self) -> &Path {
        &self.path
    }

    /// Fatal errors discard any buffered partial record.
    fn read_events(&mut self) -> Result<ReadOutcome, DeviceError> {
        let mut chunk = [0u8; RECORD_SIZE * READ_RECORDS];

        match self.reader.read(&mut chunk) {
            Ok(0) => {
                self.buffer.clear();
                Err(DeviceError::EndOfStream(self.path.clone()))
            }
            Ok(len) => {
                self.buffer.push(&chunk[..len]);
                let records = self.buffer.drain_records();
                if records.is_empty() {
                    Ok(ReadOutcome::Pending)
                } else {
                    Ok(ReadOutcome::Events(records.into_iter().map(RawEvent::from).collect()))
                }
            }
            Err(e) => {
                let outcome = read_error(&self.path, e);
                if outcome.as_ref().is_err_and(DeviceError::is_fatal) {
                    self.buffer.clear();
                }
                outcome
            }
        }
    }
}
