//! Pen event model and the `input_event` capture format
//!
//! Live devices are read through `evdev`, which hands out [`InputEvent`]s.
//! Recorded captures (`--replay`) are plain dumps of the kernel's
//! `struct input_event` records. On 64-bit Linux the layout is:
//!
//! - Bytes 0-7:   `time.tv_sec`  (i64, native endian)
//! - Bytes 8-15:  `time.tv_usec` (i64, native endian)
//! - Bytes 16-17: `type`  (u16)
//! - Bytes 18-19: `code`  (u16)
//! - Bytes 20-23: `value` (i32)
//!
//! Reads from a capture may return partial records, so bytes are
//! accumulated in a [`RecordBuffer`] until whole records can be decoded.
//! Both sources end up as [`RawEvent`]s.

use evdev::{AbsoluteAxisType, EventType, InputEvent, Key};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Size of one `input_event` record in bytes
pub const RECORD_SIZE: usize = 24;

const EV_SYN: u16 = EventType::SYNCHRONIZATION.0;
const EV_KEY: u16 = EventType::KEY.0;
const EV_ABS: u16 = EventType::ABSOLUTE.0;

const BTN_TOOL_PEN: u16 = Key::BTN_TOOL_PEN.0;
const BTN_STYLUS: u16 = Key::BTN_STYLUS.0;
const ABS_PRESSURE: u16 = AbsoluteAxisType::ABS_PRESSURE.0;
const ABS_DISTANCE: u16 = AbsoluteAxisType::ABS_DISTANCE.0;

/// A point in device time with microsecond resolution.
///
/// The epoch is whatever clock the kernel stamps events with; only
/// differences between two timestamps are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    micros: i64,
}

impl Timestamp {
    /// Build a timestamp from a `timeval` pair
    pub fn from_timeval(sec: i64, usec: i64) -> Self {
        Self {
            micros: sec.saturating_mul(1_000_000).saturating_add(usec),
        }
    }

    pub fn from_millis(ms: i64) -> Self {
        Self {
            micros: ms.saturating_mul(1_000),
        }
    }

    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Convert an evdev event time; times before the epoch come out negative
    pub fn from_system_time(time: SystemTime) -> Self {
        let micros = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_micros()).unwrap_or(i64::MAX),
            Err(e) => i64::try_from(e.duration().as_micros())
                .map(|before| -before)
                .unwrap_or(i64::MIN),
        };
        Self { micros }
    }

    pub fn as_micros(&self) -> i64 {
        self.micros
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        let delta = self.micros.saturating_sub(earlier.micros);
        if delta <= 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(delta as u64)
        }
    }
}

/// One raw `input_event` record as stored in a capture file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRecord {
    pub time_sec: i64,
    pub time_usec: i64,
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl InputRecord {
    pub fn new(kind: u16, code: u16, value: i32, timestamp: Timestamp) -> Self {
        let micros = timestamp.as_micros();
        Self {
            time_sec: micros.div_euclid(1_000_000),
            time_usec: micros.rem_euclid(1_000_000),
            kind,
            code,
            value,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_timeval(self.time_sec, self.time_usec)
    }

    /// Decode a record from its wire bytes
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let mut sec = [0u8; 8];
        let mut usec = [0u8; 8];
        let mut value = [0u8; 4];
        sec.copy_from_slice(&bytes[0..8]);
        usec.copy_from_slice(&bytes[8..16]);
        value.copy_from_slice(&bytes[20..24]);

        Self {
            time_sec: i64::from_ne_bytes(sec),
            time_usec: i64::from_ne_bytes(usec),
            kind: u16::from_ne_bytes([bytes[16], bytes[17]]),
            code: u16::from_ne_bytes([bytes[18], bytes[19]]),
            value: i32::from_ne_bytes(value),
        }
    }

    /// Encode a record to its wire bytes
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0..8].copy_from_slice(&self.time_sec.to_ne_bytes());
        bytes[8..16].copy_from_slice(&self.time_usec.to_ne_bytes());
        bytes[16..18].copy_from_slice(&self.kind.to_ne_bytes());
        bytes[18..20].copy_from_slice(&self.code.to_ne_bytes());
        bytes[20..24].copy_from_slice(&self.value.to_ne_bytes());
        bytes
    }
}

/// Accumulates bytes from partial reads into whole records
#[derive(Debug, Default)]
pub struct RecordBuffer {
    bytes: Vec<u8>,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(RECORD_SIZE * 8),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Number of bytes belonging to an incomplete trailing record
    pub fn pending_bytes(&self) -> usize {
        self.bytes.len() % RECORD_SIZE
    }

    /// Decode every complete record, keeping any partial remainder
    pub fn drain_records(&mut self) -> Vec<InputRecord> {
        let whole = self.bytes.len() - self.pending_bytes();
        let records = self.bytes[..whole]
            .chunks_exact(RECORD_SIZE)
            .map(|chunk| {
                let mut record = [0u8; RECORD_SIZE];
                record.copy_from_slice(chunk);
                InputRecord::from_bytes(&record)
            })
            .collect();
        self.bytes.drain(..whole);
        records
    }

    /// Drop any buffered partial record
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

/// The event kinds the gesture classifier distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    /// End of an event cluster (`EV_SYN`)
    Sync,
    /// Tool entering (1) or leaving (0) proximity (`BTN_TOOL_PEN`)
    ToolPresence,
    /// Stylus barrel button, 1 = down, 0 = up (`BTN_STYLUS`)
    Button,
    /// Distance to the surface, 0 = touching (`ABS_DISTANCE`)
    Distance,
    /// Tip pressure, 0 = no pressure (`ABS_PRESSURE`)
    Pressure,
    /// Anything else the device reports (position, tilt, misc)
    Other,
}

impl RawEventKind {
    /// Map an evdev `(type, code)` pair to the kind the classifier cares about
    pub fn classify(kind: u16, code: u16) -> Self {
        match (kind, code) {
            (EV_SYN, _) => RawEventKind::Sync,
            (EV_KEY, BTN_TOOL_PEN) => RawEventKind::ToolPresence,
            (EV_KEY, BTN_STYLUS) => RawEventKind::Button,
            (EV_ABS, ABS_DISTANCE) => RawEventKind::Distance,
            (EV_ABS, ABS_PRESSURE) => RawEventKind::Pressure,
            _ => RawEventKind::Other,
        }
    }
}

/// One hardware transition, as seen by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub value: i32,
    pub timestamp: Timestamp,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, value: i32, timestamp: Timestamp) -> Self {
        Self {
            kind,
            value,
            timestamp,
        }
    }

    pub fn sync(at: Timestamp) -> Self {
        Self::new(RawEventKind::Sync, 0, at)
    }

    pub fn button(pressed: bool, at: Timestamp) -> Self {
        Self::new(RawEventKind::Button, i32::from(pressed), at)
    }

    pub fn tool(in_proximity: bool, at: Timestamp) -> Self {
        Self::new(RawEventKind::ToolPresence, i32::from(in_proximity), at)
    }

    pub fn distance(value: i32, at: Timestamp) -> Self {
        Self::new(RawEventKind::Distance, value, at)
    }

    pub fn pressure(value: i32, at: Timestamp) -> Self {
        Self::new(RawEventKind::Pressure, value, at)
    }

    pub fn other(value: i32, at: Timestamp) -> Self {
        Self::new(RawEventKind::Other, value, at)
    }

    pub fn is_button_down(&self) -> bool {
        self.kind == RawEventKind::Button && self.value == 1
    }

    pub fn is_button_up(&self) -> bool {
        self.kind == RawEventKind::Button && self.value == 0
    }

    pub fn is_zero_distance(&self) -> bool {
        self.kind == RawEventKind::Distance && self.value == 0
    }
}

impl From<InputRecord> for RawEvent {
    fn from(record: InputRecord) -> Self {
        Self {
            kind: RawEventKind::classify(record.kind, record.code),
            value: record.value,
            timestamp: record.timestamp(),
        }
    }
}

impl From<InputEvent> for RawEvent {
    fn from(ev: InputEvent) -> Self {
        Self {
            kind: RawEventKind::classify(ev.event_type().0, ev.code()),
            value: ev.value(),
            timestamp: Timestamp::from_system_time(ev.timestamp()),
        }
    }
}
