//! Pengesture - pen tablet gesture recognition
//!
//! Reads raw evdev events from a pen tablet and classifies them into
//! clicks, press-and-hold, long clicks and pen lifts.
//!
//! The pipeline is: a [`device::EventSource`] produces [`protocol::RawEvent`]s,
//! [`classifier::GestureClassifier`] turns them into
//! [`gesture::GestureEvent`]s, and a [`sink::GestureSink`] delivers them.
//! [`session::TabletSession`] runs the whole thing on a worker thread.

pub mod classifier;
pub mod device;
pub mod gesture;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod sink;

pub use classifier::{ClassifierState, ContactState, GestureClassifier, Timings, classify};
pub use gesture::{GestureEvent, GestureKind, KeyStroke, Modifier};
pub use protocol::{InputRecord, RawEvent, RawEventKind, Timestamp};
pub use session::{SessionConfig, TabletSession, run_classifier};
pub use sink::{ChannelSink, GestureSink, LogSink, UinputSink};
