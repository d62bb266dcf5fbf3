//! Gesture delivery
//!
//! The classifier never talks to the host directly. Gestures are handed to
//! a [`GestureSink`], which either queues them on a bounded channel,
//! injects them as Ctrl+key strokes through a uinput virtual keyboard, or
//! just logs them.

use crate::gesture::{GestureEvent, GestureKind, Modifier};
use anyhow::{Context, Result, anyhow};
use evdev::{AttributeSet, EventType, InputEvent, Key, uinput::VirtualDevice, uinput::VirtualDeviceBuilder};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use tracing::{info, warn};

/// Receives classified gestures
pub trait GestureSink: Send {
    fn deliver(&mut self, gesture: GestureEvent) -> Result<()>;
}

/// Bounded queue towards a consumer thread.
///
/// When the queue is full the newest gesture is dropped with a warning, so
/// a stalled consumer can never block the device reader.
pub struct ChannelSink {
    sender: SyncSender<GestureEvent>,
    dropped: u64,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<GestureEvent>) {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        (Self { sender, dropped: 0 }, receiver)
    }

    /// Gestures dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl GestureSink for ChannelSink {
    fn deliver(&mut self, gesture: GestureEvent) -> Result<()> {
        match self.sender.try_send(gesture) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(gesture)) => {
                self.dropped += 1;
                warn!("Gesture queue full, dropping {} ({} dropped so far)", gesture, self.dropped);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("Gesture receiver disconnected")),
        }
    }
}

/// Logs gestures instead of delivering them (dry run)
#[derive(Debug, Default)]
pub struct LogSink;

impl GestureSink for LogSink {
    fn deliver(&mut self, gesture: GestureEvent) -> Result<()> {
        let stroke = gesture.to_key_stroke();
        info!("Gesture: {} -> Ctrl+{:?} x{}", gesture, stroke.key, stroke.repeat);
        Ok(())
    }
}

/// Injects gestures as Ctrl+key strokes through a uinput virtual keyboard.
///
/// The repeat count is carried as key autorepeat: one press, `repeat - 1`
/// autorepeat events, one release.
pub struct UinputSink {
    vdev: VirtualDevice,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        keys.insert(Modifier::Control.key());
        for kind in [
            GestureKind::Click,
            GestureKind::LongClick,
            GestureKind::HoldStart,
            GestureKind::HoldStop,
            GestureKind::Lift,
        ] {
            keys.insert(kind.key());
        }

        let vdev = VirtualDeviceBuilder::new()
            .context("Failed to create uinput builder")?
            .name("Pengesture Virtual Keyboard")
            .with_keys(&keys)
            .context("Failed to set gesture key capabilities")?
            .build()
            .context("Failed to build uinput device")?;

        info!("Virtual gesture keyboard created");
        Ok(Self { vdev })
    }
}

/// Key events for one gesture, as they are written to uinput
pub fn key_stroke_events(gesture: &GestureEvent) -> Vec<InputEvent> {
    let stroke = gesture.to_key_stroke();
    let modifier = stroke.modifier.key().code();
    let key = stroke.key.code();
    let sync = || InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);

    let mut events = vec![
        InputEvent::new(EventType::KEY, modifier, 1),
        InputEvent::new(EventType::KEY, key, 1),
        sync(),
    ];
    for _ in 1..stroke.repeat {
        events.push(InputEvent::new(EventType::KEY, key, 2));
        events.push(sync());
    }
    events.push(InputEvent::new(EventType::KEY, key, 0));
    events.push(InputEvent::new(EventType::KEY, modifier, 0));
    events.push(sync());
    events
}

impl GestureSink for UinputSink {
    fn deliver(&mut self, gesture: GestureEvent) -> Result<()> {
        self.vdev
            .emit(&key_stroke_events(&gesture))
            .with_context(|| format!("Failed to inject {}", gesture))
    }
}
