//! Pen gesture classifier
//!
//! Turns the raw button/proximity/distance/pressure stream of a pen tablet
//! into clicks, press-and-hold, long clicks and lift-offs.
//!
//! The device is noisy: pressing the barrel button with the tip on the
//! surface produces a momentary distance change, and pulling the pen away
//! with the button held produces a button release. Both are filtered with
//! short debounce windows. A window is only re-evaluated when the next raw
//! event arrives; there is no timer.
//!
//! Each event runs through a fixed sequence of steps. A later step may
//! overwrite the gesture computed by an earlier one, so the step order is
//! also the gesture priority.

use crate::gesture::{GestureEvent, GestureKind};
use crate::protocol::{RawEvent, RawEventKind, Timestamp};
use std::time::Duration;
use tracing::{debug, trace};

/// Debounce and click windows, measured between event timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Max gap inside one device report cluster
    pub cycle: Duration,
    /// Contact after this long without a segment starts a new segment sequence
    pub segment_gap: Duration,
    /// Reserved minimum segment duration (not enforced)
    pub min_segment: Duration,
    /// Window in which a lift can still turn out to be an on-surface button click
    pub contact_click: Duration,
    /// Max press duration still counted as a click
    pub click: Duration,
    /// Max time after the last press before the sequence resolves
    pub double_click: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            cycle: Duration::from_millis(10),
            segment_gap: Duration::from_millis(400),
            min_segment: Duration::from_millis(50),
            contact_click: Duration::from_millis(10),
            click: Duration::from_millis(200),
            double_click: Duration::from_millis(400),
        }
    }
}

/// Whether the pen tip is on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactState {
    /// Not touching, or not touched since the last reset
    #[default]
    Away,
    Touching,
    /// Still touching as far as gestures are concerned, but a distance
    /// change was seen and may be a lift-off
    LiftPending {
        since: Timestamp,
        saw_button: bool,
        saw_zero_distance: bool,
    },
}

impl ContactState {
    pub fn in_contact(&self) -> bool {
        !matches!(self, ContactState::Away)
    }
}

/// Everything the classifier remembers between events
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifierState {
    /// Button presses in the current click/hold sequence
    pub click_count: u32,
    /// Pressure segments since the last segment sequence started
    pub segment_count: u32,
    /// A press was released inside the click window
    pub click_confirmed: bool,
    /// Open press-and-hold, with the count announced at its start
    pub hold: Option<u32>,
    pub long_click_candidate: bool,
    /// A long click goes out with the next event
    pub long_click_pending: bool,
    /// Tool left proximity at this time; reset pending confirmation
    pub abort_since: Option<Timestamp>,
    pub contact: ContactState,
    /// Button released at this time; pending confirmation
    pub release_since: Option<Timestamp>,
    pub last_press: Option<Timestamp>,
    pub last_segment: Option<Timestamp>,
}

impl ClassifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Tool went away and came back: drop the sequence, closing any open hold
    fn abort_sequence(&mut self) -> Option<GestureEvent> {
        self.click_confirmed = false;
        self.long_click_candidate = false;
        self.long_click_pending = false;
        self.contact = ContactState::Away;

        let stop = self.hold.take().map(|announced| {
            let count = self.click_count.max(announced);
            debug!("pen pulled away during hold, hold stop ({})", count);
            GestureEvent::new(GestureKind::HoldStop, count)
        });

        self.click_count = 0;
        self.segment_count = 0;
        stop
    }

    /// Button released between the click and double-click windows.
    ///
    /// Closes the open hold if there is one. A press released before any
    /// event announced its hold never produced a `HoldStart`, so it gets no
    /// `HoldStop` either and goes straight to a long click.
    fn release_hold(&mut self) -> Option<GestureEvent> {
        if self.hold.is_some() {
            Some(self.stop_hold())
        } else {
            if self.click_count > 0 {
                trace!("press released before hold was announced");
                self.long_click_pending = true;
            }
            None
        }
    }

    /// A new press while a hold is still open means the hold's release was
    /// never confirmed. Close it and start counting from scratch.
    fn close_stale_hold(&mut self) -> Option<GestureEvent> {
        let announced = self.hold.take()?;
        let count = self.click_count.max(announced);
        debug!("press during open hold, hold stop ({})", count);

        self.click_count = 0;
        self.click_confirmed = false;
        self.long_click_candidate = false;
        Some(GestureEvent::new(GestureKind::HoldStop, count))
    }

    /// Close the open hold. A hold that never touched the surface turns
    /// into a long click on the next event.
    fn stop_hold(&mut self) -> GestureEvent {
        let announced = self.hold.take().unwrap_or(0);
        let count = self.click_count.max(announced);
        debug!("hold stop ({})", count);

        if self.long_click_candidate {
            self.click_count = count;
            self.long_click_pending = true;
        } else {
            self.click_count = 0;
        }
        GestureEvent::new(GestureKind::HoldStop, count)
    }
}

/// Classify one raw event.
///
/// Events must be fed in arrival order. Returns the gesture this event
/// completes, if any.
pub fn classify(
    state: &mut ClassifierState,
    timings: &Timings,
    ev: RawEvent,
) -> Option<GestureEvent> {
    let now = ev.timestamp;
    let mut output = None;

    // Pulling the pen away emits BTN_TOOL_PEN=0, then SYN and possibly a
    // button release. The next other event decides whether it came back.
    if let Some(since) = state.abort_since {
        if !matches!(ev.kind, RawEventKind::Sync | RawEventKind::Button) {
            state.abort_since = None;
            if now.saturating_duration_since(since) > timings.cycle {
                trace!("tool re-approached, resetting sequence");
                if let Some(stop) = state.abort_sequence() {
                    output = Some(stop);
                }
            }
        }
    }

    if ev.kind == RawEventKind::ToolPresence && ev.value == 0 {
        state.abort_since = Some(now);
    }

    match state.contact {
        ContactState::LiftPending {
            since,
            saw_button,
            saw_zero_distance,
        } => {
            if now.saturating_duration_since(since) > timings.contact_click {
                state.contact = ContactState::Away;
                if state.segment_count > 0 {
                    debug!("pen lift ({} segments in this sequence)", state.segment_count);
                    output = Some(GestureEvent::new(GestureKind::Lift, state.segment_count));
                } else {
                    trace!("pen lift without pressure segments, not reported");
                }
            } else {
                let saw_button = saw_button || ev.kind == RawEventKind::Button;
                let saw_zero_distance = saw_zero_distance || ev.is_zero_distance();
                state.contact = if saw_button && saw_zero_distance {
                    trace!("button click on surface, ignoring lift");
                    ContactState::Touching
                } else {
                    ContactState::LiftPending {
                        since,
                        saw_button,
                        saw_zero_distance,
                    }
                };
            }
        }
        ContactState::Touching => {
            if ev.kind == RawEventKind::Distance {
                state.contact = ContactState::LiftPending {
                    since: now,
                    saw_button: false,
                    saw_zero_distance: false,
                };
            }
        }
        ContactState::Away => {
            if ev.is_zero_distance() {
                debug!("pen contact");
                let new_sequence = state
                    .last_segment
                    .is_none_or(|at| now.saturating_duration_since(at) > timings.segment_gap);
                if new_sequence {
                    state.segment_count = 0;
                }
                state.contact = ContactState::Touching;
            }
        }
    }

    // A real release is followed by more reports within one cycle. A
    // release produced by pulling the pen away is followed by silence.
    let mut released = false;
    if ev.kind != RawEventKind::Sync {
        if let Some(since) = state.release_since.take() {
            if now.saturating_duration_since(since) < timings.cycle {
                released = true;
            } else {
                trace!("button release caused by pulling pen away");
            }
        }
    }

    if ev.is_button_up() {
        state.release_since = Some(now);
    }

    if state.hold.is_some() && ev.kind == RawEventKind::Pressure {
        state.long_click_candidate = false;
    }

    if ev.kind == RawEventKind::Pressure && ev.value == 0 {
        state.segment_count += 1;
        state.last_segment = Some(now);
    }

    if ev.is_button_down() {
        if state.contact.in_contact() {
            debug!("pen contact press");
        } else {
            if let Some(stop) = state.close_stale_hold() {
                output = Some(stop);
            }
            state.last_press = Some(now);
            state.click_count += 1;
            state.click_confirmed = false;
        }
    }

    if state.long_click_pending {
        debug!("pen long click ({})", state.click_count);
        output = Some(GestureEvent::new(GestureKind::LongClick, state.click_count));
        state.click_count = 0;
        state.long_click_pending = false;
        state.long_click_candidate = false;
    }

    if state.click_count > 0 {
        if let Some(pressed_at) = state.last_press {
            let elapsed = now.saturating_duration_since(pressed_at);

            if elapsed < timings.click {
                if released {
                    state.click_confirmed = true;
                }
            } else if elapsed < timings.double_click {
                if !state.click_confirmed {
                    if released {
                        if let Some(stop) = state.release_hold() {
                            output = Some(stop);
                        }
                    } else if state.hold.is_none() {
                        debug!("pen hold start ({})", state.click_count);
                        output = Some(GestureEvent::new(GestureKind::HoldStart, state.click_count));
                        state.hold = Some(state.click_count);
                        state.long_click_candidate = true;
                    }
                }
            } else {
                if state.click_confirmed {
                    debug!("pen click ({})", state.click_count);
                    output = Some(GestureEvent::new(GestureKind::Click, state.click_count));
                    state.click_confirmed = false;
                    state.click_count = 0;
                }
                if released {
                    if state.hold.is_some() {
                        output = Some(state.stop_hold());
                    } else {
                        trace!("release after double-click window, dropping sequence");
                        state.click_count = 0;
                    }
                }
            }
        }
    }

    output
}

/// Owns a classifier state for one device session
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    state: ClassifierState,
    timings: Timings,
}

impl GestureClassifier {
    pub fn new(timings: Timings) -> Self {
        Self {
            state: ClassifierState::new(),
            timings,
        }
    }

    pub fn classify(&mut self, ev: RawEvent) -> Option<GestureEvent> {
        classify(&mut self.state, &self.timings, ev)
    }

    /// Forget everything, as at session start
    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }
}
