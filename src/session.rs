//! Device session: a worker thread that owns the device reader and the
//! classifier, and hands gestures to a sink.

use crate::classifier::{GestureClassifier, Timings};
use crate::device::{DeviceError, EventSource, ReadOutcome, TabletDevice};
use crate::gesture::GestureEvent;
use crate::protocol::RawEvent;
use crate::sink::GestureSink;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub device: PathBuf,
    pub timings: Timings,
    /// Sleep between reads while the device has nothing to say
    pub poll_interval: Duration,
}

/// A running device session.
///
/// Dropping the session stops the worker and waits for it.
pub struct TabletSession {
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl TabletSession {
    /// Open the configured device on a worker thread and start classifying.
    ///
    /// If the device cannot be opened the worker logs a warning and exits;
    /// the session stays inert.
    pub fn start(config: SessionConfig, sink: Box<dyn GestureSink>) -> Self {
        Self::spawn(move |stop| {
            let mut device = match TabletDevice::open(&config.device) {
                Ok(device) => device,
                Err(e) => {
                    warn!("{e}; pen gestures are disabled");
                    return Ok(());
                }
            };
            run_reader_loop(&stop, &mut device, config.timings, config.poll_interval, sink)
        })
    }

    /// Classify events from an already open source, e.g. a recorded capture
    pub fn from_source<S>(
        mut source: S,
        timings: Timings,
        poll_interval: Duration,
        sink: Box<dyn GestureSink>,
    ) -> Self
    where
        S: EventSource + Send + 'static,
    {
        Self::spawn(move |stop| run_reader_loop(&stop, &mut source, timings, poll_interval, sink))
    }

    fn spawn<F>(body: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) -> Result<()> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();

        let join = thread::spawn(move || {
            if let Err(e) = body(stop_thread) {
                warn!("tablet session stopped: {e:#}");
            }
        });

        Self {
            stop,
            join: Some(join),
        }
    }

    /// Whether the worker is still reading
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the session
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                warn!("tablet session worker panicked");
            }
        }
    }
}

impl Drop for TabletSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Read, classify and deliver until stopped or the source goes away.
///
/// Returns `Ok(())` when stopped through `stop` or at end of stream.
pub fn run_reader_loop<S: EventSource + ?Sized>(
    stop: &AtomicBool,
    source: &mut S,
    timings: Timings,
    poll_interval: Duration,
    mut sink: Box<dyn GestureSink>,
) -> Result<()> {
    let mut classifier = GestureClassifier::new(timings);
    info!(
        "Classifying pen events from {:?} with {:?}",
        source.path(),
        classifier.timings()
    );

    while !stop.load(Ordering::Relaxed) {
        match source.read_events() {
            Ok(ReadOutcome::Events(events)) => {
                for ev in events {
                    if let Some(gesture) = classifier.classify(ev) {
                        sink.deliver(gesture).context("Failed to deliver gesture")?;
                    }
                }
            }
            Ok(ReadOutcome::Pending) => thread::sleep(poll_interval),
            Err(e) if e.is_fatal() => {
                warn!("{e}");
                return match e {
                    DeviceError::EndOfStream(_) => Ok(()),
                    e => Err(e.into()),
                };
            }
            Err(e) => {
                warn!("{e}");
                thread::sleep(poll_interval);
            }
        }
    }

    info!("Tablet session for {:?} shutting down", source.path());
    Ok(())
}

/// Classify a finite event sequence with a fresh classifier
pub fn run_classifier<I>(events: I, timings: Timings) -> Vec<GestureEvent>
where
    I: IntoIterator<Item = RawEvent>,
{
    let mut classifier = GestureClassifier::new(timings);
    events
        .into_iter()
        .filter_map(|ev| classifier.classify(ev))
        .collect()
}
