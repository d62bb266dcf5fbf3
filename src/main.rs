//! Pengesture - pen tablet gesture daemon
//!
//! Classifies pen events from a tablet and injects the resulting gestures
//! as Ctrl+key strokes.

use anyhow::{Context, Result, bail};
use pengesture::device::CaptureReader;
use pengesture::settings::{AppSettings, SinkKind};
use pengesture::{ChannelSink, GestureSink, LogSink, SessionConfig, TabletSession, UinputSink};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::RecvTimeoutError,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: pengesture [--dry-run] [--replay FILE] [--write-config] [DEVICE]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    device: Option<PathBuf>,
    replay: Option<PathBuf>,
    dry_run: bool,
    write_config: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dry-run" => parsed.dry_run = true,
            "--write-config" => parsed.write_config = true,
            "--replay" => {
                let file = args.next().context("--replay needs a capture file")?;
                parsed.replay = Some(PathBuf::from(file));
            }
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with('-') => bail!("unknown option '{}'\n{}", flag, USAGE),
            path => {
                if parsed.device.is_some() {
                    bail!("only one device may be given\n{}", USAGE);
                }
                parsed.device = Some(PathBuf::from(path));
            }
        }
    }

    Ok(parsed)
}

fn main() -> Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = parse_args(std::env::args().skip(1))?;
    let mut settings = AppSettings::load()?;
    if let Some(device) = args.device.clone() {
        settings.device = Some(device);
    }

    if args.write_config {
        let path = AppSettings::settings_path()?;
        settings.save_to(&path)?;
        return Ok(());
    }

    info!("Pengesture starting...");

    let mut output = gesture_output(&settings, args.dry_run);
    let (sink, receiver) = ChannelSink::bounded(settings.channel_capacity);
    let timings = settings.timings.to_timings();

    let session = match &args.replay {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open capture file {:?}", path))?;
            TabletSession::from_source(
                CaptureReader::new(path, file),
                timings,
                settings.poll_interval(),
                Box::new(sink),
            )
        }
        None => {
            let device = settings
                .device
                .clone()
                .context("No tablet device configured; pass one on the command line")?;
            TabletSession::start(
                SessionConfig {
                    device,
                    timings,
                    poll_interval: settings.poll_interval(),
                },
                Box::new(sink),
            )
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || running_handler.store(false, Ordering::Relaxed))
        .context("Failed to install Ctrl-C handler")?;

    while running.load(Ordering::Relaxed) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(gesture) => {
                if let Err(e) = output.deliver(gesture) {
                    warn!("{e:#}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("Tablet session ended");
                break;
            }
        }
    }

    session.stop();
    info!("Pengesture shutting down");
    Ok(())
}

/// Pick the final gesture destination, falling back to logging
fn gesture_output(settings: &AppSettings, dry_run: bool) -> Box<dyn GestureSink> {
    if dry_run || settings.sink == SinkKind::Log {
        return Box::new(LogSink);
    }

    match UinputSink::new() {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            warn!("{e:#}; logging gestures instead");
            Box::new(LogSink)
        }
    }
}
