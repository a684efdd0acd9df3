mod avi;
mod frame;
#[cfg(feature = "recorder")]
mod screen;
#[cfg(feature = "recorder")]
mod terminal;

use std::cell::Cell;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::controller::{LoopConfig, LoopSummary, RealTimeLoop};
use crate::error::{CaptureError, LoopError};
use crate::input::{InputSource, NoInput};

pub use self::avi::MjpegWriter;
pub use self::frame::Frame;
#[cfg(feature = "recorder")]
pub use self::screen::ScreenSource;
#[cfg(feature = "recorder")]
pub use self::terminal::TerminalKeys;

/// Screen area in absolute screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(top: i32, left: i32, width: u32, height: u32) -> Self {
        Region { top, left, width, height }
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if self.width == 0 || self.height == 0 {
            return Err(LoopError::InvalidConfiguration(format!(
                "capture region must have a positive size, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Whether `other` lies entirely inside this region
    pub fn contains(&self, other: &Region) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.left as i64 + other.width as i64 <= self.left as i64 + self.width as i64
            && other.top as i64 + other.height as i64 <= self.top as i64 + self.height as i64
    }
}

/// Parses `top,left,width,height`
impl FromStr for Region {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            LoopError::InvalidConfiguration(format!(
                "capture region must look like top,left,width,height, got {:?}",
                s
            ))
        };
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [top, left, width, height] = parts[..] else {
            return Err(invalid());
        };
        let region = Region {
            top: top.parse().map_err(|_| invalid())?,
            left: left.parse().map_err(|_| invalid())?,
            width: width.parse().map_err(|_| invalid())?,
            height: height.parse().map_err(|_| invalid())?,
        };
        region.validate()?;
        Ok(region)
    }
}

/// Produces one frame per call
pub trait FrameSource {
    fn grab(&mut self, region: &Region) -> Result<Frame, CaptureError>;
}

/// Appends frames of a size fixed when the sink is opened. The output is
/// only valid after `finish`, which must be safe to call more than once.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), CaptureError>;
    fn finish(&mut self) -> Result<(), CaptureError>;
}

impl<K: FrameSink + ?Sized> FrameSink for &mut K {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), CaptureError> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        (**self).finish()
    }
}

/// Configuration for a screen recording
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Output AVI path
    pub output_path: PathBuf,

    /// Frames per second (default: 20)
    pub fps: f64,

    /// Stop after this long (None = until stopped by key)
    pub duration: Option<Duration>,

    /// Capture region (None = primary monitor)
    pub region: Option<Region>,

    /// JPEG quality 1-100 (default: 90)
    pub quality: u8,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("my_screen_record.avi"),
            fps: 20.0,
            duration: None,
            region: None,
            quality: 90,
        }
    }
}

impl RecordingConfig {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            target_rate_hz: self.fps,
            max_duration: self.duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSummary {
    pub frames: u64,
    pub run: LoopSummary,
}

/// Grabs `region` from `source` once per tick and appends it to `sink`
/// until `input` signals stop or the configured duration passes. The sink
/// is finished on every exit path.
///
/// A frame counts once the sink accepted it: when `write_frame` fails, that
/// frame is not counted and the loop ends with `LoopError::Tick`.
pub fn record<S, K, I>(
    config: &RecordingConfig,
    source: &mut S,
    region: Region,
    sink: K,
    input: &mut I,
) -> Result<RecordingSummary, LoopError>
where
    S: FrameSource + ?Sized,
    K: FrameSink,
    I: InputSource + ?Sized,
{
    region.validate()?;
    let frames = Cell::new(0u64);
    let run = RealTimeLoop::new(config.loop_config()).run(
        input,
        sink,
        |tick, sink| {
            let frame = source.grab(&region)?;
            sink.write_frame(&frame)?;
            frames.set(frames.get() + 1);
            log::trace!("Frame {} written at {:?}", tick.index(), tick.elapsed());
            Ok::<(), CaptureError>(())
        },
        |mut sink| sink.finish(),
    );
    if !matches!(run, Err(LoopError::InvalidConfiguration(_))) {
        log::info!(
            "Recording finished. Saved {} frames to '{}'",
            frames.get(),
            config.output_path.display()
        );
    }
    Ok(RecordingSummary { frames: frames.get(), run: run? })
}

/// Picks the stop-key source. Without a terminal a timed recording can still
/// end on its own, so it falls back to `NoInput`; an untimed one could never
/// be stopped and is refused.
pub fn stop_input<K>(opened: std::io::Result<K>, duration: Option<Duration>) -> Result<Box<dyn InputSource>, LoopError>
where
    K: InputSource + 'static,
{
    match (opened, duration) {
        (Ok(keys), _) => Ok(Box::new(keys)),
        (Err(err), Some(duration)) => {
            log::warn!("No terminal for stop keys ({}), recording for {:?}", err, duration);
            Ok(Box::new(NoInput))
        }
        (Err(err), None) => Err(LoopError::acquire("terminal", err)),
    }
}

/// Records the screen to `config.output_path`, stopping on `q`, Escape,
/// Ctrl-C, or when `config.duration` passes.
#[cfg(feature = "recorder")]
pub fn record_screen(config: &RecordingConfig) -> Result<RecordingSummary, LoopError> {
    use crate::controller::StopReason;

    config.loop_config().period()?;
    let mut source = ScreenSource::open().map_err(|e| LoopError::acquire("screen", e))?;
    let region = match config.region {
        Some(region) => region,
        None => source.primary_region(),
    };
    region.validate()?;
    source.check_region(&region)?;

    log::info!(
        "Starting screen recording of {}x{} at ({}, {}) to '{}'",
        region.width,
        region.height,
        region.left,
        region.top,
        config.output_path.display()
    );
    // 先取得终端, 失败时不留下空的 AVI
    let mut keys = stop_input(TerminalKeys::open(), config.duration)?;
    let sink = MjpegWriter::create(&config.output_path, region.width, region.height, config.fps, config.quality)
        .map_err(|e| LoopError::acquire("video writer", e))?;

    let result = record(config, &mut source, region, sink, &mut *keys);
    drop(keys);

    if let Ok(summary) = &result {
        match summary.run.reason {
            StopReason::Signal => log::info!("Manual stop requested"),
            StopReason::Duration => log::info!("Recording duration of {:?} reached", config.duration),
            StopReason::Requested => {}
        }
    }
    result
}
