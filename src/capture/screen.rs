use xcap::Monitor;

use super::{Frame, FrameSource, Region};
use crate::error::{CaptureError, LoopError};

/// Grabs frames from the attached monitors
pub struct ScreenSource {
    monitors: Vec<Monitor>,
}

impl ScreenSource {
    pub fn open() -> Result<Self, CaptureError> {
        let monitors = Monitor::all().map_err(|e| CaptureError::Screen(e.to_string()))?;
        if monitors.is_empty() {
            return Err(CaptureError::Screen("no monitor found".to_string()));
        }
        for monitor in &monitors {
            log::debug!(
                "Monitor {:?}: {}x{} at ({}, {}), scale {}",
                monitor.name(),
                monitor.width(),
                monitor.height(),
                monitor.x(),
                monitor.y(),
                monitor.scale_factor()
            );
        }
        Ok(ScreenSource { monitors })
    }

    /// Full area of the primary monitor, or the first one if none is primary
    pub fn primary_region(&self) -> Region {
        let monitor = self
            .monitors
            .iter()
            .find(|m| m.is_primary())
            .unwrap_or(&self.monitors[0]);
        bounds(monitor)
    }

    pub fn check_region(&self, region: &Region) -> Result<(), LoopError> {
        match self.monitor_for(region) {
            Some(_) => Ok(()),
            None => Err(LoopError::InvalidConfiguration(format!(
                "capture region {:?} does not fit on a single monitor",
                region
            ))),
        }
    }

    fn monitor_for(&self, region: &Region) -> Option<&Monitor> {
        self.monitors.iter().find(|m| bounds(m).contains(region))
    }
}

fn bounds(monitor: &Monitor) -> Region {
    Region::new(monitor.y(), monitor.x(), monitor.width(), monitor.height())
}

impl FrameSource for ScreenSource {
    fn grab(&mut self, region: &Region) -> Result<Frame, CaptureError> {
        let monitor = self
            .monitor_for(region)
            .ok_or_else(|| CaptureError::Screen(format!("no monitor contains {:?}", region)))?;
        let image = monitor
            .capture_image()
            .map_err(|e| CaptureError::Screen(e.to_string()))?;
        // HiDPI 下截图是物理像素, 输出帧仍保持逻辑尺寸以匹配 sink
        let scale_x = image.width() as f64 / monitor.width() as f64;
        let scale_y = image.height() as f64 / monitor.height() as f64;
        let left = ((region.left - monitor.x()) as f64 * scale_x) as u32;
        let top = ((region.top - monitor.y()) as f64 * scale_y) as u32;
        let physical = Frame::from_rgba(
            &image,
            left,
            top,
            ((region.width as f64 * scale_x) as u32).min(image.width().saturating_sub(left)),
            ((region.height as f64 * scale_y) as u32).min(image.height().saturating_sub(top)),
        )?;
        if physical.width() == region.width && physical.height() == region.height {
            return Ok(physical);
        }
        Ok(physical.resized(region.width, region.height))
    }
}
