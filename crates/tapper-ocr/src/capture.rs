use image::imageops;
use tapper_core::{Bitmap, CaptureError, ScreenSource};
use tapper_types::Region;
use xcap::Monitor;

/// Monitor geometry in virtual-screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl MonitorBounds {
    fn of(monitor: &Monitor) -> Self {
        Self {
            x: monitor.x(),
            y: monitor.y(),
            width: monitor.width(),
            height: monitor.height(),
        }
    }

    pub fn contains(&self, region: &Region) -> bool {
        let (left, top) = (region.left as i64, region.top as i64);
        left >= self.x as i64
            && top >= self.y as i64
            && left + region.width as i64 <= self.x as i64 + self.width as i64
            && top + region.height as i64 <= self.y as i64 + self.height as i64
    }
}

/// Live screen capture through xcap
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenCapture;

impl ScreenCapture {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenSource for ScreenCapture {
    fn capture(&self, region: Option<Region>) -> Result<Bitmap, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::Backend(format!("Failed to get monitors: {e}")))?;

        let monitor = match region {
            Some(region) => monitors
                .iter()
                .find(|m| MonitorBounds::of(m).contains(&region))
                .ok_or(CaptureError::OutOfBounds { region })?,
            None => monitors
                .iter()
                .find(|m| m.is_primary())
                .or(monitors.first())
                .ok_or(CaptureError::NoMonitor)?,
        };

        let image = monitor
            .capture_image()
            .map_err(|e| CaptureError::Backend(format!("Failed to capture screen: {e}")))?;

        match region {
            Some(region) => crop_to_region(&image, MonitorBounds::of(monitor), region),
            None => Ok(image),
        }
    }
}

/// Cut `region` out of a full capture of `monitor`.
pub fn crop_to_region(
    image: &Bitmap,
    monitor: MonitorBounds,
    region: Region,
) -> Result<Bitmap, CaptureError> {
    // the captured image may be scaled relative to the logical monitor size
    let bounds = MonitorBounds {
        width: image.width().min(monitor.width),
        height: image.height().min(monitor.height),
        ..monitor
    };
    if !bounds.contains(&region) {
        return Err(CaptureError::OutOfBounds { region });
    }

    let x = (region.left as i64 - monitor.x as i64) as u32;
    let y = (region.top as i64 - monitor.y as i64) as u32;
    Ok(imageops::crop_imm(image, x, y, region.width, region.height).to_image())
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn monitor(x: i32, y: i32, width: u32, height: u32) -> MonitorBounds {
        MonitorBounds {
            x,
            y,
            width,
            height,
        }
    }

    fn full_screen() -> Bitmap {
        Bitmap::from_fn(640, 480, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255]))
    }

    #[test]
    fn test_crop_has_region_size() {
        let image = full_screen();
        for region in [
            Region::new(0, 0, 1, 1).unwrap(),
            Region::new(100, 100, 400, 300).unwrap(),
            Region::new(0, 0, 640, 480).unwrap(),
            Region::new(639, 479, 1, 1).unwrap(),
        ] {
            let cropped = crop_to_region(&image, monitor(0, 0, 640, 480), region).unwrap();
            assert_eq!(cropped.dimensions(), (region.width, region.height));
        }
    }

    #[test]
    fn test_crop_offsets_by_monitor_origin() {
        let image = full_screen();
        let region = Region::new(1930, 20, 10, 10).unwrap();

        let cropped = crop_to_region(&image, monitor(1920, 0, 640, 480), region).unwrap();
        assert_eq!(cropped.get_pixel(0, 0), &Rgba([10, 20, 0, 255]));
    }

    #[test]
    fn test_crop_outside_monitor_fails() {
        let image = full_screen();
        let region = Region::new(600, 400, 100, 100).unwrap();

        let result = crop_to_region(&image, monitor(0, 0, 640, 480), region);
        assert!(matches!(result, Err(CaptureError::OutOfBounds { .. })));
    }

    #[test]
    fn test_monitor_contains() {
        let m = monitor(-1920, 0, 1920, 1080);
        assert!(!m.contains(&Region::new(0, 0, 10, 10).unwrap()));

        let m = monitor(0, 0, 1920, 1080);
        assert!(m.contains(&Region::new(1910, 1070, 10, 10).unwrap()));
        assert!(!m.contains(&Region::new(1911, 1070, 10, 10).unwrap()));
    }
}
