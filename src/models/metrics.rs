//! Device metrics reported by `OPI_GET_METRICS`.

/// Physical screen properties of the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMetrics {
    /// Width in pixels.
    pub width_px: u32,
    /// Height in pixels.
    pub height_px: u32,
    /// Horizontal pixel density.
    pub xdpi: f32,
    /// Vertical pixel density.
    pub ydpi: f32,
    /// Field-of-view half-angles in degrees: left, right, up, down.
    pub fov: [f32; 4],
}

/// The nine readings of a metrics reply, in wire order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceMetrics {
    /// Screen geometry and field of view.
    pub screen: ScreenMetrics,
    /// Ambient light level; negative when no reading is available.
    pub light_level: f32,
}

impl DeviceMetrics {
    /// One reply line per reading:
    /// width, height, xdpi, ydpi, fovLeft, fovRight, fovUp, fovDown, lightLevel.
    ///
    /// Pixel counts are integers; every other reading keeps its decimal
    /// point (`441.0`, `-1.0`).
    #[must_use]
    pub fn to_lines(&self) -> Vec<String> {
        let [left, right, up, down] = self.screen.fov;
        vec![
            self.screen.width_px.to_string(),
            self.screen.height_px.to_string(),
            decimal(self.screen.xdpi),
            decimal(self.screen.ydpi),
            decimal(left),
            decimal(right),
            decimal(up),
            decimal(down),
            decimal(self.light_level),
        ]
    }
}

fn decimal(value: f32) -> String {
    format!("{value:?}")
}
