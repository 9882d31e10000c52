use serde::{Deserialize, Serialize};

/// A point in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Horizontal gradient spanning the full surface width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    pub x0: f32,
    pub x1: f32,
    /// Colour stops as `(offset, css colour)` with offsets in `[0, 1]`.
    pub stops: Vec<(f32, String)>,
}

impl LinearGradient {
    /// Spreads `colours` evenly across `[0, width]`.
    pub fn horizontal(width: f32, colours: &[String]) -> Self {
        let last = colours.len().saturating_sub(1).max(1) as f32;
        let stops = colours
            .iter()
            .enumerate()
            .map(|(i, colour)| (i as f32 / last, colour.clone()))
            .collect();
        Self {
            x0: 0.0,
            x1: width,
            stops,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub width: f32,
    pub gradient: LinearGradient,
}

/// The 2D drawing surface the waveform is rendered onto.
pub trait Surface {
    /// Size of the surface's container in CSS pixels.
    fn layout_size(&self) -> (f32, f32);
    fn device_pixel_ratio(&self) -> f32;
    /// Backing store size in device pixels.
    fn pixel_size(&self) -> (u32, u32);
    fn set_pixel_size(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn stroke_path(&mut self, points: &[Point], style: &StrokeStyle);
}

/// Keeps the backing store matched to the container's layout box. Returns the
/// resulting device-pixel size.
pub fn fit_to_container(surface: &mut dyn Surface) -> (u32, u32) {
    let (css_w, css_h) = surface.layout_size();
    let dpr = surface.device_pixel_ratio().max(f32::EPSILON);
    let wanted = ((css_w * dpr).floor() as u32, (css_h * dpr).floor() as u32);
    if surface.pixel_size() != wanted {
        surface.set_pixel_size(wanted.0, wanted.1);
    }
    wanted
}
