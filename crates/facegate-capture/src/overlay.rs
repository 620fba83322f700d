//! Overlay rendering for recognition results.

use facegate_core::{BoundingBox, Detection};
use image::{ImageFormat, Rgba, RgbaImage};
use std::path::Path;

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
const BOX_THICKNESS: u32 = 2;
/// Labels sit this many pixels above the box's top edge.
const LABEL_OFFSET: f64 = 5.0;

/// A surface the capture loop draws detections onto.
pub trait Overlay {
    /// Remove everything drawn so far.
    fn clear(&mut self);
    /// Draw one detection's box with the given label.
    fn draw(&mut self, detection: &Detection, label: &str);
}

/// Clear `overlay` and draw every detection in order.
pub fn render<O: Overlay + ?Sized>(overlay: &mut O, detections: &[Detection]) {
    overlay.clear();
    for detection in detections {
        overlay.draw(detection, detection.label());
    }
}

/// A label placed on the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub bounding_box: BoundingBox,
    pub label: String,
    /// Anchor point (x, y) of the label text.
    pub anchor: (f64, f64),
}

/// In-memory RGBA overlay.
///
/// Box outlines are rasterised into a transparent canvas; labels are kept
/// as [`Annotation`]s since no font is available to rasterise them.
pub struct CanvasOverlay {
    canvas: RgbaImage,
    annotations: Vec<Annotation>,
    redraws: u64,
}

impl CanvasOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, CLEAR),
            annotations: Vec::new(),
            redraws: 0,
        }
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn labels(&self) -> Vec<&str> {
        self.annotations.iter().map(|a| a.label.as_str()).collect()
    }

    /// Number of times the overlay has been cleared for a redraw.
    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.canvas.save_with_format(path, ImageFormat::Png)
    }
}

impl Overlay for CanvasOverlay {
    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = CLEAR;
        }
        self.annotations.clear();
        self.redraws += 1;
    }

    fn draw(&mut self, detection: &Detection, label: &str) {
        let b = detection.bounding_box;
        stroke_rect(&mut self.canvas, &b, BOX_THICKNESS, BOX_COLOR);
        self.annotations.push(Annotation {
            bounding_box: b,
            label: label.to_string(),
            anchor: (b.left, b.top - LABEL_OFFSET),
        });
    }
}

/// Draw a rectangle outline, clipped to the canvas.
fn stroke_rect(canvas: &mut RgbaImage, b: &BoundingBox, thickness: u32, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 || b.width() <= 0.0 || b.height() <= 0.0 {
        return;
    }

    let clamp_x = |v: f64| v.round().clamp(0.0, (w - 1) as f64) as u32;
    let clamp_y = |v: f64| v.round().clamp(0.0, (h - 1) as f64) as u32;
    let (x0, x1) = (clamp_x(b.left), clamp_x(b.right));
    let (y0, y1) = (clamp_y(b.top), clamp_y(b.bottom));

    for t in 0..thickness {
        for x in x0..=x1 {
            put(canvas, x, y0.saturating_add(t), color);
            put(canvas, x, y1.saturating_sub(t), color);
        }
        for y in y0..=y1 {
            put(canvas, x0.saturating_add(t), y, color);
            put(canvas, x1.saturating_sub(t), y, color);
        }
    }
}

fn put(canvas: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, color);
    }
}
