use image::{GrayImage, Luma, Rgba, RgbaImage};
use log::debug;

use crate::components::history::{CanvasSnapshot, HistoryManager};

/// Semi-transparent highlight used when no configuration overrides it.
pub const DEFAULT_PREVIEW_COLOR: Rgba<u8> = Rgba([255, 59, 48, 128]);

// ============================================================================
// COORDINATES
// ============================================================================

/// A position in drawing-surface pixels (sub-pixel precision).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasPoint {
    pub x: f32,
    pub y: f32,
}

impl CanvasPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Where the surface is rendered on screen: the element's top-left corner
/// and its rendered size, in the same units as pointer events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Surface shown at its natural size at the origin (identity mapping).
    pub fn native(surface_width: u32, surface_height: u32) -> Self {
        Self::new(0.0, 0.0, surface_width as f32, surface_height as f32)
    }

    /// Map a pointer position to buffer coordinates. X and Y are scaled
    /// independently by `buffer size / rendered size`. Points outside the
    /// element are still mapped; rasterization clips them.
    ///
    /// Returns `None` when the element has no rendered area.
    pub fn to_surface(
        &self,
        pointer_x: f32,
        pointer_y: f32,
        surface_width: u32,
        surface_height: u32,
    ) -> Option<CanvasPoint> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return None;
        }
        let scale_x = surface_width as f32 / self.width;
        let scale_y = surface_height as f32 / self.height;
        Some(CanvasPoint::new(
            (pointer_x - self.left) * scale_x,
            (pointer_y - self.top) * scale_y,
        ))
    }
}

/// Inclusive pixel bounds touched by a drawing operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl PixelBounds {
    pub fn union(self, other: PixelBounds) -> PixelBounds {
        PixelBounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

// ============================================================================
// DRAWING SURFACE
// ============================================================================

/// RGBA buffer at photo resolution. Alpha 0 means untouched; RGB is only
/// the on-screen highlight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawingSurface {
    pixels: RgbaImage,
}

impl DrawingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.pixels.get_pixel_checked(x, y).copied()
    }

    /// True when at least one pixel has been touched.
    pub fn has_paint(&self) -> bool {
        self.pixels.pixels().any(|p| p[3] > 0)
    }

    fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    fn replace(&mut self, pixels: RgbaImage) {
        self.pixels = pixels;
    }
}

/// Normal (source-over) compositing of straight-alpha pixels.
/// The result alpha is never below the source alpha.
pub fn composite_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as u32;
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }
    let da = dst[3] as u32;
    // out_a = sa + da * (1 - sa), scaled by 255
    let dst_weight = da * (255 - sa);
    let out_a_255 = sa * 255 + dst_weight;
    let out_a = ((out_a_255 + 127) / 255).min(255) as u8;
    let channel = |i: usize| -> u8 {
        let num = src[i] as u32 * sa * 255 + dst[i] as u32 * dst_weight;
        ((num + out_a_255 / 2) / out_a_255).min(255) as u8
    };
    Rgba([channel(0), channel(1), channel(2), out_a.max(src[3])])
}

// ============================================================================
// STROKE CANVAS
// ============================================================================

/// Path being drawn between pointer-down and pointer-up.
struct ActiveStroke {
    last: CanvasPoint,
    diameter: f32,
    /// Pixels already painted by this stroke; each is composited once so
    /// overlapping segments do not darken the joints.
    coverage: GrayImage,
}

enum StrokeState {
    Idle,
    Stroking(ActiveStroke),
}

/// Freehand drawing surface with bounded snapshot undo.
///
/// Operations never fail: undo on an empty history, extending without an
/// active stroke and similar cases are silent no-ops.
pub struct StrokeCanvas {
    surface: DrawingSurface,
    history: HistoryManager,
    state: StrokeState,
    preview_color: Rgba<u8>,
}

impl StrokeCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_settings(width, height, 10, DEFAULT_PREVIEW_COLOR)
    }

    pub fn with_settings(
        width: u32,
        height: u32,
        history_depth: usize,
        preview_color: Rgba<u8>,
    ) -> Self {
        Self {
            surface: DrawingSurface::new(width, height),
            history: HistoryManager::new(history_depth),
            state: StrokeState::Idle,
            preview_color,
        }
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn is_stroking(&self) -> bool {
        matches!(self.state, StrokeState::Stroking(_))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn preview_color(&self) -> Rgba<u8> {
        self.preview_color
    }

    /// Snapshot the buffer, then start a new path at `point`. A stroke that
    /// is still active is sealed first.
    pub fn begin_stroke(&mut self, point: CanvasPoint, diameter: u32) {
        self.end_stroke();
        self.history
            .push(CanvasSnapshot::capture("Brush Stroke", self.surface.as_image()));
        let (w, h) = self.surface.dimensions();
        self.state = StrokeState::Stroking(ActiveStroke {
            last: point,
            diameter: diameter.max(1) as f32,
            coverage: GrayImage::new(w, h),
        });
    }

    /// Draw a round-capped segment from the previous point to `point`.
    /// Returns the pixels touched, or `None` when idle or fully off-surface.
    pub fn extend_stroke(&mut self, point: CanvasPoint) -> Option<PixelBounds> {
        let StrokeState::Stroking(stroke) = &mut self.state else {
            return None;
        };
        let from = stroke.last;
        stroke.last = point;
        rasterize_segment(
            &mut self.surface.pixels,
            &mut stroke.coverage,
            from,
            point,
            stroke.diameter / 2.0,
            self.preview_color,
        )
    }

    /// Seal the active stroke. Returns `false` if none was active.
    pub fn end_stroke(&mut self) -> bool {
        match std::mem::replace(&mut self.state, StrokeState::Idle) {
            StrokeState::Stroking(_) => true,
            StrokeState::Idle => false,
        }
    }

    /// Restore the most recent snapshot. Returns `false` on empty history.
    pub fn undo(&mut self) -> bool {
        self.end_stroke();
        match self.history.pop() {
            Some(snapshot) => {
                debug!(
                    "undo '{}' ({} left)",
                    snapshot.description,
                    self.history.undo_count()
                );
                self.surface.replace(snapshot.pixels);
                true
            }
            None => false,
        }
    }

    /// Snapshot the buffer, then make every pixel fully transparent.
    pub fn clear(&mut self) {
        self.end_stroke();
        self.history
            .push(CanvasSnapshot::capture("Clear", self.surface.as_image()));
        self.surface.clear();
    }

    /// Drop history and any pending stroke, and reallocate a transparent
    /// buffer at the new size.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.state = StrokeState::Idle;
        self.history.clear();
        self.surface = DrawingSurface::new(width, height);
        debug!("canvas reset to {}x{}", width, height);
    }
}

/// Paint every pixel the capsule of `radius` around segment `a`-`b` reaches
/// (round caps and joins). A pixel counts as reached when its centre is
/// closer than `radius` plus half a pixel, so edge pixels the brush only
/// partly covers are painted too. Pixels already set in `coverage` are
/// skipped.
fn rasterize_segment(
    pixels: &mut RgbaImage,
    coverage: &mut GrayImage,
    a: CanvasPoint,
    b: CanvasPoint,
    radius: f32,
    color: Rgba<u8>,
) -> Option<PixelBounds> {
    let (w, h) = pixels.dimensions();
    if w == 0 || h == 0 || !(radius > 0.0) {
        return None;
    }
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return None;
    }

    let min_x = ((a.x.min(b.x) - radius - 1.0).floor() as i64).max(0);
    let min_y = ((a.y.min(b.y) - radius - 1.0).floor() as i64).max(0);
    let max_x = ((a.x.max(b.x) + radius + 1.0).ceil() as i64).min(w as i64 - 1);
    let max_y = ((a.y.max(b.y) + radius + 1.0).ceil() as i64).min(h as i64 - 1);
    if min_x > max_x || min_y > max_y {
        return None;
    }

    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let reach = radius + 0.5;
    let r_sq = reach * reach;

    let mut bounds: Option<PixelBounds> = None;
    for y in min_y as u32..=max_y as u32 {
        let py = y as f32 + 0.5;
        for x in min_x as u32..=max_x as u32 {
            let px = x as f32 + 0.5;
            let t = if len_sq > 0.0 {
                (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let ex = px - (a.x + t * dx);
            let ey = py - (a.y + t * dy);
            if ex * ex + ey * ey >= r_sq {
                continue;
            }
            if coverage.get_pixel(x, y)[0] != 0 {
                continue;
            }
            coverage.put_pixel(x, y, Luma([255]));
            let dst = *pixels.get_pixel(x, y);
            pixels.put_pixel(x, y, composite_over(dst, color));

            let here = PixelBounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            };
            bounds = Some(bounds.map_or(here, |b| b.union(here)));
        }
    }
    bounds
}
