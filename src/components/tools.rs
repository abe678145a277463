use log::debug;

use crate::canvas::{DisplayRect, StrokeCanvas};
use crate::config::BrushConfig;

/// Pointer and touch input, in the same coordinate space as the
/// [`DisplayRect`] the surface is rendered into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    /// Pointer left the element; treated like `Up`.
    Leave,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrushProperties {
    /// Brush diameter in surface pixels.
    pub diameter: u32,
    pub min_diameter: u32,
    pub max_diameter: u32,
}

impl Default for BrushProperties {
    fn default() -> Self {
        Self::from(&BrushConfig::default())
    }
}

impl From<&BrushConfig> for BrushProperties {
    fn from(config: &BrushConfig) -> Self {
        Self {
            diameter: config.default_diameter,
            min_diameter: config.min_diameter,
            max_diameter: config.max_diameter,
        }
    }
}

/// The mask brush: turns pointer events into canvas operations.
///
/// Idle → (Down) → Stroking → (Up | Leave) → Idle. Moves while idle are
/// hover and do nothing. The diameter is captured when a stroke begins, so
/// changing it mid-stroke only affects the next stroke.
#[derive(Debug, Default)]
pub struct BrushTool {
    pub properties: BrushProperties,
}

impl BrushTool {
    pub fn new(properties: BrushProperties) -> Self {
        Self { properties }
    }

    /// Set the brush diameter, clamped to the configured range. Returns the
    /// value actually applied.
    pub fn set_diameter(&mut self, diameter: u32) -> u32 {
        let p = &mut self.properties;
        p.diameter = diameter.clamp(p.min_diameter, p.max_diameter);
        p.diameter
    }

    pub fn diameter(&self) -> u32 {
        self.properties.diameter
    }

    /// Feed one input event. Returns `true` if the surface pixels changed.
    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        view: &DisplayRect,
        canvas: &mut StrokeCanvas,
    ) -> bool {
        let (w, h) = (canvas.width(), canvas.height());
        match event {
            PointerEvent::Down { x, y } => {
                let Some(point) = view.to_surface(x, y, w, h) else {
                    debug!("pointer down on a display with no area; ignored");
                    return false;
                };
                canvas.begin_stroke(point, self.properties.diameter);
                false
            }
            PointerEvent::Move { x, y } => {
                if !canvas.is_stroking() {
                    return false;
                }
                match view.to_surface(x, y, w, h) {
                    Some(point) => canvas.extend_stroke(point).is_some(),
                    None => false,
                }
            }
            PointerEvent::Up | PointerEvent::Leave => {
                canvas.end_stroke();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasPoint;

    #[test]
    fn diameter_is_clamped_to_range() {
        let mut brush = BrushTool::default();
        assert_eq!(brush.diameter(), 30);
        assert_eq!(brush.set_diameter(4), 10);
        assert_eq!(brush.set_diameter(250), 100);
        assert_eq!(brush.set_diameter(42), 42);
    }

    #[test]
    fn hover_without_down_does_not_paint() {
        let mut brush = BrushTool::default();
        let mut canvas = StrokeCanvas::new(50, 50);
        let view = DisplayRect::native(50, 50);
        assert!(!brush.handle_pointer(PointerEvent::Move { x: 10.0, y: 10.0 }, &view, &mut canvas));
        assert!(!canvas.surface().has_paint());
        assert!(!canvas.can_undo());
    }

    #[test]
    fn down_move_up_paints_one_undoable_stroke() {
        let mut brush = BrushTool::default();
        brush.set_diameter(10);
        let mut canvas = StrokeCanvas::new(50, 50);
        let view = DisplayRect::native(50, 50);

        brush.handle_pointer(PointerEvent::Down { x: 10.0, y: 10.0 }, &view, &mut canvas);
        assert!(canvas.is_stroking());
        assert!(brush.handle_pointer(PointerEvent::Move { x: 40.0, y: 10.0 }, &view, &mut canvas));
        brush.handle_pointer(PointerEvent::Leave, &view, &mut canvas);
        assert!(!canvas.is_stroking());
        assert!(!brush.handle_pointer(PointerEvent::Move { x: 40.0, y: 40.0 }, &view, &mut canvas));

        assert_eq!(canvas.history().undo_count(), 1);
        assert_eq!(canvas.surface().pixel(25, 40).unwrap()[3], 0);
        assert!(canvas.surface().pixel(25, 10).unwrap()[3] > 0);
    }

    #[test]
    fn scaled_display_paints_at_buffer_resolution() {
        // 400x300 photo shown at half size
        let mut brush = BrushTool::default();
        brush.set_diameter(10);
        let mut canvas = StrokeCanvas::new(400, 300);
        let view = DisplayRect::new(0.0, 0.0, 200.0, 150.0);

        brush.handle_pointer(PointerEvent::Down { x: 50.0, y: 50.0 }, &view, &mut canvas);
        brush.handle_pointer(PointerEvent::Move { x: 50.0, y: 50.0 }, &view, &mut canvas);
        brush.handle_pointer(PointerEvent::Up, &view, &mut canvas);

        assert!(canvas.surface().pixel(100, 100).unwrap()[3] > 0);
        assert_eq!(canvas.surface().pixel(50, 50).unwrap()[3], 0);
    }

    #[test]
    fn diameter_change_mid_stroke_applies_to_next_stroke() {
        let mut brush = BrushTool::default();
        brush.set_diameter(10);
        let mut canvas = StrokeCanvas::new(100, 100);
        let view = DisplayRect::native(100, 100);

        brush.handle_pointer(PointerEvent::Down { x: 20.0, y: 50.0 }, &view, &mut canvas);
        brush.set_diameter(60);
        brush.handle_pointer(PointerEvent::Move { x: 20.0, y: 50.0 }, &view, &mut canvas);
        brush.handle_pointer(PointerEvent::Up, &view, &mut canvas);

        // A 60px brush would reach x = 45; the 10px one stops near x = 25.
        assert_eq!(canvas.surface().pixel(35, 50).unwrap()[3], 0);

        canvas.begin_stroke(CanvasPoint::new(70.0, 50.0), brush.diameter());
        canvas.extend_stroke(CanvasPoint::new(70.0, 50.0));
        assert!(canvas.surface().pixel(45, 50).unwrap()[3] > 0);
    }
}
