//! Canvas abstraction and bitmap drawing.
//!
//! Rendering is expressed against the [`Canvas`] trait, a minimal
//! save/restore transform stack plus image blits, so the core stays
//! backend-agnostic and fully testable: [`RecordingCanvas`] captures the
//! exact operation stream for assertions, and a real backend replays the
//! same calls against whatever surface it owns.

use rapier2d::math::Real;

use crate::assets::ImageHandle;
use crate::transform::Transform;

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

/// Drawing surface with a transform/alpha state stack.
///
/// `save`/`restore` bracket state changes; `translate`, `rotate`, `scale`,
/// and `multiply_alpha` compose onto the current state.
pub trait Canvas {
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: Real, y: Real);
    fn rotate(&mut self, radians: Real);
    fn scale(&mut self, x: Real, y: Real);
    /// Multiply the current alpha; nested draws inherit the product.
    fn multiply_alpha(&mut self, alpha: Real);
    /// Blit an image with its top-left corner at `(x, y)` in the current
    /// local space, at its natural size.
    fn draw_image(&mut self, image: &ImageHandle, x: Real, y: Real);
    /// Stroke a closed polyline, in absolute display coordinates.
    fn stroke_polygon(&mut self, points: &[[Real; 2]]);
    /// Erase the whole surface.
    fn clear(&mut self);
}

// ---------------------------------------------------------------------------
// Bitmap
// ---------------------------------------------------------------------------

/// One image plus its anchor and opacity, drawn at an entity's transform.
///
/// The anchor is a fraction of the image size; the default `(0.5, 0.5)`
/// centers the image on the transform position, which is what physics-bound
/// sprites want since body positions are centroids.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub image: ImageHandle,
    /// Anchor as a fraction of width/height. `(0, 0)` = top-left corner on
    /// the position, `(0.5, 0.5)` = centered.
    pub anchor: [Real; 2],
    /// Opacity in `[0, 1]`. At zero the draw is skipped entirely.
    pub alpha: Real,
}

impl Bitmap {
    pub fn new(image: ImageHandle) -> Self {
        Self {
            image,
            anchor: [0.5, 0.5],
            alpha: 1.0,
        }
    }

    /// Anchor on the top-left corner instead of the center.
    pub fn top_left(mut self) -> Self {
        self.anchor = [0.0, 0.0];
        self
    }

    /// Draw under the given transform: translate, rotate, scale, then blit
    /// offset by the anchor. Fully transparent bitmaps emit nothing.
    pub fn draw(&self, canvas: &mut dyn Canvas, transform: &Transform) {
        if self.alpha <= 0.0 {
            return;
        }
        canvas.save();
        canvas.translate(transform.position.x, transform.position.y);
        if transform.rotation != 0.0 {
            canvas.rotate(transform.rotation);
        }
        if transform.scale.x != 1.0 || transform.scale.y != 1.0 {
            canvas.scale(transform.scale.x, transform.scale.y);
        }
        if self.alpha < 1.0 {
            canvas.multiply_alpha(self.alpha);
        }
        canvas.draw_image(
            &self.image,
            -self.image.width * self.anchor[0],
            -self.image.height * self.anchor[1],
        );
        canvas.restore();
    }
}

// ---------------------------------------------------------------------------
// RecordingCanvas
// ---------------------------------------------------------------------------

/// One recorded canvas operation.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    Save,
    Restore,
    Translate { x: Real, y: Real },
    Rotate { radians: Real },
    Scale { x: Real, y: Real },
    MultiplyAlpha { alpha: Real },
    DrawImage { name: String, x: Real, y: Real },
    StrokePolygon { points: Vec<[Real; 2]> },
    Clear,
}

/// Canvas that records every call, for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<CanvasOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded operations, in call order.
    pub fn ops(&self) -> &[CanvasOp] {
        &self.ops
    }

    /// Number of image blits recorded.
    pub fn blit_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, CanvasOp::DrawImage { .. }))
            .count()
    }

    /// Drop everything recorded so far.
    pub fn reset(&mut self) {
        self.ops.clear();
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.ops.push(CanvasOp::Save);
    }

    fn restore(&mut self) {
        self.ops.push(CanvasOp::Restore);
    }

    fn translate(&mut self, x: Real, y: Real) {
        self.ops.push(CanvasOp::Translate { x, y });
    }

    fn rotate(&mut self, radians: Real) {
        self.ops.push(CanvasOp::Rotate { radians });
    }

    fn scale(&mut self, x: Real, y: Real) {
        self.ops.push(CanvasOp::Scale { x, y });
    }

    fn multiply_alpha(&mut self, alpha: Real) {
        self.ops.push(CanvasOp::MultiplyAlpha { alpha });
    }

    fn draw_image(&mut self, image: &ImageHandle, x: Real, y: Real) {
        self.ops.push(CanvasOp::DrawImage {
            name: image.name.clone(),
            x,
            y,
        });
    }

    fn stroke_polygon(&mut self, points: &[[Real; 2]]) {
        self.ops.push(CanvasOp::StrokePolygon {
            points: points.to_vec(),
        });
    }

    fn clear(&mut self) {
        self.ops.push(CanvasOp::Clear);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_image() -> ImageHandle {
        ImageHandle::new("ball", 40.0, 40.0)
    }

    #[test]
    fn centered_bitmap_offsets_by_half_size() {
        let bitmap = Bitmap::new(ball_image());
        let mut canvas = RecordingCanvas::new();
        bitmap.draw(&mut canvas, &Transform::at(100.0, 200.0));

        assert_eq!(
            canvas.ops(),
            &[
                CanvasOp::Save,
                CanvasOp::Translate { x: 100.0, y: 200.0 },
                CanvasOp::DrawImage {
                    name: "ball".into(),
                    x: -20.0,
                    y: -20.0,
                },
                CanvasOp::Restore,
            ]
        );
    }

    #[test]
    fn top_left_bitmap_draws_at_origin() {
        let bitmap = Bitmap::new(ball_image()).top_left();
        let mut canvas = RecordingCanvas::new();
        bitmap.draw(&mut canvas, &Transform::new());

        assert!(canvas
            .ops()
            .contains(&CanvasOp::DrawImage { name: "ball".into(), x: 0.0, y: 0.0 }));
    }

    #[test]
    fn rotation_and_alpha_are_emitted_when_set() {
        let mut bitmap = Bitmap::new(ball_image());
        bitmap.alpha = 0.5;
        let mut transform = Transform::at(0.0, 0.0);
        transform.set_rotation_degrees(90.0);

        let mut canvas = RecordingCanvas::new();
        bitmap.draw(&mut canvas, &transform);

        assert!(canvas
            .ops()
            .iter()
            .any(|op| matches!(op, CanvasOp::Rotate { .. })));
        assert!(canvas
            .ops()
            .contains(&CanvasOp::MultiplyAlpha { alpha: 0.5 }));
    }

    #[test]
    fn fully_transparent_bitmap_draws_nothing() {
        let mut bitmap = Bitmap::new(ball_image());
        bitmap.alpha = 0.0;
        let mut canvas = RecordingCanvas::new();
        bitmap.draw(&mut canvas, &Transform::at(50.0, 50.0));
        assert!(canvas.ops().is_empty());
    }

    #[test]
    fn identity_transform_skips_rotate_and_scale() {
        let bitmap = Bitmap::new(ball_image());
        let mut canvas = RecordingCanvas::new();
        bitmap.draw(&mut canvas, &Transform::new());

        assert!(!canvas
            .ops()
            .iter()
            .any(|op| matches!(op, CanvasOp::Rotate { .. } | CanvasOp::Scale { .. })));
    }
}
