//! Drag-to-rotate gesture tracking

use glam::Vec2;

/// Converts horizontal pointer travel into whole frame steps
///
/// Travel that does not add up to a full step carries over to the next
/// update, so slow drags still rotate.
#[derive(Debug, Clone)]
pub struct DragTracker {
    anchor: Option<Vec2>,
    sensitivity_px: f32,
}

impl DragTracker {
    pub fn new(sensitivity_px: f32) -> Self {
        Self {
            anchor: None,
            sensitivity_px: sensitivity_px.max(f32::EPSILON),
        }
    }

    pub fn begin(&mut self, position: Vec2) {
        self.anchor = Some(position);
    }

    /// Signed frame delta since the last emitted step, if at least one step
    pub fn update(&mut self, position: Vec2) -> Option<i64> {
        let anchor = self.anchor.as_mut()?;
        let steps = ((position.x - anchor.x) / self.sensitivity_px).trunc() as i64;
        if steps == 0 {
            return None;
        }
        anchor.x += steps as f32 * self.sensitivity_px;
        Some(steps)
    }

    pub fn end(&mut self) {
        self.anchor = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }
}
