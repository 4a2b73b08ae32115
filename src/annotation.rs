//! Marker capture over a reference image.
//!
//! Pointer events arrive in display (CSS) pixels and are mapped to the
//! image's intrinsic pixels, so markers stay put when the canvas is resized.
//! A stroke is open between `pointer_down` and `pointer_up`; closing it commits
//! one [`PainMarker`] tagged with the tool settings captured at pointer-down.

use crate::models::{PainMarker, PainType, Point};
use crate::validation::{validate_marker, MAX_BRUSH_SIZE, MAX_INTENSITY, MIN_BRUSH_SIZE, MIN_INTENSITY};

/// Maps display coordinates onto intrinsic image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub intrinsic_width: f64,
    pub intrinsic_height: f64,
    pub display_width: f64,
    pub display_height: f64,
}

impl Viewport {
    pub fn new(intrinsic: (f64, f64), display: (f64, f64)) -> Self {
        Self {
            intrinsic_width: intrinsic.0,
            intrinsic_height: intrinsic.1,
            display_width: display.0,
            display_height: display.1,
        }
    }

    pub fn scale(&self) -> (f64, f64) {
        let sx = if self.display_width > 0.0 { self.intrinsic_width / self.display_width } else { 1.0 };
        let sy = if self.display_height > 0.0 { self.intrinsic_height / self.display_height } else { 1.0 };
        (sx, sy)
    }

    /// `None` when the point falls outside the displayed image.
    pub fn to_image(&self, x: f64, y: f64) -> Option<Point> {
        if !(0.0..=self.display_width).contains(&x) || !(0.0..=self.display_height).contains(&y) {
            return None;
        }
        let (sx, sy) = self.scale();
        Some(Point { x: x * sx, y: y * sy })
    }

    /// Same mapping, but clamps to the image edge instead of rejecting.
    pub fn to_image_clamped(&self, x: f64, y: f64) -> Point {
        let (sx, sy) = self.scale();
        Point {
            x: (x * sx).clamp(0.0, self.intrinsic_width),
            y: (y * sy).clamp(0.0, self.intrinsic_height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub pain_type: PainType,
    pub intensity: u8,
    pub brush_size: u32,
}

impl Default for Tool {
    fn default() -> Self {
        Self { pain_type: PainType::Sharp, intensity: 3, brush_size: 10 }
    }
}

impl Tool {
    /// Out-of-range settings are pulled back into range.
    pub fn new(pain_type: PainType, intensity: u8, brush_size: u32) -> Self {
        Self {
            pain_type,
            intensity: intensity.clamp(MIN_INTENSITY, MAX_INTENSITY),
            brush_size: brush_size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasState {
    Clean,
    Marking { tool: Tool, points: Vec<Point> },
}

#[derive(Debug, Clone)]
pub struct AnnotationCanvas {
    viewport: Viewport,
    tool: Tool,
    state: CanvasState,
    markers: Vec<PainMarker>,
}

impl AnnotationCanvas {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport, tool: Tool::default(), state: CanvasState::Clean, markers: Vec::new() }
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn is_marking(&self) -> bool {
        matches!(self.state, CanvasState::Marking { .. })
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Takes effect from the next stroke.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// The canvas element was resized; already committed markers are unaffected.
    pub fn resize(&mut self, display_width: f64, display_height: f64) {
        self.viewport.display_width = display_width;
        self.viewport.display_height = display_height;
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        if self.is_marking() {
            return false;
        }
        let Some(p) = self.viewport.to_image(x, y) else { return false };
        self.state = CanvasState::Marking { tool: self.tool, points: vec![p] };
        true
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        let p = self.viewport.to_image_clamped(x, y);
        if let CanvasState::Marking { points, .. } = &mut self.state {
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
    }

    /// Closes the open stroke and returns the committed marker.
    pub fn pointer_up(&mut self) -> Option<&PainMarker> {
        let CanvasState::Marking { tool, points } = std::mem::replace(&mut self.state, CanvasState::Clean) else {
            return None;
        };
        let marker = PainMarker {
            pain_type: tool.pain_type,
            intensity: tool.intensity,
            points,
            brush_size: tool.brush_size,
        };
        if let Err(e) = validate_marker(&marker) {
            tracing::debug!(error = %e, "discarding invalid stroke");
            return None;
        }
        self.markers.push(marker);
        self.markers.last()
    }

    /// Pointer left the canvas mid-stroke; nothing is committed.
    pub fn cancel(&mut self) {
        self.state = CanvasState::Clean;
    }

    pub fn undo(&mut self) -> Option<PainMarker> {
        self.markers.pop()
    }

    /// Drops every marker so only the bare image is redrawn.
    pub fn clear(&mut self) {
        self.state = CanvasState::Clean;
        self.markers.clear();
    }

    pub fn markers(&self) -> &[PainMarker] {
        &self.markers
    }

    pub fn into_markers(self) -> Vec<PainMarker> {
        self.markers
    }

    /// Committed markers as display-space strokes with their paint color, in draw order.
    pub fn render_plan(&self) -> Vec<(&'static str, f64, Vec<Point>)> {
        let (sx, sy) = self.viewport.scale();
        self.markers
            .iter()
            .map(|m| {
                let pts = m.points.iter().map(|p| Point { x: p.x / sx, y: p.y / sy }).collect();
                (m.pain_type.color(), f64::from(m.brush_size) / sx, pts)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> AnnotationCanvas {
        // 1000x800 image shown at half size
        AnnotationCanvas::new(Viewport::new((1000.0, 800.0), (500.0, 400.0)))
    }

    #[test]
    fn stroke_commits_one_marker_in_image_space() {
        let mut c = canvas();
        c.set_tool(Tool::new(PainType::Burning, 4, 8));
        assert!(c.pointer_down(10.0, 20.0));
        assert!(c.is_marking());
        c.pointer_move(15.0, 25.0);
        c.pointer_move(15.0, 25.0); // duplicate dropped
        let m = c.pointer_up().cloned().unwrap();
        assert_eq!(c.state(), &CanvasState::Clean);
        assert_eq!(m.pain_type, PainType::Burning);
        assert_eq!(m.intensity, 4);
        assert_eq!(m.brush_size, 8);
        assert_eq!(m.points, vec![Point { x: 20.0, y: 40.0 }, Point { x: 30.0, y: 50.0 }]);
    }

    #[test]
    fn click_without_drag_is_a_point_marker() {
        let mut c = canvas();
        c.pointer_down(100.0, 100.0);
        let m = c.pointer_up().unwrap();
        assert_eq!(m.points.len(), 1);
    }

    #[test]
    fn pointer_down_outside_image_is_ignored() {
        let mut c = canvas();
        assert!(!c.pointer_down(600.0, 10.0));
        assert!(c.pointer_up().is_none());
        assert!(c.markers().is_empty());
    }

    #[test]
    fn moves_outside_are_clamped() {
        let mut c = canvas();
        c.pointer_down(490.0, 390.0);
        c.pointer_move(700.0, 700.0);
        let m = c.pointer_up().unwrap();
        assert_eq!(m.points[1], Point { x: 1000.0, y: 800.0 });
    }

    #[test]
    fn tool_change_mid_stroke_applies_next_time() {
        let mut c = canvas();
        c.pointer_down(1.0, 1.0);
        c.set_tool(Tool::new(PainType::Numbness, 1, 3));
        assert_eq!(c.pointer_up().unwrap().pain_type, PainType::Sharp);
        c.pointer_down(2.0, 2.0);
        assert_eq!(c.pointer_up().unwrap().pain_type, PainType::Numbness);
    }

    #[test]
    fn tool_settings_are_clamped() {
        let t = Tool::new(PainType::Dull, 9, 0);
        assert_eq!(t.intensity, MAX_INTENSITY);
        assert_eq!(t.brush_size, MIN_BRUSH_SIZE);
    }

    #[test]
    fn clear_and_undo() {
        let mut c = canvas();
        for x in [10.0, 20.0, 30.0] {
            c.pointer_down(x, x);
            c.pointer_up();
        }
        assert_eq!(c.undo().unwrap().points[0], Point { x: 60.0, y: 60.0 });
        assert_eq!(c.markers().len(), 2);
        c.pointer_down(5.0, 5.0);
        c.clear();
        assert!(!c.is_marking());
        assert!(c.markers().is_empty());
    }

    #[test]
    fn resize_keeps_committed_markers() {
        let mut c = canvas();
        c.pointer_down(50.0, 50.0);
        c.pointer_up();
        c.resize(1000.0, 800.0);
        c.pointer_down(50.0, 50.0);
        c.pointer_up();
        let pts: Vec<_> = c.markers().iter().map(|m| m.points[0]).collect();
        assert_eq!(pts, vec![Point { x: 100.0, y: 100.0 }, Point { x: 50.0, y: 50.0 }]);
        assert!(c.markers().iter().all(|m| validate_marker(m).is_ok()));
    }

    #[test]
    fn render_plan_maps_back_to_display() {
        let mut c = canvas();
        c.set_tool(Tool::new(PainType::Stiffness, 2, 20));
        c.pointer_down(50.0, 40.0);
        c.pointer_up();
        let plan = c.render_plan();
        assert_eq!(plan[0].0, PainType::Stiffness.color());
        assert_eq!(plan[0].1, 10.0);
        assert_eq!(plan[0].2, vec![Point { x: 50.0, y: 40.0 }]);
    }
}
