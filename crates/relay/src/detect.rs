use {
    crate::RelayError,
    image::{Image, draw_rect, track_color},
    serde::Serialize,
};

const UNTRACKED_COLOR: [u8; 3] = [0, 255, 0];
const BOX_THICKNESS: i32 = 2;

/// One detected object, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub label: String,
    pub confidence: f32,
    #[serde(rename = "id")]
    pub track_id: Option<u32>,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            label: label.into(),
            confidence,
            track_id: None,
        }
    }

    pub fn with_track_id(mut self, track_id: u32) -> Self {
        self.track_id = Some(track_id);
        self
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with `other`, 0 for disjoint boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Object detector: frame in, boxes out.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Image) -> Result<Vec<BoundingBox>, RelayError>;
}

/// Assigns stable identifiers to boxes across frames.
pub trait Tracker: Send {
    fn update(&mut self, boxes: Vec<BoundingBox>) -> Vec<BoundingBox>;

    /// Forget all tracks; the next new track is numbered 1.
    fn reset(&mut self);
}

/// The full detection step the relay drives: raw frame in, annotated frame
/// and ordered boxes out.
pub trait DetectionStage: Send {
    fn process(&mut self, frame: Image) -> Result<(Image, Vec<BoundingBox>), RelayError>;

    fn reset(&mut self) -> Result<(), RelayError>;
}

/// Box corners as pixel coordinates; `None` when any corner is NaN.
/// Infinite and out-of-range values saturate and are clipped by `draw_rect`.
fn pixel_corners(b: &BoundingBox) -> Option<[i32; 4]> {
    let corners = [b.x1, b.y1, b.x2, b.y2];
    if corners.iter().any(|v| v.is_nan()) {
        return None;
    }
    Some(corners.map(|v| v.round() as i32))
}

/// A detector followed by a tracker, with boxes drawn onto the frame.
pub struct Annotated<D, T> {
    detector: D,
    tracker: T,
}

impl<D: Detector, T: Tracker> Annotated<D, T> {
    pub fn new(detector: D, tracker: T) -> Self {
        Self { detector, tracker }
    }
}

impl<D: Detector, T: Tracker> DetectionStage for Annotated<D, T> {
    fn process(&mut self, frame: Image) -> Result<(Image, Vec<BoundingBox>), RelayError> {
        let mut frame = image::to_rgb(&frame)?;
        let boxes = self.detector.detect(&frame)?;
        let boxes = self.tracker.update(boxes);
        for b in &boxes {
            let Some([x1, y1, x2, y2]) = pixel_corners(b) else {
                continue;
            };
            let color = b.track_id.map(track_color).unwrap_or(UNTRACKED_COLOR);
            draw_rect(&mut frame, x1, y1, x2, y2, BOX_THICKNESS, color);
        }
        Ok((frame, boxes))
    }

    fn reset(&mut self) -> Result<(), RelayError> {
        self.tracker.reset();
        Ok(())
    }
}

/// Detector that never finds anything; runs the relay without a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDetector;

impl Detector for NoopDetector {
    fn detect(&mut self, _frame: &Image) -> Result<Vec<BoundingBox>, RelayError> {
        Ok(Vec::new())
    }
}
