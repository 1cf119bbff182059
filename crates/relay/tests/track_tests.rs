use base::Vec2;
use image::{Image, PixelFormat, track_color};
use std::time::{Duration, Instant};
use relay::{
    Annotated, BoundingBox, DetectionStage, Detector, IouTracker, NoopDetector, RelayError,
    Tracker,
};

fn person(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
    BoundingBox::new(x1, y1, x2, y2, "person", 0.9)
}

fn ids(boxes: &[BoundingBox]) -> Vec<Option<u32>> {
    boxes.iter().map(|b| b.track_id).collect()
}

#[test]
fn test_iou() {
    let a = person(0.0, 0.0, 10.0, 10.0);
    let b = person(5.0, 0.0, 15.0, 10.0);
    let c = person(20.0, 20.0, 30.0, 30.0);

    assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    assert_eq!(a.iou(&c), 0.0);
    assert_eq!(person(1.0, 1.0, 1.0, 1.0).iou(&person(1.0, 1.0, 1.0, 1.0)), 0.0);
}

#[test]
fn test_tracker_keeps_ids_for_moving_boxes() {
    let mut tracker = IouTracker::default();

    let first = tracker.update(vec![person(0.0, 0.0, 100.0, 100.0), person(300.0, 0.0, 400.0, 100.0)]);
    assert_eq!(ids(&first), vec![Some(1), Some(2)]);

    // both shifted a little, listed in the other order
    let second = tracker.update(vec![person(305.0, 0.0, 405.0, 100.0), person(5.0, 0.0, 105.0, 100.0)]);
    assert_eq!(ids(&second), vec![Some(2), Some(1)]);
}

#[test]
fn test_tracker_does_not_match_other_labels() {
    let mut tracker = IouTracker::default();
    tracker.update(vec![person(0.0, 0.0, 100.0, 100.0)]);

    let cat = BoundingBox::new(0.0, 0.0, 100.0, 100.0, "cat", 0.8);
    let out = tracker.update(vec![cat]);
    assert_eq!(ids(&out), vec![Some(2)]);
}

#[test]
fn test_tracker_forgets_missing_tracks() {
    let mut tracker = IouTracker::new(0.3, 2);
    tracker.update(vec![person(0.0, 0.0, 100.0, 100.0)]);
    assert_eq!(tracker.track_count(), 1);

    tracker.update(Vec::new());
    tracker.update(Vec::new());
    assert_eq!(tracker.track_count(), 1);
    tracker.update(Vec::new());
    assert_eq!(tracker.track_count(), 0);

    let out = tracker.update(vec![person(0.0, 0.0, 100.0, 100.0)]);
    assert_eq!(ids(&out), vec![Some(2)]);
}

#[test]
fn test_reset_restarts_numbering() {
    let mut tracker = IouTracker::default();
    tracker.update(vec![person(0.0, 0.0, 10.0, 10.0), person(50.0, 50.0, 60.0, 60.0)]);
    tracker.reset();
    assert_eq!(tracker.track_count(), 0);

    let out = tracker.update(vec![person(0.0, 0.0, 10.0, 10.0)]);
    assert_eq!(ids(&out), vec![Some(1)]);
}

struct FixedDetector(Vec<BoundingBox>);

impl Detector for FixedDetector {
    fn detect(&mut self, _frame: &Image) -> Result<Vec<BoundingBox>, RelayError> {
        Ok(self.0.clone())
    }
}

struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&mut self, _frame: &Image) -> Result<Vec<BoundingBox>, RelayError> {
        Err(RelayError::Detect("model not loaded".to_string()))
    }
}

fn black(width: usize, height: usize) -> Image {
    Image::black(Vec2::new(width, height))
}

fn pixel(image: &Image, x: usize, y: usize) -> [u8; 3] {
    let i = (y * image.width() + x) * 3;
    [image.data[i], image.data[i + 1], image.data[i + 2]]
}

#[test]
fn test_annotated_draws_tracked_boxes() {
    let mut stage = Annotated::new(
        FixedDetector(vec![person(10.0, 10.0, 30.0, 30.0)]),
        IouTracker::default(),
    );

    let (frame, boxes) = stage.process(black(64, 48)).expect("process failed");
    assert_eq!(ids(&boxes), vec![Some(1)]);
    assert_eq!(frame.format, PixelFormat::Rgb8);
    assert_eq!(pixel(&frame, 10, 10), track_color(1));
    assert_eq!(pixel(&frame, 20, 20), [0, 0, 0]);
}

#[test]
fn test_annotated_reset_resets_tracker() {
    let mut stage = Annotated::new(
        FixedDetector(vec![person(0.0, 0.0, 10.0, 10.0)]),
        IouTracker::new(0.99, 0),
    );

    stage.process(black(32, 32)).unwrap();
    stage.reset().unwrap();
    let (_, boxes) = stage.process(black(32, 32)).unwrap();
    assert_eq!(ids(&boxes), vec![Some(1)]);
}

#[test]
fn test_annotated_converts_rgba_input() {
    let mut stage = Annotated::new(NoopDetector, IouTracker::default());
    let rgba = Image::new(Vec2::new(4, 4), vec![200; 64], PixelFormat::Rgba8);

    let (frame, boxes) = stage.process(rgba).unwrap();
    assert!(boxes.is_empty());
    assert_eq!(frame.format, PixelFormat::Rgb8);
    assert_eq!(frame.data.len(), 48);
}

#[test]
fn test_annotated_propagates_detector_error() {
    let mut stage = Annotated::new(FailingDetector, IouTracker::default());
    assert!(matches!(
        stage.process(black(8, 8)),
        Err(RelayError::Detect(_))
    ));
}

#[test]
fn test_annotated_clips_unbounded_boxes() {
    let mut stage = Annotated::new(
        FixedDetector(vec![
            person(4.0, 4.0, 2.0e8, 20.0),
            person(-f32::INFINITY, -f32::MAX, 10.0, 10.0),
        ]),
        IouTracker::default(),
    );

    let started = Instant::now();
    let (frame, boxes) = stage.process(black(64, 48)).expect("process failed");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(boxes.len(), 2);

    // first box runs off the right edge
    assert_eq!(pixel(&frame, 4, 15), track_color(1));
    assert_eq!(pixel(&frame, 63, 15), track_color(1));
    // second box starts past the top-left corner
    assert_eq!(pixel(&frame, 0, 5), track_color(2));
    assert_eq!(pixel(&frame, 5, 0), track_color(2));
    assert_eq!(pixel(&frame, 10, 2), track_color(2));
}

#[test]
fn test_annotated_skips_nan_boxes() {
    let mut stage = Annotated::new(
        FixedDetector(vec![person(f32::NAN, 0.0, 10.0, 10.0)]),
        IouTracker::default(),
    );

    let (frame, boxes) = stage.process(black(16, 16)).expect("process failed");
    assert_eq!(boxes.len(), 1);
    assert!(frame.data.iter().all(|&b| b == 0));
}
