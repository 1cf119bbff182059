use crate::{BoundingBox, Tracker};

// minimum overlap to continue a track
const DEFAULT_IOU_THRESHOLD: f32 = 0.3;

// frames a track survives without a match
const DEFAULT_MAX_MISSED: u32 = 30;

struct Track {
    id: u32,
    bbox: BoundingBox,
    missed: u32,
}

/// Greedy IoU tracker.
///
/// Each detection, in order, takes the unmatched track of the same label it
/// overlaps most (above the threshold); otherwise it opens a new track.
/// Output order equals input order.
pub struct IouTracker {
    tracks: Vec<Track>,
    next_id: u32,
    iou_threshold: f32,
    max_missed: u32,
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_MISSED)
    }
}

impl IouTracker {
    pub fn new(iou_threshold: f32, max_missed: u32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            iou_threshold,
            max_missed,
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

impl Tracker for IouTracker {
    fn update(&mut self, boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
        let mut matched = vec![false; self.tracks.len()];
        let mut out = Vec::with_capacity(boxes.len());
        let mut opened = Vec::new();

        for mut bbox in boxes {
            let best = self
                .tracks
                .iter()
                .enumerate()
                .filter(|(i, t)| !matched[*i] && t.bbox.label == bbox.label)
                .map(|(i, t)| (i, t.bbox.iou(&bbox)))
                .filter(|(_, iou)| *iou >= self.iou_threshold)
                .max_by(|a, b| a.1.total_cmp(&b.1));

            match best {
                Some((i, _)) => {
                    matched[i] = true;
                    let track = &mut self.tracks[i];
                    track.bbox = bbox.clone();
                    track.missed = 0;
                    bbox.track_id = Some(track.id);
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    bbox.track_id = Some(id);
                    opened.push(Track {
                        id,
                        bbox: bbox.clone(),
                        missed: 0,
                    });
                }
            }
            out.push(bbox);
        }

        for (track, hit) in self.tracks.iter_mut().zip(&matched) {
            if !hit {
                track.missed += 1;
            }
        }
        let max_missed = self.max_missed;
        self.tracks.retain(|t| t.missed <= max_missed);
        self.tracks.extend(opened);

        out
    }

    fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }
}
