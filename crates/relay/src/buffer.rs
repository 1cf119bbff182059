use {
    image::Image,
    std::{sync::Mutex, time::Duration},
    tokio::sync::Notify,
};

#[derive(Default)]
struct SlotState {
    frame: Option<Image>,
    // set by put, cleared by take
    fresh: bool,
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
    arrived: Notify,
}

impl Slot {
    fn put(&self, frame: Image) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.frame = Some(frame);
            state.fresh = true;
        }
        self.arrived.notify_one();
    }

    fn get(&self) -> Option<Image> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.frame.clone()
    }

    fn take(&self) -> Option<Image> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.fresh {
            return None;
        }
        state.fresh = false;
        state.frame.clone()
    }
}

/// Holds the freshest raw frame and the freshest annotated frame.
///
/// Each slot keeps at most one frame; a put overwrites whatever is there,
/// read or not. Reads hand out a copy, so a reader never sees a frame that
/// is still being written. The two slots lock independently and no lock is
/// held across an await.
#[derive(Default)]
pub struct SharedFrameBuffer {
    raw: Slot,
    annotated: Slot,
}

impl SharedFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_raw(&self, frame: Image) {
        self.raw.put(frame);
    }

    /// Copy of the current raw frame, `None` before the first put.
    pub fn get_raw(&self) -> Option<Image> {
        self.raw.get()
    }

    /// Copy of the raw frame if it arrived since the last take.
    pub fn take_raw(&self) -> Option<Image> {
        self.raw.take()
    }

    /// Wait up to `wait` for a raw frame not yet taken.
    pub async fn next_raw(&self, wait: Duration) -> Option<Image> {
        if let Some(frame) = self.raw.take() {
            return Some(frame);
        }
        // a put between the take above and this wait leaves a stored permit
        let _ = tokio::time::timeout(wait, self.raw.arrived.notified()).await;
        self.raw.take()
    }

    pub fn put_annotated(&self, frame: Image) {
        self.annotated.put(frame);
    }

    /// Copy of the current annotated frame, `None` before the first put.
    pub fn get_annotated(&self) -> Option<Image> {
        self.annotated.get()
    }

    /// The annotated frame, or the raw one while nothing has been annotated.
    pub fn get_latest(&self) -> Option<Image> {
        self.get_annotated().or_else(|| self.get_raw())
    }
}
