use {std::fmt, tokio::sync::mpsc};

/// Why the tracker was asked to restart its identifier numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    Startup,
    CameraConnected,
    CameraDisconnected,
    ViewerConnected,
    ViewerDisconnected,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::Startup => write!(f, "startup"),
            ResetReason::CameraConnected => write!(f, "camera connected"),
            ResetReason::CameraDisconnected => write!(f, "camera disconnected"),
            ResetReason::ViewerConnected => write!(f, "viewer connected"),
            ResetReason::ViewerDisconnected => write!(f, "viewer disconnected"),
        }
    }
}

/// Fire-and-forget sender side of the tracker-reset signal.
#[derive(Clone)]
pub struct ResetSignal {
    tx: mpsc::UnboundedSender<ResetReason>,
}

/// Receiving side, drained by whoever owns the tracker.
pub struct ResetEvents {
    rx: mpsc::UnboundedReceiver<ResetReason>,
}

pub fn reset_channel() -> (ResetSignal, ResetEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ResetSignal { tx }, ResetEvents { rx })
}

impl ResetSignal {
    pub fn fire(&self, reason: ResetReason) {
        if self.tx.send(reason).is_err() {
            log::debug!("tracker reset ({}) dropped, no tracker attached", reason);
        }
    }
}

impl ResetEvents {
    /// Next pending reset, without waiting.
    pub fn try_next(&mut self) -> Option<ResetReason> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next reset; `None` once every signal is dropped.
    pub async fn next(&mut self) -> Option<ResetReason> {
        self.rx.recv().await
    }
}
