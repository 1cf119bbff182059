use {
    crate::{RateGate, RelayConfig, SharedFrameBuffer, Shutdown},
    com::ViewerRegistry,
    std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    },
    tokio::{
        sync::mpsc::{self, error::TrySendError},
        task::JoinHandle,
    },
};

/// Encoded frames waiting for the broadcaster. Anything beyond this is
/// dropped so a slow viewer can never stall the forward loop.
pub const FORWARD_QUEUE: usize = 2;

/// Counters published by the forward loop.
#[derive(Debug, Default)]
pub struct ForwardStats {
    encoded: AtomicU64,
    queued: AtomicU64,
    overflowed: AtomicU64,
    broadcasts: AtomicU64,
}

impl ForwardStats {
    pub fn encoded(&self) -> u64 {
        self.encoded.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Frames dropped because the broadcaster was still busy.
    pub fn overflowed(&self) -> u64 {
        self.overflowed.load(Ordering::Relaxed)
    }

    /// Broadcast passes completed by the broadcaster task.
    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }
}

/// Running forward loop and its broadcaster.
pub struct ForwardHandle {
    stats: Arc<ForwardStats>,
    forward: JoinHandle<()>,
    broadcaster: JoinHandle<()>,
}

impl ForwardHandle {
    pub fn stats(&self) -> Arc<ForwardStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for the forward loop to exit, then for the broadcaster to drain.
    pub async fn join(self) {
        if let Err(e) = self.forward.await {
            log::error!("Forward worker ended abnormally: {}", e);
        }
        if let Err(e) = self.broadcaster.await {
            log::error!("Broadcaster ended abnormally: {}", e);
        }
    }
}

/// Samples the newest frame at a fixed rate, encodes it as JPEG and hands it
/// to the broadcaster.
pub struct ForwardWorker {
    buffer: Arc<SharedFrameBuffer>,
    registry: Arc<ViewerRegistry>,
    shutdown: Shutdown,
    forward_rate: f32,
    jpeg_quality: u8,
    idle_sleep: Duration,
}

impl ForwardWorker {
    pub fn new(
        config: &RelayConfig,
        buffer: Arc<SharedFrameBuffer>,
        registry: Arc<ViewerRegistry>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            buffer,
            registry,
            shutdown,
            forward_rate: config.forward_rate(),
            jpeg_quality: config.jpeg_quality(),
            idle_sleep: config.idle_sleep(),
        }
    }

    pub fn spawn(self) -> ForwardHandle {
        let stats = Arc::new(ForwardStats::default());
        let (tx, rx) = mpsc::channel(FORWARD_QUEUE);
        let broadcaster = tokio::spawn(broadcast_frames(
            Arc::clone(&self.registry),
            rx,
            Arc::clone(&stats),
        ));
        let forward = tokio::spawn(self.run(tx, Arc::clone(&stats)));
        ForwardHandle {
            stats,
            forward,
            broadcaster,
        }
    }

    async fn run(self, tx: mpsc::Sender<Vec<u8>>, stats: Arc<ForwardStats>) {
        let mut gate = RateGate::new(self.forward_rate);
        log::info!("Forward worker started at {} fps", self.forward_rate);

        while !self.shutdown.is_triggered() {
            if !gate.ready(Instant::now()) {
                tokio::time::sleep(self.idle_sleep).await;
                continue;
            }

            // nobody to send to
            if self.registry.is_empty().await {
                continue;
            }

            // no frame yet
            let Some(frame) = self.buffer.get_latest() else {
                continue;
            };

            let quality = self.jpeg_quality;
            let encoded =
                match tokio::task::spawn_blocking(move || image::encode_jpeg(&frame, quality)).await {
                    Ok(Ok(encoded)) => encoded,
                    Ok(Err(e)) => {
                        log::warn!("Forward encode failed: {}", e);
                        continue;
                    }
                    Err(e) => {
                        log::error!("Forward encode task lost: {}", e);
                        break;
                    }
                };
            stats.encoded.fetch_add(1, Ordering::Relaxed);

            match tx.try_send(encoded) {
                Ok(()) => {
                    stats.queued.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    stats.overflowed.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Broadcaster busy, forward frame dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    log::warn!("Broadcaster gone, stopping forward worker");
                    break;
                }
            }
        }

        log::info!("Forward worker stopped");
    }
}

async fn broadcast_frames(
    registry: Arc<ViewerRegistry>,
    mut rx: mpsc::Receiver<Vec<u8>>,
    stats: Arc<ForwardStats>,
) {
    while let Some(frame) = rx.recv().await {
        let report = registry.broadcast(frame).await;
        stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        if report.removed > 0 {
            log::info!(
                "Broadcast reached {} viewers, removed {}",
                report.delivered,
                report.removed
            );
        }
    }
}
