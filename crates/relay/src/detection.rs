use {
    crate::{
        DetectionStage, DirectionMapper, FpsCounter, RateGate, RelayConfig, ResetEvents,
        SharedFrameBuffer, Shutdown, round_angle,
    },
    std::{
        panic::{AssertUnwindSafe, catch_unwind},
        sync::{
            Arc,
            atomic::{AtomicU32, AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    },
    tokio::task::JoinHandle,
};

/// Counters published by the detection loop.
#[derive(Debug, Default)]
pub struct DetectionStats {
    processed: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
    resets: AtomicU64,
    fps: AtomicU32,
}

impl DetectionStats {
    /// Frames that made it through the stage.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Frames taken from the raw slot but dropped by the rate gate.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    /// Processed frames during the last full second.
    pub fn fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }
}

/// Running detection loop.
pub struct DetectionHandle {
    stats: Arc<DetectionStats>,
    join: JoinHandle<()>,
}

impl DetectionHandle {
    pub fn stats(&self) -> Arc<DetectionStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the loop to notice shutdown and exit.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            log::error!("Detection worker ended abnormally: {}", e);
        }
    }
}

/// Pulls raw frames, runs the detection stage, publishes annotated frames
/// and steers the direction mapper toward the first box.
pub struct DetectionWorker<S, M> {
    stage: S,
    mapper: Arc<M>,
    buffer: Arc<SharedFrameBuffer>,
    resets: ResetEvents,
    shutdown: Shutdown,
    frame_rate: f32,
    poll_timeout: Duration,
    idle_sleep: Duration,
    wait_for_control: bool,
}

impl<S, M> DetectionWorker<S, M>
where
    S: DetectionStage + 'static,
    M: DirectionMapper,
{
    pub fn new(
        config: &RelayConfig,
        stage: S,
        mapper: Arc<M>,
        buffer: Arc<SharedFrameBuffer>,
        resets: ResetEvents,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            stage,
            mapper,
            buffer,
            resets,
            shutdown,
            frame_rate: config.frame_rate(),
            poll_timeout: config.poll_timeout(),
            idle_sleep: config.idle_sleep(),
            wait_for_control: config.wait_for_control(),
        }
    }

    pub fn spawn(self) -> DetectionHandle {
        let stats = Arc::new(DetectionStats::default());
        let join = tokio::spawn(self.run(Arc::clone(&stats)));
        DetectionHandle { stats, join }
    }

    async fn run(self, stats: Arc<DetectionStats>) {
        let Self {
            mut stage,
            mapper,
            buffer,
            mut resets,
            shutdown,
            frame_rate,
            poll_timeout,
            idle_sleep,
            wait_for_control,
        } = self;

        if wait_for_control && !wait_for_mapper(mapper.as_ref(), &shutdown, poll_timeout).await {
            return;
        }

        let mut gate = RateGate::new(frame_rate);
        let mut fps = FpsCounter::new(Instant::now());
        let mut target: Option<f32> = None;
        log::info!("Detection worker started at {} fps", frame_rate);

        while !shutdown.is_triggered() {
            while let Some(reason) = resets.try_next() {
                match stage.reset() {
                    Ok(()) => {
                        stats.resets.fetch_add(1, Ordering::Relaxed);
                        log::info!("Tracker reset ({})", reason);
                    }
                    Err(e) => log::warn!("Tracker reset ({}) failed: {}", reason, e),
                }
            }

            let Some(frame) = buffer.next_raw(poll_timeout).await else {
                tokio::time::sleep(idle_sleep).await;
                continue;
            };

            if !gate.ready(Instant::now()) {
                stats.skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let frame_width = frame.width() as u32;
            let joined = tokio::task::spawn_blocking(move || {
                let result = catch_unwind(AssertUnwindSafe(|| stage.process(frame)));
                (stage, result)
            })
            .await;
            let result = match joined {
                Ok((returned, result)) => {
                    stage = returned;
                    result
                }
                Err(e) => {
                    log::error!("Detection task lost: {}", e);
                    return;
                }
            };

            match result {
                Ok(Ok((annotated, boxes))) => {
                    buffer.put_annotated(annotated);
                    stats.processed.fetch_add(1, Ordering::Relaxed);

                    target = boxes
                        .first()
                        .map(|first| round_angle(mapper.angle(first.x1, first.x2, frame_width)));
                    if target.is_some() {
                        if let Err(e) = mapper.send(&boxes, frame_width).await {
                            log::warn!("Direction update failed: {}", e);
                        }
                    }
                }
                Ok(Err(e)) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Detection failed, frame skipped: {}", e);
                }
                Err(_) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    log::error!("Detection stage panicked, frame skipped");
                }
            }

            if let Some(rate) = fps.tick(Instant::now()) {
                stats.fps.store(rate, Ordering::Relaxed);
                match target {
                    Some(angle) => log::debug!("Detection at {} fps, target at {} degrees", rate, angle),
                    None => log::debug!("Detection at {} fps, no target", rate),
                }
            }
        }

        log::info!("Detection worker stopped");
    }
}

async fn wait_for_mapper<M: DirectionMapper>(
    mapper: &M,
    shutdown: &Shutdown,
    poll_timeout: Duration,
) -> bool {
    log::info!("Waiting for the direction control client");
    while !shutdown.is_triggered() {
        match tokio::time::timeout(poll_timeout, mapper.ready()).await {
            Ok(Ok(())) => {
                log::info!("Direction control client ready");
                return true;
            }
            Ok(Err(e)) => {
                log::error!("Direction control unavailable: {}", e);
                return false;
            }
            Err(_) => continue,
        }
    }
    false
}
