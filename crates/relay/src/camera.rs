use {
    crate::{CameraPolicy, RelayConfig, RelayError, ResetReason, ResetSignal, SharedFrameBuffer},
    base::Vec2,
    com::{Incoming, WsListener},
    futures_util::{SinkExt, StreamExt},
    std::{
        net::SocketAddr,
        sync::{
            Arc,
            atomic::{AtomicU64, AtomicUsize, Ordering},
        },
        time::Duration,
    },
    tokio::task::{JoinHandle, JoinSet},
};

#[derive(Default)]
struct CameraStats {
    active: AtomicUsize,
    received: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Clone)]
struct CameraContext {
    buffer: Arc<SharedFrameBuffer>,
    reset: ResetSignal,
    stats: Arc<CameraStats>,
    size: Vec2<usize>,
    policy: CameraPolicy,
}

// releases the active-camera slot on every exit path
struct ActiveCamera<'a>(&'a AtomicUsize);

impl Drop for ActiveCamera<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl CameraContext {
    fn claim(&self) -> Option<ActiveCamera<'_>> {
        let active = &self.stats.active;
        match self.policy {
            CameraPolicy::Shared => {
                active.fetch_add(1, Ordering::AcqRel);
            }
            CameraPolicy::Exclusive => {
                active
                    .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                    .ok()?;
            }
        }
        Some(ActiveCamera(active))
    }
}

/// Accepts camera connections and feeds decoded frames into the raw slot.
///
/// Every accepted camera fires a tracker reset when it starts streaming and
/// another when it goes away. A failing camera only ends its own handler.
/// Dropping the ingest stops the listener and every camera handler.
pub struct CameraIngest {
    stats: Arc<CameraStats>,
    _accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl CameraIngest {
    pub async fn start(
        config: &RelayConfig,
        buffer: Arc<SharedFrameBuffer>,
        reset: ResetSignal,
    ) -> Result<Self, RelayError> {
        let listener = WsListener::bind(config.camera_addr(), config.max_message_size()).await?;
        let local_addr = listener.local_addr();
        let stats = Arc::new(CameraStats::default());

        let context = CameraContext {
            buffer,
            reset,
            stats: Arc::clone(&stats),
            size: config.size(),
            policy: config.camera_policy(),
        };

        log::info!("camera ingest listening on ws://{}", local_addr);
        let accept_task = tokio::spawn(async move {
            // handlers live as long as the accept loop; aborting it drops them all
            let mut handlers = JoinSet::new();
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok(incoming) => {
                            handlers.spawn(handle_camera(incoming, context.clone()));
                        }
                        Err(e) => {
                            log::warn!("Camera accept error: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    },
                    Some(_) = handlers.join_next() => {}
                }
            }
        });

        Ok(Self {
            stats,
            _accept_task: accept_task,
            local_addr,
        })
    }

    /// Return the local address the service is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_cameras(&self) -> usize {
        self.stats.active.load(Ordering::Acquire)
    }

    /// Frames decoded and stored since start.
    pub fn received_frames(&self) -> u64 {
        self.stats.received.load(Ordering::Relaxed)
    }

    /// Payloads discarded because they matched no accepted layout.
    pub fn dropped_frames(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for CameraIngest {
    fn drop(&mut self) {
        self._accept_task.abort();
    }
}

async fn handle_camera(incoming: Incoming, context: CameraContext) {
    let addr = incoming.addr();
    let mut ws_stream = match incoming.upgrade().await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            log::warn!("Camera handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let Some(_active) = context.claim() else {
        log::warn!("Rejecting camera {}: another camera is streaming", addr);
        if let Err(e) = ws_stream.close().await {
            log::debug!("Closing rejected camera {} failed: {}", addr, e);
        }
        return;
    };

    log::info!("Camera {} connected", addr);
    context.reset.fire(ResetReason::CameraConnected);

    while let Some(item) = ws_stream.next().await {
        let msg = match item {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Camera {} error: {}", addr, e);
                break;
            }
        };
        if !msg.is_binary() {
            continue;
        }

        let payload = msg.into_payload().to_vec();
        let len = payload.len();
        let size = context.size;
        match tokio::task::spawn_blocking(move || image::decode_frame(&payload, size)).await {
            Ok(Some(frame)) => {
                context.buffer.put_raw(frame);
                context.stats.received.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                context.stats.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("Dropped {}-byte payload from camera {}", len, addr);
            }
            Err(e) => {
                log::warn!("Decode task for camera {} failed: {}", addr, e);
            }
        }
    }

    context.reset.fire(ResetReason::CameraDisconnected);
    log::info!("Camera {} disconnected", addr);
}
