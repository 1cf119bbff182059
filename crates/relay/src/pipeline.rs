use {
    crate::{
        CameraIngest, ControlDirection, DetectionHandle, DetectionStage, DetectionStats,
        DetectionWorker, ForwardHandle, ForwardStats, ForwardWorker, RelayConfig, RelayError,
        ResetReason, SharedFrameBuffer, Shutdown, ViewerIngest, reset_channel,
    },
    com::{ControlServer, ViewerRegistry},
    std::{net::SocketAddr, sync::Arc},
};

/// The whole relay: camera and viewer endpoints, the control endpoint and
/// the two worker loops sharing one frame buffer.
pub struct Relay {
    buffer: Arc<SharedFrameBuffer>,
    registry: Arc<ViewerRegistry>,
    control: Arc<ControlServer>,
    camera: CameraIngest,
    viewer: ViewerIngest,
    detection: DetectionHandle,
    forward: ForwardHandle,
    shutdown: Shutdown,
}

impl Relay {
    pub async fn start<S>(config: RelayConfig, stage: S) -> Result<Self, RelayError>
    where
        S: DetectionStage + 'static,
    {
        config.validate()?;
        if config.preview() {
            log::info!("Local preview requested; this build has no display, ignoring");
        }

        let buffer = Arc::new(SharedFrameBuffer::new());
        let registry = Arc::new(ViewerRegistry::new(config.send_timeout()));
        let shutdown = Shutdown::new();
        let (reset, resets) = reset_channel();

        // the stage starts from a clean tracker whatever it was built with
        reset.fire(ResetReason::Startup);

        let control = Arc::new(ControlServer::bind(config.control_addr()).await?);
        log::info!("direction control listening on ws://{}", control.local_addr());
        let camera = CameraIngest::start(&config, Arc::clone(&buffer), reset.clone()).await?;
        let viewer = ViewerIngest::start(&config, Arc::clone(&registry), reset).await?;

        let mapper = Arc::new(ControlDirection::new(
            Arc::clone(&control),
            config.horizontal_fov(),
        ));
        let detection = DetectionWorker::new(
            &config,
            stage,
            mapper,
            Arc::clone(&buffer),
            resets,
            shutdown.clone(),
        )
        .spawn();
        let forward = ForwardWorker::new(
            &config,
            Arc::clone(&buffer),
            Arc::clone(&registry),
            shutdown.clone(),
        )
        .spawn();

        Ok(Self {
            buffer,
            registry,
            control,
            camera,
            viewer,
            detection,
            forward,
            shutdown,
        })
    }

    pub fn camera_addr(&self) -> SocketAddr {
        self.camera.local_addr()
    }

    pub fn viewer_addr(&self) -> SocketAddr {
        self.viewer.local_addr()
    }

    pub fn control_addr(&self) -> SocketAddr {
        self.control.local_addr()
    }

    pub fn buffer(&self) -> &Arc<SharedFrameBuffer> {
        &self.buffer
    }

    pub fn camera(&self) -> &CameraIngest {
        &self.camera
    }

    pub async fn viewer_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn detection_stats(&self) -> Arc<DetectionStats> {
        self.detection.stats()
    }

    pub fn forward_stats(&self) -> Arc<ForwardStats> {
        self.forward.stats()
    }

    /// Stop both worker loops and close the listeners.
    pub async fn stop(self) {
        log::info!("Stopping relay");
        self.shutdown.trigger();
        self.detection.join().await;
        self.forward.join().await;
        log::info!("Relay stopped");
    }
}
