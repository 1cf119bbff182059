use {
    crate::{RelayConfig, RelayError, ResetReason, ResetSignal},
    com::{Incoming, ViewerRegistry, WsListener},
    futures_util::StreamExt,
    std::{net::SocketAddr, sync::Arc, time::Duration},
    tokio::task::{JoinHandle, JoinSet},
};

/// Accepts viewer connections and keeps the registry in step with them.
///
/// Dropping the ingest stops the listener and every viewer handler. Sinks
/// already registered stay until a broadcast fails on them or the registry
/// is dropped.
pub struct ViewerIngest {
    registry: Arc<ViewerRegistry>,
    _accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl ViewerIngest {
    pub async fn start(
        config: &RelayConfig,
        registry: Arc<ViewerRegistry>,
        reset: ResetSignal,
    ) -> Result<Self, RelayError> {
        let listener = WsListener::bind(config.viewer_addr(), config.max_message_size()).await?;
        let local_addr = listener.local_addr();

        log::info!("viewer ingest listening on ws://{}", local_addr);
        let accept_task = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move {
                let mut handlers = JoinSet::new();
                loop {
                    tokio::select! {
                        accepted = listener.accept() => match accepted {
                            Ok(incoming) => {
                                handlers.spawn(handle_viewer(
                                    incoming,
                                    Arc::clone(&registry),
                                    reset.clone(),
                                ));
                            }
                            Err(e) => {
                                log::warn!("Viewer accept error: {}", e);
                                tokio::time::sleep(Duration::from_millis(100)).await;
                            }
                        },
                        Some(_) = handlers.join_next() => {}
                    }
                }
            }
        });

        Ok(Self {
            registry,
            _accept_task: accept_task,
            local_addr,
        })
    }

    /// Return the local address the service is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn viewer_count(&self) -> usize {
        self.registry.len().await
    }
}

impl Drop for ViewerIngest {
    fn drop(&mut self) {
        self._accept_task.abort();
    }
}

async fn handle_viewer(incoming: Incoming, registry: Arc<ViewerRegistry>, reset: ResetSignal) {
    let addr = incoming.addr();
    let ws_stream = match incoming.upgrade().await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            log::warn!("Viewer handshake failed for {}: {}", addr, e);
            return;
        }
    };

    reset.fire(ResetReason::ViewerConnected);

    let (sink, mut stream) = ws_stream.split();
    let id = registry.register(sink).await;
    log::info!("Viewer {} connected as {}", addr, id);

    // viewers are receive-only; reading just drives close detection
    while let Some(item) = stream.next().await {
        if let Err(e) = item {
            log::debug!("Viewer {} error: {}", addr, e);
            break;
        }
    }

    registry.unregister(id).await;
    reset.fire(ResetReason::ViewerDisconnected);
    log::info!("Viewer {} ({}) disconnected", addr, id);
}
