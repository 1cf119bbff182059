use {
    crate::{ComError, WsListener, WsSink},
    futures_util::{SinkExt, StreamExt},
    serde::Serialize,
    std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration},
    tokio::{
        net::ToSocketAddrs,
        sync::{Mutex, watch},
        task::JoinHandle,
        time::timeout,
    },
    tokio_websockets::Message,
};

// control messages are tiny
const CONTROL_MESSAGE_SIZE: usize = 64 * 1024;

// bound on one control send
const CONTROL_SEND_TIMEOUT: Duration = Duration::from_secs(1);

struct ControlClients {
    sinks: Mutex<HashMap<SocketAddr, WsSink>>,
    count: watch::Sender<usize>,
}

impl ControlClients {
    async fn insert(&self, addr: SocketAddr, sink: WsSink) {
        let mut sinks = self.sinks.lock().await;
        sinks.insert(addr, sink);
        self.count.send_replace(sinks.len());
    }

    async fn remove(&self, addr: &SocketAddr) {
        let mut sinks = self.sinks.lock().await;
        if sinks.remove(addr).is_some() {
            self.count.send_replace(sinks.len());
        }
    }
}

/// WebSocket endpoint for the downstream direction controller.
///
/// Any number of controllers may connect; each JSON message goes to all of
/// them as a text frame. Incoming text is ignored.
pub struct ControlServer {
    clients: Arc<ControlClients>,
    connected: watch::Receiver<usize>,
    _accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl ControlServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, ComError> {
        let listener = WsListener::bind(addr, CONTROL_MESSAGE_SIZE).await?;
        let local_addr = listener.local_addr();

        let (count, connected) = watch::channel(0usize);
        let clients = Arc::new(ControlClients {
            sinks: Mutex::new(HashMap::new()),
            count,
        });

        let accept_task = tokio::spawn({
            let clients = Arc::clone(&clients);
            async move {
                loop {
                    let incoming = match listener.accept().await {
                        Ok(incoming) => incoming,
                        Err(e) => {
                            log::warn!("Control accept error: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };
                    let clients = Arc::clone(&clients);
                    tokio::spawn(async move {
                        let addr = incoming.addr();
                        let ws_stream = match incoming.upgrade().await {
                            Ok(ws_stream) => ws_stream,
                            Err(e) => {
                                log::warn!("Control handshake failed for {}: {}", addr, e);
                                return;
                            }
                        };
                        let (sink, mut stream) = ws_stream.split();
                        clients.insert(addr, sink).await;
                        log::info!("Control client {} connected", addr);

                        while let Some(item) = stream.next().await {
                            match item {
                                Ok(msg) => {
                                    if let Some(text) = msg.as_text() {
                                        log::debug!("Control client {} says: {}", addr, text);
                                    }
                                }
                                Err(e) => {
                                    log::warn!("Control client {} error: {}", addr, e);
                                    break;
                                }
                            }
                        }

                        clients.remove(&addr).await;
                        log::info!("Control client {} disconnected", addr);
                    });
                }
            }
        });

        Ok(Self {
            clients,
            connected,
            _accept_task: accept_task,
            local_addr,
        })
    }

    /// Resolve once at least one controller is connected.
    pub async fn wait_for_client(&self) -> Result<(), ComError> {
        let mut connected = self.connected.clone();
        connected
            .wait_for(|count| *count > 0)
            .await
            .map_err(|_| ComError::ConnectionClosed)?;
        Ok(())
    }

    /// Serialize `value` and send it to every controller.
    ///
    /// Controllers that fail to receive are dropped. Returns the number of
    /// controllers reached.
    pub async fn send_json<T: Serialize>(&self, value: &T) -> Result<usize, ComError> {
        let text = serde_json::to_string(value)?;
        let message = Message::text(text);

        let mut sinks = self.clients.sinks.lock().await;
        let mut failed = Vec::new();
        for (addr, sink) in sinks.iter_mut() {
            match timeout(CONTROL_SEND_TIMEOUT, sink.send(message.clone())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!("Failed to send control message to {}: {}", addr, e);
                    failed.push(*addr);
                }
                Err(_) => {
                    log::warn!("Control send to {} timed out", addr);
                    failed.push(*addr);
                }
            }
        }
        for addr in &failed {
            sinks.remove(addr);
        }
        self.clients.count.send_replace(sinks.len());

        Ok(sinks.len())
    }

    /// Return the number of currently connected controllers.
    pub async fn client_count(&self) -> usize {
        self.clients.sinks.lock().await.len()
    }

    /// Return the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self._accept_task.abort();
    }
}
