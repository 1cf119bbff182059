use {
    crate::ComError,
    futures_util::stream::SplitSink,
    std::net::SocketAddr,
    tokio::net::{TcpListener, TcpStream, ToSocketAddrs},
    tokio_websockets::{Limits, Message, ServerBuilder, WebSocketStream},
};

pub type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// A TCP listener that hands out not-yet-upgraded WebSocket connections.
///
/// The handshake is left to `Incoming::upgrade` so a slow or broken peer
/// only stalls its own task, never the accept loop.
pub struct WsListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_message_size: usize,
}

pub struct Incoming {
    stream: TcpStream,
    addr: SocketAddr,
    max_message_size: usize,
}

impl WsListener {
    pub async fn bind(addr: impl ToSocketAddrs, max_message_size: usize) -> Result<Self, ComError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            max_message_size,
        })
    }

    /// Wait for the next TCP connection.
    pub async fn accept(&self) -> Result<Incoming, ComError> {
        let (stream, addr) = self.listener.accept().await?;
        Ok(Incoming {
            stream,
            addr,
            max_message_size: self.max_message_size,
        })
    }

    /// Return the local address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Incoming {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Perform the WebSocket handshake, enforcing the message size limit.
    pub async fn upgrade(self) -> Result<WebSocketStream<TcpStream>, ComError> {
        let limits = Limits::default().max_payload_len(Some(self.max_message_size));
        let (_request, ws_stream) = ServerBuilder::new()
            .limits(limits)
            .accept(self.stream)
            .await?;
        Ok(ws_stream)
    }
}
