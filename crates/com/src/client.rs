use {
    crate::ComError,
    futures_util::{SinkExt, StreamExt},
    std::net::SocketAddr,
    tokio::net::TcpStream,
    tokio_websockets::{ClientBuilder, MaybeTlsStream, Message, WebSocketStream},
};

/// Minimal WebSocket peer used by cameras, viewers and controllers.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ComError> {
        let uri: http::Uri = format!("ws://{}", addr).parse().map_err(|e| {
            ComError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid WebSocket URI: {e}"),
            ))
        })?;
        let (stream, _response) = ClientBuilder::from_uri(uri).connect().await?;
        Ok(Self { stream })
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), ComError> {
        self.stream.send(Message::binary(data)).await?;
        Ok(())
    }

    pub async fn send_text(&mut self, text: String) -> Result<(), ComError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    /// Receive the next binary message, skipping text and control frames.
    ///
    /// Returns `ComError::ConnectionClosed` when the server closes.
    pub async fn recv(&mut self) -> Result<Vec<u8>, ComError> {
        loop {
            match self.stream.next().await {
                Some(Ok(msg)) => {
                    if msg.is_binary() {
                        return Ok(msg.into_payload().to_vec());
                    }
                }
                Some(Err(e)) => return Err(ComError::from(e)),
                None => return Err(ComError::ConnectionClosed),
            }
        }
    }

    /// Receive the next text message, skipping binary and control frames.
    pub async fn recv_text(&mut self) -> Result<String, ComError> {
        loop {
            match self.stream.next().await {
                Some(Ok(msg)) => {
                    if let Some(text) = msg.as_text() {
                        return Ok(text.to_string());
                    }
                }
                Some(Err(e)) => return Err(ComError::from(e)),
                None => return Err(ComError::ConnectionClosed),
            }
        }
    }

    /// Send a close frame and shut the connection down.
    pub async fn close(mut self) -> Result<(), ComError> {
        self.stream.close().await?;
        Ok(())
    }
}
