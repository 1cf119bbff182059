use {
    crate::WsSink,
    futures_util::{Sink, SinkExt},
    std::{
        collections::HashMap,
        fmt,
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    },
    tokio::{sync::Mutex, time::timeout},
    tokio_websockets::Message,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer#{}", self.0)
    }
}

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub removed: usize,
}

/// The set of live viewer connections.
///
/// One lock covers membership changes and the whole broadcast pass, so a
/// viewer is never written to after its removal started and removal never
/// races a send to the same viewer. Every send is bounded by `send_timeout`;
/// a viewer that errors or times out is dropped before the pass returns.
pub struct ViewerRegistry<S = WsSink> {
    members: Mutex<HashMap<ViewerId, S>>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl<S> ViewerRegistry<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: fmt::Display,
{
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            send_timeout,
        }
    }

    pub async fn register(&self, sink: S) -> ViewerId {
        let id = ViewerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut members = self.members.lock().await;
        members.insert(id, sink);
        log::info!("{} registered, {} viewers", id, members.len());
        id
    }

    /// Remove a viewer. Returns `false` when it was already gone, e.g. dropped
    /// by a failed broadcast.
    pub async fn unregister(&self, id: ViewerId) -> bool {
        let mut members = self.members.lock().await;
        let removed = members.remove(&id).is_some();
        if removed {
            log::info!("{} unregistered, {} viewers", id, members.len());
        }
        removed
    }

    /// Send `frame` to every member, dropping the ones that fail.
    pub async fn broadcast(&self, frame: Vec<u8>) -> BroadcastReport {
        if frame.is_empty() {
            return BroadcastReport::default();
        }
        let message = Message::binary(frame);

        let mut members = self.members.lock().await;
        let mut failed = Vec::new();
        let mut delivered = 0;

        for (id, sink) in members.iter_mut() {
            match timeout(self.send_timeout, sink.send(message.clone())).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    log::warn!("Failed to send to {}: {}", id, e);
                    failed.push(*id);
                }
                Err(_) => {
                    log::warn!("Send to {} timed out after {:?}", id, self.send_timeout);
                    failed.push(*id);
                }
            }
        }

        for id in &failed {
            members.remove(id);
        }
        if !failed.is_empty() {
            log::info!(
                "Removed {} closed viewers, {} remaining",
                failed.len(),
                members.len()
            );
        }

        BroadcastReport {
            delivered,
            removed: failed.len(),
        }
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ViewerId) -> bool {
        self.members.lock().await.contains_key(&id)
    }
}
