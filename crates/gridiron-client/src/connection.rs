//! Live WebSocket connection with automatic reconnect.
//!
//! [`ConnectionManager::connect`] spawns a task that owns the socket. The
//! task reports status transitions through the caller's callback, answers
//! server `Ping` frames with `Pong`, and hands every decoded event batch to
//! the subscribers of the returned [`LiveConnection`]. The handle is owned
//! by the caller; closing or dropping it stops the task for good.
//!
//! Reconnect delays grow with every session that ends without delivering a
//! frame, so a server that accepts and immediately drops the socket is
//! retried on the full backoff schedule. The schedule starts over only
//! after a session has delivered at least one valid frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use parking_lot::ReentrantMutex;
use gridiron_core::{SubscriberRegistry, SubscriptionId};
use gridiron_types::{ControlMessage, NormalizedEvent, ServerFrame, decode_server_frame, encode_control};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Status callback shared with the connection task.
type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Connection status as shown to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionStatus {
    /// Not connected; a reconnect may be pending.
    Disc,
    /// A connection attempt is in progress.
    Connecting,
    /// The socket is open and frames are flowing.
    Live,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disc => "DISC",
            Self::Connecting => "CONNECTING",
            Self::Live => "LIVE",
        };
        f.write_str(label)
    }
}

/// Builder for a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    url: String,
    backoff: Backoff,
}

impl ConnectionManager {
    /// Target the given WebSocket URL with the default reconnect schedule.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backoff: Backoff::default(),
        }
    }

    /// Use a custom reconnect schedule.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// The target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the connection. Must be called from within a tokio runtime.
    ///
    /// `on_status` is invoked on every status transition until the
    /// returned handle is closed.
    pub fn connect<F>(self, on_status: F) -> LiveConnection
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        let subscribers = Arc::new(SubscriberRegistry::new());
        let lifecycle = Arc::new(Lifecycle::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

        let reporter = StatusReporter {
            callback: Arc::new(on_status),
            status: status_tx,
            lifecycle: Arc::clone(&lifecycle),
        };
        let task = ConnectionTask {
            url: self.url,
            backoff: self.backoff,
            subscribers: Arc::clone(&subscribers),
            lifecycle: Arc::clone(&lifecycle),
            shutdown: shutdown_rx,
            reporter,
        };
        tokio::spawn(task.run());

        LiveConnection {
            subscribers,
            lifecycle,
            shutdown: shutdown_tx,
            status: status_rx,
        }
    }
}

/// Open/closed flag shared by the handle and its task.
///
/// Status reports and batch deliveries run under the same reentrant gate
/// that [`Lifecycle::close`] takes, so once `close` returns nothing else is
/// delivered, whichever thread the task runs on. A handler may close the
/// connection from inside a delivery.
#[derive(Debug, Default)]
struct Lifecycle {
    closed: AtomicBool,
    gate: ReentrantMutex<()>,
}

impl Lifecycle {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run `deliver` unless closed. Returns `None` once closed.
    fn run_if_open<R>(&self, deliver: impl FnOnce() -> R) -> Option<R> {
        let _gate = self.gate.lock();
        (!self.is_closed()).then(deliver)
    }

    /// Mark closed. Returns `false` if it already was.
    fn close(&self) -> bool {
        let _gate = self.gate.lock();
        !self.closed.swap(true, Ordering::SeqCst)
    }
}

/// Caller-owned handle to a running connection.
pub struct LiveConnection {
    subscribers: Arc<SubscriberRegistry<[NormalizedEvent]>>,
    lifecycle: Arc<Lifecycle>,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<ConnectionStatus>,
}

impl LiveConnection {
    /// Register a handler for decoded event batches.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&[NormalizedEvent]) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(handler)
    }

    /// Cancel a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// The most recently reported status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Whether [`LiveConnection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Stop reconnecting and close the socket.
    ///
    /// Waits for a delivery already in progress on another thread; no
    /// status callbacks or event deliveries happen after it returns.
    pub fn close(&self) {
        if !self.lifecycle.close() {
            return;
        }
        self.subscribers.clear();
        self.shutdown.send_replace(true);
        info!("live connection closed");
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConnection")
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

struct StatusReporter {
    callback: StatusCallback,
    status: watch::Sender<ConnectionStatus>,
    lifecycle: Arc<Lifecycle>,
}

impl StatusReporter {
    fn report(&self, status: ConnectionStatus) {
        self.lifecycle.run_if_open(|| {
            self.status.send_replace(status);
            (self.callback)(status);
        });
    }
}

/// Why a socket session ended.
enum SessionEnd {
    /// The handle was closed; stop for good.
    Closed,
    /// The socket dropped; reconnect. `delivered` records whether any
    /// valid frame arrived before it did.
    Dropped {
        /// At least one ping or event batch was decoded.
        delivered: bool,
    },
}

struct ConnectionTask {
    url: String,
    backoff: Backoff,
    subscribers: Arc<SubscriberRegistry<[NormalizedEvent]>>,
    lifecycle: Arc<Lifecycle>,
    shutdown: watch::Receiver<bool>,
    reporter: StatusReporter,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            if self.is_closed() {
                return;
            }
            self.reporter.report(ConnectionStatus::Connecting);

            let attempt = tokio::select! {
                result = connect_async(self.url.as_str()) => result,
                _ = self.shutdown.changed() => return,
            };

            match attempt {
                Ok((socket, _response)) => {
                    info!(url = %self.url, "live connection open");
                    self.reporter.report(ConnectionStatus::Live);
                    match self.pump(socket).await {
                        SessionEnd::Closed => return,
                        SessionEnd::Dropped { delivered: true } => self.backoff.reset(),
                        SessionEnd::Dropped { delivered: false } => {}
                    }
                }
                Err(e) => warn!(url = %self.url, error = %e, "connection attempt failed"),
            }

            if self.is_closed() {
                return;
            }
            self.reporter.report(ConnectionStatus::Disc);

            let delay = self.backoff.next_delay();
            debug!(delay_ms = delay.as_millis(), "reconnect scheduled");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => return,
            }
        }
    }

    async fn pump(&mut self, socket: Socket) -> SessionEnd {
        let (mut write, mut read) = socket.split();
        let mut delivered = false;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Closed;
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => match decode_server_frame(text.as_str()) {
                        Ok(ServerFrame::Ping { ts }) => {
                            delivered = true;
                            let reply = match encode_control(&ControlMessage::Pong { ts }) {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(error = %e, "failed to encode pong");
                                    continue;
                                }
                            };
                            if let Err(e) = write.send(Message::Text(reply.into())).await {
                                warn!(error = %e, "failed to send pong");
                                return SessionEnd::Dropped { delivered };
                            }
                        }
                        Ok(ServerFrame::Events(events)) => {
                            delivered = true;
                            let subscribers = &self.subscribers;
                            let dispatched = self.lifecycle.run_if_open(|| {
                                if !events.is_empty() {
                                    subscribers.dispatch(&events);
                                }
                            });
                            if dispatched.is_none() {
                                return SessionEnd::Closed;
                            }
                        }
                        Err(e) => debug!(error = %e, "dropping malformed frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "server closed the socket");
                        return SessionEnd::Dropped { delivered };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "socket error");
                        return SessionEnd::Dropped { delivered };
                    }
                    None => return SessionEnd::Dropped { delivered },
                },
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use gridiron_types::{EventKind, encode_events};
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_backoff() -> Backoff {
        Backoff::new(10.0, 1.5, 50.0)
    }

    fn clock(seq: u64) -> NormalizedEvent {
        NormalizedEvent::new(seq, 0, EventKind::ClockUpdate { clock_ms: 1000 })
    }

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    fn status_channel() -> (
        impl Fn(ConnectionStatus) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<ConnectionStatus>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (move |s: ConnectionStatus| drop(tx.send(s)), rx)
    }

    async fn next_status(rx: &mut mpsc::UnboundedReceiver<ConnectionStatus>) -> ConnectionStatus {
        tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Connecting).unwrap(),
            "\"CONNECTING\""
        );
        assert_eq!(ConnectionStatus::Disc.to_string(), "DISC");
    }

    #[tokio::test]
    async fn delivers_batches_and_drops_malformed_frames() {
        let (listener, url) = listener().await;
        let (on_status, mut statuses) = status_channel();
        let connection = ConnectionManager::new(url).connect(on_status);

        let (tx, mut batches) = mpsc::unbounded_channel();
        connection.subscribe(move |batch| drop(tx.send(batch.to_vec())));

        let mut server = accept(&listener).await;
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Live);

        let single = encode_events(&[clock(1)]).unwrap();
        let pair = encode_events(&[clock(2), clock(3)]).unwrap();
        server.send(Message::Text(single.into())).await.unwrap();
        server.send(Message::Text("not json".into())).await.unwrap();
        server.send(Message::Text(pair.into())).await.unwrap();

        let first = tokio::time::timeout(WAIT, batches.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(WAIT, batches.recv()).await.unwrap().unwrap();
        assert_eq!(first, vec![clock(1)]);
        assert_eq!(second, vec![clock(2), clock(3)]);
        assert_eq!(connection.status(), ConnectionStatus::Live);
    }

    #[tokio::test]
    async fn answers_ping_with_pong() {
        let (listener, url) = listener().await;
        let connection = ConnectionManager::new(url).connect(|_| {});
        let mut server = accept(&listener).await;

        server
            .send(Message::Text(r#"{"type":"Ping","ts":42}"#.into()))
            .await
            .unwrap();

        let reply = tokio::time::timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
        let Message::Text(text) = reply else {
            panic!("expected a text frame, got {reply:?}");
        };
        let pong: ControlMessage = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(pong, ControlMessage::Pong { ts: 42 });
        connection.close();
    }

    #[tokio::test]
    async fn reconnects_after_server_close() {
        let (listener, url) = listener().await;
        let (on_status, mut statuses) = status_channel();
        let connection = ConnectionManager::new(url)
            .with_backoff(fast_backoff())
            .connect(on_status);

        let mut server = accept(&listener).await;
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Live);

        server.close(None).await.unwrap();
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Disc);
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Connecting);

        let _server = accept(&listener).await;
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Live);
        connection.close();
    }

    #[tokio::test]
    async fn failed_attempts_report_disc_and_retry() {
        // Bind then drop to get a port nobody listens on.
        let (listener, url) = listener().await;
        drop(listener);

        let (on_status, mut statuses) = status_channel();
        let connection = ConnectionManager::new(url)
            .with_backoff(fast_backoff())
            .connect(on_status);

        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Disc);
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Connecting);
        connection.close();
    }

    /// Accept `sessions` sockets; each sends `frames` and then closes.
    fn serve_sessions(listener: TcpListener, sessions: Vec<Vec<String>>) {
        tokio::spawn(async move {
            for frames in sessions {
                let mut server = accept(&listener).await;
                for frame in frames {
                    server.send(Message::Text(frame.into())).await.unwrap();
                }
                let _ = server.close(None).await;
            }
        });
    }

    fn timed_status_channel() -> (
        impl Fn(ConnectionStatus) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<(ConnectionStatus, Instant)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |s: ConnectionStatus| drop(tx.send((s, Instant::now()))),
            rx,
        )
    }

    /// Time from each `Disc` to the following `Connecting`, for `count` gaps.
    async fn reconnect_gaps(
        rx: &mut mpsc::UnboundedReceiver<(ConnectionStatus, Instant)>,
        count: usize,
    ) -> Vec<Duration> {
        let mut gaps = Vec::new();
        let mut disc_at = None;
        while gaps.len() < count {
            let (status, at) = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            match status {
                ConnectionStatus::Disc => disc_at = Some(at),
                ConnectionStatus::Connecting => {
                    if let Some(disc) = disc_at.take() {
                        gaps.push(at.duration_since(disc));
                    }
                }
                ConnectionStatus::Live => {}
            }
        }
        gaps
    }

    #[tokio::test]
    async fn sessions_without_frames_keep_backing_off() {
        let (listener, url) = listener().await;
        serve_sessions(listener, vec![Vec::new(); 5]);

        let (on_status, mut statuses) = timed_status_channel();
        let connection = ConnectionManager::new(url)
            .with_backoff(Backoff::new(20.0, 2.0, 1000.0))
            .connect(on_status);

        let gaps = reconnect_gaps(&mut statuses, 4).await;
        for (gap, floor_ms) in gaps.iter().zip([20, 40, 80, 160]) {
            assert!(
                *gap >= Duration::from_millis(floor_ms),
                "gap {gap:?} shorter than {floor_ms} ms in {gaps:?}"
            );
        }
        connection.close();
    }

    #[tokio::test]
    async fn delivered_frame_restarts_the_schedule() {
        let (listener, url) = listener().await;
        let event = encode_events(&[clock(1)]).unwrap();
        // quiet, quiet, delivers, quiet
        serve_sessions(
            listener,
            vec![Vec::new(), Vec::new(), vec![event], Vec::new()],
        );

        let (on_status, mut statuses) = timed_status_channel();
        let connection = ConnectionManager::new(url)
            .with_backoff(Backoff::new(20.0, 10.0, 5000.0))
            .connect(on_status);

        let gaps = reconnect_gaps(&mut statuses, 3).await;
        assert!(gaps.get(1).unwrap() >= &Duration::from_millis(200), "{gaps:?}");
        assert!(gaps.get(2).unwrap() < &Duration::from_millis(200), "{gaps:?}");
        connection.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn close_waits_for_delivery_in_flight() {
        let (listener, url) = listener().await;
        let connection = ConnectionManager::new(url).connect(|_| {});

        let entered = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (started, done) = (Arc::clone(&entered), Arc::clone(&finished));
        connection.subscribe(move |_| {
            started.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            done.store(true, Ordering::SeqCst);
        });

        let mut server = accept(&listener).await;
        let batch = encode_events(&[clock(1)]).unwrap();
        server.send(Message::Text(batch.into())).await.unwrap();

        tokio::time::timeout(WAIT, async {
            while !entered.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
        connection.close();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn close_silences_status_and_events() {
        let (listener, url) = listener().await;
        let (on_status, mut statuses) = status_channel();
        let connection = ConnectionManager::new(url)
            .with_backoff(fast_backoff())
            .connect(on_status);

        let (tx, mut batches) = mpsc::unbounded_channel::<Vec<NormalizedEvent>>();
        connection.subscribe(move |batch| drop(tx.send(batch.to_vec())));

        let mut server = accept(&listener).await;
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut statuses).await, ConnectionStatus::Live);

        connection.close();
        assert!(connection.is_closed());

        let pair = encode_events(&[clock(1), clock(2)]).unwrap();
        let _ = server.send(Message::Text(pair.into())).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(statuses.try_recv().is_err());
        // The subscriber was dropped on close, so the channel is closed and empty.
        assert!(batches.try_recv().is_err());
    }
}
