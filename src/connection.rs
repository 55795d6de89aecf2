//! One TLS connection to a Blaze backend.
//!
//! A [`Connection`] owns three background tasks:
//! 1. Read loop: feeds the [`FrameBuffer`], decodes packets, resolves
//!    pending requests by correlation id
//! 2. Writer task: the only writer to the socket (see [`crate::writer`])
//! 3. Keepalive loop: queues a ping frame every `keepalive_interval`
//!
//! Any number of tasks may call [`Connection::send`] concurrently;
//! responses are matched by id, not by arrival order.
//!
//! # Example
//!
//! ```ignore
//! use blaze_client::codec::Struct;
//! use blaze_client::protocol::Packet;
//! use blaze_client::{Connection, ConnectionConfig, ServerAddress};
//!
//! let addr = ServerAddress::new("diceprodblapp-08.ea.com", 10539);
//! let conn = Connection::connect(addr, ConnectionConfig::default()).await?;
//!
//! let body = Struct::new().with("GID", 123456)?;
//! let response = conn.send(Packet::request("Game.getGameDataFromId", body)).await?;
//! println!("{:?}", response.data);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;

use crate::error::{BlazeError, Result};
use crate::pending::PendingRequests;
use crate::protocol::{
    FrameBuffer, FrameType, MethodRegistry, Packet, RawFrame, DEFAULT_MAX_PAYLOAD_SIZE,
};
use crate::transport::{connect_tls, ServerAddress};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Default time to wait for a response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between keepalive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Default bound on TCP connect plus TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the notification broadcast channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Notification the server sends when the session is no longer valid.
pub const SESSION_EXPIRED_METHOD: &str = "UserSessions.userUnauthenticated";

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Method table used to encode requests and name received packets.
    pub registry: Arc<MethodRegistry>,
    pub request_timeout: Duration,
    /// Zero disables keepalive.
    pub keepalive_interval: Duration,
    pub connect_timeout: Duration,
    /// Largest payload accepted from the server.
    pub max_frame_size: u64,
    /// Writer queue capacity.
    pub channel_capacity: usize,
    pub notification_capacity: usize,
    /// Notifications that mean the session is gone and close the connection.
    pub session_expired_methods: Vec<String>,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(mut self, registry: Arc<MethodRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_frame_size(mut self, size: u64) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    pub fn session_expired_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.session_expired_methods = methods.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            registry: MethodRegistry::builtin(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_frame_size: DEFAULT_MAX_PAYLOAD_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            session_expired_methods: vec![SESSION_EXPIRED_METHOD.to_string()],
        }
    }
}

/// Handle to a live connection. Clones share the same socket.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    address: Option<ServerAddress>,
    config: ConnectionConfig,
    writer: WriterHandle,
    pending: Mutex<PendingRequests>,
    closed: watch::Sender<bool>,
    notifications: broadcast::Sender<Packet>,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl Connection {
    /// Connect over TLS and start the background tasks.
    pub async fn connect(address: ServerAddress, config: ConnectionConfig) -> Result<Self> {
        let stream = connect_tls(&address, config.connect_timeout).await?;
        Ok(Self::start(stream, Some(address), config))
    }

    /// Run the protocol over an already established stream.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_stream<S>(stream: S, config: ConnectionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start(stream, None, config)
    }

    /// Like [`from_stream`](Self::from_stream), recording the peer address.
    pub fn from_stream_with_address<S>(
        stream: S,
        address: ServerAddress,
        config: ConnectionConfig,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start(stream, Some(address), config)
    }

    fn start<S>(stream: S, address: Option<ServerAddress>, config: ConnectionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, config.channel_capacity);
        let (closed, _) = watch::channel(false);
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));

        let max_frame_size = config.max_frame_size;
        let keepalive_interval = config.keepalive_interval;

        let inner = Arc::new(Inner {
            address,
            config,
            writer,
            pending: Mutex::new(PendingRequests::new()),
            closed,
            notifications,
            tasks: Mutex::new(Vec::new()),
        });

        let mut tasks = vec![writer_task.abort_handle()];
        let read_task = tokio::spawn(read_loop(reader, Arc::downgrade(&inner), max_frame_size));
        tasks.push(read_task.abort_handle());
        if !keepalive_interval.is_zero() {
            let keepalive = tokio::spawn(keepalive_loop(Arc::downgrade(&inner), keepalive_interval));
            tasks.push(keepalive.abort_handle());
        }
        *inner.lock_tasks() = tasks;

        Self { inner }
    }

    /// Send a request and wait for its response using the configured timeout.
    pub async fn send(&self, packet: Packet) -> Result<Packet> {
        self.send_with_timeout(packet, self.inner.config.request_timeout)
            .await
    }

    /// Send a request and wait up to `timeout` for its response.
    ///
    /// The packet's `id` is replaced with a fresh correlation id. A timeout
    /// fails only this call; the connection stays open. Error frames from
    /// the server come back as `Ok` packets with `is_error()` set.
    pub async fn send_with_timeout(&self, packet: Packet, timeout: Duration) -> Result<Packet> {
        let inner = &self.inner;
        let (mut header, payload) = packet.encode_parts(&inner.config.registry)?;

        let (id, rx) = {
            let mut pending = inner.lock_pending();
            if !inner.is_open() {
                return Err(BlazeError::ConnectionClosed);
            }
            pending.register(&packet.method)?
        };
        let _guard = PendingGuard { inner, id };

        header.id = id;
        // One deadline covers queueing behind a stalled writer and the reply.
        let deadline = tokio::time::Instant::now() + timeout;
        let frame = OutboundFrame::new(&header, payload);
        match tokio::time::timeout_at(deadline, inner.writer.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                inner.shutdown("writer stopped");
                return Err(e);
            }
            Err(_) => return Err(timed_out(packet.method, id, timeout)),
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BlazeError::ConnectionClosed),
            Err(_) => Err(timed_out(packet.method, id, timeout)),
        }
    }

    /// Close the connection. Pending requests fail with `ConnectionClosed`.
    ///
    /// Idempotent.
    pub fn close(&self) {
        self.inner.shutdown("closed by caller");
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Resolves once the connection is closed, for whatever reason.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Peer address, when connected through [`connect`](Self::connect).
    pub fn address(&self) -> Option<&ServerAddress> {
        self.inner.address.as_ref()
    }

    /// Number of requests waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.inner.lock_pending().len()
    }

    /// Receive unsolicited message packets.
    ///
    /// Notifications arriving while nobody is subscribed are dropped.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Packet> {
        self.inner.notifications.subscribe()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same socket.
    pub fn ptr_eq(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.inner.address)
            .field("open", &self.is_open())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Inner {
    fn is_open(&self) -> bool {
        !*self.closed.borrow()
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingRequests> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<AbortHandle>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn peer(&self) -> String {
        match &self.address {
            Some(addr) => addr.to_string(),
            None => "stream".to_string(),
        }
    }

    fn shutdown(&self, reason: &str) {
        if self.closed.send_replace(true) {
            return;
        }
        tracing::debug!("Closing connection to {}: {}", self.peer(), reason);

        // The flag is set before taking the lock, so a concurrent send()
        // either sees it or has its entry failed here.
        self.lock_pending().fail_all(|| BlazeError::ConnectionClosed);

        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }

    /// Handle one complete frame. Returns a reason when the connection
    /// must close.
    fn dispatch(&self, frame: RawFrame) -> Option<String> {
        if frame.frame_type().is_keepalive() {
            tracing::trace!("Keepalive {:?} from {}", frame.frame_type(), self.peer());
            return None;
        }

        let packet = match Packet::decode(&frame, &self.config.registry) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::error!("Failed to decode frame from {}: {}", self.peer(), e);
                return Some(format!("decode error: {}", e));
            }
        };

        if self
            .config
            .session_expired_methods
            .iter()
            .any(|method| *method == packet.method)
        {
            tracing::warn!("Session expired on {} ({})", self.peer(), packet.method);
            return Some(format!("session expired: {}", packet.method));
        }

        if packet.frame_type == FrameType::Message {
            self.notify(packet);
            return None;
        }

        if let Err(packet) = self.lock_pending().complete(packet) {
            tracing::debug!(
                "Dropping unsolicited {:?} {} (id {})",
                packet.frame_type,
                packet.method,
                packet.id
            );
        }
        None
    }

    fn notify(&self, packet: Packet) {
        if self.notifications.receiver_count() == 0 {
            tracing::debug!("Dropping notification {} (no subscribers)", packet.method);
            return;
        }
        let _ = self.notifications.send(packet);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }
}

/// Removes a pending entry when `send` returns or is cancelled.
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: u32,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.lock_pending().cancel(self.id);
    }
}

fn timed_out(method: String, id: u32, timeout: Duration) -> BlazeError {
    tracing::warn!("Request {} (id {}) timed out after {:?}", method, id, timeout);
    BlazeError::Timeout {
        method,
        id,
        timeout,
    }
}

async fn read_loop<R>(mut reader: R, inner: Weak<Inner>, max_frame_size: u64)
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_payload(max_frame_size);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let reason = loop {
        let read = reader.read(&mut buf).await;

        let inner = match inner.upgrade() {
            Some(inner) => inner,
            None => return,
        };
        let n = match read {
            Ok(0) => break (inner, "connection closed by peer".to_string()),
            Ok(n) => n,
            Err(e) => break (inner, format!("read error: {}", e)),
        };

        let mut close_reason = None;
        for frame in frame_buffer.push(&buf[..n]) {
            close_reason = inner.dispatch(frame);
            if close_reason.is_some() {
                break;
            }
        }
        if let Some(reason) = close_reason {
            break (inner, reason);
        }
    };

    let (inner, reason) = reason;
    inner.shutdown(&reason);
}

async fn keepalive_loop(inner: Weak<Inner>, interval: Duration) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let inner = match inner.upgrade() {
            Some(inner) if inner.is_open() => inner,
            _ => return,
        };
        if let Err(e) = inner.writer.send(OutboundFrame::ping()).await {
            tracing::warn!("Keepalive to {} failed: {}", inner.peer(), e);
            inner.shutdown("keepalive failed");
            return;
        }
        tracing::trace!("Sent keepalive ping to {}", inner.peer());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    use crate::codec::Struct;
    use crate::protocol::{Header, HEADER_SIZE, PING_FRAME};

    struct MockServer {
        stream: DuplexStream,
        buffer: FrameBuffer,
        queue: VecDeque<RawFrame>,
        registry: Arc<MethodRegistry>,
    }

    impl MockServer {
        async fn next_frame(&mut self) -> RawFrame {
            let mut buf = [0u8; 4096];
            loop {
                if let Some(frame) = self.queue.pop_front() {
                    return frame;
                }
                let n = self.stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed the stream");
                self.queue.extend(self.buffer.push(&buf[..n]));
            }
        }

        async fn next_request(&mut self) -> Packet {
            loop {
                let frame = self.next_frame().await;
                if !frame.frame_type().is_keepalive() {
                    return Packet::decode(&frame, &self.registry).unwrap();
                }
            }
        }

        async fn send(&mut self, packet: &Packet) {
            let bytes = packet.encode(&self.registry).unwrap();
            self.stream.write_all(&bytes).await.unwrap();
        }

        async fn reply(&mut self, request: &Packet, data: Struct) {
            let response = Packet::new(request.method.clone(), FrameType::Result, request.id, data);
            self.send(&response).await;
        }
    }

    fn quiet_config() -> ConnectionConfig {
        ConnectionConfig::default().keepalive_interval(Duration::ZERO)
    }

    fn pair(config: ConnectionConfig) -> (Connection, MockServer) {
        let (client, server) = duplex(64 * 1024);
        let registry = config.registry.clone();
        let conn = Connection::from_stream(client, config);
        let server = MockServer {
            stream: server,
            buffer: FrameBuffer::new(),
            queue: VecDeque::new(),
            registry,
        };
        (conn, server)
    }

    async fn wait_closed(conn: &Connection) {
        tokio::time::timeout(Duration::from_secs(2), conn.closed())
            .await
            .expect("connection did not close");
    }

    #[tokio::test]
    async fn test_send_resolves_with_decoded_response() {
        let (conn, mut server) = pair(quiet_config());

        let server_task = tokio::spawn(async move {
            let request = server.next_request().await;
            assert_eq!(request.method, "Game.leaveGame");
            assert_eq!(request.frame_type, FrameType::Command);
            assert_eq!(request.data.get_str("GAME"), Some("tunguska"));
            let body = Struct::new().with("STAT", 1).unwrap();
            server.reply(&request, body).await;
            server
        });

        let data = Struct::new()
            .with("GAME", "tunguska")
            .unwrap()
            .with("GID", 123_456)
            .unwrap();
        let response = conn.send(Packet::request("Game.leaveGame", data)).await.unwrap();

        assert_eq!(response.method, "Game.leaveGame");
        assert_eq!(response.frame_type, FrameType::Result);
        assert_eq!(response.data.get_int("STAT"), Some(1));
        assert_eq!(conn.pending_count(), 0);
        let _server = server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_responses_in_reverse_order_reach_their_callers() {
        let (conn, mut server) = pair(quiet_config());
        const N: i64 = 8;

        let mut calls = Vec::new();
        for i in 0..N {
            let conn = conn.clone();
            calls.push(tokio::spawn(async move {
                let data = Struct::new().with("SEQ", i).unwrap();
                let response = conn.send(Packet::request("Util.ping", data)).await.unwrap();
                (i, response)
            }));
        }

        let mut requests = Vec::new();
        for _ in 0..N {
            requests.push(server.next_request().await);
        }
        for request in requests.iter().rev() {
            let seq = request.data.get_int("SEQ").unwrap();
            server
                .reply(request, Struct::new().with("ECHO", seq).unwrap())
                .await;
        }

        for call in calls {
            let (i, response) = call.await.unwrap();
            assert_eq!(response.data.get_int("ECHO"), Some(i));
        }
    }

    #[tokio::test]
    async fn test_timeout_keeps_connection_open() {
        let (conn, mut server) = pair(quiet_config());

        let err = conn
            .send_with_timeout(
                Packet::request("Util.ping", Struct::new()),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BlazeError::Timeout { .. }));
        assert!(conn.is_open());
        assert_eq!(conn.pending_count(), 0);

        // The late answer is dropped, the next request works
        let late = server.next_request().await;
        server.reply(&late, Struct::new()).await;

        let next = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.send(Packet::request("Util.ping", Struct::new())).await })
        };
        let request = server.next_request().await;
        assert_ne!(request.id, late.id);
        server.reply(&request, Struct::new()).await;
        assert!(next.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_timeout_covers_stalled_writer() {
        // The peer never reads, so the socket and the writer queue fill up.
        let (client, _server) = duplex(64);
        let conn = Connection::from_stream(client, quiet_config().channel_capacity(1));
        let data = Struct::new().with("DATA", vec![0xAB; 4096]).unwrap();

        for _ in 0..4 {
            let call = conn.send_with_timeout(
                Packet::request("Util.ping", data.clone()),
                Duration::from_millis(100),
            );
            let err = tokio::time::timeout(Duration::from_secs(1), call)
                .await
                .expect("send outlived its timeout")
                .unwrap_err();
            assert!(matches!(err, BlazeError::Timeout { .. }));
        }
        assert!(conn.is_open());
        assert_eq!(conn.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_keepalive_sends_ping_frame() {
        let config = ConnectionConfig::default().keepalive_interval(Duration::from_millis(20));
        let (_conn, mut server) = pair(config);

        let mut buf = [0u8; HEADER_SIZE];
        tokio::time::timeout(Duration::from_secs(2), server.stream.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf, PING_FRAME);
    }

    #[tokio::test]
    async fn test_session_expired_closes_and_fails_pending() {
        let (conn, mut server) = pair(quiet_config());

        let call = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.send(Packet::request("Util.ping", Struct::new())).await })
        };
        let _request = server.next_request().await;

        let expired = Packet::new(SESSION_EXPIRED_METHOD, FrameType::Message, 0, Struct::new());
        server.send(&expired).await;

        wait_closed(&conn).await;
        assert!(!conn.is_open());
        assert!(matches!(
            call.await.unwrap(),
            Err(BlazeError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_decode_error_closes_connection() {
        let (conn, mut server) = pair(quiet_config());

        let payload = [0x9E, 0x99, 0x00, 0x0F];
        let header = Header::new(FrameType::Result, 4, 0x19, 1, payload.len() as u64);
        server.stream.write_all(&header.encode()).await.unwrap();
        server.stream.write_all(&payload).await.unwrap();

        wait_closed(&conn).await;
    }

    #[tokio::test]
    async fn test_eof_closes_connection() {
        let (conn, server) = pair(quiet_config());
        drop(server);
        wait_closed(&conn).await;
        assert!(matches!(
            conn.send(Packet::request("Util.ping", Struct::new())).await,
            Err(BlazeError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_fails_pending() {
        let (conn, mut server) = pair(quiet_config());

        let call = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.send(Packet::request("Util.ping", Struct::new())).await })
        };
        let _request = server.next_request().await;

        conn.close();
        conn.close();

        assert!(!conn.is_open());
        assert!(matches!(
            call.await.unwrap(),
            Err(BlazeError::ConnectionClosed)
        ));
        assert_eq!(conn.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_notifications_and_pings_do_not_disturb_requests() {
        let (conn, mut server) = pair(quiet_config());
        let mut notifications = conn.subscribe_notifications();

        let call = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.send(Packet::request("Util.ping", Struct::new())).await })
        };
        let request = server.next_request().await;

        server.stream.write_all(&PING_FRAME).await.unwrap();
        let note = Packet::new(
            "Game.notifyGameStateChange",
            FrameType::Message,
            0,
            Struct::new().with("GID", 5).unwrap(),
        );
        server.send(&note).await;
        // Result nobody asked for
        let stray = Packet::new("Util.ping", FrameType::Result, request.id + 100, Struct::new());
        server.send(&stray).await;
        server.reply(&request, Struct::new()).await;

        assert!(call.await.unwrap().is_ok());
        let received = notifications.recv().await.unwrap();
        assert_eq!(received.method, "Game.notifyGameStateChange");
        assert_eq!(received.data.get_int("GID"), Some(5));
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_unknown_method_rejected_before_sending() {
        let (conn, _server) = pair(quiet_config());
        let err = conn
            .send(Packet::request("Game.noSuchThing", Struct::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, BlazeError::UnknownMethod(_)));
        assert_eq!(conn.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_last_handle_stops_tasks() {
        let (conn, mut server) = pair(quiet_config());
        drop(conn);

        // Writer half is dropped, so the server sees EOF
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), server.stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_config_builder() {
        let config = ConnectionConfig::new()
            .request_timeout(Duration::from_secs(5))
            .keepalive_interval(Duration::from_secs(30))
            .max_frame_size(1024)
            .session_expired_methods(["UserSessions.userRemoved"]);

        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.session_expired_methods, vec!["UserSessions.userRemoved"]);
        assert_eq!(ConnectionConfig::default().request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
