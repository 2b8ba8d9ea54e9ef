//! TCP listener and per-connection loop

use super::accessory::AccessoryGraph;
use super::config::HapServerConfig;
use super::connection::{ConnectionId, HapConnection};
use super::context::ServerContext;
use super::events::{EventCharacteristic, EventNotifier, ServerEvent, event_body, spawn_keepalive};
use super::pairing_handlers::abandon_setup;
use super::request_router::dispatch;
use crate::error::HapError;
use crate::protocol::http::{
    HttpServerCodec, ResponseBuilder, StatusCode, encode_event, encode_response,
};
use crate::protocol::pairing::{AccessoryIdentity, PairingStorage};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::time::Instant;

/// HAP accessory server
pub struct HapServer {
    context: Arc<ServerContext>,
    shutdown_tx: Option<watch::Sender<bool>>,
    local_addr: Option<SocketAddr>,
}

impl HapServer {
    /// Create a server for `identity`, backed by `store` and `graph`
    ///
    /// # Errors
    ///
    /// Returns `HapError::Config` if the configuration is invalid.
    pub fn new(
        config: HapServerConfig,
        identity: AccessoryIdentity,
        store: Box<dyn PairingStorage>,
        graph: Arc<dyn AccessoryGraph>,
    ) -> Result<Self, HapError> {
        config.validate()?;
        Ok(Self {
            context: Arc::new(ServerContext::new(config, identity, store, graph)),
            shutdown_tx: None,
            local_addr: None,
        })
    }

    /// Handle for pushing characteristic changes to subscribed controllers
    #[must_use]
    pub fn notifier(&self) -> EventNotifier {
        self.context.notifier.clone()
    }

    /// Shared state, mainly for inspection in tests
    #[must_use]
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Bound address while running
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Bind and start accepting controllers
    ///
    /// # Errors
    ///
    /// Returns error if the server is already running or the port cannot be
    /// bound.
    pub async fn start(&mut self) -> Result<SocketAddr, HapError> {
        if self.shutdown_tx.is_some() {
            return Err(HapError::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.context.config.socket_addr()).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);

        spawn_keepalive(
            self.context.notifier.clone(),
            self.context.config.keepalive_interval,
            shutdown_rx.clone(),
        );

        tracing::info!(
            name = %self.context.config.name,
            username = %self.context.identity.username,
            %local_addr,
            "HAP server listening"
        );

        let context = self.context.clone();
        tokio::spawn(accept_loop(listener, context, shutdown_rx));

        Ok(local_addr)
    }

    /// Stop accepting and close every live connection
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
            tracing::info!("HAP server stopped");
        }
        self.local_addr = None;
    }
}

impl Drop for HapServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: Arc<ServerContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next_id = 0u64;
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        next_id += 1;
                        let id = ConnectionId(next_id);
                        let context = context.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(context, stream, peer, id, shutdown).await {
                                tracing::warn!(connection = %id, "Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Sleep until the timed-write deadline, or forever without one
async fn timed_write_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Serve one controller until it disconnects or the server stops
async fn handle_connection(
    context: Arc<ServerContext>,
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), HapError> {
    tracing::info!(connection = %id, %peer, "Controller connected");
    let _ = stream.set_nodelay(true);

    let mut conn = HapConnection::new(id, peer);
    let mut codec = HttpServerCodec::new();
    let mut events = context.notifier.subscribe();
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; 4096];

    let result = loop {
        let deadline = conn.timed_write_deadline();
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = match read {
                    Ok(0) => break Ok(()),
                    Ok(n) => n,
                    Err(e) => break Err(e.into()),
                };
                match process_incoming(&context, &mut conn, &mut codec, &buf[..n], &mut writer).await {
                    Ok(true) => {}
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
            event = events.recv() => {
                let mut batch = match event {
                    Ok(event) => vec![event],
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(connection = %id, skipped, "Event subscriber lagging");
                        // A dropped PairingRemoved is recovered from the store
                        if context.pairing_revoked(&conn).await {
                            tracing::info!(connection = %id, "Closing session of removed pairing");
                            break Ok(());
                        }
                        continue;
                    }
                    Err(RecvError::Closed) => break Ok(()),
                };
                while let Ok(event) = events.try_recv() {
                    batch.push(event);
                }
                match deliver_events(&context, &mut conn, batch, &mut writer).await {
                    Ok(true) => {}
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
            () = timed_write_expiry(deadline) => conn.expire_timed_write(Instant::now()),
            _ = shutdown.changed() => break Ok(()),
        }
    };

    abandon_setup(&context, &mut conn).await;
    for characteristic in conn.take_subscriptions() {
        context.graph.unsubscribe(characteristic).await;
    }
    let _ = writer.shutdown().await;
    tracing::info!(connection = %id, "Controller disconnected");

    result
}

/// Decrypt, decode and answer everything in `data`
///
/// Returns `Ok(false)` when the connection must close.
async fn process_incoming(
    context: &ServerContext,
    conn: &mut HapConnection,
    codec: &mut HttpServerCodec,
    data: &[u8],
    writer: &mut OwnedWriteHalf,
) -> Result<bool, HapError> {
    if !feed_codec(conn, codec, data) {
        return Ok(false);
    }

    loop {
        let request = match codec.decode() {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(true),
            Err(e) => {
                tracing::debug!(connection = %conn.id(), "Malformed request: {}", e);
                let response = ResponseBuilder::new(StatusCode::BAD_REQUEST).build();
                write_message(conn, writer, &encode_response(&response)).await?;
                return Ok(false);
            }
        };

        let was_encrypted = conn.is_encrypted();
        let response = dispatch(context, conn, &request).await;
        write_message(conn, writer, &encode_response(&response)).await?;

        if !was_encrypted && conn.is_encrypted() {
            // Anything pipelined after the final Pair-Verify message is ciphertext
            let pending = codec.take_remaining();
            if !pending.is_empty() && !feed_codec(conn, codec, &pending) {
                return Ok(false);
            }
        }

        if conn.should_close() {
            return Ok(false);
        }
    }
}

/// Push raw bytes through the transport layer into the codec
///
/// Returns `false` on a decrypt failure.
fn feed_codec(conn: &mut HapConnection, codec: &mut HttpServerCodec, data: &[u8]) -> bool {
    let id = conn.id();
    let Some(channel) = conn.channel_mut() else {
        codec.feed(data);
        return true;
    };

    channel.feed(data);
    match channel.decrypt_all() {
        Ok(plaintext) => {
            codec.feed(&plaintext);
            true
        }
        Err(e) => {
            tracing::warn!(connection = %id, "Closing after transport failure: {}", e);
            false
        }
    }
}

/// Write a message, encrypting it once the transport is active
async fn write_message(
    conn: &mut HapConnection,
    writer: &mut OwnedWriteHalf,
    message: &[u8],
) -> Result<(), HapError> {
    match conn.channel_mut() {
        Some(channel) if channel.outbound_active() => {
            let frames = channel.encrypt(message)?;
            writer.write_all(&frames).await?;
        }
        _ => writer.write_all(message).await?,
    }
    Ok(())
}

/// Whether unsolicited events may be written to `conn`
fn can_push_events(context: &ServerContext, conn: &mut HapConnection) -> bool {
    match conn.channel_mut() {
        Some(channel) => channel.outbound_active(),
        None => context.config.allow_insecure,
    }
}

/// Coalesce a batch of events into at most one frame
///
/// Returns `Ok(false)` when the connection must close.
async fn deliver_events(
    context: &ServerContext,
    conn: &mut HapConnection,
    batch: Vec<ServerEvent>,
    writer: &mut OwnedWriteHalf,
) -> Result<bool, HapError> {
    let mut changes = Vec::new();
    let mut keepalive = false;

    for event in batch {
        match event {
            ServerEvent::CharacteristicChanged { id, value, origin } => {
                if origin != Some(conn.id()) && conn.is_subscribed(id) {
                    changes.push(EventCharacteristic {
                        aid: id.aid,
                        iid: id.iid,
                        value,
                    });
                }
            }
            ServerEvent::Keepalive => keepalive |= conn.is_authenticated(),
            ServerEvent::PairingRemoved { username } => {
                if conn.username() == Some(username.as_str()) {
                    tracing::info!(connection = %conn.id(), controller = %username, "Closing session of removed pairing");
                    return Ok(false);
                }
            }
        }
    }

    if (changes.is_empty() && !keepalive) || !can_push_events(context, conn) {
        return Ok(true);
    }

    let body = event_body(&changes)?;
    tracing::trace!(connection = %conn.id(), count = changes.len(), "Sending event");
    write_message(conn, writer, &encode_event(&body)).await?;
    Ok(true)
}
