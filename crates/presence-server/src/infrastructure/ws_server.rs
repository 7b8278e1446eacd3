//! WebSocket server: accept loop and per-session tasks.
//!
//! Each accepted TCP connection gets its own Tokio task which:
//!
//! 1. completes the WebSocket handshake,
//! 2. assigns a fresh [`ConnectionId`] and announces the session to the hub,
//! 3. spawns a writer task that drains the session's outbox into the socket,
//! 4. reads frames until the peer goes away or the hub closes the session,
//!    forwarding text and pongs to the hub,
//! 5. tells the hub the session is closed.
//!
//! The hub learns about every session exactly once through `Accepted` and
//! exactly once through `Closed`, whatever way the socket ends.
//!
//! Shutdown is driven by a shared `AtomicBool` (set by the Ctrl+C handler in
//! `main.rs`).  The accept loop polls it every 200 ms, then asks the hub to
//! close every session.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use presence_core::ConnectionId;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::config::HubConfig;
use crate::infrastructure::hub::{spawn_hub, HubCommand};
use crate::infrastructure::transport::{Outgoing, OUTBOX_CAPACITY};

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (port in use, missing
/// permission) or if the hub task panics.
pub async fn run_server(config: HubConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind presence listener on {}", config.bind_addr))?;

    info!("presence hub listening on {}", config.bind_addr);
    serve(listener, config, running).await
}

/// Runs the hub and the accept loop on an already-bound listener.
///
/// Split from [`run_server`] so tests can bind port 0 and read back the
/// chosen address before serving.
///
/// # Errors
///
/// Returns an error if the hub task panics.
pub async fn serve(
    listener: TcpListener,
    config: HubConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let (hub, hub_task) = spawn_hub(&config);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("TCP connection from {peer_addr}");
                let hub = hub.clone();
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, hub).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {
                // No connection in the last poll window; re-check the flag.
            }
        }
    }

    // A full queue only delays this; the hub drains it before stopping.
    let _ = hub.send(HubCommand::Shutdown).await;
    hub_task.await.context("hub task panicked")?;
    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_session(stream: TcpStream, peer_addr: SocketAddr, hub: mpsc::Sender<HubCommand>) {
    match run_session(stream, peer_addr, hub).await {
        Ok(()) => debug!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: mpsc::Sender<HubCommand>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let id: ConnectionId = Uuid::new_v4();
    let (mut ws_sink, mut ws_source) = ws_stream.split();
    let (outbox, mut outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);

    hub.send(HubCommand::Accepted {
        id,
        remote_addr: peer_addr,
        outbox,
    })
    .await
    .context("hub is not running")?;

    // ── Writer: hub → socket ──────────────────────────────────────────────────
    let mut writer = tokio::spawn(async move {
        while let Some(item) = outbox_rx.recv().await {
            let result = match item {
                Outgoing::Text(text) => ws_sink.send(WsMessage::Text(text)).await,
                Outgoing::Ping => ws_sink.send(WsMessage::Ping(Vec::new())).await,
                Outgoing::Close => {
                    let _ = ws_sink.send(WsMessage::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = result {
                debug!("session {id}: write failed: {e}");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // ── Reader: socket → hub ──────────────────────────────────────────────────
    //
    // The writer only finishes once the hub closed the session or the socket
    // failed.  Either way the peer is done, so stop reading instead of waiting
    // for a close reply a dead peer will never send.
    let mut writer_done = false;
    let mut read_error = None;
    loop {
        let frame = tokio::select! {
            frame = ws_source.next() => frame,
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        };
        let command = match frame {
            Some(Ok(WsMessage::Text(text))) => HubCommand::Inbound { id, text },
            Some(Ok(WsMessage::Pong(_))) => HubCommand::Pong { id },
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(WsMessage::Binary(_))) => {
                debug!("session {id}: ignoring binary frame");
                continue;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                read_error = Some(e);
                break;
            }
        };
        if hub.send(command).await.is_err() {
            break;
        }
    }

    let _ = hub.send(HubCommand::Closed { id }).await;
    if writer_done {
        debug!("session {id}: writer finished, releasing socket");
    } else {
        writer.abort();
    }
    // Dropping the read half here releases the socket.

    match read_error {
        Some(e) => Err(e).with_context(|| format!("session {id} read failed")),
        None => Ok(()),
    }
}
