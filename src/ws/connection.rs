//! Per-transport connection lifecycle.
//!
//! Each connection runs one read loop and one write loop for the life of the
//! transport. Inbound messages are processed strictly in arrival order;
//! recipe extraction is dispatched to its own task so the read loop is never
//! blocked on network or AI latency.

use crate::models::SharerInfo;
use crate::services::recipe::RecipeService;
use crate::ws::message::{
    kind, ConnectionAckPayload, Envelope, Inbound, RecipeAdditionsPayload, RecipeProgressPayload,
    RecipeUrlRequestPayload, UserIdentifyPayload, UserJoinedPayload, UserLeftPayload,
    STATUS_SERVICE_UNAVAILABLE, STATUS_SUCCESS,
};
use crate::ws::pool::{ConnectionHandle, ConnectionPool};
use crate::ws::transport::{Frame, MixTransport, TransportReader, TransportWriter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Budget for one outbound write.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// The remote is considered dead when no traffic arrives for this long.
const LIVENESS_WAIT: Duration = Duration::from_secs(30);
/// Keepalive probe period; must be shorter than the liveness wait.
const PING_PERIOD: Duration = Duration::from_secs(24);
/// Maximum accepted inbound message size.
pub const MAX_MESSAGE_BYTES: usize = 512 * 1024;
/// Outbound queue capacity, sized to tolerate bursts. A full queue means a
/// stalled peer and the connection is torn down.
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Identity state machine. One-way: a connection identifies once and stays
/// Active for its remaining life. A repeated identify overwrites the identity
/// silently (clients treat it as a rename).
#[derive(Debug, Clone, Default)]
pub enum IdentityState {
    #[default]
    Unidentified,
    Active {
        user_id: String,
        user_name: String,
    },
}

impl IdentityState {
    pub fn is_active(&self) -> bool {
        matches!(self, IdentityState::Active { .. })
    }
}

/// Run a connection to completion over its transport.
///
/// Registers with the pool, serves the read/write loops, and on exit
/// unregisters and announces the departure to the rest of the session.
pub async fn serve<T: MixTransport>(
    transport: T,
    connection_id: String,
    session_id: String,
    pool: Arc<ConnectionPool>,
    service: Arc<RecipeService>,
) {
    let (reader, writer) = transport.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let cancel = CancellationToken::new();
    let identity = Arc::new(std::sync::RwLock::new(IdentityState::Unidentified));

    pool.register(ConnectionHandle::new(
        connection_id.clone(),
        session_id.clone(),
        Arc::clone(&identity),
        outbound_tx.clone(),
        cancel.clone(),
    ))
    .await;

    let ack = ConnectionAckPayload {
        connection_id: connection_id.clone(),
        session_id: session_id.clone(),
    };
    match Envelope::new(kind::CONNECTION_ACK, ack) {
        // Queue is freshly created; this cannot meaningfully fail.
        Ok(env) => {
            let _ = outbound_tx.try_send(env);
        }
        Err(e) => tracing::error!(error = %e, "failed to build CONNECTION_ACK"),
    }

    let writer_task = tokio::spawn(write_loop(writer, outbound_rx, cancel.clone()));

    let conn = Connection {
        id: connection_id,
        session_id,
        identity,
        pool: Arc::clone(&pool),
        service,
        cancel: cancel.clone(),
    };
    conn.read_loop(reader).await;

    cancel.cancel();
    let removed = pool.unregister(&conn.id).await;
    let _ = writer_task.await;

    if removed.is_some() {
        let snapshot = conn
            .identity
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        if let IdentityState::Active { user_id, user_name } = snapshot {
            let payload = UserLeftPayload {
                user_id,
                user_name,
                session_id: conn.session_id.clone(),
            };
            if let Ok(env) = Envelope::new(kind::USER_LEFT, payload) {
                pool.broadcast_to_session(&conn.session_id, env).await;
            }
        }
    }
}

/// Single writer task: drains the outbound queue and probes keepalive.
async fn write_loop<W: TransportWriter>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Envelope>,
    cancel: CancellationToken,
) {
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + PING_PERIOD,
        PING_PERIOD,
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = writer.send_frame(Frame::Close).await;
                break;
            }
            maybe = outbound.recv() => {
                let Some(envelope) = maybe else {
                    let _ = writer.send_frame(Frame::Close).await;
                    break;
                };
                let text = match serde_json::to_string(&envelope) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize outbound envelope");
                        continue;
                    }
                };
                match tokio::time::timeout(WRITE_TIMEOUT, writer.send_frame(Frame::Text(text))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "write failed, closing connection");
                        cancel.cancel();
                        break;
                    }
                    Err(_) => {
                        tracing::warn!("write timed out, closing connection");
                        cancel.cancel();
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match tokio::time::timeout(WRITE_TIMEOUT, writer.send_frame(Frame::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    }
}

struct Connection {
    id: String,
    session_id: String,
    identity: Arc<std::sync::RwLock<IdentityState>>,
    pool: Arc<ConnectionPool>,
    service: Arc<RecipeService>,
    cancel: CancellationToken,
}

impl Connection {
    async fn read_loop<R: TransportReader>(&self, mut reader: R) {
        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = tokio::time::timeout(LIVENESS_WAIT, reader.next_frame()) => {
                    match result {
                        Err(_) => {
                            tracing::warn!(connection_id = %self.id, "liveness deadline lapsed");
                            break;
                        }
                        Ok(None) => break,
                        Ok(Some(Err(e))) => {
                            tracing::debug!(connection_id = %self.id, error = %e, "transport read failed");
                            break;
                        }
                        Ok(Some(Ok(frame))) => frame,
                    }
                }
            };

            match frame {
                Frame::Text(text) => {
                    if text.len() > MAX_MESSAGE_BYTES {
                        tracing::warn!(
                            connection_id = %self.id,
                            bytes = text.len(),
                            "inbound message exceeds size limit, closing"
                        );
                        break;
                    }
                    self.handle_text(&text).await;
                }
                // Any traffic refreshes the liveness deadline; keepalive
                // acknowledgments need no further handling.
                Frame::Ping(_) | Frame::Pong(_) => {}
                Frame::Close => break,
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(connection_id = %self.id, error = %e, "undecodable frame dropped");
                return;
            }
        };

        match envelope.decode() {
            Err(e) => {
                tracing::warn!(connection_id = %self.id, error = %e, "bad payload dropped");
            }
            Ok(Inbound::Ping) => {
                tracing::debug!(connection_id = %self.id, "keepalive received");
            }
            Ok(Inbound::Identify(payload)) => self.on_identify(payload).await,
            Ok(Inbound::Chat) => self.on_chat(envelope).await,
            Ok(Inbound::RecipeUrlRequest(payload)) => self.on_recipe_request(payload).await,
            Ok(Inbound::Unrecognized(kind)) => {
                tracing::warn!(connection_id = %self.id, kind = %kind, "unknown message type dropped");
            }
        }
    }

    fn identity_snapshot(&self) -> IdentityState {
        self.identity
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    async fn on_identify(&self, payload: UserIdentifyPayload) {
        if let Ok(mut guard) = self.identity.write() {
            *guard = IdentityState::Active {
                user_id: payload.user_id.clone(),
                user_name: payload.user_name.clone(),
            };
        }
        tracing::info!(
            connection_id = %self.id,
            session_id = %self.session_id,
            user_id = %payload.user_id,
            user_name = %payload.user_name,
            "user identified"
        );

        let joined = UserJoinedPayload {
            user_id: payload.user_id,
            user_name: payload.user_name,
            session_id: self.session_id.clone(),
        };
        match Envelope::new(kind::USER_JOINED, joined) {
            Ok(env) => {
                self.pool
                    .broadcast_to_session_except(&self.session_id, &self.id, env)
                    .await;
            }
            Err(e) => tracing::error!(error = %e, "failed to build USER_JOINED"),
        }
    }

    async fn on_chat(&self, envelope: Envelope) {
        if !self.identity_snapshot().is_active() {
            tracing::warn!(connection_id = %self.id, "rejected CHAT_MESSAGE from unidentified connection");
            return;
        }
        // Chat payloads are opaque; relay the envelope untouched to everyone
        // else in the session.
        self.pool
            .broadcast_to_session_except(&self.session_id, &self.id, envelope)
            .await;
    }

    async fn on_recipe_request(&self, payload: RecipeUrlRequestPayload) {
        let identity = self.identity_snapshot();
        let IdentityState::Active { user_id, .. } = identity else {
            tracing::warn!(
                connection_id = %self.id,
                "rejected RECIPE_URL_REQUEST from unidentified connection"
            );
            return;
        };
        if payload.sharer_id != user_id {
            tracing::warn!(
                connection_id = %self.id,
                claimed = %payload.sharer_id,
                "sharer id mismatch in RECIPE_URL_REQUEST"
            );
            return;
        }

        tracing::info!(
            connection_id = %self.id,
            session_id = %self.session_id,
            url = %payload.url,
            "recipe url request accepted"
        );

        // Detached task: the read loop keeps servicing keepalives and chat
        // while the extraction runs.
        tokio::spawn(process_recipe_request(
            Arc::clone(&self.pool),
            Arc::clone(&self.service),
            self.session_id.clone(),
            self.id.clone(),
            payload,
        ));
    }
}

/// One in-flight extraction request. Progress goes to the requester only;
/// the terminal result is broadcast to the whole session.
pub(crate) async fn process_recipe_request(
    pool: Arc<ConnectionPool>,
    service: Arc<RecipeService>,
    session_id: String,
    connection_id: String,
    request: RecipeUrlRequestPayload,
) {
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<crate::services::recipe::Progress>();

    let drain = tokio::spawn({
        let pool = Arc::clone(&pool);
        let session_id = session_id.clone();
        let connection_id = connection_id.clone();
        let request = request.clone();
        async move {
            while let Some(progress) = progress_rx.recv().await {
                let payload = RecipeProgressPayload {
                    request: request.clone(),
                    phase: progress.phase,
                    status: progress.status,
                    message: progress.message,
                };
                match Envelope::new(kind::RECIPE_PROGRESS, payload) {
                    Ok(env) => {
                        pool.send_to_session_member(&session_id, &connection_id, env)
                            .await;
                    }
                    Err(e) => tracing::error!(error = %e, "failed to build RECIPE_PROGRESS"),
                }
            }
        }
    });

    let sharer = SharerInfo {
        id: request.sharer_id.clone(),
        name: request.sharer_name.clone(),
    };
    let result = service
        .recipe_for_url(&session_id, &request.url, sharer, &progress_tx)
        .await;

    // Close the channel and let all progress events flush before the
    // terminal result goes out.
    drop(progress_tx);
    let _ = drain.await;

    let payload = match result {
        Ok(recipe) => RecipeAdditionsPayload {
            status: STATUS_SUCCESS.to_string(),
            request,
            recipe: Some(recipe),
        },
        Err(e) => {
            tracing::warn!(
                session_id = %session_id,
                url = %request.url,
                error = %e,
                "recipe extraction failed"
            );
            RecipeAdditionsPayload {
                status: STATUS_SERVICE_UNAVAILABLE.to_string(),
                request,
                recipe: None,
            }
        }
    };

    match Envelope::new(kind::RECIPE_ADDITIONS, payload) {
        Ok(env) => pool.broadcast_to_session(&session_id, env).await,
        Err(e) => tracing::error!(error = %e, "failed to build RECIPE_ADDITIONS"),
    }
}
