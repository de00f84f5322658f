//! Socket lifecycle for the realtime push feed.
//!
//! One driver task owns at most one socket and at most one pending reconnect
//! timer, so the states here describe the whole connection, not a single
//! attempt. The task connects only while the session carries both a user id
//! and a token; any identity change tears the current socket down and
//! reconnects with the new credential, and a missing credential parks the
//! connection idle instead of retrying.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff::Backoff;
use crate::cache::CacheHandle;
use crate::protocol::{self, Decoded};
use crate::reconcile::Reconciler;
use crate::refetch::RefetchQueue;
use crate::session::Identity;

/// Lifecycle state of the single managed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnState {
    /// No credential; not connecting and not scheduled to.
    Idle,
    /// Dialing or waiting out a reconnect delay.
    Connecting,
    /// Socket established and subscribed.
    Open,
    /// Last socket ended; a reconnect may be pending.
    Closed,
}

/// Published connection status: the state plus the zero-based index of the
/// next reconnect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnStatus {
    pub state: ConnState,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Base socket URL; the auth token is appended as a query parameter.
    pub ws_url: String,
    pub heartbeat: Duration,
    pub backoff: Backoff,
}

/// Handle to the spawned driver task.
pub struct Connection {
    status_rx: watch::Receiver<ConnStatus>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Spawn the driver task. It runs until [`Connection::stop`].
    pub fn start(
        cfg: ConnectionConfig,
        cache: CacheHandle,
        reconciler: Reconciler,
        refetch: RefetchQueue,
        session_rx: watch::Receiver<Identity>,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnStatus {
            state: ConnState::Idle,
            attempts: 0,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(drive(
            cfg,
            cache,
            reconciler,
            refetch,
            session_rx,
            status_tx,
            shutdown_rx,
        ));
        Self {
            status_rx,
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Receiver of the published status, for the HTTP surface and tests.
    pub fn status(&self) -> watch::Receiver<ConnStatus> {
        self.status_rx.clone()
    }

    /// Tear down the socket and the driver task. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

enum SessionEnd {
    /// Socket closed or errored; reconnect with backoff.
    Lost,
    /// Credentials changed under us; reconnect immediately with the new ones.
    IdentityChanged,
    Shutdown,
}

async fn drive(
    cfg: ConnectionConfig,
    cache: CacheHandle,
    reconciler: Reconciler,
    refetch: RefetchQueue,
    mut session_rx: watch::Receiver<Identity>,
    status_tx: watch::Sender<ConnStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempts: u32 = 0;
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        let identity = session_rx.borrow_and_update().clone();
        let Some((_, token)) = identity.ready() else {
            let _ = status_tx.send(ConnStatus {
                state: ConnState::Idle,
                attempts: 0,
            });
            info!("credentials missing; connection idle");
            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    attempts = 0;
                }
                _ = shutdown_rx.changed() => {}
            }
            continue;
        };

        let _ = status_tx.send(ConnStatus {
            state: ConnState::Connecting,
            attempts,
        });
        let connected = match socket_url(&cfg.ws_url, token) {
            Ok(url) => {
                debug!(attempt = attempts, "dialing socket");
                tokio::select! {
                    result = connect_async(url.as_str()) => Some(result),
                    changed = session_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        attempts = 0;
                        continue;
                    }
                    _ = shutdown_rx.changed() => continue,
                }
            }
            Err(error) => {
                warn!(%error, "invalid socket url");
                None
            }
        };

        match connected {
            Some(Ok((socket, _))) => {
                info!("socket open");
                attempts = 0;
                let _ = status_tx.send(ConnStatus {
                    state: ConnState::Open,
                    attempts: 0,
                });
                let end = run_session(
                    socket,
                    &cfg,
                    &cache,
                    &reconciler,
                    &refetch,
                    &mut session_rx,
                    &mut shutdown_rx,
                )
                .await;
                let _ = status_tx.send(ConnStatus {
                    state: ConnState::Closed,
                    attempts,
                });
                match end {
                    SessionEnd::Shutdown => break,
                    SessionEnd::IdentityChanged => continue,
                    SessionEnd::Lost => {}
                }
            }
            Some(Err(error)) => {
                warn!(%error, attempt = attempts, "connect failed");
                let _ = status_tx.send(ConnStatus {
                    state: ConnState::Closed,
                    attempts,
                });
            }
            None => {}
        }

        // Exactly one reconnect is scheduled per loss; the attempt index
        // advances after the delay is chosen.
        let delay = cfg.backoff.delay(attempts);
        info!(attempt = attempts, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        attempts = attempts.saturating_add(1);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = session_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                attempts = 0;
            }
            _ = shutdown_rx.changed() => {}
        }
    }
    let _ = status_tx.send(ConnStatus {
        state: ConnState::Closed,
        attempts,
    });
}

/// Run one established socket until it ends: subscribe once, ping on the
/// heartbeat interval, and feed every text frame through decode and merge.
async fn run_session(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    cfg: &ConnectionConfig,
    cache: &CacheHandle,
    reconciler: &Reconciler,
    refetch: &RefetchQueue,
    session_rx: &mut watch::Receiver<Identity>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    let subscribe = serde_json::json!({
        "action": "notification.subscribe",
        "topics": ["bell"],
    });
    if let Err(error) = sink.send(Message::Text(subscribe.to_string())).await {
        warn!(%error, "subscribe send failed");
        return SessionEnd::Lost;
    }

    let mut heartbeat = tokio::time::interval(cfg.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let ping = r#"{"action":"ping"}"#.to_string();
                if sink.send(Message::Text(ping)).await.is_err() {
                    return SessionEnd::Lost;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&text, cache, reconciler, refetch).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("socket closed by server");
                    return SessionEnd::Lost;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(%error, "socket error");
                    return SessionEnd::Lost;
                }
            },
            changed = session_rx.changed() => {
                if changed.is_err() {
                    return SessionEnd::Shutdown;
                }
                info!("session identity changed; reconnecting");
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::IdentityChanged;
            }
            _ = shutdown_rx.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
        }
    }
}

async fn handle_frame(
    text: &str,
    cache: &CacheHandle,
    reconciler: &Reconciler,
    refetch: &RefetchQueue,
) {
    match protocol::decode(text) {
        Decoded::Push(message) => {
            let targets = {
                let mut state = cache.write().await;
                reconciler.apply(&mut state, &message)
            };
            for target in targets {
                refetch.schedule(target);
            }
        }
        Decoded::Unknown(kind) => debug!(kind, "ignoring unsupported push type"),
        Decoded::Malformed(what) => warn!(what, "dropping malformed push frame"),
    }
}

/// Build the dial URL with the token as a query parameter.
fn socket_url(base: &str, token: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}
