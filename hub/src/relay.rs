//! Relay hub: accept loop, per-session tasks and the shared roster/map
//! state they all mutate.
//!
//! One task per accepted connection reads frames and applies them to the
//! shared state under a single mutex; a companion writer task drains that
//! session's bounded outbound queue. Broadcasts are fire-and-forget: a
//! session whose queue is full is disconnected rather than allowed to
//! stall the others.

use log::{debug, error, info, warn};
use shared::error::NetError;
use shared::framing::{encode, FrameDecoder, READ_CHUNK};
use shared::map::{canonical_json, BlockMap};
use shared::protocol::{Message, PeerKey, PlayerSnapshot};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex, Notify};

/// Outbound frames queued per session before it is considered stalled.
const SEND_QUEUE: usize = 64;

/// One connected session as the hub sees it.
struct SessionHandle {
    outbound: mpsc::Sender<Vec<u8>>,
    close: watch::Sender<bool>,
}

/// Mutable hub state shared by every session task.
///
/// Every mutation or iteration happens with the mutex held; the client
/// loops run concurrently and all touch the roster and session set.
#[derive(Default)]
struct HubState {
    roster: HashMap<PeerKey, PlayerSnapshot>,
    sessions: HashMap<PeerKey, SessionHandle>,
    /// Canonical map plus its canonical serialization, kept together so a
    /// candidate update can be compared byte-for-byte.
    map: Option<(BlockMap, String)>,
    /// Set once any message has been processed; gates the empty-room
    /// shutdown so a freshly started hub does not exit before the first
    /// participant arrives.
    was_active: bool,
    shutting_down: bool,
}

pub struct Hub {
    listener: TcpListener,
    state: Arc<Mutex<HubState>>,
    shutdown: Arc<Notify>,
}

impl Hub {
    pub async fn bind(addr: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Hub listening on {}", listener.local_addr()?);
        Ok(Hub {
            listener,
            state: Arc::new(Mutex::new(HubState::default())),
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Returns once the hub has shut itself down (empty room
    /// after activity, or last participant leaving).
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            self.accept_session(stream, addr).await;
                        }
                        Err(e) => error!("Accept failed: {}", e),
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("Hub shut down");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn accept_session(&self, stream: TcpStream, addr: SocketAddr) {
        let peer_key = addr.to_string();
        info!("New connection from {}", peer_key);

        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(SEND_QUEUE);
        let (close_tx, close_rx) = watch::channel(false);

        // Initial map message: the canonical map, or the explicit
        // empty-map marker for the first joiner.
        let initial = {
            let mut state = self.state.lock().await;
            state.sessions.insert(
                peer_key.clone(),
                SessionHandle {
                    outbound: outbound_tx.clone(),
                    close: close_tx,
                },
            );
            Message::Map {
                map: state.map.as_ref().map(|(map, _)| map.clone()),
            }
        };
        match encode(&initial) {
            Ok(bytes) => {
                if outbound_tx.send(bytes).await.is_err() {
                    warn!("Session {} closed before the initial map", peer_key);
                }
            }
            Err(e) => error!("Failed to encode initial map: {}", e),
        }

        tokio::spawn(writer_loop(peer_key.clone(), write_half, outbound_rx));
        tokio::spawn(reader_loop(
            peer_key,
            read_half,
            close_rx,
            Arc::clone(&self.state),
            Arc::clone(&self.shutdown),
        ));
    }
}

/// Drains one session's outbound queue into its socket. Exits when the
/// queue closes (session dropped) or the socket errors out.
async fn writer_loop(
    peer_key: PeerKey,
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(bytes) = outbound_rx.recv().await {
        if let Err(e) = write_half.write_all(&bytes).await {
            debug!("Write to {} failed: {}", peer_key, e);
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

/// Per-session read loop: frames, decodes, applies. A zero-length read,
/// a transport error, or a close signal ends the session.
async fn reader_loop(
    peer_key: PeerKey,
    mut read_half: OwnedReadHalf,
    mut close_rx: watch::Receiver<bool>,
    state: Arc<Mutex<HubState>>,
    shutdown: Arc<Notify>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK];

    'session: loop {
        tokio::select! {
            _ = close_rx.changed() => break 'session,
            read = read_half.read(&mut buf) => {
                match read {
                    Ok(0) => break 'session,
                    Ok(n) => {
                        for message in decoder.push(&buf[..n]) {
                            if let Err(e) =
                                handle_message(&state, &shutdown, &peer_key, message).await
                            {
                                warn!("Dropping message from {}: {}", peer_key, e);
                            }
                            if state.lock().await.shutting_down {
                                break 'session;
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Read from {} failed: {}", peer_key, e);
                        break 'session;
                    }
                }
            }
        }
    }

    on_session_closed(&state, &shutdown, &peer_key).await;
}

async fn handle_message(
    state: &Arc<Mutex<HubState>>,
    shutdown: &Arc<Notify>,
    peer_key: &str,
    message: Message,
) -> Result<(), NetError> {
    let mut state = state.lock().await;
    state.was_active = true;

    match message {
        Message::Map { map: Some(map) } => {
            let canonical = canonical_json(&map);
            let unchanged = state
                .map
                .as_ref()
                .is_some_and(|(_, stored)| *stored == canonical);
            if unchanged {
                debug!("Map from {} identical to stored map, ignoring", peer_key);
                return Ok(());
            }
            info!("Received map from {}", peer_key);
            state.map = Some((map.clone(), canonical));
            // Every session gets the new map, the sender included.
            broadcast(&mut state, &Message::Map { map: Some(map) });
        }

        Message::Map { map: None } => {
            debug!("Empty map payload from {}, ignoring", peer_key);
        }

        Message::Leave { id, .. } => {
            if state.roster.len() <= 1 {
                begin_shutdown(&mut state, shutdown);
                return Ok(());
            }
            // A leave may name any roster entry with this identity, not
            // only the sender's own key.
            let departing: Vec<PeerKey> = state
                .roster
                .iter()
                .filter(|(_, snapshot)| snapshot.id == id)
                .map(|(key, _)| key.clone())
                .collect();
            for key in &departing {
                state.roster.remove(key);
                info!("Participant {} ({}) disconnected", id, key);
                if key.as_str() == peer_key {
                    if let Some(session) = state.sessions.get(key) {
                        let _ = session.close.send(true);
                    }
                }
            }
            broadcast_roster(&mut state);
        }

        Message::Snapshot(snapshot) => {
            state.roster.insert(peer_key.to_string(), snapshot);
            broadcast_roster(&mut state);
        }

        Message::Roster(_) | Message::Shutdown { .. } => {
            return Err(NetError::Protocol("hub-only message from a participant"));
        }
    }
    Ok(())
}

/// Cleanup when a session's transport closes for any reason.
async fn on_session_closed(state: &Arc<Mutex<HubState>>, shutdown: &Arc<Notify>, peer_key: &str) {
    let mut state = state.lock().await;

    state.sessions.remove(peer_key);
    if state.roster.remove(peer_key).is_some() {
        info!("Participant {} removed from roster", peer_key);
    }
    info!("Connection with {} closed", peer_key);

    if state.shutting_down {
        return;
    }

    broadcast_roster(&mut state);

    // Empty-room policy: nothing survives an empty period.
    if state.sessions.is_empty() && state.was_active {
        info!("No sessions remaining, shutting hub down");
        begin_shutdown(&mut state, shutdown);
    }
}

fn begin_shutdown(state: &mut HubState, shutdown: &Arc<Notify>) {
    if state.shutting_down {
        return;
    }
    state.shutting_down = true;

    broadcast(
        state,
        &Message::Shutdown {
            server_shutdown: true,
        },
    );
    for session in state.sessions.values() {
        let _ = session.close.send(true);
    }
    state.sessions.clear();
    state.roster.clear();
    shutdown.notify_one();
}

fn broadcast_roster(state: &mut HubState) {
    let roster = Message::Roster(state.roster.clone());
    broadcast(state, &roster);
}

/// Queues one message on every session. A failure towards one target never
/// stops delivery to the rest; a full queue disconnects that session.
fn broadcast(state: &mut HubState, message: &Message) {
    let bytes = match encode(message) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to encode broadcast: {}", e);
            return;
        }
    };

    let mut stalled = Vec::new();
    for (key, session) in &state.sessions {
        match session.outbound.try_send(bytes.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Session {}: {}, disconnecting", key, NetError::Capacity);
                let _ = session.close.send(true);
                stalled.push(key.clone());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Session {} already closed", key);
            }
        }
    }
    for key in stalled {
        state.sessions.remove(&key);
    }
}
