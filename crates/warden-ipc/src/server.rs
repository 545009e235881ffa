//! IPC server implementation
//!
//! The socket is world-connectable; mutation is gated per command by the
//! role derived from the peer's UID. Requests flow to the daemon through a
//! channel, responses and broadcast events flow back per connection.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tracing::{debug, error, info, warn};
use warden_api::{ClientRole, Command, Event, Request, Response};
use warden_util::ClientId;

use crate::{IpcError, IpcResult};

/// A message surfaced to the daemon's dispatch loop
pub enum ServerMessage {
    Request {
        client_id: ClientId,
        role: ClientRole,
        request: Request,
    },
    Disconnected {
        client_id: ClientId,
    },
}

struct ClientHandle {
    role: ClientRole,
    response_tx: mpsc::UnboundedSender<String>,
    subscribed: Arc<AtomicBool>,
}

/// NDJSON server over a Unix domain socket
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    clients: Arc<RwLock<HashMap<ClientId, ClientHandle>>>,
    event_tx: broadcast::Sender<Event>,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    message_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerMessage>>>,
}

impl IpcServer {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            message_tx,
            message_rx: Mutex::new(Some(message_rx)),
        }
    }

    /// Bind the socket, replacing a stale one left by a previous run
    pub async fn start(&mut self) -> IpcResult<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        // Anyone may connect; mutation is gated per command by role
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o666))?;

        info!(path = %self.socket_path.display(), "IPC server listening");

        self.listener = Some(listener);
        Ok(())
    }

    /// Take the daemon-side receiver for server messages (once)
    pub async fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.message_rx.lock().await.take()
    }

    /// Accept connections until the task is dropped
    pub async fn run(&self) -> IpcResult<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| IpcError::ServerError("server not started".into()))?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let client_id = ClientId::new();
                    let uid = peer_uid(&stream);
                    let role = role_for_uid(uid);

                    info!(client_id = %client_id, uid = ?uid, role = ?role, "Client connected");
                    self.spawn_client_tasks(stream, client_id, role).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn spawn_client_tasks(&self, stream: UnixStream, client_id: ClientId, role: ClientRole) {
        let (read_half, write_half) = stream.into_split();
        let (response_tx, mut response_rx) = mpsc::unbounded_channel::<String>();
        let subscribed = Arc::new(AtomicBool::new(false));

        self.clients.write().await.insert(
            client_id.clone(),
            ClientHandle {
                role,
                response_tx,
                subscribed: subscribed.clone(),
            },
        );

        // Reader: parse requests and forward them to the daemon. The
        // subscribe flag flips here so the writer starts forwarding events
        // before the daemon even answers.
        let message_tx = self.message_tx.clone();
        let reader_subscribed = subscribed.clone();
        let reader_client_id = client_id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Request>(line) {
                            Ok(request) => {
                                if matches!(request.command, Command::SubscribeEvents) {
                                    reader_subscribed.store(true, Ordering::Relaxed);
                                }
                                let _ = message_tx.send(ServerMessage::Request {
                                    client_id: reader_client_id.clone(),
                                    role,
                                    request,
                                });
                            }
                            Err(e) => {
                                warn!(client_id = %reader_client_id, error = %e, "Invalid request");
                            }
                        }
                    }
                    Ok(None) => {
                        debug!(client_id = %reader_client_id, "Client disconnected (EOF)");
                        break;
                    }
                    Err(e) => {
                        debug!(client_id = %reader_client_id, error = %e, "Read error");
                        break;
                    }
                }
            }
            let _ = message_tx.send(ServerMessage::Disconnected {
                client_id: reader_client_id,
            });
        });

        // Writer: interleave responses with broadcast events for
        // subscribed clients
        let mut event_rx = self.event_tx.subscribe();
        let clients = self.clients.clone();
        tokio::spawn(async move {
            let mut writer = write_half;
            loop {
                let line = tokio::select! {
                    response = response_rx.recv() => match response {
                        Some(json) => json,
                        None => break,
                    },
                    event = event_rx.recv() => match event {
                        Ok(event) if subscribed.load(Ordering::Relaxed) => {
                            match serde_json::to_string(&event) {
                                Ok(json) => json,
                                Err(_) => continue,
                            }
                        }
                        Ok(_) => continue,
                        // Lagged subscribers just miss events
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };

                let mut line = line;
                line.push('\n');
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    debug!(client_id = %client_id, error = %e, "Write error");
                    break;
                }
            }
            clients.write().await.remove(&client_id);
        });
    }

    /// Send a response to one client
    pub async fn send_response(&self, client_id: &ClientId, response: Response) -> IpcResult<()> {
        let json = serde_json::to_string(&response)?;

        let clients = self.clients.read().await;
        if let Some(handle) = clients.get(client_id) {
            handle
                .response_tx
                .send(json)
                .map_err(|_| IpcError::ConnectionClosed)?;
        }
        Ok(())
    }

    /// Broadcast an event to all subscribed clients
    pub fn broadcast_event(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    /// Role of a connected client
    pub async fn client_role(&self, client_id: &ClientId) -> Option<ClientRole> {
        self.clients.read().await.get(client_id).map(|h| h.role)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn peer_uid(stream: &UnixStream) -> Option<u32> {
    use std::os::unix::io::AsFd;

    let fd = stream.as_fd();
    nix::sys::socket::getsockopt(&fd, nix::sys::socket::sockopt::PeerCredentials)
        .ok()
        .map(|cred| cred.uid())
}

fn role_for_uid(uid: Option<u32>) -> ClientRole {
    match uid {
        Some(0) => ClientRole::Admin,
        Some(u) if u == nix::unistd::getuid().as_raw() => ClientRole::Admin,
        _ => ClientRole::User,
    }
}
