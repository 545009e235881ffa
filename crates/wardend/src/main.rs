//! wardend - login-session time policy enforcement
//!
//! The main entry point for the wardend service. It wires together:
//! - Configuration loading
//! - The state store (with crash recovery at startup)
//! - The IPC server and command dispatch
//! - The enforcement engine
//! - Unix signal handling

mod host;
mod views;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use warden_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, LifecycleSignal, Response, ResponsePayload,
};
use warden_config::{Config, load_config};
use warden_core::{Engine, eval};
use warden_host_api::SessionHost;
use warden_host_linux::LoginctlAdapter;
use warden_ipc::{IpcServer, ServerMessage};
use warden_state::{Override, OverrideKind, StateStore};
use warden_util::{ClientId, WardenError, default_config_path, end_of_day};

use host::DaemonHost;

/// wardend - time-based access policy for interactive login sessions
#[derive(Parser, Debug)]
#[command(name = "wardend")]
#[command(about = "Time-based access policy for interactive login sessions", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override
    #[arg(short, long, env = "WARDEND_SOCKET")]
    socket: Option<PathBuf>,

    /// State file override
    #[arg(long, env = "WARDEND_STATE")]
    state: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Daemon {
    store: Arc<StateStore>,
    config: Config,
    ipc: Arc<IpcServer>,
    host: Arc<DaemonHost>,
}

impl Daemon {
    async fn new(args: &Args) -> Result<Self> {
        let mut config = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        if let Some(socket) = &args.socket {
            config.daemon.socket_path = socket.clone();
        }
        if let Some(state) = &args.state {
            config.daemon.state_path = state.clone();
        }

        info!(
            config_path = %args.config.display(),
            users = config.users.len(),
            default_enabled = config.default.enabled,
            "Configuration loaded"
        );

        if let Some(parent) = config.daemon.state_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {:?}", parent))?;
        }

        let store = Arc::new(
            StateStore::open(&config.daemon.state_path).with_context(|| {
                format!("Failed to open state file {:?}", config.daemon.state_path)
            })?,
        );

        // Close sessions left open across a downtime window. Skipped when
        // uptime cannot be read; recovery is best-effort.
        match warden_host_linux::uptime() {
            Ok(uptime) => store
                .recover(Local::now(), uptime)
                .context("Crash recovery failed")?,
            Err(e) => debug!(error = %e, "Uptime unavailable, skipping crash recovery"),
        }

        let mut ipc = IpcServer::new(&config.daemon.socket_path);
        ipc.start().await?;
        let ipc = Arc::new(ipc);

        let host = Arc::new(DaemonHost::new(LoginctlAdapter::new(), ipc.clone()));

        Ok(Self {
            store,
            config,
            ipc,
            host,
        })
    }

    async fn run(self) -> Result<()> {
        let mut messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        // The engine and the dispatch loop share only the store's lock
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let host: Arc<dyn SessionHost> = self.host.clone();
        let engine = Engine::new(self.store.clone(), self.config.clone(), host);
        let engine_handle = tokio::spawn(engine.run(shutdown_rx));

        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down");
                    break;
                }
                Some(msg) = messages.recv() => {
                    self.handle_message(msg).await;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        let _ = engine_handle.await;
        self.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request {
                client_id,
                role,
                request,
            } => {
                let response = self
                    .handle_command(&client_id, role, request.request_id, request.command)
                    .await;
                let _ = self.ipc.send_response(&client_id, response).await;
            }
            ServerMessage::Disconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
            }
        }
    }

    async fn handle_command(
        &self,
        client_id: &ClientId,
        role: ClientRole,
        request_id: u64,
        command: Command,
    ) -> Response {
        let now = Local::now();

        if requires_admin(&command) && !role.can_mutate() {
            return Response::error(
                request_id,
                ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"),
            );
        }

        match command {
            Command::Status { user } => {
                match views::user_status(&self.store.snapshot(), &user, now) {
                    Ok(status) => {
                        Response::success(request_id, ResponsePayload::Status(status))
                    }
                    Err(e) => Response::error(request_id, error_info(&e)),
                }
            }

            Command::CheckLogin { user } => {
                let permitted =
                    eval::permit_login(&user, &self.store.snapshot(), &self.config, now);
                Response::success(request_id, ResponsePayload::LoginPermitted { permitted })
            }

            Command::Pause { user } => match self.store.pause_user(&user) {
                Ok(()) => {
                    // A paused user's live session is locked right away;
                    // failure to lock does not undo the pause
                    if let Some(session_id) = self.store.active_session_id(&user) {
                        if let Err(e) = self.host.lock_session(&user, &session_id).await {
                            warn!(user = %user, error = %e, "Failed to lock session after pause");
                        }
                    }
                    Response::success(request_id, ResponsePayload::Paused)
                }
                Err(e) => Response::error(request_id, error_info(&e)),
            },

            Command::Resume { user } => match self.store.resume_user(&user) {
                Ok(()) => Response::success(request_id, ResponsePayload::Resumed),
                Err(e) => Response::error(request_id, error_info(&e)),
            },

            Command::AddOverride {
                user,
                reason,
                extra_minutes,
                allowed_hours,
                expires_at,
            } => {
                let kind = match (extra_minutes, allowed_hours) {
                    (Some(minutes), None) if minutes > 0 => {
                        OverrideKind::ExtraTime {
                            extra_minutes: minutes,
                        }
                    }
                    (Some(_), None) => {
                        return Response::error(
                            request_id,
                            ErrorInfo::new(
                                ErrorCode::InvalidOverride,
                                "extra_minutes must be positive",
                            ),
                        );
                    }
                    (None, Some(window)) => OverrideKind::AllowedHours {
                        allowed_hours: window,
                    },
                    _ => {
                        return Response::error(
                            request_id,
                            ErrorInfo::new(
                                ErrorCode::InvalidOverride,
                                "specify exactly one of extra_minutes or allowed_hours",
                            ),
                        );
                    }
                };

                let ov = Override {
                    reason,
                    expires_at: expires_at.unwrap_or_else(|| end_of_day(&now)),
                    kind,
                };

                match self.store.add_override(&user, ov) {
                    Ok(()) => Response::success(request_id, ResponsePayload::OverrideAdded),
                    Err(e) => Response::error(request_id, error_info(&e)),
                }
            }

            Command::RemoveOverride { user, index } => {
                match self.store.remove_override(&user, index) {
                    Ok(()) => Response::success(request_id, ResponsePayload::OverrideRemoved),
                    Err(e) => Response::error(request_id, error_info(&e)),
                }
            }

            Command::ListOverrides { user } => {
                match self.store.list_overrides(user.as_deref()) {
                    Ok(map) => Response::success(
                        request_id,
                        ResponsePayload::Overrides(
                            map.into_iter()
                                .map(|(name, overrides)| {
                                    (name, overrides.iter().map(views::override_view).collect())
                                })
                                .collect(),
                        ),
                    ),
                    Err(e) => Response::error(request_id, error_info(&e)),
                }
            }

            Command::Notify { user, message } => {
                let Some(session_id) = self.store.active_session_id(&user) else {
                    let e = if self.store.snapshot().user(&user).is_none() {
                        ErrorInfo::new(ErrorCode::UserNotFound, format!("unknown user {}", user))
                    } else {
                        ErrorInfo::new(
                            ErrorCode::SessionNotFound,
                            format!("no active session for {}", user),
                        )
                    };
                    return Response::error(request_id, e);
                };

                match self
                    .host
                    .notify(&user, &session_id, "Session warden", &message)
                    .await
                {
                    Ok(()) => Response::success(request_id, ResponsePayload::Notified),
                    Err(e) => Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::InternalError, e.to_string()),
                    ),
                }
            }

            Command::SessionSignal { signal } => {
                self.apply_signal(signal, now);
                Response::success(request_id, ResponsePayload::SignalAccepted)
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }

    fn apply_signal(&self, signal: LifecycleSignal, now: chrono::DateTime<Local>) {
        match signal {
            LifecycleSignal::Login { user, session_id } => {
                self.store.handle_login(&user, &session_id, now);
            }
            LifecycleSignal::Logout { session_id } => {
                self.store.handle_logout(&session_id, now);
            }
            LifecycleSignal::Lock { user, session_id } => {
                self.store.handle_lock(&user, &session_id, now);
            }
            LifecycleSignal::Unlock { user, session_id } => {
                self.store.handle_unlock(&user, &session_id, now);
            }
            LifecycleSignal::Sleep => self.store.handle_sleep(now),
            LifecycleSignal::Wake => self.store.handle_wake(),
        }
    }
}

/// Commands that mutate state or reach into a user's session
fn requires_admin(command: &Command) -> bool {
    matches!(
        command,
        Command::Pause { .. }
            | Command::Resume { .. }
            | Command::AddOverride { .. }
            | Command::RemoveOverride { .. }
            | Command::Notify { .. }
            | Command::SessionSignal { .. }
    )
}

fn error_info(e: &WardenError) -> ErrorInfo {
    let code = match e {
        WardenError::UserNotFound(_) => ErrorCode::UserNotFound,
        WardenError::SessionNotFound(_) => ErrorCode::SessionNotFound,
        WardenError::InvalidOverride(_) => ErrorCode::InvalidOverride,
        WardenError::PermissionDenied(_) => ErrorCode::PermissionDenied,
        WardenError::StoreError(_) => ErrorCode::StoreError,
        _ => ErrorCode::InternalError,
    };
    ErrorInfo::new(code, e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "wardend starting");

    let daemon = Daemon::new(&args).await?;
    daemon.run().await
}
