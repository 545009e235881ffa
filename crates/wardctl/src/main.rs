//! wardctl - administrative CLI for wardend
//!
//! Talks NDJSON to the daemon's control socket. The `listen` subcommand is
//! meant to run inside a user's desktop session: it subscribes to the
//! daemon's event stream and renders notifications with `notify-send`.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use warden_api::{
    Command, EventPayload, Response, ResponsePayload, ResponseResult, UserStatus,
};
use warden_ipc::IpcClient;
use warden_util::{TimeRange, default_socket_path, format_duration};

/// wardctl - control and query wardend
#[derive(Parser, Debug)]
#[command(name = "wardctl")]
#[command(about = "Control and query the wardend session-time daemon", long_about = None)]
struct Cli {
    /// Daemon socket path
    #[arg(short, long, env = "WARDEND_SOCKET", default_value_os_t = default_socket_path())]
    socket: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show a user's usage, sessions, and overrides
    Status {
        user: String,
        /// Print the raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Check whether a user would be permitted to log in now
    /// (exits 1 when denied)
    Check { user: String },

    /// Suspend a user's access and lock their session
    Pause { user: String },

    /// Lift a pause
    Resume { user: String },

    /// Manage temporary overrides
    #[command(subcommand)]
    Override(OverrideCmd),

    /// Send a notification to a user's session
    Notify { user: String, message: String },

    /// Run inside a desktop session: render daemon notifications with
    /// notify-send
    Listen,

    /// Check that the daemon is answering
    Ping,
}

#[derive(Subcommand, Debug)]
enum OverrideCmd {
    /// Grant extra time or a replacement login window
    Add {
        user: String,
        /// Why the override exists (shown in status output)
        #[arg(long)]
        reason: String,
        /// Extra minutes on top of the daily limit
        #[arg(long, conflicts_with = "hours")]
        extra_minutes: Option<u32>,
        /// Replacement login window, e.g. 10:00-22:00
        #[arg(long)]
        hours: Option<TimeRange>,
        /// RFC 3339 expiry (default: end of today)
        #[arg(long)]
        expires_at: Option<String>,
    },

    /// Remove an override by its index in `override list`
    Remove { user: String, index: usize },

    /// List overrides for one user, or all users
    List { user: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut client = IpcClient::connect(&cli.socket)
        .await
        .with_context(|| format!("Failed to connect to wardend at {:?}", cli.socket))?;

    match cli.command {
        Cmd::Status { user, json } => {
            let status = match expect_ok(client.send(Command::Status { user }).await?)? {
                ResponsePayload::Status(status) => status,
                other => bail!("unexpected response: {:?}", other),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Cmd::Check { user } => {
            match expect_ok(client.send(Command::CheckLogin { user }).await?)? {
                ResponsePayload::LoginPermitted { permitted } => {
                    if permitted {
                        println!("permitted");
                    } else {
                        println!("denied");
                        std::process::exit(1);
                    }
                }
                other => bail!("unexpected response: {:?}", other),
            }
        }

        Cmd::Pause { user } => {
            expect_ok(client.send(Command::Pause { user: user.clone() }).await?)?;
            println!("{} paused", user);
        }

        Cmd::Resume { user } => {
            expect_ok(client.send(Command::Resume { user: user.clone() }).await?)?;
            println!("{} resumed", user);
        }

        Cmd::Override(cmd) => handle_override(&mut client, cmd).await?,

        Cmd::Notify { user, message } => {
            expect_ok(client.send(Command::Notify { user, message }).await?)?;
            println!("notification sent");
        }

        Cmd::Listen => listen(client).await?,

        Cmd::Ping => {
            expect_ok(client.send(Command::Ping).await?)?;
            println!("pong");
        }
    }

    Ok(())
}

async fn handle_override(client: &mut IpcClient, cmd: OverrideCmd) -> Result<()> {
    match cmd {
        OverrideCmd::Add {
            user,
            reason,
            extra_minutes,
            hours,
            expires_at,
        } => {
            let expires_at = expires_at
                .map(|s| parse_expiry(&s))
                .transpose()?;

            expect_ok(
                client
                    .send(Command::AddOverride {
                        user: user.clone(),
                        reason,
                        extra_minutes,
                        allowed_hours: hours,
                        expires_at,
                    })
                    .await?,
            )?;
            println!("override added for {}", user);
        }

        OverrideCmd::Remove { user, index } => {
            expect_ok(
                client
                    .send(Command::RemoveOverride {
                        user: user.clone(),
                        index,
                    })
                    .await?,
            )?;
            println!("override {} removed for {}", index, user);
        }

        OverrideCmd::List { user } => {
            match expect_ok(client.send(Command::ListOverrides { user }).await?)? {
                ResponsePayload::Overrides(map) => {
                    if map.is_empty() {
                        println!("no overrides");
                    }
                    for (user, overrides) in map {
                        println!("{}:", user);
                        for (i, ov) in overrides.iter().enumerate() {
                            let what = match (ov.extra_minutes, ov.allowed_hours) {
                                (Some(minutes), _) => format!("+{}m", minutes),
                                (_, Some(window)) => format!("hours {}", window),
                                _ => "?".to_string(),
                            };
                            println!(
                                "  [{}] {} until {} ({})",
                                i,
                                what,
                                ov.expires_at.format("%Y-%m-%d %H:%M"),
                                ov.reason
                            );
                        }
                    }
                }
                other => bail!("unexpected response: {:?}", other),
            }
        }
    }

    Ok(())
}

async fn listen(client: IpcClient) -> Result<()> {
    let username = std::env::var("USER").context("USER not set")?;
    let mut events = client
        .subscribe()
        .await
        .map_err(|e| anyhow!("subscribe failed: {}", e))?;

    eprintln!("listening for notifications for {}", username);

    loop {
        let event = events.next().await?;
        match event.payload {
            EventPayload::Notification {
                username: target,
                summary,
                body,
            } if target == username => {
                let result = tokio::process::Command::new("notify-send")
                    .arg("--urgency=normal")
                    .arg("--expire-time=10000")
                    .arg(&summary)
                    .arg(&body)
                    .status()
                    .await;
                if let Err(e) = result {
                    eprintln!("notify-send failed: {}", e);
                }
            }
            _ => {}
        }
    }
}

fn print_status(status: &UserStatus) {
    println!("user: {}", status.username);
    println!("paused: {}", status.paused);
    println!(
        "used today: {}",
        format_duration(Duration::from_secs(status.seconds_used_today.max(0) as u64))
    );

    let active: Vec<_> = status.sessions.iter().filter(|s| s.end.is_none()).collect();
    println!(
        "sessions: {} ({} active)",
        status.sessions.len(),
        active.len()
    );
    for session in active {
        println!(
            "  {} since {}",
            session.session_id,
            session.start.format("%Y-%m-%d %H:%M")
        );
    }

    println!("overrides: {}", status.overrides.len());
}

fn expect_ok(response: Response) -> Result<ResponsePayload> {
    match response.result {
        ResponseResult::Ok(payload) => Ok(payload),
        ResponseResult::Err(e) => bail!("{:?}: {}", e.code, e.message),
    }
}

fn parse_expiry(s: &str) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .with_context(|| format!("invalid expiry {:?} (expected RFC 3339)", s))
}
