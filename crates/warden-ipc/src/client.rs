//! IPC client implementation

use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use warden_api::{Command, Event, Request, Response, ResponseResult};

use crate::{IpcError, IpcResult};

/// Client for the wardend control socket
pub struct IpcClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    next_request_id: u64,
}

impl IpcClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
        })
    }

    /// Send a command and wait for its response
    pub async fn send(&mut self, command: Command) -> IpcResult<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let mut json = serde_json::to_string(&Request::new(request_id, command))?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;

        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(IpcError::ConnectionClosed);
        }

        Ok(serde_json::from_str(line.trim())?)
    }

    /// Subscribe to events, consuming this client into an event stream
    pub async fn subscribe(mut self) -> IpcResult<EventStream> {
        let response = self.send(Command::SubscribeEvents).await?;

        match response.result {
            ResponseResult::Ok(_) => Ok(EventStream {
                reader: self.reader,
            }),
            ResponseResult::Err(e) => Err(IpcError::ServerError(e.message)),
        }
    }
}

/// Stream of broadcast events from wardend
pub struct EventStream {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
}

impl EventStream {
    /// Wait for the next event
    pub async fn next(&mut self) -> IpcResult<Event> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(IpcError::ConnectionClosed);
        }

        Ok(serde_json::from_str(line.trim())?)
    }
}
