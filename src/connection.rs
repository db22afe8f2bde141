//! Per-client connection loop: read, frame, dispatch, reply.
//!
//! A connection that issues `PSYNC` keeps its read half here (subsequent
//! inbound frames are its `REPLCONF ACK`s) while its write half is handed to
//! the replication core as the propagation channel.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::commands::{CommandResult, ParsedCommand};
use crate::config::{ServerConfig, ServerRole};
use crate::engine::SharedEngine;
use crate::request::RequestParser;

pub async fn handle_client_connection(
    stream: TcpStream,
    peer: String,
    config: Arc<ServerConfig>,
    engine: SharedEngine,
) {
    let (reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));

    run_connection(reader, &writer, &peer, &config, &engine).await;

    // If this connection had attached as a replica, drop its record so
    // propagation stops targeting a dead socket.
    let mut engine_guard = engine.lock().await;
    if let Some(leader) = engine_guard.replication.as_leader_mut() {
        leader.remove_replica(&peer);
    }
    engine_guard.readers.unwatch_client(&peer);
}

async fn run_connection(
    mut reader: OwnedReadHalf,
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    peer: &str,
    config: &Arc<ServerConfig>,
    engine: &SharedEngine,
) {
    let mut parser = RequestParser::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => return,
            Ok(read) => read,
            Err(error) => {
                tracing::debug!(peer = %peer, error = %error, "connection read failed");
                return;
            }
        };
        parser.extend(&chunk[..read]);

        loop {
            let request = match parser.try_next() {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(error) => {
                    // Framing violations close the connection with no reply.
                    tracing::warn!(peer = %peer, error = %error, "protocol violation");
                    return;
                }
            };

            let command = match ParsedCommand::from_request(request) {
                Ok(command) => command,
                Err(error) => {
                    if !write_to_client(writer, error.as_string().as_bytes()).await {
                        return;
                    }
                    continue;
                }
            };

            let outcome = match config.role {
                ServerRole::Leader => command.apply_on_leader(config, peer, engine).await,
                ServerRole::Follower { .. } => {
                    command.apply_on_follower_client(config, peer, engine).await
                }
            };

            match outcome {
                Ok(CommandResult::Response(response)) => {
                    if !write_to_client(writer, response.as_bytes()).await {
                        return;
                    }
                }
                Ok(CommandResult::NoResponse) => {}
                Ok(CommandResult::FullResync { header, snapshot }) => {
                    let mut payload = header.into_bytes();
                    payload.extend_from_slice(format!("${}\r\n", snapshot.len()).as_bytes());
                    payload.extend_from_slice(&snapshot);
                    if !write_to_client(writer, &payload).await {
                        return;
                    }

                    let mut engine_guard = engine.lock().await;
                    if let Some(leader) = engine_guard.replication.as_leader_mut() {
                        leader.register_replica(peer.to_string(), Arc::clone(writer));
                        tracing::info!(replica = %peer, "replica attached");
                    }
                }
                Err(error) => {
                    if !write_to_client(writer, error.as_string().as_bytes()).await {
                        return;
                    }
                }
            }
        }
    }
}

async fn write_to_client(writer: &Arc<Mutex<OwnedWriteHalf>>, bytes: &[u8]) -> bool {
    let mut writer_guard = writer.lock().await;
    if let Err(error) = writer_guard.write_all(bytes).await {
        tracing::debug!(error = %error, "connection write failed");
        return false;
    }
    if let Err(error) = writer_guard.flush().await {
        tracing::debug!(error = %error, "connection flush failed");
        return false;
    }
    true
}
