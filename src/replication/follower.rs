//! The master-link task a follower runs: handshake, snapshot ingestion, then
//! the silent apply loop over the propagated command stream.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::commands::ParsedCommand;
use crate::config::{ServerConfig, ServerRole};
use crate::engine::SharedEngine;
use crate::rdb;
use crate::request::{FrameError, Request, RequestParser};

use super::handshake::{perform_handshake, HandshakeError};

#[derive(Error, Debug)]
pub enum ReplicaLinkError {
    #[error("server is not configured as a replica")]
    NotAReplica,
    #[error("failed to connect to leader at {0}: {1}")]
    Connect(String, String),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error("protocol violation on the master stream: {0}")]
    Protocol(#[from] FrameError),
    #[error("leader closed the replication stream")]
    StreamClosed,
    #[error("I/O error on the master stream: {0}")]
    Io(String),
}

/// Connects to the configured leader and runs the replication link until the
/// connection drops.
pub async fn run_replica_link(
    config: Arc<ServerConfig>,
    engine: SharedEngine,
) -> Result<(), ReplicaLinkError> {
    let ServerRole::Follower { ref host, port } = config.role else {
        return Err(ReplicaLinkError::NotAReplica);
    };
    let leader_address = format!("{}:{}", host, port);

    let mut stream = TcpStream::connect(&leader_address)
        .await
        .map_err(|error| ReplicaLinkError::Connect(leader_address.clone(), error.to_string()))?;

    let outcome = perform_handshake(&mut stream, config.port).await?;
    tracing::info!(leader = %leader_address, "replication handshake complete");

    ingest_snapshot(&engine, &outcome.snapshot).await;
    {
        let mut engine_guard = engine.lock().await;
        if let Some(follower) = engine_guard.replication.as_follower_mut() {
            follower.master_replid = Some(outcome.master_replid);
        }
    }

    // Propagated commands may already have been read together with the
    // snapshot; they must be framed before anything new off the socket.
    let mut parser = RequestParser::with_leftover(&outcome.leftover);
    let mut chunk = [0u8; 4096];

    loop {
        while let Some(request) = parser.try_next()? {
            apply_master_request(&mut stream, &engine, request).await?;
        }

        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|error| ReplicaLinkError::Io(error.to_string()))?;
        if read == 0 {
            return Err(ReplicaLinkError::StreamClosed);
        }
        parser.extend(&chunk[..read]);
    }
}

/// Applies one propagated request with its reply suppressed, then advances
/// the consumed-byte counter by the frame's exact length.
///
/// A `REPLCONF GETACK *` is the exception: its acknowledgement goes back on
/// the master socket, carrying the offset as it stood before this frame.
async fn apply_master_request(
    stream: &mut TcpStream,
    engine: &SharedEngine,
    request: Request,
) -> Result<(), ReplicaLinkError> {
    let consumed = request.raw.len() as u64;

    match ParsedCommand::from_request(request) {
        Ok(command) => {
            if let Some(reply) = command.apply_from_master(engine).await {
                stream
                    .write_all(reply.as_bytes())
                    .await
                    .map_err(|error| ReplicaLinkError::Io(error.to_string()))?;
            }
        }
        Err(error) => {
            tracing::debug!(error = %error, "ignoring unparseable master request");
        }
    }

    let mut engine_guard = engine.lock().await;
    if let Some(follower) = engine_guard.replication.as_follower_mut() {
        follower.master_offset += consumed;
    }

    Ok(())
}

/// Feeds the snapshot received over PSYNC into the keyspace. An
/// unparseable snapshot is discarded rather than taking the link down.
async fn ingest_snapshot(engine: &SharedEngine, snapshot: &[u8]) {
    match rdb::parse_snapshot(snapshot) {
        Ok(snapshot) => {
            let mut engine_guard = engine.lock().await;
            let count = snapshot.entries.len();
            for (key, value) in snapshot.entries {
                engine_guard.keyspace.insert_value(key, value);
            }
            tracing::info!(keys = count, "ingested leader snapshot");
        }
        Err(error) => {
            tracing::warn!(error = %error, "discarding unparseable leader snapshot");
        }
    }
}
