//! Server bootstrap: snapshot load, listener bind, connection accept loop,
//! and the follower's master link.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ServerConfig, ServerRole};
use crate::connection::handle_client_connection;
use crate::engine::{Engine, SharedEngine};
use crate::rdb::{self, RdbError};
use crate::replication::{
    self, FollowerReplication, LeaderReplication, ReplicationState,
};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, String),
    #[error(transparent)]
    Rdb(#[from] RdbError),
}

pub struct Server {
    config: Arc<ServerConfig>,
    engine: SharedEngine,
    listener: TcpListener,
}

impl Server {
    /// Boots the engine (loading the snapshot on a leader) and binds the
    /// listener. A malformed snapshot is fatal; a missing one is an empty
    /// keyspace.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let replid = replication::generate_replid();
        let replication = match config.role {
            ServerRole::Leader => ReplicationState::Leader(LeaderReplication::new(replid)),
            ServerRole::Follower { .. } => {
                ReplicationState::Follower(FollowerReplication::new(replid))
            }
        };
        let mut engine = Engine::new(replication);

        if config.role == ServerRole::Leader {
            if let Some(snapshot) = rdb::load_snapshot_file(&config.dir, &config.dbfilename).await?
            {
                tracing::info!(keys = snapshot.entries.len(), "loaded boot snapshot");
                for (key, value) in snapshot.entries {
                    engine.keyspace.insert_value(key, value);
                }
            }
        }

        let address = format!("127.0.0.1:{}", config.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|error| ServerError::Bind(address, error.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            engine: engine.into_shared(),
            listener,
        })
    }

    /// The address the listener actually bound, useful when the configured
    /// port was ephemeral.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Runs the server: spawns the master link on a follower, then accepts
    /// client connections until the process ends.
    pub async fn run(self) {
        if let ServerRole::Follower { .. } = self.config.role {
            let config = Arc::clone(&self.config);
            let engine = Arc::clone(&self.engine);
            tokio::spawn(async move {
                if let Err(error) = replication::run_replica_link(config, engine).await {
                    tracing::error!(error = %error, "replica link terminated");
                }
            });
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let config = Arc::clone(&self.config);
                    let engine = Arc::clone(&self.engine);
                    tokio::spawn(async move {
                        handle_client_connection(stream, peer.to_string(), config, engine).await;
                    });
                }
                Err(error) => {
                    tracing::warn!(error = %error, "failed to accept connection");
                }
            }
        }
    }
}
