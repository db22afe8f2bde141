//! Routing of framed requests to command handlers, per server role.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::SharedEngine;
use crate::request::Request;

use super::command_error::CommandError;
use super::{
    config_get, echo, get, incr, info, keys, ping, psync, replconf, set, type_command, wait, xadd,
    xrange, xread,
};

/// Commands that mutate the keyspace. On a leader their raw frames are
/// propagated; on a follower ordinary clients may not issue them.
const WRITE_COMMANDS: [&str; 3] = ["SET", "INCR", "XADD"];

/// What dispatching a command produced.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// A reply to write to the requesting client.
    Response(String),
    /// Nothing to write.
    NoResponse,
    /// A `PSYNC` was accepted: send the header and the framed snapshot,
    /// then treat the connection's write half as a replica channel.
    FullResync { header: String, snapshot: Vec<u8> },
}

/// A framed request with its verb uppercased, ready to dispatch. Keeps the
/// raw frame bytes for propagation and offset accounting.
#[derive(Debug, PartialEq, Clone)]
pub struct ParsedCommand {
    pub name: String,
    pub arguments: Vec<String>,
    pub raw: Vec<u8>,
}

impl ParsedCommand {
    pub fn from_request(request: Request) -> Result<Self, CommandError> {
        let mut arguments = request.arguments;
        if arguments.is_empty() {
            return Err(CommandError::EmptyRequest);
        }
        let name = arguments.remove(0).to_uppercase();

        Ok(Self {
            name,
            arguments,
            raw: request.raw,
        })
    }

    pub fn is_write(&self) -> bool {
        WRITE_COMMANDS.contains(&self.name.as_str())
    }

    /// Executes a client command on a leader. Successful writes are
    /// propagated to every attached replica afterwards.
    pub async fn apply_on_leader(
        &self,
        config: &Arc<ServerConfig>,
        peer: &str,
        engine: &SharedEngine,
    ) -> Result<CommandResult, CommandError> {
        let result = self.execute(config, peer, engine).await?;

        if self.is_write() {
            let mut engine_guard = engine.lock().await;
            if let Some(leader) = engine_guard.replication.as_leader_mut() {
                leader.propagate(&self.raw).await;
            }
        }

        Ok(result)
    }

    /// Executes a client command on a follower. Writes and leader-only
    /// commands are rejected; reads and introspection pass through.
    pub async fn apply_on_follower_client(
        &self,
        config: &Arc<ServerConfig>,
        peer: &str,
        engine: &SharedEngine,
    ) -> Result<CommandResult, CommandError> {
        if self.is_write() {
            return Err(CommandError::ReadOnlyReplica);
        }
        match self.name.as_str() {
            "PSYNC" => return Err(CommandError::LeaderOnly("psync")),
            "WAIT" => return Err(CommandError::LeaderOnly("wait")),
            _ => {}
        }

        self.execute(config, peer, engine).await
    }

    /// Applies a command propagated over the master link. Replies are
    /// suppressed; the returned string, if any, is the `REPLCONF GETACK`
    /// acknowledgement and belongs on the master socket.
    pub async fn apply_from_master(&self, engine: &SharedEngine) -> Option<String> {
        match self.name.as_str() {
            "SET" => {
                if let Err(error) = set::set(engine, self.arguments.clone()).await {
                    tracing::debug!(error = %error, "propagated SET failed");
                }
                None
            }
            "INCR" => {
                if let Err(error) = incr::incr(engine, self.arguments.clone()).await {
                    tracing::debug!(error = %error, "propagated INCR failed");
                }
                None
            }
            "XADD" => {
                if let Err(error) = xadd::xadd(engine, self.arguments.clone()).await {
                    tracing::debug!(error = %error, "propagated XADD failed");
                }
                None
            }
            "REPLCONF" => replconf::getack_reply(engine, &self.arguments).await,
            "PING" => None,
            other => {
                tracing::debug!(command = other, "ignoring unsupported master command");
                None
            }
        }
    }

    async fn execute(
        &self,
        config: &Arc<ServerConfig>,
        peer: &str,
        engine: &SharedEngine,
    ) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "PING" => ping::ping(self.arguments.clone()),
            "ECHO" => echo::echo(self.arguments.clone()),
            "SET" => set::set(engine, self.arguments.clone()).await,
            "GET" => get::get(engine, self.arguments.clone()).await,
            "INCR" => incr::incr(engine, self.arguments.clone()).await,
            "TYPE" => type_command::type_command(engine, self.arguments.clone()).await,
            "KEYS" => keys::keys(engine, self.arguments.clone()).await,
            "CONFIG" => config_get::config_get(config, self.arguments.clone()),
            "INFO" => info::info(engine, self.arguments.clone()).await,
            "XADD" => xadd::xadd(engine, self.arguments.clone()).await,
            "XRANGE" => xrange::xrange(engine, self.arguments.clone()).await,
            "XREAD" => xread::xread(engine, peer, self.arguments.clone()).await,
            "REPLCONF" => replconf::replconf(engine, peer, self.arguments.clone()).await,
            "PSYNC" => psync::psync(engine, self.arguments.clone()).await,
            "WAIT" => wait::wait(config, engine, &self.raw, self.arguments.clone()).await,
            _ => Err(CommandError::UnknownCommand(self.name.clone())),
        }
    }
}
