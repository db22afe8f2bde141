use crate::engine::SharedEngine;
use crate::rdb;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Parsed arguments of `PSYNC <replid> <offset>`. A new replica sends
/// `PSYNC ? -1`.
pub struct PsyncArguments {
    pub requested_replid: String,
    pub requested_offset: i64,
}

impl PsyncArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongArity("psync"));
        }

        let requested_offset = arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::ValueNotInteger)?;

        Ok(Self {
            requested_replid: arguments[0].clone(),
            requested_offset,
        })
    }
}

/// Handles PSYNC on a leader: always answers with a full resynchronization,
/// `+FULLRESYNC <replid> <offset>` followed by the framed snapshot.
pub async fn psync(engine: &SharedEngine, arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let _ = PsyncArguments::parse(arguments)?;

    let engine_guard = engine.lock().await;
    let Some(leader) = engine_guard.replication.as_leader() else {
        return Err(CommandError::LeaderOnly("psync"));
    };

    let header = RespValue::SimpleString(format!(
        "FULLRESYNC {} {}",
        leader.replid, leader.repl_offset
    ))
    .encode();

    Ok(CommandResult::FullResync {
        header,
        snapshot: rdb::empty_snapshot(),
    })
}
