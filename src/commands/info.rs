use crate::engine::SharedEngine;
use crate::replication::ReplicationState;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Handles `INFO [replication]`: the replication section as one bulk string
/// of `name:value` lines.
pub async fn info(engine: &SharedEngine, arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    match arguments.len() {
        0 => {}
        1 if arguments[0].eq_ignore_ascii_case("replication") => {}
        1 => return Err(CommandError::UnknownInfoSection(arguments[0].clone())),
        _ => return Err(CommandError::WrongArity("info")),
    }

    let engine_guard = engine.lock().await;
    let replication = &engine_guard.replication;

    let mut lines = vec![
        format!("role:{}", replication.role_name()),
        format!("master_replid:{}", replication.reported_replid()),
        format!("master_repl_offset:{}", replication.offset()),
    ];
    if let ReplicationState::Leader(leader) = replication {
        lines.push(format!("connected_slaves:{}", leader.replica_count()));
    }

    Ok(CommandResult::Response(
        RespValue::BulkString(lines.join("\r\n")).encode(),
    ))
}
