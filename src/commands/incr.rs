use crate::engine::SharedEngine;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Handles INCR: increments the integer at `key`, creating it at 1.
pub async fn incr(engine: &SharedEngine, arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("incr"));
    }

    let mut engine_guard = engine.lock().await;
    let value = engine_guard.keyspace.incr(&arguments[0])?;

    Ok(CommandResult::Response(RespValue::Integer(value).encode()))
}
