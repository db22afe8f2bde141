use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Handles PING: `+PONG` bare, or the message echoed back as a bulk string.
pub fn ping(arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    match arguments.len() {
        0 => Ok(CommandResult::Response(
            RespValue::SimpleString("PONG".to_string()).encode(),
        )),
        1 => Ok(CommandResult::Response(
            RespValue::BulkString(arguments[0].clone()).encode(),
        )),
        _ => Err(CommandError::WrongArity("ping")),
    }
}
