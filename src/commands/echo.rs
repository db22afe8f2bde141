use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

pub fn echo(arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("echo"));
    }

    Ok(CommandResult::Response(
        RespValue::BulkString(arguments[0].clone()).encode(),
    ))
}
