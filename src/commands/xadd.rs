use crate::engine::SharedEngine;
use crate::resp::RespValue;
use crate::stream::RequestedId;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Parsed arguments of `XADD key id field value [field value ...]`.
#[derive(Debug, PartialEq)]
pub struct XaddArguments {
    pub key: String,
    pub requested_id: RequestedId,
    pub fields: Vec<(String, String)>,
}

impl XaddArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments[2..].len() % 2 != 0 {
            return Err(CommandError::WrongArity("xadd"));
        }

        let requested_id = RequestedId::parse(&arguments[1])?;
        let fields = arguments[2..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        Ok(Self {
            key: arguments[0].clone(),
            requested_id,
            fields,
        })
    }
}

/// Handles XADD: appends an entry under an arbitrated ID, wakes blocked
/// readers of the stream, and replies with the assigned ID.
pub async fn xadd(engine: &SharedEngine, arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;

    let mut engine_guard = engine.lock().await;
    let assigned = engine_guard.keyspace.xadd(
        &xadd_arguments.key,
        xadd_arguments.requested_id,
        xadd_arguments.fields,
    )?;
    engine_guard.readers.notify_append(&xadd_arguments.key);

    Ok(CommandResult::Response(
        RespValue::BulkString(assigned.to_string()).encode(),
    ))
}
