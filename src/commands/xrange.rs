use crate::engine::SharedEngine;
use crate::stream::{self, StreamEntryId};

use super::command_error::CommandError;
use super::handler::CommandResult;
use super::stream_reply::encode_entries;

/// Parsed arguments of `XRANGE key start end`.
#[derive(Debug, PartialEq)]
pub struct XrangeArguments {
    pub key: String,
    pub start: StreamEntryId,
    pub end: StreamEntryId,
}

impl XrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongArity("xrange"));
        }

        Ok(Self {
            key: arguments[0].clone(),
            start: stream::parse_range_start(&arguments[1])?,
            end: stream::parse_range_end(&arguments[2])?,
        })
    }
}

/// Handles XRANGE: entries with `start <= id <= end` in stream order.
pub async fn xrange(engine: &SharedEngine, arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let xrange_arguments = XrangeArguments::parse(arguments)?;

    let engine_guard = engine.lock().await;
    let entries = engine_guard.keyspace.xrange(
        &xrange_arguments.key,
        xrange_arguments.start,
        xrange_arguments.end,
    )?;

    Ok(CommandResult::Response(encode_entries(&entries).encode()))
}
