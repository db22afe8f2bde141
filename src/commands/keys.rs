use globset::Glob;

use crate::engine::SharedEngine;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Handles KEYS: every live key matching the glob pattern, as bulk strings.
pub async fn keys(engine: &SharedEngine, arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("keys"));
    }

    let matcher = Glob::new(&arguments[0])
        .map_err(|error| CommandError::InvalidGlobPattern(error.to_string()))?
        .compile_matcher();

    let mut engine_guard = engine.lock().await;
    let matching = engine_guard
        .keyspace
        .live_keys()
        .into_iter()
        .filter(|key| matcher.is_match(key))
        .map(RespValue::BulkString)
        .collect();

    Ok(CommandResult::Response(RespValue::Array(matching).encode()))
}
