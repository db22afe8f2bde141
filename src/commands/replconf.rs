//! REPLCONF handling on both sides of a replication link.
//!
//! On a leader, `listening-port` and `capa` from a connecting replica are
//! acknowledged with `+OK`, and `ACK <n>` feeds the replica's offset into
//! any pending WAIT without producing a reply. On a follower, the master's
//! `GETACK *` is answered on the master socket by [`getack_reply`].

use crate::engine::SharedEngine;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

pub async fn replconf(
    engine: &SharedEngine,
    peer: &str,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let Some(subcommand) = arguments.first() else {
        return Err(CommandError::WrongArity("replconf"));
    };

    match subcommand.to_lowercase().as_str() {
        "ack" => {
            let acked = arguments
                .get(1)
                .and_then(|value| value.parse::<u64>().ok())
                .ok_or(CommandError::ValueNotInteger)?;

            let mut engine_guard = engine.lock().await;
            if let Some(leader) = engine_guard.replication.as_leader_mut() {
                leader.acknowledge(peer, acked);
            }

            // ACK is never acknowledged back.
            Ok(CommandResult::NoResponse)
        }
        _ => Ok(CommandResult::Response(
            RespValue::SimpleString("OK".to_string()).encode(),
        )),
    }
}

/// Builds the `REPLCONF ACK <offset>` frame a follower sends in answer to
/// `REPLCONF GETACK *`, or `None` for any other REPLCONF subcommand.
pub async fn getack_reply(engine: &SharedEngine, arguments: &[String]) -> Option<String> {
    let is_getack = arguments
        .first()
        .is_some_and(|subcommand| subcommand.eq_ignore_ascii_case("getack"));
    if !is_getack {
        return None;
    }

    let engine_guard = engine.lock().await;
    let offset = engine_guard.replication.offset().to_string();

    Some(
        RespValue::Array(vec![
            RespValue::BulkString("REPLCONF".to_string()),
            RespValue::BulkString("ACK".to_string()),
            RespValue::BulkString(offset),
        ])
        .encode(),
    )
}
