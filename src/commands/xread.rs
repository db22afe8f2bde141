use std::time::Duration;

use tokio::sync::mpsc;

use crate::engine::SharedEngine;
use crate::keyspace::Keyspace;
use crate::resp::RespValue;
use crate::state::StreamWatcher;
use crate::stream::{self, StreamEntryId};

use super::command_error::CommandError;
use super::handler::CommandResult;
use super::stream_reply::encode_streams;

/// Parsed arguments of `XREAD [BLOCK ms] STREAMS key... id...`.
pub struct XreadArguments {
    pub block_ms: Option<u64>,
    /// Stream keys paired with their raw start positions (`$` not yet
    /// resolved).
    pub pairs: Vec<(String, String)>,
}

impl XreadArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.is_empty() {
            return Err(CommandError::WrongArity("xread"));
        }

        let (block_ms, streams_index) = if arguments[0].eq_ignore_ascii_case("block") {
            let duration = arguments
                .get(1)
                .and_then(|value| value.parse::<u64>().ok())
                .ok_or(CommandError::TimeoutNotInteger)?;
            (Some(duration), 2)
        } else {
            (None, 0)
        };

        if !arguments
            .get(streams_index)
            .is_some_and(|word| word.eq_ignore_ascii_case("streams"))
        {
            return Err(CommandError::SyntaxError);
        }

        let tail = &arguments[streams_index + 1..];
        // Keys and start positions must pair up exactly.
        if tail.is_empty() || tail.len() % 2 != 0 {
            return Err(CommandError::UnbalancedXread);
        }

        let half = tail.len() / 2;
        let pairs = (0..half)
            .map(|i| (tail[i].clone(), tail[half + i].clone()))
            .collect();

        Ok(Self { block_ms, pairs })
    }
}

/// Handles XREAD.
///
/// Without BLOCK this evaluates once; an all-empty result is the null bulk
/// string. With BLOCK the connection parks on a wake channel until an append
/// to one of the watched streams yields entries or the deadline passes.
pub async fn xread(
    engine: &SharedEngine,
    client: &str,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    let (wake_sender, mut wake_receiver) = mpsc::channel(1);
    let keys: Vec<String> = xread_arguments
        .pairs
        .iter()
        .map(|(key, _)| key.clone())
        .collect();

    // Resolve start positions, evaluate once, and, if blocking, register
    // watchers — all under the same lock, so an append cannot slip between
    // the evaluation and the registration.
    let resolved = {
        let mut engine_guard = engine.lock().await;
        let resolved = resolve_start_positions(&engine_guard.keyspace, &xread_arguments.pairs)?;

        let streams = collect_new_entries(&engine_guard.keyspace, &resolved);
        if !streams.is_empty() {
            return Ok(CommandResult::Response(encode_streams(&streams).encode()));
        }
        if xread_arguments.block_ms.is_none() {
            return Ok(CommandResult::Response(RespValue::NullBulkString.encode()));
        }

        for key in &keys {
            engine_guard.readers.watch(
                key.clone(),
                StreamWatcher {
                    client: client.to_string(),
                    wake: wake_sender.clone(),
                },
            );
        }
        resolved
    };

    let deadline = xread_arguments
        .block_ms
        .filter(|ms| *ms > 0)
        .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

    let streams = loop {
        let woken = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, wake_receiver.recv()).await {
                    Ok(message) => message.is_some(),
                    Err(_) => false,
                }
            }
            None => wake_receiver.recv().await.is_some(),
        };

        let engine_guard = engine.lock().await;
        let streams = collect_new_entries(&engine_guard.keyspace, &resolved);
        if !streams.is_empty() {
            break streams;
        }
        if !woken {
            // Deadline passed (or the channel died) with nothing to report.
            break streams;
        }
    };

    {
        let mut engine_guard = engine.lock().await;
        engine_guard.readers.unwatch(&keys, client);
    }

    if streams.is_empty() {
        Ok(CommandResult::Response(RespValue::NullBulkString.encode()))
    } else {
        Ok(CommandResult::Response(encode_streams(&streams).encode()))
    }
}

/// Resolves each raw start position, substituting `$` with the stream's
/// current last ID (`0-0` when the stream is empty or missing).
fn resolve_start_positions(
    keyspace: &Keyspace,
    pairs: &[(String, String)],
) -> Result<Vec<(String, StreamEntryId)>, CommandError> {
    pairs
        .iter()
        .map(|(key, position)| {
            let after = if position == "$" {
                keyspace.last_entry_id(key).unwrap_or(StreamEntryId::ZERO)
            } else {
                stream::parse_read_start(position)?
            };
            Ok((key.clone(), after))
        })
        .collect()
}

/// Entries strictly after each start position; keys with nothing new are
/// omitted.
fn collect_new_entries(
    keyspace: &Keyspace,
    resolved: &[(String, StreamEntryId)],
) -> Vec<(String, Vec<crate::stream::StreamEntry>)> {
    resolved
        .iter()
        .filter_map(|(key, after)| {
            let entries = keyspace.entries_after(key, *after);
            if entries.is_empty() {
                None
            } else {
                Some((key.clone(), entries))
            }
        })
        .collect()
}
