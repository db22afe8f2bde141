//! WAIT: synchronous acknowledgement of propagated writes.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;

use crate::config::ServerConfig;
use crate::engine::SharedEngine;
use crate::replication::PendingWait;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Parsed arguments of `WAIT <numreplicas> <timeout_ms>`. A zero timeout
/// waits indefinitely.
pub struct WaitArguments {
    pub required_acks: usize,
    pub timeout: Option<Duration>,
}

impl WaitArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongArity("wait"));
        }

        let required_acks = arguments[0]
            .parse::<usize>()
            .map_err(|_| CommandError::ValueNotInteger)?;
        let timeout_ms = arguments[1]
            .parse::<u64>()
            .map_err(|_| CommandError::TimeoutNotInteger)?;

        Ok(Self {
            required_acks,
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
        })
    }
}

/// Handles WAIT on a leader.
///
/// With no replicas attached the answer is `:0`; before any write has been
/// propagated it is the replica count. Otherwise a pending record is
/// registered, `REPLCONF GETACK *` is broadcast, and the reply is the number
/// of replicas that acknowledged the baseline offset before quorum or
/// deadline.
pub async fn wait(
    config: &Arc<ServerConfig>,
    engine: &SharedEngine,
    raw_request: &[u8],
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;

    let (receiver, writers) = {
        let mut engine_guard = engine.lock().await;
        let Some(leader) = engine_guard.replication.as_leader_mut() else {
            return Err(CommandError::LeaderOnly("wait"));
        };

        if leader.replica_count() == 0 {
            return Ok(CommandResult::Response(RespValue::Integer(0).encode()));
        }
        if leader.repl_offset == 0 {
            return Ok(CommandResult::Response(
                RespValue::Integer(leader.replica_count() as i64).encode(),
            ));
        }

        let (notify, receiver) = oneshot::channel();
        leader.pending_wait = Some(PendingWait {
            required: wait_arguments.required_acks,
            baseline_offset: leader.repl_offset,
            acks_received: 0,
            notify: Some(notify),
        });

        (receiver, leader.replica_writers())
    };

    // Broadcast outside the engine lock; ACKs arrive on the replica
    // connections and need that lock to be counted.
    let getack = RespValue::command(&["REPLCONF", "GETACK", "*"]).encode();
    for writer in writers {
        let mut writer_guard = writer.lock().await;
        if let Err(error) = writer_guard.write_all(getack.as_bytes()).await {
            tracing::warn!(error = %error, "failed to send GETACK to replica");
        }
    }

    match wait_arguments.timeout {
        Some(timeout) => {
            let _ = tokio::time::timeout(timeout, receiver).await;
        }
        None => {
            let _ = receiver.await;
        }
    }

    let mut engine_guard = engine.lock().await;
    let Some(leader) = engine_guard.replication.as_leader_mut() else {
        return Err(CommandError::LeaderOnly("wait"));
    };
    let acks_received = leader
        .pending_wait
        .take()
        .map(|wait| wait.acks_received)
        .unwrap_or(0);

    if config.count_wait_bytes_in_offset {
        leader.repl_offset += raw_request.len() as u64;
    }

    Ok(CommandResult::Response(
        RespValue::Integer(acks_received as i64).encode(),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::ServerConfig;
    use crate::engine::Engine;
    use crate::replication::{LeaderReplication, ReplicationState};

    use super::{wait, CommandError, CommandResult, WaitArguments};

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn test_parse() {
        let parsed = WaitArguments::parse(strings(&["2", "500"])).unwrap();
        assert_eq!(parsed.required_acks, 2);
        assert_eq!(parsed.timeout, Some(Duration::from_millis(500)));

        let parsed = WaitArguments::parse(strings(&["1", "0"])).unwrap();
        assert_eq!(parsed.timeout, None);

        let test_cases = vec![
            (strings(&["1"]), CommandError::WrongArity("wait")),
            (strings(&["x", "500"]), CommandError::ValueNotInteger),
            (strings(&["1", "x"]), CommandError::TimeoutNotInteger),
        ];
        for (input, expected) in test_cases {
            assert_eq!(WaitArguments::parse(input.clone()).err(), Some(expected), "args {:?}", input);
        }
    }

    #[tokio::test]
    async fn test_wait_with_no_replicas_is_zero() {
        let config = Arc::new(ServerConfig::default());
        let engine = Engine::new(ReplicationState::Leader(LeaderReplication::new(
            "f".repeat(40),
        )))
        .into_shared();

        let result = wait(&config, &engine, b"", strings(&["1", "100"]))
            .await
            .unwrap();
        assert_eq!(result, CommandResult::Response(":0\r\n".to_string()));
    }
}
