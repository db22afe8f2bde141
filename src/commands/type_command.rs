use crate::engine::SharedEngine;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Handles TYPE: `string`, `stream` or `none` as a simple string.
pub async fn type_command(
    engine: &SharedEngine,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("type"));
    }

    let mut engine_guard = engine.lock().await;
    let kind = engine_guard.keyspace.type_of(&arguments[0]);

    Ok(CommandResult::Response(
        RespValue::SimpleString(kind.to_string()).encode(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::replication::{LeaderReplication, ReplicationState};
    use crate::stream::RequestedId;

    use super::{type_command, CommandResult};

    #[tokio::test]
    async fn test_type_command() {
        let engine = Engine::new(ReplicationState::Leader(LeaderReplication::new(
            "f".repeat(40),
        )))
        .into_shared();
        {
            let mut engine_guard = engine.lock().await;
            engine_guard.keyspace.set("s", "v".to_string(), None);
            engine_guard
                .keyspace
                .xadd("st", RequestedId::Auto, vec![("a".to_string(), "1".to_string())])
                .unwrap();
        }

        let test_cases = vec![("s", "+string\r\n"), ("st", "+stream\r\n"), ("nope", "+none\r\n")];
        for (key, expected) in test_cases {
            assert_eq!(
                type_command(&engine, vec![key.to_string()]).await.unwrap(),
                CommandResult::Response(expected.to_string()),
                "type of {}",
                key
            );
        }
    }
}
