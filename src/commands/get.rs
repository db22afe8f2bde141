use crate::engine::SharedEngine;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Handles GET: the stored string as a bulk reply, or the null bulk string
/// for missing, expired and stream keys.
pub async fn get(engine: &SharedEngine, arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("get"));
    }

    let mut engine_guard = engine.lock().await;
    let reply = match engine_guard.keyspace.get(&arguments[0]) {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    };

    Ok(CommandResult::Response(reply.encode()))
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::replication::{LeaderReplication, ReplicationState};

    use super::{get, CommandResult};

    #[tokio::test]
    async fn test_get() {
        let engine = Engine::new(ReplicationState::Leader(LeaderReplication::new(
            "f".repeat(40),
        )))
        .into_shared();
        engine
            .lock()
            .await
            .keyspace
            .set("foo", "bar".to_string(), None);

        assert_eq!(
            get(&engine, vec!["foo".to_string()]).await.unwrap(),
            CommandResult::Response("$3\r\nbar\r\n".to_string())
        );
        assert_eq!(
            get(&engine, vec!["missing".to_string()]).await.unwrap(),
            CommandResult::Response("$-1\r\n".to_string())
        );
    }
}
