use jiff::Timestamp;

use crate::engine::SharedEngine;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Parsed arguments of `SET key value [PX ms | EX s]`.
pub struct SetArguments {
    pub key: String,
    pub value: String,
    pub expire_after_ms: Option<u64>,
}

impl SetArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::WrongArity("set"));
        }

        let expire_after_ms = if arguments.len() == 4 {
            let amount = arguments[3]
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidExpiry)?;

            match arguments[2].to_uppercase().as_str() {
                "PX" => Some(amount),
                "EX" => Some(amount.saturating_mul(1000)),
                _ => return Err(CommandError::SyntaxError),
            }
        } else {
            None
        };

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            expire_after_ms,
        })
    }
}

/// Handles SET: upserts a string value, optionally with a relative expiry
/// converted to an absolute wall-clock instant at execution time.
pub async fn set(engine: &SharedEngine, arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let expiration = match set_arguments.expire_after_ms {
        Some(ms) => Some(expiry_from_now(ms)?),
        None => None,
    };

    let mut engine_guard = engine.lock().await;
    engine_guard
        .keyspace
        .set(&set_arguments.key, set_arguments.value, expiration);

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}

fn expiry_from_now(after_ms: u64) -> Result<Timestamp, CommandError> {
    let now_ms = Timestamp::now().as_millisecond();
    let at_ms = now_ms.saturating_add(i64::try_from(after_ms).unwrap_or(i64::MAX));
    Timestamp::from_millisecond(at_ms).map_err(|_| CommandError::InvalidExpiry)
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::replication::{LeaderReplication, ReplicationState};

    use super::{set, CommandError, CommandResult, SetArguments};

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn test_parse() {
        let parsed = SetArguments::parse(strings(&["k", "v"])).unwrap();
        assert_eq!(parsed.key, "k");
        assert_eq!(parsed.value, "v");
        assert_eq!(parsed.expire_after_ms, None);

        let parsed = SetArguments::parse(strings(&["k", "v", "px", "100"])).unwrap();
        assert_eq!(parsed.expire_after_ms, Some(100));

        let parsed = SetArguments::parse(strings(&["k", "v", "EX", "2"])).unwrap();
        assert_eq!(parsed.expire_after_ms, Some(2000));

        let test_cases = vec![
            (strings(&["k"]), CommandError::WrongArity("set")),
            (strings(&["k", "v", "px"]), CommandError::WrongArity("set")),
            (strings(&["k", "v", "nx", "1"]), CommandError::SyntaxError),
            (strings(&["k", "v", "px", "x"]), CommandError::InvalidExpiry),
        ];
        for (input, expected) in test_cases {
            assert_eq!(SetArguments::parse(input.clone()).err(), Some(expected), "args {:?}", input);
        }
    }

    #[tokio::test]
    async fn test_set_stores_value() {
        let engine = Engine::new(ReplicationState::Leader(LeaderReplication::new(
            "f".repeat(40),
        )))
        .into_shared();

        let result = set(&engine, strings(&["foo", "bar"])).await.unwrap();
        assert_eq!(result, CommandResult::Response("+OK\r\n".to_string()));

        let mut engine_guard = engine.lock().await;
        assert_eq!(engine_guard.keyspace.get("foo"), Some("bar".to_string()));
    }
}
