//! Errors surfaced by command parsing and execution, with their RESP
//! renderings.

use thiserror::Error;

use crate::keyspace::KeyspaceError;
use crate::resp::RespValue;
use crate::stream::StreamIdError;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CommandError {
    #[error("empty request")]
    EmptyRequest,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("syntax error")]
    SyntaxError,
    #[error("invalid expire time in 'set' command")]
    InvalidExpiry,
    #[error("timeout is not an integer or out of range")]
    TimeoutNotInteger,
    #[error("value is not an integer or out of range")]
    ValueNotInteger,
    #[error("Unbalanced XREAD list of streams: for each stream key an ID or '$' must be specified.")]
    UnbalancedXread,
    #[error("unknown CONFIG parameter '{0}'")]
    UnknownConfigParameter(String),
    #[error("unknown INFO section '{0}'")]
    UnknownInfoSection(String),
    #[error("invalid glob pattern: {0}")]
    InvalidGlobPattern(String),
    #[error("'{0}' can only be processed by a leader")]
    LeaderOnly(&'static str),
    #[error("write command received on a read-only replica")]
    ReadOnlyReplica,
    #[error(transparent)]
    Keyspace(#[from] KeyspaceError),
    #[error(transparent)]
    StreamId(#[from] StreamIdError),
}

impl CommandError {
    /// Renders the error as a RESP simple error frame.
    pub fn as_string(&self) -> String {
        let message = match self {
            // WRONGTYPE and READONLY carry their own error class instead of
            // the generic ERR prefix.
            CommandError::Keyspace(KeyspaceError::WrongType) => {
                KeyspaceError::WrongType.to_string()
            }
            CommandError::ReadOnlyReplica => {
                "READONLY You can't write against a read only replica.".to_string()
            }
            other => format!("ERR {}", other),
        };

        RespValue::Error(message).encode()
    }
}

#[cfg(test)]
mod tests {
    use crate::keyspace::KeyspaceError;
    use crate::stream::StreamIdError;

    use super::CommandError;

    #[test]
    fn test_as_string() {
        let test_cases = vec![
            (
                CommandError::UnknownCommand("NOPE".to_string()),
                "-ERR unknown command 'NOPE'\r\n",
            ),
            (
                CommandError::WrongArity("get"),
                "-ERR wrong number of arguments for 'get' command\r\n",
            ),
            (
                CommandError::StreamId(StreamIdError::ZeroId),
                "-ERR The ID specified in XADD must be greater than 0-0\r\n",
            ),
            (
                CommandError::Keyspace(KeyspaceError::InvalidStreamId(
                    StreamIdError::NotGreaterThanTop,
                )),
                "-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n",
            ),
            (
                CommandError::Keyspace(KeyspaceError::WrongType),
                "-WRONGTYPE Operation against a key holding the wrong kind of value\r\n",
            ),
            (
                CommandError::Keyspace(KeyspaceError::NotAnInteger),
                "-ERR value is not an integer or out of range\r\n",
            ),
            (
                CommandError::ReadOnlyReplica,
                "-READONLY You can't write against a read only replica.\r\n",
            ),
        ];

        for (error, expected) in test_cases {
            assert_eq!(error.as_string(), expected, "rendering {:?}", error);
        }
    }
}
