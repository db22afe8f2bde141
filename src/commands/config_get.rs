use std::sync::Arc;

use crate::config::ServerConfig;
use crate::resp::RespValue;

use super::command_error::CommandError;
use super::handler::CommandResult;

/// Handles `CONFIG GET <name>...`: pairs of parameter name and configured
/// value.
pub fn config_get(
    config: &Arc<ServerConfig>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    if arguments.len() < 2 || !arguments[0].eq_ignore_ascii_case("GET") {
        return Err(CommandError::WrongArity("config"));
    }

    let mut pairs = Vec::new();
    for name in &arguments[1..] {
        let value = match name.to_lowercase().as_str() {
            "dir" => config.dir.clone(),
            "dbfilename" => config.dbfilename.clone(),
            unknown => return Err(CommandError::UnknownConfigParameter(unknown.to_string())),
        };
        pairs.push(RespValue::BulkString(name.to_lowercase()));
        pairs.push(RespValue::BulkString(value));
    }

    Ok(CommandResult::Response(RespValue::Array(pairs).encode()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::ServerConfig;

    use super::{config_get, CommandError, CommandResult};

    #[test]
    fn test_config_get() {
        let config = Arc::new(ServerConfig {
            dir: "/data".to_string(),
            dbfilename: "boot.rdb".to_string(),
            ..ServerConfig::default()
        });

        assert_eq!(
            config_get(&config, vec!["GET".to_string(), "dir".to_string()]).unwrap(),
            CommandResult::Response("*2\r\n$3\r\ndir\r\n$5\r\n/data\r\n".to_string())
        );
        assert_eq!(
            config_get(&config, vec!["get".to_string(), "dbfilename".to_string()]).unwrap(),
            CommandResult::Response("*2\r\n$10\r\ndbfilename\r\n$8\r\nboot.rdb\r\n".to_string())
        );
        assert_eq!(
            config_get(&config, vec!["GET".to_string(), "maxmemory".to_string()]),
            Err(CommandError::UnknownConfigParameter("maxmemory".to_string()))
        );
        assert_eq!(
            config_get(&config, vec!["SET".to_string(), "dir".to_string()]),
            Err(CommandError::WrongArity("config"))
        );
    }
}
