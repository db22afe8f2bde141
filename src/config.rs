//! Server configuration parsed from command-line arguments.

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum ConfigError {
    #[error("unknown command line flag '{0}'")]
    UnknownFlag(String),
    #[error("missing value for flag '{0}'")]
    MissingFlagValue(&'static str),
    #[error("invalid port value")]
    InvalidPort,
    #[error("invalid leader address")]
    InvalidLeaderAddress,
    #[error("invalid leader port")]
    InvalidLeaderPort,
}

/// The role a server runs in: a leader accepting writes, or a follower
/// replicating from the given leader.
#[derive(Debug, PartialEq, Clone)]
pub enum ServerRole {
    Leader,
    Follower { host: String, port: u16 },
}

#[derive(Debug, PartialEq, Clone)]
pub struct ServerConfig {
    /// TCP port the server listens on.
    pub port: u16,
    pub role: ServerRole,
    /// Directory holding the boot snapshot.
    pub dir: String,
    /// Snapshot file name inside `dir`.
    pub dbfilename: String,
    /// When set, a resolved WAIT adds its own request length to the
    /// replication offset, mirroring the behavior of the original server
    /// this implementation is compatible with.
    pub count_wait_bytes_in_offset: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6379,
            role: ServerRole::Leader,
            dir: ".".to_string(),
            dbfilename: "dump.rdb".to_string(),
            count_wait_bytes_in_offset: true,
        }
    }
}

impl ServerConfig {
    /// Parses configuration from command-line arguments.
    ///
    /// Supported flags: `--port <N>`, `--replicaof "<host> <port>"`,
    /// `--dir <path>`, `--dbfilename <name>`.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ConfigError> {
        let mut config = ServerConfig::default();
        let mut iter = args.into_iter().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    let value = iter.next().ok_or(ConfigError::MissingFlagValue("--port"))?;
                    config.port = validate_port(&value, ConfigError::InvalidPort)?;
                }
                "--replicaof" => {
                    let value = iter
                        .next()
                        .ok_or(ConfigError::MissingFlagValue("--replicaof"))?;
                    let (host, port) = validate_leader_address(&value)?;
                    config.role = ServerRole::Follower { host, port };
                }
                "--dir" => {
                    config.dir = iter.next().ok_or(ConfigError::MissingFlagValue("--dir"))?;
                }
                "--dbfilename" => {
                    config.dbfilename = iter
                        .next()
                        .ok_or(ConfigError::MissingFlagValue("--dbfilename"))?;
                }
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }

        Ok(config)
    }
}

fn validate_port(port: &str, error: ConfigError) -> Result<u16, ConfigError> {
    let port = port.parse::<u16>().map_err(|_| error.clone())?;
    if port == 0 {
        return Err(error);
    }
    Ok(port)
}

/// Validates a `"<host> <port>"` leader address. The host may be an IPv4
/// address or a hostname.
fn validate_leader_address(address: &str) -> Result<(String, u16), ConfigError> {
    let ipv4 = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap();
    let hostname = Regex::new(r"^[a-zA-Z0-9\-\.]+$").unwrap();

    let parts: Vec<&str> = address.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(ConfigError::InvalidLeaderAddress);
    }

    let host = parts[0];
    let host_is_valid = if let Some(captures) = ipv4.captures(host) {
        captures.iter().skip(1).all(|octet| {
            octet
                .map(|m| m.as_str().parse::<u16>().map(|v| v <= 255).unwrap_or(false))
                .unwrap_or(false)
        })
    } else {
        hostname.is_match(host)
    };

    if !host_is_valid {
        return Err(ConfigError::InvalidLeaderAddress);
    }

    let port = validate_port(parts[1], ConfigError::InvalidLeaderPort)?;

    Ok((host.to_string(), port))
}
