use crate::error::RuntimeError;
use std::env::{args, var};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tracing::debug;

/// The platform sends custom runtime requests to this port unless told otherwise.
const DEFAULT_PORT: u16 = 9000;

/// The payload of a one-off local invocation, read from a file given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalConfig {
    /// Raw file contents, any bytes
    pub payload: Vec<u8>,
    /// File name from which the payload was read, as provided in the param
    pub file_name: PathBuf,
}

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Serve the custom runtime HTTP API until killed
    Serve,
    /// Invoke the handler once with a payload from a file and exit
    Local(LocalConfig),
    /// Print usage and exit
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    /// E.g. 0.0.0.0:9000
    pub listener: SocketAddr,
    pub command: Command,
}

impl Config {
    /// Creates a new Config instance from environment variables and command line arguments.
    /// Uses default values where possible.
    pub fn from_env() -> Result<Self, RuntimeError> {
        debug!("Args: {}", args().collect::<Vec<String>>().join(" "));

        let Config { listener, command } =
            Self::from_parts(var("FC_SERVER_HOST").ok(), var("FC_SERVER_PORT").ok(), args().nth(1))?;

        // reading the file is the only part that touches the file system
        let command = match command {
            Command::Local(LocalConfig { file_name, .. }) => {
                let payload = std::fs::read(&file_name).map_err(|e| {
                    RuntimeError::Config(format!("Failed to read payload from {}: {e}", file_name.display()))
                })?;
                Command::Local(LocalConfig { payload, file_name })
            }
            command => command,
        };

        Ok(Self { listener, command })
    }

    /// Parses the raw values. The payload of a local command is left empty.
    fn from_parts(host: Option<String>, port: Option<String>, param: Option<String>) -> Result<Self, RuntimeError> {
        let ip = match host {
            Some(host) => host.parse::<IpAddr>().map_err(|e| {
                RuntimeError::Config(format!(
                    "Invalid IP address in FC_SERVER_HOST env var: {host}. Must be a valid IP, e.g. 0.0.0.0. {e}"
                ))
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|e| {
                RuntimeError::Config(format!(
                    "Invalid port number in FC_SERVER_PORT env var: {port}. Must be a valid port number, e.g. 9000. {e}"
                ))
            })?,
            None => DEFAULT_PORT,
        };

        let command = match param.as_deref() {
            None => Command::Serve,
            Some("--help") | Some("-h") => Command::Help,
            Some(file_name) => Command::Local(LocalConfig {
                payload: Vec::new(),
                file_name: PathBuf::from(file_name),
            }),
        };

        Ok(Self {
            listener: SocketAddr::new(ip, port),
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serving_on_9000() {
        let config = Config::from_parts(None, None, None).unwrap();
        assert_eq!(config.listener, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.command, Command::Serve);
    }

    #[test]
    fn env_overrides_listener() {
        let config = Config::from_parts(Some("127.0.0.1".to_owned()), Some("8080".to_owned()), None).unwrap();
        assert_eq!(config.listener, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(
            Config::from_parts(Some("localhost".to_owned()), None, None),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            Config::from_parts(None, Some("99999".to_owned()), None),
            Err(RuntimeError::Config(_))
        ));
    }

    #[test]
    fn param_selects_the_command() {
        let config = Config::from_parts(None, None, Some("--help".to_owned())).unwrap();
        assert_eq!(config.command, Command::Help);

        let config = Config::from_parts(None, None, Some("payload.json".to_owned())).unwrap();
        match config.command {
            Command::Local(local) => assert_eq!(local.file_name, PathBuf::from("payload.json")),
            other => panic!("Expected a local command, got {other:?}"),
        }
    }
}
