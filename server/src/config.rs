//! Startup configuration for the session server

use crate::errors::ConfigError;
use shared::{DEFAULT_FLAG_COUNT, DEFAULT_MIN_PLAYERS};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the acceptor binds to, e.g. `0.0.0.0:8080`
    pub bind_addr: String,
    /// Joined players needed before `startGame` is broadcast
    pub min_players: usize,
    /// Flags expected in a `flagCoordinates` message
    pub flag_count: usize,
    /// Connections beyond this are dropped on accept
    pub max_clients: usize,
    /// Stop accepting and return from `Server::run` once the last player exits
    pub exit_when_empty: bool,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_players == 0 {
            return Err(ConfigError::ZeroMinPlayers);
        }
        if self.flag_count == 0 {
            return Err(ConfigError::ZeroFlags);
        }
        if self.max_clients == 0 {
            return Err(ConfigError::ZeroMaxClients);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            min_players: DEFAULT_MIN_PLAYERS,
            flag_count: DEFAULT_FLAG_COUNT,
            max_clients: 16,
            exit_when_empty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_players, 4);
        assert_eq!(config.flag_count, 7);
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = ServerConfig {
            min_players: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroMinPlayers));

        let config = ServerConfig {
            flag_count: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFlags));

        let config = ServerConfig {
            max_clients: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxClients));
    }
}
