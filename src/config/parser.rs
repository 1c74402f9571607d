use crate::config::types::Config;
use crate::config::validation::validate;
use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so that deployments can tell which configuration a
/// running process picked up.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Applies environment overrides on top of the file configuration
///
/// `PORT` replaces the port of `server.bind`, keeping its host.
pub fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Ok(port) = std::env::var("PORT") {
        if !port.is_empty() {
            config.server.bind = override_port(&config.server.bind, &port)?;
        }
    }
    Ok(())
}

fn override_port(bind: &str, port: &str) -> ConfigResult<String> {
    let port: u16 = port
        .parse()
        .map_err(|_| ConfigError::Validation(format!("PORT must be a valid port, got '{}'", port)))?;
    let mut addr: SocketAddr = bind.parse().map_err(|_| {
        ConfigError::Validation(format!("server.bind must be a socket address, got '{}'", bind))
    })?;
    addr.set_port(port);
    Ok(addr.to_string())
}
