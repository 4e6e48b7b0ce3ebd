//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration, resolving secrets without printing them.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let sync_config = config.to_sync_config().map_err(ClientError::Config)?;
    sync_config.transformer()?;

    config
        .access_token()
        .map_err(|e| ClientError::Config(format!("invalid calendar credentials: {}", e)))?;
    config.geocoding_api_key().map_err(ClientError::Config)?;

    println!(
        "Configuration is valid (calendar {}, zone {}).",
        sync_config.calendar_id, sync_config.timezone
    );
    Ok(())
}

/// Show the configuration and store paths.
pub fn path(config: &ClientConfig) -> ClientResult<()> {
    println!("config: {}", ClientConfig::default_path().display());
    println!("store:  {}", config.store_path().display());
    Ok(())
}
