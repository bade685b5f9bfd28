use crate::core::bluetooth::constants::{
    MAX_ATTRIBUTE_VALUE_LEN, UUID_MESSAGE_CHAR, UUID_MESSAGE_SERVICE,
};
use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

const CONFIG_FILE_NAME: &str = "ble_config.json";

/// What `connect` does while another session is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconnectPolicy {
    /// Refuse the new connection until the caller disconnects
    Reject,
    /// Disconnect the current session, then connect the new peripheral
    ReplaceSession,
}

/// Bluetooth session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Service that carries the message characteristic
    pub service_uuid: Uuid,
    /// Characteristic messages are written to
    pub characteristic_uuid: Uuid,
    pub reconnect_policy: ReconnectPolicy,
    /// Stop discovery once a connection has been established.
    pub stop_scan_on_connect: bool,
    /// Largest encoded payload a single write may carry.
    pub max_payload_len: usize,
    /// Log level used when the crate installs its own logger.
    pub log_level: String,
}

impl Default for BleConfig {
    fn default() -> Self {
        BleConfig {
            service_uuid: UUID_MESSAGE_SERVICE,
            characteristic_uuid: UUID_MESSAGE_CHAR,
            reconnect_policy: ReconnectPolicy::ReplaceSession,
            stop_scan_on_connect: true,
            max_payload_len: MAX_ATTRIBUTE_VALUE_LEN,
            log_level: "info".to_string(),
        }
    }
}

impl BleConfig {
    /// Loads the config from `config_dir`, falling back to defaults when no file exists.
    pub async fn load_config(config_dir: &Path) -> Result<Self> {
        let file_path = config_dir.join(CONFIG_FILE_NAME);
        let file_path_str = file_path.to_string_lossy().into_owned();

        if !file_path.exists() {
            warn!(
                "BLE config file not found at {:?}, using default.",
                file_path_str
            );
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(&file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("BLE config loaded from {:?}", file_path_str);
        Ok(config)
    }

    /// Saves the config into `config_dir`, creating the directory if needed.
    pub async fn save_config(&self, config_dir: &Path) -> Result<()> {
        // create_dir_all is a no-op for an existing directory
        if let Err(e) = fs::create_dir_all(config_dir).await {
            error!("Failed to create config directory {:?}: {}", config_dir, e);
            return Err(e.into());
        }

        let file_path = config_dir.join(CONFIG_FILE_NAME);
        let file_path_str = file_path.to_string_lossy().into_owned();

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize BLE config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(&file_path, config_json).await?;

        info!("BLE config saved to {:?}.", file_path_str);
        Ok(())
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            log::LevelFilter::Info
        })
    }
}
