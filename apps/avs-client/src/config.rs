//! Client configuration.
//!
//! Loaded from the same `config.dict` JSON shape the original device used
//! (`Client_ID`, `Client_Secret`, `ProductID`, `refresh_token`), with
//! environment variable overrides for the fields worth overriding without
//! editing the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use avs_core::auth::RefreshCredentials;
use serde::{Deserialize, Serialize};

/// On-disk client configuration.
///
/// Field names match the original device's `config.dict` JSON exactly so an
/// existing authorized config file can be reused without conversion.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(rename = "Client_ID")]
    pub client_id: String,

    #[serde(rename = "Client_Secret")]
    pub client_secret: String,

    #[serde(rename = "ProductID")]
    pub product_id: String,

    #[serde(default)]
    pub refresh_token: String,

    /// Path to an MP3 file played (looped) for alerts. Not part of the
    /// original `config.dict` shape; a supplemented field since alert tones
    /// have to come from somewhere on disk.
    #[serde(default)]
    pub alert_tone_path: Option<PathBuf>,

    /// Wake word passed to the microphone collaborator. Cosmetic: the bundled
    /// `Microphone` implementation doesn't match it against audio content,
    /// it only logs it (see `avs-client`'s `microphone.rs`).
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
}

fn default_wake_word() -> String {
    "alexa".to_string()
}

impl ClientConfig {
    /// Loads configuration from a JSON file, then applies environment
    /// overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AVS_CLIENT_ID") {
            self.client_id = val;
        }
        if let Ok(val) = std::env::var("AVS_CLIENT_SECRET") {
            self.client_secret = val;
        }
        if let Ok(val) = std::env::var("AVS_PRODUCT_ID") {
            self.product_id = val;
        }
        if let Ok(val) = std::env::var("AVS_REFRESH_TOKEN") {
            self.refresh_token = val;
        }
    }

    /// Writes the configuration back to `path`, preserving the same JSON
    /// shape it was loaded from. Used after an authorization flow updates
    /// `refresh_token`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// `true` if this config has no refresh token yet, meaning the device
    /// hasn't completed the authorization flow. Lets the daemon fail fast
    /// with a clear message instead of silently trying to refresh with an
    /// empty token and getting a confusing 400 from the token endpoint.
    #[must_use]
    pub fn needs_authorization(&self) -> bool {
        self.refresh_token.trim().is_empty()
    }

    #[must_use]
    pub fn to_credentials(&self) -> RefreshCredentials {
        RefreshCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_original_config_dict_shape() {
        let json = r#"{
            "Client_ID": "amzn1.application-oa2-client.example",
            "Client_Secret": "supersecret",
            "ProductID": "my_avs_client",
            "refresh_token": "Atzr|example"
        }"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.client_id, "amzn1.application-oa2-client.example");
        assert_eq!(config.client_secret, "supersecret");
        assert_eq!(config.product_id, "my_avs_client");
        assert_eq!(config.refresh_token, "Atzr|example");
        assert!(!config.needs_authorization());
    }

    #[test]
    fn missing_refresh_token_needs_authorization() {
        let json = r#"{
            "Client_ID": "id",
            "Client_Secret": "secret",
            "ProductID": "product"
        }"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert!(config.needs_authorization());
    }

    #[test]
    fn blank_refresh_token_needs_authorization() {
        let mut config = ClientConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            product_id: "product".into(),
            ..Default::default()
        };
        config.refresh_token = "   ".into();
        assert!(config.needs_authorization());
    }
}
