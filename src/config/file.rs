//! TOML configuration file loading
//!
//! Supports `~/.config/autozap/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AutoZapConfigFile {
    /// Generative-text provider settings
    #[serde(default)]
    pub provider: ProviderFileConfig,

    /// Rules appended to every persona instruction
    #[serde(default)]
    pub house_rules: HouseRulesFileConfig,

    /// Bank transfer details offered to customers
    #[serde(default)]
    pub payment: PaymentFileConfig,

    /// Cosmetic delays of the simulation
    #[serde(default)]
    pub simulation: SimulationFileConfig,

    #[serde(default)]
    pub storage: StorageFileConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProviderFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier (e.g. "gemini-3-flash-preview")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HouseRulesFileConfig {
    /// Locale whose formal register replies use (e.g. "Angolan Portuguese")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PaymentFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_holder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SimulationFileConfig {
    /// Pause before a reply is requested, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_delay_ms: Option<u64>,

    /// Simulated QR scan duration, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StorageFileConfig {
    /// Directory holding the state file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `AutoZapConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> AutoZapConfigFile {
    let Some(path) = config_file_path() else {
        return AutoZapConfigFile::default();
    };

    if !path.exists() {
        return AutoZapConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            AutoZapConfigFile::default()
        }
    }
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<AutoZapConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Serialize and write a config file, creating parent directories
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub fn write_config_file(path: &Path, config: &AutoZapConfigFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| crate::Error::Config(format!("failed to serialize config: {e}")))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Return the config file path: `~/.config/autozap/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("autozap").join("config.toml"))
}
