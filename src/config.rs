//! Configuration management for the AutoZap console

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::prompt::{DEFAULT_LOCALE, PaymentDetails};
use crate::{Error, Result};
use file::AutoZapConfigFile;

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Default Gemini REST base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_REPLY_DELAY_MS: u64 = 2_000;
const DEFAULT_LINK_DELAY_MS: u64 = 3_000;

/// Console configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the state file
    pub data_dir: PathBuf,

    pub provider: ProviderConfig,

    /// Locale whose formal register generated replies use
    pub locale: String,

    /// Payment details used when the persisted settings carry none
    pub payment: PaymentDetails,

    pub simulation: SimulationConfig,
}

/// Generative-text provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// From `GEMINI_API_KEY` / `API_KEY` env or the config file
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Cosmetic delays of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Pause before a reply is requested ("typing" time)
    pub reply_delay: Duration,
    /// Simulated QR scan duration
    pub link_delay: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            reply_delay: Duration::from_millis(DEFAULT_REPLY_DELAY_MS),
            link_delay: Duration::from_millis(DEFAULT_LINK_DELAY_MS),
        }
    }
}

impl SimulationConfig {
    /// No delays (tests and scripted runs)
    #[must_use]
    pub const fn instant() -> Self {
        Self {
            reply_delay: Duration::ZERO,
            link_delay: Duration::ZERO,
        }
    }
}

/// Default data directory: `~/.local/share/autozap/` on Linux
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/autozap"),
        |d| d.data_dir().join("autozap"),
    )
}

impl Config {
    /// Load configuration from env, the config file and defaults
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is out of range
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let fc = file::load_config_file();
        let mut config = Self::resolve(fc, |key| std::env::var(key).ok())?;
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        Ok(config)
    }

    /// Merge a parsed config file with an environment lookup (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the model is blank or the temperature is outside `0.0..=2.0`
    pub fn resolve<F>(fc: AutoZapConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = env("GEMINI_API_KEY")
            .or_else(|| env("API_KEY"))
            .or(fc.provider.api_key)
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let model = env("AUTOZAP_MODEL")
            .or(fc.provider.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(Error::Config("provider model must not be empty".to_string()));
        }

        let temperature = fc.provider.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::Config(format!(
                "temperature {temperature} outside 0.0..=2.0"
            )));
        }

        let provider = ProviderConfig {
            api_key,
            model,
            base_url: fc
                .provider
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            temperature,
        };

        let data_dir = env("AUTOZAP_DATA_DIR")
            .or(fc.storage.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        let payment = PaymentDetails {
            bank_name: fc.payment.bank_name.unwrap_or_default(),
            account_holder: fc.payment.account_holder.unwrap_or_default(),
            iban: fc.payment.iban.unwrap_or_default(),
        };

        let simulation = SimulationConfig {
            reply_delay: fc
                .simulation
                .reply_delay_ms
                .map_or(SimulationConfig::default().reply_delay, Duration::from_millis),
            link_delay: fc
                .simulation
                .link_delay_ms
                .map_or(SimulationConfig::default().link_delay, Duration::from_millis),
        };

        Ok(Self {
            data_dir,
            provider,
            locale: fc
                .house_rules
                .locale
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            payment,
            simulation,
        })
    }

    /// Path of the persisted console state
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::file::{PaymentFileConfig, ProviderFileConfig, SimulationFileConfig};
    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(AutoZapConfigFile::default(), env_from(&[])).unwrap();
        assert!(config.provider.api_key.is_none());
        assert_eq!(config.provider.model, DEFAULT_MODEL);
        assert_eq!(config.locale, DEFAULT_LOCALE);
        assert_eq!(config.simulation, SimulationConfig::default());
        assert!(!config.payment.is_configured());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = AutoZapConfigFile {
            provider: ProviderFileConfig {
                api_key: Some("from-file".to_string()),
                model: Some("file-model".to_string()),
                ..ProviderFileConfig::default()
            },
            ..AutoZapConfigFile::default()
        };
        let config = Config::resolve(
            fc,
            env_from(&[("API_KEY", "from-env"), ("AUTOZAP_MODEL", "env-model")]),
        )
        .unwrap();

        assert_eq!(
            config.provider.api_key.as_ref().map(|k| k.expose_secret()),
            Some("from-env")
        );
        assert_eq!(config.provider.model, "env-model");
    }

    #[test]
    fn test_gemini_key_preferred_and_blank_ignored() {
        let config = Config::resolve(
            AutoZapConfigFile::default(),
            env_from(&[("GEMINI_API_KEY", "g"), ("API_KEY", "a")]),
        )
        .unwrap();
        assert_eq!(
            config.provider.api_key.as_ref().map(|k| k.expose_secret()),
            Some("g")
        );

        let blank = Config::resolve(AutoZapConfigFile::default(), env_from(&[("API_KEY", "  ")]))
            .unwrap();
        assert!(blank.provider.api_key.is_none());
    }

    #[test]
    fn test_file_values_applied() {
        let fc = AutoZapConfigFile {
            payment: PaymentFileConfig {
                bank_name: Some("BAI".to_string()),
                account_holder: Some("AO Express".to_string()),
                iban: Some("AO06 0000".to_string()),
            },
            simulation: SimulationFileConfig {
                reply_delay_ms: Some(10),
                link_delay_ms: None,
            },
            ..AutoZapConfigFile::default()
        };
        let config = Config::resolve(fc, env_from(&[("AUTOZAP_DATA_DIR", "/tmp/az")])).unwrap();

        assert!(config.payment.is_configured());
        assert_eq!(config.simulation.reply_delay, Duration::from_millis(10));
        assert_eq!(config.simulation.link_delay, SimulationConfig::default().link_delay);
        assert_eq!(config.state_path(), PathBuf::from("/tmp/az/state.json"));
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        let fc = AutoZapConfigFile {
            provider: ProviderFileConfig {
                temperature: Some(3.5),
                ..ProviderFileConfig::default()
            },
            ..AutoZapConfigFile::default()
        };
        assert!(matches!(
            Config::resolve(fc, env_from(&[])),
            Err(Error::Config(_))
        ));
    }
}
