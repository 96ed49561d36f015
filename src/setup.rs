//! Interactive first-run setup wizard (`autozap setup`)

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Password};

use crate::config::file::{
    AutoZapConfigFile, HouseRulesFileConfig, PaymentFileConfig, ProviderFileConfig,
    SimulationFileConfig, config_file_path, load_config_file, write_config_file,
};
use crate::config::{DEFAULT_MODEL, SimulationConfig};
use crate::prompt::DEFAULT_LOCALE;

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("AutoZap Setup\n");

    let existing = load_config_file();
    let config_path = config_file_path()
        .unwrap_or_else(|| PathBuf::from("~/.config/autozap/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. Gemini API key
    let existing_key = existing.provider.api_key.as_deref();
    let prompt = existing_key.map_or_else(
        || "Gemini API key (GEMINI_API_KEY)".to_string(),
        |k| format!("Gemini API key (current: {}, leave blank to keep)", mask(k)),
    );
    let api_key_input = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;
    let api_key = if api_key_input.trim().is_empty() {
        existing_key.map(str::to_string)
    } else {
        Some(api_key_input)
    };

    // 2. Model
    let model: String = Input::new()
        .with_prompt("Gemini model")
        .default(
            existing
                .provider
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )
        .interact_text()?;

    // 3. Locale
    let locale: String = Input::new()
        .with_prompt("Reply locale")
        .default(
            existing
                .house_rules
                .locale
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        )
        .interact_text()?;

    // 4. Payment details (optional)
    let has_payment = existing.payment.bank_name.is_some();
    let payment = if Confirm::new()
        .with_prompt("Configure bank transfer details?")
        .default(has_payment)
        .interact()?
    {
        PaymentFileConfig {
            bank_name: Some(ask("Bank name", existing.payment.bank_name.as_deref())?),
            account_holder: Some(ask(
                "Account holder",
                existing.payment.account_holder.as_deref(),
            )?),
            iban: Some(ask("IBAN", existing.payment.iban.as_deref())?),
        }
    } else {
        PaymentFileConfig::default()
    };

    // 5. Simulation delays
    let defaults = SimulationConfig::default();
    let reply_delay_ms: u64 = Input::new()
        .with_prompt("Reply delay (ms)")
        .default(
            existing
                .simulation
                .reply_delay_ms
                .unwrap_or_else(|| millis(defaults.reply_delay)),
        )
        .interact_text()?;
    let link_delay_ms: u64 = Input::new()
        .with_prompt("Link delay (ms)")
        .default(
            existing
                .simulation
                .link_delay_ms
                .unwrap_or_else(|| millis(defaults.link_delay)),
        )
        .interact_text()?;

    let config_file = AutoZapConfigFile {
        provider: ProviderFileConfig {
            api_key,
            model: Some(model),
            base_url: existing.provider.base_url,
            temperature: existing.provider.temperature,
        },
        house_rules: HouseRulesFileConfig {
            locale: Some(locale),
        },
        payment,
        simulation: SimulationFileConfig {
            reply_delay_ms: Some(reply_delay_ms),
            link_delay_ms: Some(link_delay_ms),
        },
        storage: existing.storage,
    };

    write_config_file(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `autozap` to open the console.");

    Ok(())
}

fn ask(prompt: &str, current: Option<&str>) -> anyhow::Result<String> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(value) = current {
        input = input.default(value.to_string());
    }
    Ok(input.interact_text()?)
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Show the first and last four characters of a key
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
