//! System instruction builder
//!
//! Wraps a persona's free-text instruction in the fixed house rules every
//! generated reply must follow.

use serde::{Deserialize, Serialize};

/// Default locale whose formal register replies must use
pub const DEFAULT_LOCALE: &str = "Angolan Portuguese";

/// Banking details a persona may share with customers
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub bank_name: String,
    pub account_holder: String,
    pub iban: String,
}

impl PaymentDetails {
    /// All three fields are filled in
    #[must_use]
    pub fn is_configured(&self) -> bool {
        ![&self.bank_name, &self.account_holder, &self.iban]
            .iter()
            .any(|f| f.trim().is_empty())
    }
}

/// Rules appended to every persona instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseRules {
    pub locale: String,
    /// Included only when configured
    pub payment: Option<PaymentDetails>,
}

impl Default for HouseRules {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            payment: None,
        }
    }
}

impl HouseRules {
    /// Same rules with payment details attached when they are complete
    #[must_use]
    pub fn with_payment(mut self, payment: &PaymentDetails) -> Self {
        self.payment = payment.is_configured().then(|| payment.clone());
        self
    }
}

/// Build the provider-facing system instruction for a persona
#[must_use]
pub fn build_system_instruction(instruction: &str, rules: &HouseRules) -> String {
    let mut prompt = format!(
        "You are a highly efficient virtual assistant operating over WhatsApp.\n\
         Your personality follows this instruction: \"{}\".\n\
         Guidelines:\n\
         1. Write clear, professional {} using its formal register.\n\
         2. Be extremely concise; replies are read on a phone.\n\
         3. Never say you are an artificial intelligence unless it is relevant to the service.\n\
         4. When the context allows, be warm in keeping with the local culture.",
        instruction.trim(),
        rules.locale,
    );

    if let Some(payment) = &rules.payment {
        prompt.push_str(&format!(
            "\n5. When the customer asks how to pay, share these bank transfer details exactly:\n\
             Bank: {}\nAccount holder: {}\nIBAN: {}",
            payment.bank_name.trim(),
            payment.account_holder.trim(),
            payment.iban.trim(),
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> PaymentDetails {
        PaymentDetails {
            bank_name: "BAI".to_string(),
            account_holder: "AO Express Lda".to_string(),
            iban: "AO06 0040 0000 1234 5678 1012 3".to_string(),
        }
    }

    #[test]
    fn test_instruction_is_embedded() {
        let prompt = build_system_instruction("Be concise", &HouseRules::default());
        assert!(prompt.contains("\"Be concise\""));
        assert!(prompt.contains(DEFAULT_LOCALE));
        assert!(prompt.contains("artificial intelligence"));
        assert!(!prompt.contains("IBAN"));
    }

    #[test]
    fn test_payment_details_appended_when_configured() {
        let rules = HouseRules::default().with_payment(&payment());
        let prompt = build_system_instruction("Sell", &rules);
        assert!(prompt.contains("Bank: BAI"));
        assert!(prompt.contains("IBAN: AO06"));
    }

    #[test]
    fn test_partial_payment_details_ignored() {
        let mut partial = payment();
        partial.iban = "  ".to_string();
        assert!(!partial.is_configured());

        let rules = HouseRules::default().with_payment(&partial);
        assert!(rules.payment.is_none());
    }

    #[test]
    fn test_custom_locale() {
        let rules = HouseRules {
            locale: "European Portuguese".to_string(),
            payment: None,
        };
        assert!(build_system_instruction("x", &rules).contains("European Portuguese"));
    }
}
