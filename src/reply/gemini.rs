//! Gemini `generateContent` provider

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{GenerationRequest, TextProvider, TurnRole};
use crate::config::ProviderConfig;
use crate::{Error, Result};

/// Gemini REST provider
pub struct GeminiProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    temperature: f32,
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: SecretString, config: &ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
        }
    }

    /// Build a provider when the config carries a credential
    #[must_use]
    pub fn from_config(config: &ProviderConfig) -> Option<Self> {
        config.api_key.clone().map(|key| Self::new(key, config))
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn to_wire(&self, request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: request.system_instruction.clone(),
                }],
            },
            contents: request
                .turns
                .iter()
                .map(|turn| Content {
                    role: Some(turn.role),
                    parts: vec![Part {
                        text: turn.text.clone(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>> {
        let body = self.to_wire(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        parse_response(status, &text)
    }
}

/// Map a `generateContent` response to the reply text
fn parse_response(status: StatusCode, body: &str) -> Result<Option<String>> {
    if !status.is_success() {
        return Err(Error::Provider(format!("Gemini API error: {status} - {body}")));
    }

    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| Error::Provider(format!("Failed to parse Gemini response: {e}")))?;
    Ok(parsed.text())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<TurnRole>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        (!text.is_empty()).then_some(text)
    }
}
