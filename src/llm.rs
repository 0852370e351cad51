//! Text-generation backends. Only Ollama is wired up today; the trait seam
//! keeps the answer pipeline ignorant of the provider.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate a completion for `prompt` under the given system framing.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for a local Ollama daemon (`/api/generate`, non-streaming).
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build LLM HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl GenerationService for OllamaClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            system,
            prompt,
            stream: false,
        };

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(err) if err.is_connect() => {
                bail!(
                    "LLM service unavailable at {} (is ollama running?): {}",
                    self.base_url,
                    err
                );
            }
            Err(err) => return Err(err).context("LLM request failed"),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("LLM returned {}: {}", status, body);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("failed to decode LLM response")?;
        Ok(parsed.response)
    }
}

/// Build the configured generation backend. `load_config` has already
/// rejected unknown providers, so this only dispatches.
pub fn create_service(config: &LlmConfig) -> Result<Box<dyn GenerationService>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaClient::new(config)?)),
        other => bail!("unsupported LLM provider '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            model: "llama3.2",
            system: "be brief",
            prompt: "hello",
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["stream"], false);
        assert!(json["system"].is_string());
    }

    #[test]
    fn test_response_decodes() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"response": "hi", "done": true}"#).unwrap();
        assert_eq!(parsed.response, "hi");
    }

    #[test]
    fn test_create_rejects_unknown_provider() {
        let mut config = LlmConfig::default();
        config.provider = "openai".to_string();
        assert!(create_service(&config).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let mut config = LlmConfig::default();
        config.base_url = "http://localhost:11434/".to_string();
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
