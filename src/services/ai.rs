use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI service is not configured")]
    NotConfigured,

    #[error("AI request failed: {0}")]
    Upstream(String),
}

/// Result of asking the model for JSON-only output. Every call site picks
/// its own fallback for `ParseFailure` (or escalates it) — there is no
/// implicit swallow.
#[derive(Debug)]
pub enum AiJson<T> {
    Parsed(T),
    ParseFailure(String),
}

/// Stateless adapter over the Anthropic Messages API. Cheap to clone; the
/// inner reqwest client is shared.
#[derive(Clone)]
pub struct AiGateway {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AiGateway {
    pub fn new(config: &crate::config::Config) -> Self {
        // 30-second timeout so a hanging upstream call cannot hold a
        // request open indefinitely.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: config.claude_api_key.clone(),
            model: config.claude_model.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, AiError> {
        if !self.is_configured() {
            return Err(AiError::NotConfigured);
        }

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 1024,
                "messages": [{
                    "role": "user",
                    "content": prompt
                }]
            }))
            .send()
            .await
            .map_err(|e| AiError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Upstream(format!(
                "Claude API error {}: {}",
                status, body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AiError::Upstream(e.to_string()))?;

        let text = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| AiError::Upstream("response has no text content".into()))?;

        Ok(text.trim().to_string())
    }
}

/// Parse a JSON-only model reply, tolerating a Markdown code fence around
/// the payload.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> AiJson<T> {
    let stripped = strip_code_fences(raw);
    match serde_json::from_str(stripped) {
        Ok(value) => AiJson::Parsed(value),
        Err(_) => AiJson::ParseFailure(raw.to_string()),
    }
}

/// Models asked for JSON frequently wrap it in ``` or ```json fences.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line if present ("json\n{...")
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
