use crate::error::{Result, StoryforgeError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    /// Relay server that holds the model credential and forwards the payload.
    #[default]
    Proxy,
    Gemini,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: Option<&'static str>,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Proxy => ProviderConfig {
                api_url: "http://127.0.0.1:5000/generate-script",
                model: "server-default",
                env_var: None,
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent",
                model: "gemini-2.5-flash",
                env_var: Some("GEMINI_API_KEY"),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Proxy => "Proxy",
            Provider::Gemini => "Gemini",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "proxy" | "server" => Some(Provider::Proxy),
            "gemini" => Some(Provider::Gemini),
            _ => None,
        }
    }

    /// Validate that the API key is set for this provider. The proxy keeps its
    /// own credential, so it never needs one.
    pub fn validate_api_key(&self) -> Result<Option<String>> {
        let Some(env_var) = self.config().env_var else {
            return Ok(None);
        };
        match std::env::var(env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key.trim().to_string())),
            _ => Err(StoryforgeError::MissingApiKey {
                env_var: env_var.to_string(),
            }),
        }
    }
}
