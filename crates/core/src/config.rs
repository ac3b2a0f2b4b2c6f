use std::{str::FromStr, time::Duration};

use crate::{
    error::{Result, StoryforgeError},
    provider::Provider,
};

/// Settings for one generation session.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub provider: Provider,
    /// Overrides the provider's default URL when set.
    pub endpoint: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub credit_cost: u64,
    pub request_timeout: Duration,
    pub initial_credits: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            endpoint: None,
            temperature: 0.8,
            max_output_tokens: 8192,
            credit_cost: 10,
            request_timeout: Duration::from_secs(120),
            initial_credits: 100,
        }
    }
}

impl GeneratorConfig {
    /// Load `.env` if present, then read `STORYFORGE_*` variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("STORYFORGE_PROVIDER") {
            config.provider = Provider::parse(&raw).ok_or_else(|| {
                StoryforgeError::configuration(format!("unknown provider `{raw}`"))
            })?;
        }
        config.endpoint = lookup("STORYFORGE_SERVER_URL").filter(|url| !url.trim().is_empty());

        if let Some(v) = parse_var(&lookup, "STORYFORGE_TEMPERATURE")? {
            config.temperature = v;
        }
        if let Some(v) = parse_var(&lookup, "STORYFORGE_MAX_OUTPUT_TOKENS")? {
            config.max_output_tokens = v;
        }
        if let Some(v) = parse_var(&lookup, "STORYFORGE_CREDIT_COST")? {
            config.credit_cost = v;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "STORYFORGE_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = parse_var(&lookup, "STORYFORGE_INITIAL_CREDITS")? {
            config.initial_credits = v;
        }

        Ok(config)
    }

    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.provider.config().api_url.to_string())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| StoryforgeError::configuration(format!("{key} has invalid value `{raw}`")))
}
