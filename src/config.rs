//! Configuration for upstream providers, retries and the HTTP server

use std::time::Duration;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GEMINI_MODEL: &str = "text-bison-001";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_API_BASE: &str
  = "https://generativelanguage.googleapis.com/v1beta2";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Retry configuration for the chat completions path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig
{   /// Max retry attempts after the first call
    pub max_retries: usize
  , /// Backoff multiplier for retries
    pub backoff_multiplier: f32
  , /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64
}

impl Default for RetryConfig
{   fn default() -> Self
    {   RetryConfig
        {   max_retries: 2
          , backoff_multiplier: 2.0
          , initial_backoff_ms: 250
        }
    }
}

/// Provider configuration, rebuilt for every incoming request.
///
/// Missing keys are a normal state: they decide which provider
/// (if any) the gateway may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig
{   /// Prefer the Gemini text generation API
    pub use_gemini: bool
  , /// Allow the OpenAI chat completions API
    pub use_openai: bool
  , #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>
  , #[serde(skip_serializing)]
    pub openai_api_key: Option<String>
  , /// Gemini model, bare or `models/` prefixed
    pub gemini_model: String
  , /// Default chat completions model when a request names none
    pub openai_model: String
  , pub gemini_api_base: String
  , pub openai_api_base: String
  , /// Request timeout in seconds
    pub timeout_secs: u64
  , pub retry: RetryConfig
}

impl Default for ProviderConfig
{   fn default() -> Self
    {   ProviderConfig
        {   use_gemini: false
          , use_openai: true
          , gemini_api_key: None
          , openai_api_key: None
          , gemini_model: DEFAULT_GEMINI_MODEL.to_string()
          , openai_model: DEFAULT_OPENAI_MODEL.to_string()
          , gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string()
          , openai_api_base: DEFAULT_OPENAI_API_BASE.to_string()
          , timeout_secs: 30
          , retry: RetryConfig::default()
        }
    }
}

impl ProviderConfig
{   /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    /// Blank values are treated as absent.
    pub fn from_lookup<F>(lookup: F)
      -> Result<Self, crate::error::Error>
    where F: Fn(&str) -> Option<String>
    {   let get = |key: &str| {
          lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        };
        let defaults = ProviderConfig::default();

        let use_gemini = get("USE_GEMINI")
          .map(|v| v.eq_ignore_ascii_case("true"))
          .unwrap_or(defaults.use_gemini);
        let use_openai = get("USE_OPENAI")
          .map(|v| !v.eq_ignore_ascii_case("false"))
          .unwrap_or(defaults.use_openai);

        let timeout_secs = match get("CHAT_TIMEOUT_SECS")
        {   Some(raw) => parse_number("CHAT_TIMEOUT_SECS", &raw)?
          , None => defaults.timeout_secs
        };
        let mut retry = defaults.retry.clone();
        if let Some(raw) = get("CHAT_MAX_RETRIES")
        {   retry.max_retries = parse_number("CHAT_MAX_RETRIES", &raw)?;
        }

        let config = ProviderConfig
        {   use_gemini
          , use_openai
          , gemini_api_key: get("GEMINI_API_KEY")
          , openai_api_key: get("OPENAI_API_KEY")
          , gemini_model: get("GEMINI_MODEL")
              .unwrap_or(defaults.gemini_model)
          , openai_model: get("OPENAI_MODEL")
              .unwrap_or(defaults.openai_model)
          , gemini_api_base: get("GEMINI_API_BASE")
              .unwrap_or(defaults.gemini_api_base)
          , openai_api_base: get("OPENAI_API_BASE")
              .unwrap_or(defaults.openai_api_base)
          , timeout_secs
          , retry
        };
        debug!(
          "Provider config: gemini={} (key: {}), openai={} (key: {})",
          config.use_gemini,
          config.gemini_api_key.is_some(),
          config.use_openai,
          config.openai_api_key.is_some()
        );
        Ok(config)
    }

    pub fn timeout(&self) -> Duration
    {   Duration::from_secs(self.timeout_secs)
    }

    /// Pick the provider for a request.
    ///
    /// Gemini wins when enabled and keyed, then OpenAI. An enabled
    /// provider without a key is a configuration error; with both
    /// disabled the mock responder answers.
    pub fn select_provider(&self)
      -> Result<crate::Provider, crate::error::Error>
    {   if self.use_gemini && self.gemini_api_key.is_some()
        {   return Ok(crate::Provider::Gemini);
        }
        if self.use_openai && self.openai_api_key.is_some()
        {   return Ok(crate::Provider::OpenAi);
        }
        if self.use_gemini
        {   warn!("USE_GEMINI is set but GEMINI_API_KEY is missing");
            return Err(crate::error::Error::MissingApiKey(
              "gemini".to_string()
            ));
        }
        if self.use_openai
        {   warn!("USE_OPENAI is set but OPENAI_API_KEY is missing");
            return Err(crate::error::Error::MissingApiKey(
              "openai".to_string()
            ));
        }
        Ok(crate::Provider::Mock)
    }
}

fn parse_number<T: std::str::FromStr>(
  key: &str
, raw: &str
) -> Result<T, crate::error::Error>
{   raw.parse().map_err(|_| {
      crate::error::Error::InvalidConfiguration(
        format!("{} must be a non-negative integer, got {:?}", key, raw)
      )
    })
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig
{   /// Socket address to listen on
    pub bind_addr: String
}

impl Default for ServerConfig
{   fn default() -> Self
    {   ServerConfig
        {   bind_addr: DEFAULT_BIND_ADDR.to_string()
        }
    }
}

impl ServerConfig
{   pub fn from_env() -> Self
    {   ServerConfig
        {   bind_addr: std::env::var("CHAT_BIND_ADDR")
              .ok()
              .filter(|v| !v.trim().is_empty())
              .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::Provider;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)])
      -> impl Fn(&str) -> Option<String>
    {   let map: HashMap<String, String> = pairs
          .iter()
          .map(|(k, v)| (k.to_string(), v.to_string()))
          .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults()
    {   let config = ProviderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ProviderConfig::default());
        assert!(!config.use_gemini);
        assert!(config.use_openai);
    }

    #[test]
    fn flags_follow_their_own_truthiness()
    {   let config = ProviderConfig::from_lookup(lookup(&[
          ("USE_GEMINI", "TRUE")
        , ("USE_OPENAI", "no")
        ])).unwrap();
        assert!(config.use_gemini);
        // only the literal "false" disables openai
        assert!(config.use_openai);

        let config = ProviderConfig::from_lookup(lookup(&[
          ("USE_GEMINI", "yes")
        , ("USE_OPENAI", "False")
        ])).unwrap();
        assert!(!config.use_gemini);
        assert!(!config.use_openai);
    }

    #[test]
    fn blank_keys_count_as_missing()
    {   let config = ProviderConfig::from_lookup(lookup(&[
          ("OPENAI_API_KEY", "   ")
        ])).unwrap();
        assert_eq!(config.openai_api_key, None);
        assert_eq!(
          config.select_provider()
        , Err(crate::error::Error::MissingApiKey("openai".to_string()))
        );
    }

    #[test]
    fn bad_numbers_are_rejected()
    {   let result = ProviderConfig::from_lookup(lookup(&[
          ("CHAT_TIMEOUT_SECS", "soon")
        ]));
        assert!(matches!(
          result
        , Err(crate::error::Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn provider_selection_order()
    {   let both = ProviderConfig
        {   use_gemini: true
          , gemini_api_key: Some("g".into())
          , openai_api_key: Some("o".into())
          , ..ProviderConfig::default()
        };
        assert_eq!(both.select_provider(), Ok(Provider::Gemini));

        let gemini_without_key = ProviderConfig
        {   use_gemini: true
          , openai_api_key: Some("o".into())
          , ..ProviderConfig::default()
        };
        assert_eq!(gemini_without_key.select_provider(), Ok(Provider::OpenAi));

        let none_enabled = ProviderConfig
        {   use_openai: false
          , ..ProviderConfig::default()
        };
        assert_eq!(none_enabled.select_provider(), Ok(Provider::Mock));

        let gemini_only_unkeyed = ProviderConfig
        {   use_gemini: true
          , use_openai: false
          , ..ProviderConfig::default()
        };
        assert!(gemini_only_unkeyed.select_provider().is_err());
    }
}
