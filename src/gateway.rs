//! Chat gateway: picks one upstream per request and normalizes its
//! answer or failure.

use log::{debug, info, error};
use serde::Serialize;

use crate::config::ProviderConfig;
use crate::error::GatewayFailure;
use crate::providers::{mock_response, GeminiClient, OpenAiClient};
use crate::request::{ChatRequest, ConversationReply, SingleTurnReply, Usage};
use crate::Provider;

/// Success variant of a chat response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply
{   pub text: String
  , pub usage: Option<Usage>
  , /// Upstream trouble that was answered from the mock responder
    pub warning: Option<String>
  , pub provider: Provider
}

impl ChatReply
{   pub fn new(provider: Provider, text: impl Into<String>) -> Self
    {   ChatReply
        {   text: text.into()
          , usage: None
          , warning: None
          , provider
        }
    }

    /// Mock answer standing in for a failed upstream call
    pub fn degraded(user_message: &str, warning: impl Into<String>) -> Self
    {   ChatReply
        {   text: mock_response(user_message).to_string()
          , usage: None
          , warning: Some(warning.into())
          , provider: Provider::Mock
        }
    }

    pub fn into_conversation_reply(self) -> ConversationReply
    {   ConversationReply
        {   message: self.text
          , usage: self.usage
          , warning: self.warning
          , success: true
        }
    }

    pub fn into_single_turn_reply(self) -> SingleTurnReply
    {   SingleTurnReply
        {   response: self.text
          , warning: self.warning
        }
    }
}

/// Stateless gateway. Holds only the shared HTTP connection pool;
/// nothing about a conversation outlives `handle`.
#[derive(Debug, Clone)]
pub struct Gateway
{   gemini: GeminiClient
  , openai: OpenAiClient
}

impl Default for Gateway
{   fn default() -> Self
    {   Gateway::new(reqwest::Client::new())
    }
}

impl Gateway
{   pub fn new(http_client: reqwest::Client) -> Self
    {   debug!("Creating Gateway");
        Gateway
        {   gemini: GeminiClient::new(http_client.clone())
          , openai: OpenAiClient::new(http_client)
        }
    }

    /// Answer one chat request with the provider `config` selects.
    /// Missing credentials are rejected before any network call.
    pub async fn handle(
      &self
    , config: &ProviderConfig
    , request: ChatRequest
    ) -> Result<ChatReply, GatewayFailure>
    {   let provider = config.select_provider().map_err(|e| {
          error!("Provider selection failed: {}", e);
          GatewayFailure::missing_api_key().with_details(e.to_string())
        })?;
        info!(
          "Chat request: provider={}, history={}",
          provider.name(), request.history.len()
        );

        match provider
        {   Provider::Gemini => {
              let key = config.gemini_api_key.as_deref().unwrap_or_default();
              self.gemini.generate(config, key, &request).await
            }
          , Provider::OpenAi => {
              let key = config.openai_api_key.as_deref().unwrap_or_default();
              self.openai.complete(config, key, &request).await
            }
          , Provider::Mock => {
              debug!("No provider enabled, answering from mock");
              Ok(ChatReply::new(
                Provider::Mock
              , mock_response(&request.user_message)
              ))
            }
        }
    }
}
