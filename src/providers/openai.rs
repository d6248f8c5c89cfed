use serde::{Deserialize, Serialize};
use log::{debug, trace, error, warn};

use crate::classify::{classify, UpstreamFailure, Verdict, OPENAI_RULES};
use crate::error::{ErrorKind, GatewayFailure};
use crate::failover::RetryPolicy;
use crate::gateway::ChatReply;
use crate::request::{ChatRequest, Usage};
use crate::ConversationMessage;

const FALLBACK_WARNING: &str
  = "OpenAI API returned an error, using fallback response";

// ===== Message Types =====

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest
{   pub model: String
  , pub messages: Vec<ConversationMessage>
  , pub temperature: f32
  , pub max_tokens: u32
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse
{   #[serde(default)]
    pub choices: Vec<Choice>
  , #[serde(default)]
    pub usage: Option<CompletionUsage>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   #[serde(default)]
    pub message: Option<ChoiceMessage>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage
{   #[serde(default)]
    pub content: Option<String>
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CompletionUsage
{   #[serde(default)]
    pub prompt_tokens: u32
  , #[serde(default)]
    pub completion_tokens: u32
  , #[serde(default)]
    pub total_tokens: u32
}

impl From<CompletionUsage> for Usage
{   fn from(u: CompletionUsage) -> Self
    {   Usage
        {   prompt_tokens: u.prompt_tokens
          , completion_tokens: u.completion_tokens
          , total_tokens: u.total_tokens
        }
    }
}

impl ChatCompletionResponse
{   /// Text of the first choice, if it has any
    pub fn first_text(&self) -> Option<&str>
    {   self.choices
          .first()
          .and_then(|c| c.message.as_ref())
          .and_then(|m| m.content.as_deref())
          .filter(|t| !t.trim().is_empty())
    }
}

/// Preamble, then history, then the new user turn
pub fn build_messages(request: &ChatRequest) -> Vec<ConversationMessage>
{   let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ConversationMessage::system(crate::SYSTEM_PROMPT));
    messages.extend(request.history.iter().cloned());
    messages.push(ConversationMessage::user(request.user_message.clone()));
    messages
}

/// One failed call and whether it is worth repeating
struct Attempt
{   failure: UpstreamFailure
  , retryable: bool
}

// ===== OpenAI Client =====

/// Stateless chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiClient
{   http_client: reqwest::Client
}

impl OpenAiClient
{   pub fn new(http_client: reqwest::Client) -> Self
    {   debug!("Creating OpenAiClient");
        OpenAiClient { http_client }
    }

    /// Ask for one completion.
    ///
    /// Quota errors are returned as failures. Other upstream errors
    /// degrade to the mock reply with a warning attached.
    pub async fn complete(
      &self
    , config: &crate::config::ProviderConfig
    , api_key: &str
    , request: &ChatRequest
    ) -> Result<ChatReply, GatewayFailure>
    {   let endpoint = format!(
          "{}/chat/completions"
        , config.openai_api_base.trim_end_matches('/')
        );
        let endpoint = reqwest::Url::parse(&endpoint).map_err(|e| {
          error!("Bad OPENAI_API_BASE: {}", e);
          GatewayFailure::internal(format!("OPENAI_API_BASE: {}", e))
        })?;

        let body = ChatCompletionRequest
        {   model: request
              .model
              .clone()
              .unwrap_or_else(|| config.openai_model.clone())
          , messages: build_messages(request)
          , temperature: 0.7
          , max_tokens: 1000
        };
        debug!(
          "Calling chat completions: model={}, messages={}",
          body.model, body.messages.len()
        );

        match self.call(config, api_key, endpoint, &body).await
        {   Ok(completion) => {
              trace!("Completion usage: {:?}", completion.usage);
              let text = completion.first_text().ok_or_else(|| {
                error!("No content in chat completion");
                GatewayFailure::new(
                  ErrorKind::EmptyCompletion
                , "No response generated from AI"
                )
              })?;
              let mut reply = ChatReply::new(
                crate::Provider::OpenAi
              , text.to_string()
              );
              reply.usage = completion.usage.map(Usage::from);
              Ok(reply)
            }
          , Err(failure) => match classify(&OPENAI_RULES, &failure)
            {   Verdict::QuotaExhausted => {
                  error!("OpenAI quota exceeded: {}", failure.message);
                  let out = GatewayFailure::new(
                    ErrorKind::InsufficientQuota
                  , "OpenAI quota exceeded. Please check your OpenAI \
                     billing and plan at \
                     https://platform.openai.com/account/usage or set \
                     USE_OPENAI=false to use mock responses."
                  );
                  Err(if failure.message.is_empty()
                  {   out
                  } else
                  {   out.with_details(failure.message)
                  })
                }
              , Verdict::ModelNotFound | Verdict::Other => {
                  warn!(
                    "OpenAI failed, answering from mock: {:?}",
                    failure
                  );
                  let warning = if failure.message.is_empty()
                  {   FALLBACK_WARNING.to_string()
                  } else
                  {   failure.message
                  };
                  Ok(ChatReply::degraded(&request.user_message, warning))
                }
            }
        }
    }

    /// Call with bounded retries for transport errors and 5xx
    async fn call(
      &self
    , config: &crate::config::ProviderConfig
    , api_key: &str
    , endpoint: reqwest::Url
    , body: &ChatCompletionRequest
    ) -> Result<ChatCompletionResponse, UpstreamFailure>
    {   let policy = RetryPolicy::from(&config.retry);
        let mut attempt = 0;
        loop
        { match self.call_once(config, api_key, endpoint.clone(), body).await
          {   Ok(completion) => return Ok(completion)
            , Err(a) if a.retryable && policy.should_retry(attempt) => {
                let backoff = policy.backoff_for_attempt(attempt);
                warn!(
                  "Chat completion attempt {} failed ({}), retrying in {:?}",
                  attempt + 1, a.failure.message, backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
              }
            , Err(a) => return Err(a.failure)
          }
        }
    }

    async fn call_once(
      &self
    , config: &crate::config::ProviderConfig
    , api_key: &str
    , endpoint: reqwest::Url
    , body: &ChatCompletionRequest
    ) -> Result<ChatCompletionResponse, Attempt>
    {   let response = self.http_client
          .post(endpoint)
          .timeout(config.timeout())
          .header("Authorization", format!("Bearer {}", api_key))
          .json(body)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            Attempt
            {   failure: UpstreamFailure::transport(e.to_string())
              , retryable: true
            }
          })?;

        let status = response.status();
        trace!("Chat completions response status: {}", status);

        if !status.is_success()
        {   let error_body: Option<serde_json::Value>
              = response.json().await.ok();
            error!("OpenAI API error: {:?}", error_body);
            return Err(Attempt
            {   failure: UpstreamFailure::from_body(
                  Some(status.as_u16())
                , error_body.as_ref()
                )
              , retryable: status.is_server_error()
            });
        }

        response.json().await.map_err(|e| {
          error!("Parse error: {}", e);
          Attempt
          {   failure: UpstreamFailure::transport(
                format!("unreadable completion: {}", e)
              )
            , retryable: false
          }
        })
    }
}
