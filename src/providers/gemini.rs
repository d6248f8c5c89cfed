use serde::Serialize;
use serde_json::Value;
use log::{debug, trace, error, warn};

use crate::classify::{classify, UpstreamFailure, Verdict, GEMINI_RULES};
use crate::error::{ErrorKind, GatewayFailure};
use crate::failover::CandidateSequence;
use crate::gateway::ChatReply;
use crate::request::ChatRequest;

const NO_TEXT: &str = "Gemini returned no text";
const UNKNOWN_MODEL: &str
  = "Requested Gemini model not found or inaccessible.";

// ===== Message Types =====

#[derive(Debug, Clone, Serialize)]
pub struct PromptText
{   pub text: String
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTextRequest
{   pub prompt: PromptText
  , pub temperature: f32
  , pub max_output_tokens: u32
}

/// Flatten a conversation into one prompt: preamble, each prior
/// turn as `Role: content`, then the new user turn.
pub fn build_prompt(request: &ChatRequest) -> String
{   let mut parts = Vec::with_capacity(request.history.len() + 2);
    parts.push(crate::SYSTEM_PROMPT.to_string());
    for turn in &request.history
    {   parts.push(format!("{}: {}", turn.role.label(), turn.content));
    }
    parts.push(format!(
      "{}: {}"
    , crate::Role::User.label()
    , request.user_message
    ));
    parts.join("\n\n")
}

/// Pull reply text out of the shapes the API has returned over time
pub fn extract_text(body: &Value) -> Option<String>
{   [ "/candidates/0/content"
    , "/candidates/0/content/parts/0/text"
    , "/candidates/0/output/0/content"
    , "/output/0/content"
    ]
      .iter()
      .filter_map(|p| body.pointer(p).and_then(Value::as_str))
      .find(|t| !t.trim().is_empty())
      .map(str::to_string)
}

/// `{base}/models/{candidate}:generateText?key=...`, the candidate
/// sent as one percent-encoded segment.
pub fn candidate_url(
  base: &str
, candidate: &str
, api_key: &str
) -> Result<reqwest::Url, crate::error::Error>
{   let mut url = reqwest::Url::parse(base).map_err(|e| {
      crate::error::Error::InvalidConfiguration(
        format!("GEMINI_API_BASE {:?}: {}", base, e)
      )
    })?;
    {   let mut segments = url.path_segments_mut().map_err(|_| {
          crate::error::Error::InvalidConfiguration(
            format!("GEMINI_API_BASE {:?} cannot take a path", base)
          )
        })?;
        segments
          .pop_if_empty()
          .push("models")
          .push(&format!("{}:generateText", candidate));
    }
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

/// Why a single candidate did not produce a reply
#[derive(Debug)]
enum CandidateError
{   /// Remember and move on to the next spelling
    Skip(String)
  , /// Stop trying candidates
    Stop(GatewayFailure)
}

fn quota_failure(failure: &UpstreamFailure) -> GatewayFailure
{   let out = GatewayFailure::new(
      ErrorKind::InsufficientQuota
    , "Gemini (Google) quota exceeded. Please check your Google Cloud \
       billing and quotas or set USE_GEMINI=false to use a different \
       provider or mock responses."
    );
    if failure.message.is_empty()
    {   out
    } else
    {   out.with_details(failure.message.clone())
    }
}

fn not_found_failure(
  candidates: &CandidateSequence
, last_error: Option<&str>
) -> GatewayFailure
{   GatewayFailure::new(
      ErrorKind::ModelNotFound
    , format!(
        "Gemini model not found or inaccessible. Tried model variants: {}.\n\
         Error: {}\n\
         Ensure the Generative Language API is enabled and your API key \
         has access to the requested model (and billing is enabled)."
      , candidates.describe()
      , last_error.unwrap_or(UNKNOWN_MODEL)
      )
    )
}

// ===== Gemini Client =====

/// Stateless Gemini text generation client
#[derive(Debug, Clone)]
pub struct GeminiClient
{   http_client: reqwest::Client
}

impl GeminiClient
{   pub fn new(http_client: reqwest::Client) -> Self
    {   debug!("Creating GeminiClient");
        GeminiClient { http_client }
    }

    /// Try each model spelling in order until one answers.
    ///
    /// Quota exhaustion stops immediately: it applies to the account,
    /// not the spelling.
    pub async fn generate(
      &self
    , config: &crate::config::ProviderConfig
    , api_key: &str
    , request: &ChatRequest
    ) -> Result<ChatReply, GatewayFailure>
    {   let body = GenerateTextRequest
        {   prompt: PromptText { text: build_prompt(request) }
          , temperature: 0.7
          , max_output_tokens: 512
        };
        trace!("Gemini prompt: {:?}", body.prompt.text);

        let mut candidates
          = CandidateSequence::for_model(&config.gemini_model);
        let mut last_error: Option<String> = None;

        while let Some(candidate)
          = candidates.current().map(str::to_string)
        {   debug!("Trying Gemini model candidate: {}", candidate);
            match self
              .try_candidate(config, api_key, &candidate, &body)
              .await
            {   Ok(text) => {
                  debug!("Gemini candidate {} answered", candidate);
                  return Ok(ChatReply::new(crate::Provider::Gemini, text));
                }
              , Err(CandidateError::Stop(failure)) => {
                  warn!("Gemini candidate {} stopped: {}", candidate, failure);
                  return Err(failure);
                }
              , Err(CandidateError::Skip(reason)) => {
                  warn!("Gemini candidate {} failed: {}", candidate, reason);
                  last_error = Some(reason);
                }
            }
            candidates.next();
        }

        error!("All Gemini candidates failed: {}", candidates.describe());
        Err(not_found_failure(&candidates, last_error.as_deref()))
    }

    async fn try_candidate(
      &self
    , config: &crate::config::ProviderConfig
    , api_key: &str
    , candidate: &str
    , body: &GenerateTextRequest
    ) -> Result<String, CandidateError>
    {   let url = candidate_url(&config.gemini_api_base, candidate, api_key)
          .map_err(|e| {
            CandidateError::Stop(GatewayFailure::internal(e.to_string()))
          })?;

        let response = self.http_client
          .post(url)
          .timeout(config.timeout())
          .json(body)
          .send()
          .await
          .map_err(|e| {
            error!("Gemini request failed: {}", e);
            CandidateError::Skip(e.to_string())
          })?;

        let status = response.status();
        trace!("Gemini response status: {}", status);

        if !status.is_success()
        {   let error_body: Option<Value> = response.json().await.ok();
            error!(
              "Gemini API error for model {}: {:?}",
              candidate, error_body
            );
            let failure = UpstreamFailure::from_body(
              Some(status.as_u16())
            , error_body.as_ref()
            );
            let reason = if failure.message.is_empty()
            {   UNKNOWN_MODEL.to_string()
            } else
            {   failure.message.clone()
            };
            return match classify(&GEMINI_RULES, &failure)
            {   Verdict::QuotaExhausted => {
                  Err(CandidateError::Stop(quota_failure(&failure)))
                }
              , Verdict::ModelNotFound | Verdict::Other => {
                  Err(CandidateError::Skip(reason))
                }
            };
        }

        let data: Option<Value> = response.json().await.ok();
        data.as_ref()
          .and_then(extract_text)
          .ok_or_else(|| CandidateError::Skip(NO_TEXT.to_string()))
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::ConversationMessage;
    use serde_json::json;

    #[test]
    fn prompt_flattens_history_with_blank_lines()
    {   let request = ChatRequest::new("and tomorrow?").with_history(vec![
          ConversationMessage::user("plan today")
        , ConversationMessage::assistant("Block the morning.")
        ]);
        let prompt = build_prompt(&request);
        let expected = format!(
          "{}\n\nUser: plan today\n\nAssistant: Block the morning.\n\nUser: and tomorrow?"
        , crate::SYSTEM_PROMPT
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn text_is_found_in_every_known_shape()
    {   assert_eq!(
          extract_text(&json!({"candidates": [{"content": "a"}]}))
        , Some("a".to_string())
        );
        assert_eq!(
          extract_text(&json!({"candidates": [{"content": {"parts": [{"text": "b"}]}}]}))
        , Some("b".to_string())
        );
        assert_eq!(
          extract_text(&json!({"candidates": [{"output": [{"content": "c"}]}]}))
        , Some("c".to_string())
        );
        assert_eq!(
          extract_text(&json!({"output": [{"content": "d"}]}))
        , Some("d".to_string())
        );
        assert_eq!(extract_text(&json!({"candidates": []})), None);
        assert_eq!(extract_text(&json!({"candidates": [{"content": ""}]})), None);
    }

    #[test]
    fn namespaced_candidate_is_one_encoded_segment()
    {   let url = candidate_url(
          "https://example.test/v1beta2"
        , "models/text-bison-001"
        , "k&y"
        ).unwrap();
        assert_eq!(
          url.as_str()
        , "https://example.test/v1beta2/models/models%2Ftext-bison-001:generateText?key=k%26y"
        );
    }

    #[test]
    fn bad_base_is_a_configuration_error()
    {   assert!(matches!(
          candidate_url("not a url", "m", "k")
        , Err(crate::error::Error::InvalidConfiguration(_))
        ));
    }
}
