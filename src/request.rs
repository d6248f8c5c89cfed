//! Wire request and response shapes for `POST /api/chat`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::{ConversationMessage, GatewayFailure, ErrorKind, Role};

/// Which request body a client sent. The reply uses the matching shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape
{   /// `{ messages, model? }`
    Conversation
  , /// `{ message, conversationHistory? }`
    SingleTurn
}

/// Normalized chat request handed to the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest
{   /// Prior turns, oldest first
    pub history: Vec<ConversationMessage>
  , /// The new user turn
    pub user_message: String
  , /// Requested chat completions model
    pub model: Option<String>
}

impl ChatRequest
{   pub fn new(user_message: impl Into<String>) -> Self
    {   ChatRequest
        {   history: vec![]
          , user_message: user_message.into()
          , model: None
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationMessage>) -> Self
    {   self.history = history;
        self
    }
}

/// Body the client posts: the canonical conversation shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationBody
{   pub messages: Vec<ConversationMessage>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>
}

/// Token accounting reported by the chat completions API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage
{   pub prompt_tokens: u32
  , pub completion_tokens: u32
  , pub total_tokens: u32
}

/// Success body for the conversation shape
#[derive(Debug, Clone, Serialize)]
pub struct ConversationReply
{   pub message: String
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>
  , pub success: bool
}

/// Success body for the single-turn shape
#[derive(Debug, Clone, Serialize)]
pub struct SingleTurnReply
{   pub response: String
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>
}

/// Failure body for either shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody
{   pub error: String
  , pub message: String
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>
  , pub success: bool
}

impl From<&GatewayFailure> for ErrorBody
{   fn from(failure: &GatewayFailure) -> Self
    {   ErrorBody
        {   error: failure.kind.as_str().to_string()
          , message: failure.message.clone()
          , details: failure.details.clone()
          , success: false
        }
    }
}

/// Any gateway response as seen by a client; every field optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseBody
{   pub message: Option<String>
  , pub response: Option<String>
  , pub error: Option<String>
  , pub details: Option<String>
  , pub warning: Option<String>
}

/// Decode a request body into its shape and a normalized request.
///
/// A body with `messages` is a conversation; otherwise a body with
/// `message` is single-turn; anything else is invalid.
pub fn parse_body(body: &Value)
  -> Result<(RequestShape, ChatRequest), GatewayFailure>
{   let object = body
      .as_object()
      .ok_or_else(GatewayFailure::invalid_messages)?;

    if let Some(messages) = object.get("messages")
    {   let model = match object.get("model")
        {   None | Some(Value::Null) => None
          , Some(Value::String(m)) if m.trim().is_empty() => None
          , Some(Value::String(m)) => Some(m.clone())
          , Some(_) => {
              return Err(GatewayFailure::invalid_messages()
                .with_details("model must be a string"));
            }
        };
        let mut messages = parse_messages(messages)
          .map_err(|details| {
            GatewayFailure::invalid_messages().with_details(details)
          })?;
        let last = messages
          .pop()
          .ok_or_else(|| {
            GatewayFailure::invalid_messages()
              .with_details("messages must not be empty")
          })?;
        if last.role != Role::User
        {   return Err(GatewayFailure::invalid_messages()
              .with_details("the last message must come from the user"));
        }
        let request = ChatRequest
        {   history: messages
          , user_message: last.content
          , model
        };
        return Ok((RequestShape::Conversation, request));
    }

    if let Some(message) = object.get("message")
    {   let invalid = || {
          GatewayFailure::new(ErrorKind::InvalidRequest, "Invalid message")
        };
        let text = message
          .as_str()
          .filter(|m| !m.trim().is_empty())
          .ok_or_else(invalid)?;
        let history = match object.get("conversationHistory")
        {   None | Some(Value::Null) => vec![]
          , Some(h) => parse_messages(h)
              .map_err(|details| invalid().with_details(details))?
        };
        let request = ChatRequest
        {   history
          , user_message: text.to_string()
          , model: None
        };
        return Ok((RequestShape::SingleTurn, request));
    }

    Err(GatewayFailure::invalid_messages())
}

fn parse_messages(value: &Value)
  -> Result<Vec<ConversationMessage>, String>
{   if !value.is_array()
    {   return Err("messages must be an array".to_string());
    }
    let messages: Vec<ConversationMessage>
      = serde_json::from_value(value.clone())
        .map_err(|e| format!("malformed message: {}", e))?;
    let blank = messages.iter().position(|m| {
      m.role != Role::Assistant && m.content.trim().is_empty()
    });
    if let Some(index) = blank
    {   return Err(format!("message {} has no content", index));
    }
    Ok(messages)
}
