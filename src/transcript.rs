//! Client-side conversation state.
//!
//! `ChatClient` is a two-state machine: `Idle` accepts a submit,
//! `AwaitingReply` accepts only the outcome of the request in flight.
//! The transcript only ever grows.

use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::Serialize;

use crate::request::ConversationBody;
use crate::{ConversationMessage, Role};

pub const GREETING: &str = "Hi! I'm your productivity assistant 🤖 I can help you with time management, productivity tips, scheduling advice, and general questions. How can I assist you today?";

pub const EMPTY_REPLY: &str
  = "I received your message but couldn't generate a response.";

/// One displayed chat bubble
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry
{   pub role: Role
  , pub text: String
  , pub timestamp: DateTime<Local>
  , /// Synthesized from a failure rather than said by anyone
    pub is_error: bool
}

impl TranscriptEntry
{   fn new(role: Role, text: impl Into<String>, is_error: bool) -> Self
    {   TranscriptEntry
        {   role
          , text: text.into()
          , timestamp: Local::now()
          , is_error
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState
{   Idle
  , AwaitingReply
}

/// How a submitted turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome
{   /// 2xx with the reply text, if the body carried one
    Reply(Option<String>)
  , /// Non-2xx with the gateway's failure fields
    GatewayFailure
    {   error: Option<String>
      , message: Option<String>
      , details: Option<String>
    }
  , /// Body was empty or not JSON
    ParseFailure
  , /// Gateway unreachable
    ConnectionFailure(String)
}

impl SubmitOutcome
{   /// Bubble text for this outcome, and whether it reports an error
    pub fn render(&self) -> (String, bool)
    {   match self
        {   SubmitOutcome::Reply(Some(text)) => (text.clone(), false)
          , SubmitOutcome::Reply(None) => (EMPTY_REPLY.to_string(), false)
          , SubmitOutcome::GatewayFailure { error, message, details } => {
              let mut text = String::from("❌ Error: ");
              match (error, message)
              {   (Some(e), Some(m)) => text.push_str(&format!("{} ({})", m, e))
                , (Some(e), None) => text.push_str(e)
                , (None, Some(m)) => text.push_str(m)
                , (None, None) => text.push_str("Failed to get a response")
              }
              if let Some(d) = details
              {   text.push_str(&format!("\nDetails: {}", d));
              }
              text.push_str(
                "\nPlease try again or contact support if the issue persists."
              );
              (text, true)
            }
          , SubmitOutcome::ParseFailure => (
              "⚠️ Server error: Unable to parse response. The server might \
               be starting up or experiencing issues. Please try again in a \
               moment.".to_string()
            , true
            )
          , SubmitOutcome::ConnectionFailure(reason) => (
              format!(
                "⚠️ Connection error: {}. Please check your internet \
                 connection and try again."
              , reason
              )
            , true
            )
        }
    }
}

/// Conversation manager for one chat panel
#[derive(Debug, Clone)]
pub struct ChatClient
{   transcript: Vec<TranscriptEntry>
  , state: ClientState
  , model: Option<String>
}

impl Default for ChatClient
{   fn default() -> Self
    {   ChatClient::new(None)
    }
}

impl ChatClient
{   /// New conversation, seeded with the greeting
    pub fn new(model: Option<String>) -> Self
    {   ChatClient
        {   transcript: vec![
              TranscriptEntry::new(Role::Assistant, GREETING, false)
            ]
          , state: ClientState::Idle
          , model
        }
    }

    pub fn state(&self) -> ClientState
    {   self.state
    }

    pub fn transcript(&self) -> &[TranscriptEntry]
    {   &self.transcript
    }

    /// Start a turn.
    ///
    /// Appends the user entry, moves to `AwaitingReply` and returns
    /// the body to post. Blank text and a turn already in flight are
    /// refused without touching the transcript.
    pub fn begin_submit(
      &mut self
    , text: &str
    ) -> Result<ConversationBody, crate::error::Error>
    {   if text.trim().is_empty()
        {   debug!("Ignoring blank submit");
            return Err(crate::error::Error::EmptyInput);
        }
        if self.state == ClientState::AwaitingReply
        {   warn!("Submit refused: reply still pending");
            return Err(crate::error::Error::Busy);
        }

        self.transcript.push(TranscriptEntry::new(Role::User, text, false));
        self.state = ClientState::AwaitingReply;

        let messages = self.transcript
          .iter()
          .filter(|e| !e.is_error)
          .map(|e| ConversationMessage::new(e.role, e.text.clone()))
          .collect();
        Ok(ConversationBody
        {   messages
          , model: self.model.clone()
        })
    }

    /// Finish the turn in flight: append one assistant entry for
    /// `outcome` and return to `Idle`, whatever the outcome was.
    pub fn complete(&mut self, outcome: &SubmitOutcome) -> &TranscriptEntry
    {   if self.state != ClientState::AwaitingReply
        {   warn!("Outcome arrived with no turn in flight");
        }
        let (text, is_error) = outcome.render();
        self.transcript.push(
          TranscriptEntry::new(Role::Assistant, text, is_error)
        );
        self.state = ClientState::Idle;
        &self.transcript[self.transcript.len() - 1]
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::error::Error;

    #[test]
    fn blank_submit_is_a_no_op()
    {   let mut client = ChatClient::default();
        assert_eq!(client.begin_submit("   \n"), Err(Error::EmptyInput));
        assert_eq!(client.transcript().len(), 1);
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[test]
    fn successful_turn_appends_user_then_assistant()
    {   let mut client = ChatClient::default();
        let body = client.begin_submit("hi").unwrap();
        assert_eq!(client.state(), ClientState::AwaitingReply);
        assert_eq!(
          body.messages
        , vec![
            ConversationMessage::assistant(GREETING)
          , ConversationMessage::user("hi")
          ]
        );

        client.complete(&SubmitOutcome::Reply(Some("hello!".into())));
        assert_eq!(client.state(), ClientState::Idle);
        let added: Vec<(Role, &str)> = client.transcript()[1..]
          .iter()
          .map(|e| (e.role, e.text.as_str()))
          .collect();
        assert_eq!(added, vec![(Role::User, "hi"), (Role::Assistant, "hello!")]);
        let times: Vec<_> = client.transcript().iter().map(|e| e.timestamp).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn second_submit_while_awaiting_is_refused()
    {   let mut client = ChatClient::default();
        client.begin_submit("one").unwrap();
        assert_eq!(client.begin_submit("two"), Err(Error::Busy));
        assert_eq!(client.transcript().len(), 2);
    }

    #[test]
    fn missing_reply_text_uses_fallback()
    {   let mut client = ChatClient::default();
        client.begin_submit("hi").unwrap();
        let entry = client.complete(&SubmitOutcome::Reply(None));
        assert_eq!(entry.text, EMPTY_REPLY);
        assert!(!entry.is_error);
    }

    #[test]
    fn failure_classes_render_distinctly()
    {   let (parse, _) = SubmitOutcome::ParseFailure.render();
        let (conn, _) = SubmitOutcome::ConnectionFailure("refused".into()).render();
        assert!(parse.starts_with("⚠️ Server error"));
        assert!(conn.starts_with("⚠️ Connection error: refused"));
        assert_ne!(parse, conn);
    }

    #[test]
    fn gateway_failure_embeds_fields_verbatim()
    {   let mut client = ChatClient::default();
        client.begin_submit("hi").unwrap();
        let entry = client.complete(&SubmitOutcome::GatewayFailure
        {   error: Some("insufficient_quota".into())
          , message: Some("OpenAI quota exceeded.".into())
          , details: Some("You exceeded your current quota".into())
        });
        assert!(entry.is_error);
        assert!(entry.text.starts_with("❌ Error: "));
        assert!(entry.text.contains("insufficient_quota"));
        assert!(entry.text.contains("OpenAI quota exceeded."));
        assert!(entry.text.contains("You exceeded your current quota"));
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[test]
    fn error_bubbles_are_not_sent_as_history()
    {   let mut client = ChatClient::default();
        client.begin_submit("first").unwrap();
        client.complete(&SubmitOutcome::ParseFailure);
        let body = client.begin_submit("second").unwrap();
        assert_eq!(body.messages.len(), 3);
        assert!(body.messages.iter().all(|m| !m.content.contains("Server error")));
    }
}
