pub mod error;
pub mod config;
pub mod failover;
pub mod classify;
pub mod request;
pub mod providers;
pub mod gateway;
pub mod server;
pub mod transcript;
pub mod client;
use serde::{Deserialize, Serialize};

/*

daychat is the chat panel core of a calendar/productivity dashboard.

  browser ──▶ client (transcript, one request at a time)
                │  POST /api/chat  { messages, model }
                ▼
            server (axum) ──▶ gateway ──▶ gemini | openai | mock
                ◀── normalized { message } or { error, message }

The gateway keeps nothing between requests: history travels with
each request and configuration is rebuilt for every call.

daychat/
├── src/
│   ├── lib.rs          # Shared conversation types
│   ├── error.rs        # Error type and gateway failure taxonomy
│   ├── config.rs       # Provider and server configuration
│   ├── failover.rs     # Retry policy and model name candidates
│   ├── classify.rs     # Upstream error rule tables
│   ├── request.rs      # Wire request/response shapes
│   ├── providers/      # Gemini, OpenAI and mock responders
│   ├── gateway.rs      # Provider selection and normalization
│   ├── server.rs       # HTTP routes
│   ├── transcript.rs   # Client conversation state machine
│   ├── client.rs       # Client session task and transport
│   └── main.rs         # Server binary
└── tests/

*/

pub use error::{Error, ErrorKind, GatewayFailure};
pub use config::{ProviderConfig, RetryConfig, ServerConfig};
pub use gateway::{ChatReply, Gateway};
pub use request::{ChatRequest, Usage};
pub use transcript::{ChatClient, ClientState, SubmitOutcome};
pub use client::{ChatSession, ChatTransport, HttpTransport};

/// Fixed preamble sent ahead of every conversation.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI productivity assistant integrated into a smart calendar app. Your role is to:
- Provide personalized productivity advice
- Help users with time management strategies
- Give tips on effective time blocking and scheduling
- Suggest productivity techniques and best practices
- Help users analyze their schedule and habits
- Motivate users to stay focused and productive
Be conversational, supportive, and practical. Keep responses concise but informative. Focus on actionable advice that users can immediately implement.";

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   User
  , Assistant
  , System
}

impl Role
{   /// Label used when a turn is flattened into a text prompt
    pub fn label(self) -> &'static str
    {   match self
        {   Role::User => "User"
          , Role::Assistant => "Assistant"
          , Role::System => "System"
        }
    }
}

/// One turn of a conversation. Order within a conversation matters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConversationMessage
{   pub role: Role
  , pub content: String
}

impl ConversationMessage
{   pub fn new(role: Role, content: impl Into<String>) -> Self
    {   ConversationMessage
        {   role
          , content: content.into()
        }
    }

    pub fn user(content: impl Into<String>) -> Self
    {   Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self
    {   Self::new(Role::System, content)
    }
}

/// Upstream a chat turn is answered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider
{
  /// Google Generative Language text generation
  Gemini
  ,
  /// OpenAI-compatible chat completions
  #[serde(rename = "openai")]
  OpenAi
  ,
  /// Local canned responses, no network
  Mock
}

impl Provider
{   pub fn name(self) -> &'static str
    {   match self
        {   Provider::Gemini => "gemini"
          , Provider::OpenAi => "openai"
          , Provider::Mock => "mock"
        }
    }
}
