//! Upstream error classification.
//!
//! Each provider has an ordered table of `(matcher, verdict)` rules;
//! the first matching rule decides. New upstream phrasings are added
//! as table rows.

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// What an upstream failure means for the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict
{   /// This model spelling is unknown upstream; try the next one
    ModelNotFound
  , /// The account is out of quota; stop and tell the caller
    QuotaExhausted
  , /// Anything else
    Other
}

/// Fields pulled out of an upstream error response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamFailure
{   /// HTTP status, absent for transport failures
    pub http_status: Option<u16>
  , /// Symbolic status such as `NOT_FOUND`
    pub status: Option<String>
  , /// Error code, numeric codes rendered as text
    pub code: Option<String>
  , /// Error type (`error.type`)
    pub error_type: Option<String>
  , pub message: String
}

impl UpstreamFailure
{   /// Extract failure fields from an error body.
    /// Looks under `error.*` first, then at the top level.
    pub fn from_body(http_status: Option<u16>, body: Option<&Value>) -> Self
    {   let field = |name: &str| -> Option<String> {
          let body = body?;
          body.get("error")
            .and_then(|e| e.get(name))
            .or_else(|| body.get(name))
            .and_then(|v| match v
            {   Value::String(s) => Some(s.clone())
              , Value::Number(n) => Some(n.to_string())
              , _ => None
            })
        };
        UpstreamFailure
        {   http_status
          , status: field("status")
          , code: field("code")
          , error_type: field("type")
          , message: field("message").unwrap_or_default()
        }
    }

    /// Failure with no response at all
    pub fn transport(message: impl Into<String>) -> Self
    {   UpstreamFailure
        {   message: message.into()
          , ..UpstreamFailure::default()
        }
    }
}

/// One way of recognising a failure
#[derive(Debug)]
pub enum Matcher
{   HttpStatus(u16)
  , Status(&'static str)
  , Code(&'static str)
  , ErrorType(&'static str)
  , Message(Regex)
}

impl Matcher
{   fn matches(&self, failure: &UpstreamFailure) -> bool
    {   match self
        {   Matcher::HttpStatus(s) => failure.http_status == Some(*s)
          , Matcher::Status(s) => failure.status.as_deref() == Some(*s)
          , Matcher::Code(c) => failure.code.as_deref() == Some(*c)
          , Matcher::ErrorType(t) => {
              failure.error_type.as_deref() == Some(*t)
            }
          , Matcher::Message(re) => re.is_match(&failure.message)
        }
    }
}

#[derive(Debug)]
pub struct Rule
{   pub matcher: Matcher
  , pub verdict: Verdict
}

fn rule(matcher: Matcher, verdict: Verdict) -> Rule
{   Rule { matcher, verdict }
}

fn message(pattern: &str) -> Matcher
{   Matcher::Message(
      Regex::new(pattern).expect("rule patterns are literals")
    )
}

/// Generative Language API rules. Not-found is checked before quota.
pub static GEMINI_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
  vec![
    rule(Matcher::HttpStatus(404), Verdict::ModelNotFound)
  , rule(Matcher::Status("NOT_FOUND"), Verdict::ModelNotFound)
  , rule(message(r"(?i)not found"), Verdict::ModelNotFound)
  , rule(Matcher::Code("RESOURCE_EXHAUSTED"), Verdict::QuotaExhausted)
  , rule(Matcher::Status("RESOURCE_EXHAUSTED"), Verdict::QuotaExhausted)
  , rule(message(r"(?i)quota|exceed"), Verdict::QuotaExhausted)
  ]
});

/// Chat completions API rules
pub static OPENAI_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
  vec![
    rule(Matcher::Code("insufficient_quota"), Verdict::QuotaExhausted)
  , rule(Matcher::ErrorType("insufficient_quota"), Verdict::QuotaExhausted)
  ]
});

/// Evaluate rules in order; the first match wins
pub fn classify(rules: &[Rule], failure: &UpstreamFailure) -> Verdict
{   let verdict = rules
      .iter()
      .find(|r| r.matcher.matches(failure))
      .map(|r| r.verdict)
      .unwrap_or(Verdict::Other);
    trace!("Classified {:?} as {:?}", failure, verdict);
    verdict
}
