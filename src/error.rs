use std::fmt;

/// Custom error type for daychat operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// API key is missing for a provider
    MissingApiKey(String)
  , /// HTTP request error
    HttpError(String)
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Submitted text was blank
    EmptyInput
  , /// A reply is still being awaited
    Busy
  , /// Timeout error
    Timeout
  , /// Generic error
    Other(String)
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::MissingApiKey(provider) => {
              write!(f, "Missing API key for: {}", provider)
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::EmptyInput => {
              write!(f, "Message is empty")
            }
          , Error::Busy => {
              write!(f, "Still waiting for the previous reply")
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

// ===== Gateway failure taxonomy =====

/// Machine-readable failure kinds returned by the chat gateway.
/// Each kind maps to exactly one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind
{   InvalidRequest
  , ConfigurationError
  , InsufficientQuota
  , ModelNotFound
  , EmptyCompletion
  , InternalError
}

impl ErrorKind
{   /// HTTP status code for this kind
    pub fn status(self) -> u16
    {   match self
        {   ErrorKind::InvalidRequest => 400
          , ErrorKind::ConfigurationError => 500
          , ErrorKind::InsufficientQuota => 402
          , ErrorKind::ModelNotFound => 404
          , ErrorKind::EmptyCompletion => 500
          , ErrorKind::InternalError => 500
        }
    }

    /// Stable wire string placed in the `error` field
    pub fn as_str(self) -> &'static str
    {   match self
        {   ErrorKind::InvalidRequest => "invalid_request"
          , ErrorKind::ConfigurationError => "configuration_error"
          , ErrorKind::InsufficientQuota => "insufficient_quota"
          , ErrorKind::ModelNotFound => "model_not_found"
          , ErrorKind::EmptyCompletion => "empty_completion"
          , ErrorKind::InternalError => "internal_error"
        }
    }
}

impl fmt::Display for ErrorKind
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   f.write_str(self.as_str())
    }
}

/// Normalized gateway failure: the Failure variant of a chat response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFailure
{   pub kind: ErrorKind
  , pub message: String
  , pub details: Option<String>
}

impl GatewayFailure
{   pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self
    {   GatewayFailure
        {   kind
          , message: message.into()
          , details: None
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self
    {   self.details = Some(details.into());
        self
    }

    pub fn invalid_messages() -> Self
    {   GatewayFailure::new(
          ErrorKind::InvalidRequest
        , "Messages array is required"
        )
    }

    pub fn missing_api_key() -> Self
    {   GatewayFailure::new(
          ErrorKind::ConfigurationError
        , "API key not configured. Please check server configuration."
        )
    }

    pub fn invalid_configuration() -> Self
    {   GatewayFailure::new(
          ErrorKind::ConfigurationError
        , "Server configuration is invalid. Please check server settings."
        )
    }

    pub fn internal(details: impl Into<String>) -> Self
    {   GatewayFailure::new(
          ErrorKind::InternalError
        , "Internal server error"
        ).with_details(details)
    }
}

impl fmt::Display for GatewayFailure
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   write!(f, "{} ({}): {}", self.kind, self.kind.status(), self.message)
    }
}

impl std::error::Error for GatewayFailure {}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn kinds_map_to_fixed_statuses()
    {   let table = [
          (ErrorKind::InvalidRequest, 400, "invalid_request")
        , (ErrorKind::ConfigurationError, 500, "configuration_error")
        , (ErrorKind::InsufficientQuota, 402, "insufficient_quota")
        , (ErrorKind::ModelNotFound, 404, "model_not_found")
        , (ErrorKind::EmptyCompletion, 500, "empty_completion")
        , (ErrorKind::InternalError, 500, "internal_error")
        ];
        for (kind, status, wire) in table
        {   assert_eq!(kind.status(), status);
            assert_eq!(kind.as_str(), wire);
        }
    }

    #[test]
    fn canned_failures_carry_user_facing_text()
    {   let f = GatewayFailure::missing_api_key();
        assert_eq!(f.kind, ErrorKind::ConfigurationError);
        assert_eq!(
          f.message
        , "API key not configured. Please check server configuration."
        );
        assert_eq!(
          GatewayFailure::invalid_messages().message
        , "Messages array is required"
        );
    }
}
