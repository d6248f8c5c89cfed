//! Retry policy and model name candidates for upstream calls

use std::time::Duration;
use log::debug;

/// Longest single wait between retries
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Retry policy for failed requests
#[derive(Debug, Clone)]
pub struct RetryPolicy
{   pub max_retries: usize
  , pub backoff_multiplier: f32
  , pub initial_backoff: Duration
}

impl RetryPolicy
{   /// Create a new retry policy
    pub fn new(
      max_retries: usize
    , backoff_multiplier: f32
    , initial_backoff_ms: u64
    ) -> Self
    {   RetryPolicy
        {   max_retries
          , backoff_multiplier
          , initial_backoff: Duration::from_millis(
              initial_backoff_ms
            )
        }
    }

    /// Calculate backoff duration for attempt number, capped at
    /// `MAX_BACKOFF`
    pub fn backoff_for_attempt(
      &self
    , attempt: usize
    ) -> Duration
    {   debug!("Calculating backoff for attempt {}", attempt);
        let exponent = attempt.min(i32::MAX as usize) as i32;
        let multiplier = self.backoff_multiplier.powi(exponent);
        let millis = self.initial_backoff.as_millis() as f32 * multiplier;
        if !millis.is_finite() || millis >= MAX_BACKOFF.as_millis() as f32
        {   return MAX_BACKOFF;
        }
        Duration::from_millis(millis.max(0.0) as u64)
    }

    /// Whether another attempt is allowed after `attempt` failures
    pub fn should_retry(&self, attempt: usize) -> bool
    {   attempt < self.max_retries
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::from(&crate::config::RetryConfig::default())
    }
}

impl From<&crate::config::RetryConfig> for RetryPolicy
{   fn from(config: &crate::config::RetryConfig) -> Self
    {   RetryPolicy::new(
          config.max_retries
        , config.backoff_multiplier
        , config.initial_backoff_ms
        )
    }
}

/// Prefix the Generative Language API uses for model resource names
pub const MODEL_NAMESPACE: &str = "models/";

/// Ordered spellings of one model name.
///
/// Upstream routing may accept `text-bison-001` but reject
/// `models/text-bison-001` (or the reverse), so both are tried,
/// the configured spelling first.
#[derive(Debug, Clone)]
pub struct CandidateSequence
{   pub candidates: Vec<String>
  , pub current_index: usize
}

impl CandidateSequence
{   /// Derive candidates from a configured model name
    pub fn for_model(model: &str) -> Self
    {   let model = model.trim();
        let candidates = match model.strip_prefix(MODEL_NAMESPACE)
        {   Some(bare) => vec![model.to_string(), bare.to_string()]
          , None => vec![
              model.to_string()
            , format!("{}{}", MODEL_NAMESPACE, model)
            ]
        };
        debug!(
          "Creating candidate sequence with {} names",
          candidates.len()
        );
        CandidateSequence
        {   candidates
          , current_index: 0
        }
    }

    /// Get the current candidate
    pub fn current(&self) -> Option<&str>
    {   self.candidates
          .get(self.current_index)
          .map(String::as_str)
    }

    /// Move to the next candidate
    pub fn next(&mut self) -> Option<&str>
    {   self.current_index += 1;
        self.current()
    }

    /// Every candidate, comma separated, for error messages
    pub fn describe(&self) -> String
    {   self.candidates.join(", ")
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn bare_name_is_tried_before_namespaced()
    {   let seq = CandidateSequence::for_model("text-bison-001");
        assert_eq!(
          seq.candidates
        , vec!["text-bison-001", "models/text-bison-001"]
        );
    }

    #[test]
    fn namespaced_name_is_tried_before_bare()
    {   let seq = CandidateSequence::for_model(" models/gemini-pro ");
        assert_eq!(seq.candidates, vec!["models/gemini-pro", "gemini-pro"]);
        assert_eq!(seq.describe(), "models/gemini-pro, gemini-pro");
    }

    #[test]
    fn sequence_walks_in_order()
    {   let mut seq = CandidateSequence::for_model("a");
        assert_eq!(seq.current(), Some("a"));
        assert_eq!(seq.next(), Some("models/a"));
        assert_eq!(seq.next(), None);
    }

    #[test]
    fn backoff_grows_geometrically()
    {   let policy = RetryPolicy::new(3, 2.0, 100);
        assert_eq!(policy.backoff_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(400));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn backoff_is_capped_for_large_retry_counts()
    {   let policy = RetryPolicy::new(40, 2.0, 250);
        assert_eq!(policy.backoff_for_attempt(4), Duration::from_millis(4000));
        assert_eq!(policy.backoff_for_attempt(5), MAX_BACKOFF);
        assert_eq!(policy.backoff_for_attempt(39), MAX_BACKOFF);
        assert_eq!(policy.backoff_for_attempt(usize::MAX), MAX_BACKOFF);
    }
}
