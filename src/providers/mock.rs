//! Canned productivity tips, answered without any network call.

/// A keyword bucket and its tip sheet
struct Bucket
{   keywords: &'static [&'static str]
  , reply: &'static str
}

pub const STRESS_TIPS: &str = "Feeling overwhelmed is common! Here's how to manage it:

1. List everything on your mind - get it out of your head
2. Prioritize ruthlessly - focus on what truly matters
3. Break large projects into smaller, manageable tasks
4. Say no to non-essential commitments
5. Schedule breaks and downtime - rest is productive
6. Celebrate small wins - progress builds momentum

Remember: You can't do everything. Focus on what matters most!";

pub const TIME_BLOCKING_TIPS: &str = "Great question about time blocking! Here are some tips:

✓ Block 90 minutes for deep work sessions - this is the optimal duration for focused work
✓ Include buffer time (15-30 minutes) between meetings or classes
✓ Schedule breaks every 2 hours - even 5-10 minutes helps maintain productivity
✓ Batch similar tasks together to reduce context switching
✓ Be realistic about how long tasks actually take
✓ Protect your deep work blocks - they're precious!";

pub const PRODUCTIVITY_TIPS: &str = "Here are some proven productivity strategies:

🎯 Pomodoro Technique: Work for 25 minutes, then take a 5-minute break
🎯 Energy Management: Schedule high-priority tasks during your peak energy hours
🎯 Single-tasking: One task at a time is more effective than multitasking
🎯 Remove distractions: Turn off notifications during focused work
🎯 Track your progress: Seeing progress is motivating!

What specific area would you like help with?";

pub const DEFAULT_TIPS: &str = "That's a great question! Here are some thoughts:

• Start by identifying your most important tasks
• Block time for deep, focused work on these priorities
• Use your calendar to visualize your time and spot patterns
• Track which activities are actually productive for you
• Adjust your schedule based on what works best

What specific productivity challenge are you facing? I'm here to help!";

// Checked top to bottom. Stress comes first so "overwhelmed with my
// schedule" gets the stress sheet rather than scheduling tips.
const BUCKETS: &[Bucket] = &[
  Bucket
  {   keywords: &["overwhelm", "stress", "busy"]
    , reply: STRESS_TIPS
  }
, Bucket
  {   keywords: &["time block", "schedule"]
    , reply: TIME_BLOCKING_TIPS
  }
, Bucket
  {   keywords: &["productivity", "focus"]
    , reply: PRODUCTIVITY_TIPS
  }
];

/// Tip sheet for a user message. Depends on nothing but `message`.
pub fn mock_response(message: &str) -> &'static str
{   let lower = message.to_lowercase();
    BUCKETS
      .iter()
      .find(|b| b.keywords.iter().any(|k| lower.contains(k)))
      .map(|b| b.reply)
      .unwrap_or(DEFAULT_TIPS)
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn time_blocking_is_stable()
    {   let first = mock_response("Help me with time blocking");
        assert_eq!(first, TIME_BLOCKING_TIPS);
        for _ in 0..5
        {   assert_eq!(mock_response("Help me with time blocking"), first);
        }
    }

    #[test]
    fn overwhelm_routes_to_stress()
    {   assert_eq!(mock_response("I feel OVERWHELMED"), STRESS_TIPS);
        assert_eq!(
          mock_response("I feel overwhelmed with my schedule")
        , STRESS_TIPS
        );
        assert_eq!(mock_response("so busy lately"), STRESS_TIPS);
    }

    #[test]
    fn focus_routes_to_productivity()
    {   assert_eq!(mock_response("How do I focus?"), PRODUCTIVITY_TIPS);
    }

    #[test]
    fn unmatched_routes_to_default()
    {   assert_eq!(mock_response("what's the weather"), DEFAULT_TIPS);
        assert_eq!(mock_response(""), DEFAULT_TIPS);
    }
}
