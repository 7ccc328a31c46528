/// Running token total of one call against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    /// Tokens used so far, prompt included
    pub used: usize,
    /// Largest total the call may reach
    pub limit: usize,
}

impl TokenUsage {
    /// Start a call that already carries `prompt_tokens`.
    #[must_use]
    pub const fn new(prompt_tokens: usize, limit: usize) -> Self {
        Self {
            used: prompt_tokens,
            limit,
        }
    }

    /// Check if adding `tokens` would pass the limit.
    #[must_use]
    pub const fn would_exceed(&self, tokens: usize) -> bool {
        self.used.saturating_add(tokens) > self.limit
    }

    pub const fn add(&mut self, tokens: usize) {
        self.used = self.used.saturating_add(tokens);
    }

    /// Tokens left before the limit, as a clip budget.
    #[must_use]
    pub fn remaining(&self) -> i64 {
        let remaining = self.limit.saturating_sub(self.used);
        i64::try_from(remaining).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_tracking() {
        let mut usage = TokenUsage::new(100, 1000);
        assert!(!usage.would_exceed(900));
        assert!(usage.would_exceed(901));
        assert_eq!(usage.remaining(), 900);

        usage.add(900);
        assert_eq!(usage.remaining(), 0);
        assert!(usage.would_exceed(1));
    }

    #[test]
    fn test_prompt_above_limit() {
        let usage = TokenUsage::new(50, 10);
        assert!(usage.would_exceed(0));
        assert_eq!(usage.remaining(), 0);
    }
}
