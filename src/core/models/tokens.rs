use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Token counters for one event, one file, one day or one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenTotals {
    pub const fn zero() -> Self {
        Self {
            input_tokens: 0,
            cached_input_tokens: 0,
            output_tokens: 0,
            reasoning_output_tokens: 0,
            total_tokens: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Clamp cached input to input and reasoning to output, and fall back to
    /// `input + output` when no total was reported.
    pub fn normalized(self) -> Self {
        let total_tokens = if self.total_tokens == 0 {
            self.input_tokens.saturating_add(self.output_tokens)
        } else {
            self.total_tokens
        };
        Self {
            input_tokens: self.input_tokens,
            cached_input_tokens: self.cached_input_tokens.min(self.input_tokens),
            output_tokens: self.output_tokens,
            reasoning_output_tokens: self.reasoning_output_tokens.min(self.output_tokens),
            total_tokens,
        }
    }

    pub fn adding(self, other: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            cached_input_tokens: self
                .cached_input_tokens
                .saturating_add(other.cached_input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            reasoning_output_tokens: self
                .reasoning_output_tokens
                .saturating_add(other.reasoning_output_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }

    /// Per-field difference floored at zero. A counter that went backwards
    /// (session reset) contributes nothing.
    pub fn delta_since(self, previous: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_sub(previous.input_tokens),
            cached_input_tokens: self
                .cached_input_tokens
                .saturating_sub(previous.cached_input_tokens),
            output_tokens: self.output_tokens.saturating_sub(previous.output_tokens),
            reasoning_output_tokens: self
                .reasoning_output_tokens
                .saturating_sub(previous.reasoning_output_tokens),
            total_tokens: self.total_tokens.saturating_sub(previous.total_tokens),
        }
    }

    /// Input tokens not served from cache.
    pub fn billed_input_tokens(&self) -> u64 {
        self.input_tokens.saturating_sub(self.cached_input_tokens)
    }
}

impl Add for TokenTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.adding(rhs)
    }
}

impl AddAssign for TokenTotals {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.adding(rhs);
    }
}

impl Sum for TokenTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Self::adding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(input: u64, cached: u64, output: u64, reasoning: u64, total: u64) -> TokenTotals {
        TokenTotals {
            input_tokens: input,
            cached_input_tokens: cached,
            output_tokens: output,
            reasoning_output_tokens: reasoning,
            total_tokens: total,
        }
    }

    #[test]
    fn normalized_clamps_and_falls_back_to_sum() {
        let n = totals(100, 150, 50, 80, 0).normalized();
        assert_eq!(n.cached_input_tokens, 100);
        assert_eq!(n.reasoning_output_tokens, 50);
        assert_eq!(n.total_tokens, 150);
        assert_eq!(n.input_tokens, 100);
        assert_eq!(n.output_tokens, 50);
    }

    #[test]
    fn normalized_trusts_reported_total() {
        let n = totals(100, 20, 50, 10, 400).normalized();
        assert_eq!(n.total_tokens, 400);
        assert_eq!(n.cached_input_tokens, 20);
    }

    #[test]
    fn delta_is_floored_at_zero() {
        let earlier = totals(500, 100, 200, 50, 700);
        let later = totals(120, 150, 260, 40, 380);
        let d = later.delta_since(earlier);
        assert_eq!(d.input_tokens, 0);
        assert_eq!(d.cached_input_tokens, 50);
        assert_eq!(d.output_tokens, 60);
        assert_eq!(d.reasoning_output_tokens, 0);
        assert_eq!(d.total_tokens, 0);
    }

    #[test]
    fn adding_is_commutative_with_zero_identity() {
        let a = totals(1, 2, 3, 4, 5);
        let b = totals(10, 20, 30, 40, 50);
        assert_eq!(a + b, b + a);
        assert_eq!(a + TokenTotals::zero(), a);
        assert_eq!([a, b].into_iter().sum::<TokenTotals>(), totals(11, 22, 33, 44, 55));
    }

    #[test]
    fn billed_input_excludes_cached() {
        assert_eq!(totals(100, 30, 10, 5, 0).billed_input_tokens(), 70);
        assert_eq!(totals(10, 30, 0, 0, 0).billed_input_tokens(), 0);
    }

    #[test]
    fn is_zero_only_for_empty_totals() {
        assert!(TokenTotals::default().is_zero());
        assert!(!totals(0, 0, 1, 0, 0).is_zero());
    }
}
