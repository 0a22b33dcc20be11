use crate::expr::InvalidPatternPolicy;
use clap::ValueEnum;

/// Command-line spelling of [`InvalidPatternPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnInvalidPattern {
    /// Reject the whole expression
    Fail,
    /// Keep going; the broken pattern never matches
    NeverMatch,
}

impl From<OnInvalidPattern> for InvalidPatternPolicy {
    fn from(value: OnInvalidPattern) -> Self {
        match value {
            OnInvalidPattern::Fail => InvalidPatternPolicy::Fail,
            OnInvalidPattern::NeverMatch => InvalidPatternPolicy::NeverMatch,
        }
    }
}

impl From<InvalidPatternPolicy> for OnInvalidPattern {
    fn from(value: InvalidPatternPolicy) -> Self {
        match value {
            InvalidPatternPolicy::Fail => OnInvalidPattern::Fail,
            InvalidPatternPolicy::NeverMatch => OnInvalidPattern::NeverMatch,
        }
    }
}
