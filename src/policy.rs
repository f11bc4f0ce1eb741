//! Tie-break policy for choosing among equally specific blocks.
//!
//! Range specificity always ranks first and newest-block-id always ranks
//! last; the chain in between is deployment policy, not a hard invariant.

use serde::Deserialize;

/// A single tie-breaking rule, applied in order after specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreaker {
    /// Hardblocks outrank softblocks.
    HardBeforeSoft,
    /// Blocks that disable account creation outrank those that do not.
    CreateAccountDisabled,
    /// A match on an earlier candidate address outranks a later one.
    EarliestCandidate,
}

/// Ordered tie-breaker chain.
#[derive(Debug, Clone, Deserialize)]
pub struct PrecedencePolicy {
    #[serde(default = "default_tie_breakers")]
    pub tie_breakers: Vec<TieBreaker>,
}

impl Default for PrecedencePolicy {
    fn default() -> Self {
        Self {
            tie_breakers: default_tie_breakers(),
        }
    }
}

fn default_tie_breakers() -> Vec<TieBreaker> {
    vec![
        TieBreaker::HardBeforeSoft,
        TieBreaker::CreateAccountDisabled,
        TieBreaker::EarliestCandidate,
    ]
}
