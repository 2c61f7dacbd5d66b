//! Provider fallback policy.
//!
//! Providers are tried in slot order. After each attempt the policy decides
//! whether to accept the answer, stop with a stub, or move to the next slot.

use serde::{Deserialize, Serialize};

use super::parse::{ParseFailure, ValidationPayload};
use crate::adapters::ProviderError;

/// Result of asking one provider
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// Provider answered with a well-formed payload
    Parsed(ValidationPayload),

    /// Provider answered, but the answer could not be used
    ParseFailure { raw: String, reason: ParseFailure },

    /// Provider could not be reached or refused the call
    TransportFailure(ProviderError),
}

/// What to do after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Use the parsed payload
    Accept,

    /// Stop and return a reduced-confidence stub attributed to this provider
    Stub,

    /// Try the next provider slot
    TryNext,

    /// Stop: no provider is left to try
    Exhausted,
}

/// Fallback rules for the ordered provider list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    /// Also fall over to the next provider when an answer cannot be parsed
    #[serde(default)]
    pub retry_on_parse_failure: bool,
}

impl FallbackPolicy {
    pub fn decide(&self, outcome: &AttemptOutcome, has_next: bool) -> PolicyDecision {
        match outcome {
            AttemptOutcome::Parsed(_) => PolicyDecision::Accept,
            AttemptOutcome::ParseFailure { .. } if self.retry_on_parse_failure && has_next => {
                PolicyDecision::TryNext
            }
            AttemptOutcome::ParseFailure { .. } => PolicyDecision::Stub,
            AttemptOutcome::TransportFailure(_) if has_next => PolicyDecision::TryNext,
            AttemptOutcome::TransportFailure(_) => PolicyDecision::Exhausted,
        }
    }
}
