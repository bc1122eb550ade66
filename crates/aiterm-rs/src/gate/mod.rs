//! Risk gating for commands proposed by the AI.
//!
//! [`ActionGate::evaluate`] decides whether a command needs confirmation:
//!
//! 1. A blacklist match forces [`RiskLevel::Dangerous`] and always asks.
//! 2. Otherwise a whitelist match runs without asking.
//! 3. Otherwise the user is asked, with the [`RiskScorer`] verdict as an
//!    advisory marker.
//!
//! The user's answer arrives as an [`EventResponse`] and is folded into a
//! [`GateOutcome`] by [`GateOutcome::resolve`].

pub mod patterns;
pub mod risk;

pub use patterns::PatternSet;
pub use risk::{RiskAssessment, RiskLevel, RiskRule, RiskRuleConfig, RiskScorer};

use crate::agent::events::EventResponse;

/// Whether the command may run without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    AutoApprove,
    Confirm { blacklisted: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub assessment: RiskAssessment,
    pub verdict: GateVerdict,
}

impl GateDecision {
    pub fn needs_confirmation(&self) -> bool {
        matches!(self.verdict, GateVerdict::Confirm { .. })
    }
}

/// Final result of gating one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Run this text (possibly edited by the user).
    Approved(String),
    /// Discard the command.
    Declined { reason: Option<String> },
}

impl GateOutcome {
    /// Fold the user's answer into an outcome.
    ///
    /// No answer declines. An edit to blank text declines.
    pub fn resolve(command: &str, response: Option<EventResponse>) -> Self {
        match response {
            Some(EventResponse::Approve) => GateOutcome::Approved(command.to_string()),
            Some(EventResponse::Edit(edited)) => {
                let edited = edited.trim();
                if edited.is_empty() {
                    GateOutcome::Declined {
                        reason: Some("edited to an empty command".into()),
                    }
                } else {
                    GateOutcome::Approved(edited.to_string())
                }
            }
            Some(EventResponse::Deny(reason)) => GateOutcome::Declined {
                reason: (!reason.trim().is_empty()).then_some(reason),
            },
            None => GateOutcome::Declined { reason: None },
        }
    }
}

/// Blacklist, whitelist and scorer, borrowed for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ActionGate<'a> {
    scorer: &'a RiskScorer,
    whitelist: &'a PatternSet,
    blacklist: &'a PatternSet,
}

impl<'a> ActionGate<'a> {
    pub fn new(
        scorer: &'a RiskScorer,
        whitelist: &'a PatternSet,
        blacklist: &'a PatternSet,
    ) -> Self {
        Self {
            scorer,
            whitelist,
            blacklist,
        }
    }

    pub fn evaluate(&self, command: &str) -> GateDecision {
        if let Some(pattern) = self.blacklist.find_match(command) {
            return GateDecision {
                assessment: RiskAssessment::new(
                    RiskLevel::Dangerous,
                    format!("matches blacklist pattern `{pattern}`"),
                ),
                verdict: GateVerdict::Confirm { blacklisted: true },
            };
        }

        let assessment = self.scorer.score(command);
        let verdict = if self.whitelist.matches(command) {
            GateVerdict::AutoApprove
        } else {
            GateVerdict::Confirm { blacklisted: false }
        };
        GateDecision {
            assessment,
            verdict,
        }
    }
}
