//! Operator confirmation
//!
//! Starting restores is destructive. A run presents its plan once, before
//! any mutating cluster call, and proceeds only on an explicit accept.

use std::sync::Mutex;

/// Operator answer to the confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Decline,
    /// Interrupted while waiting for an answer
    Cancel,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Decline => "decline",
            Decision::Cancel => "cancel",
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }
}

/// Asks the operator to approve a summary
pub trait Confirmer: Send + Sync {
    fn confirm(&self, summary: &str) -> Decision;
}

/// Answers every prompt the same way and keeps the summaries it was shown.
#[derive(Debug)]
pub struct FixedConfirmer {
    decision: Decision,
    shown: Mutex<Vec<String>>,
}

impl FixedConfirmer {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn accept() -> Self {
        Self::new(Decision::Accept)
    }

    /// Summaries presented so far
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Confirmer for FixedConfirmer {
    fn confirm(&self, summary: &str) -> Decision {
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(summary.to_string());
        self.decision
    }
}
