//! Token budgets and priority-based candidate packing.
//!
//! Costs are approximate: one token per four bytes, rounded up. When every
//! candidate fits, the authored order is kept untouched. Otherwise candidates
//! are admitted greedily by priority (ties broken by original position) until
//! the first one that no longer fits what is left. Candidates too large for
//! even an empty budget are skipped without ending admission.

use std::cmp::Reverse;

use serde::Serialize;
use tracing::debug;

use crate::selection::CandidateFile;

/// Estimate the token cost of `bytes` bytes of text (~4 bytes per token).
pub fn estimate_tokens(bytes: u64) -> u64 {
    bytes.div_ceil(4)
}

/// A token ceiling and the running total admitted against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBudget {
    /// Total budget for this invocation.
    ceiling: u64,
    /// Tokens admitted so far.
    used: u64,
}

impl TokenBudget {
    pub fn new(ceiling: u64) -> Self {
        Self { ceiling, used: 0 }
    }

    /// Tokens still available.
    pub fn available(&self) -> u64 {
        self.ceiling.saturating_sub(self.used)
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Whether `cost` could fit an otherwise empty budget.
    pub fn could_ever_fit(&self, cost: u64) -> bool {
        cost <= self.ceiling
    }

    /// Admit `cost` tokens if they fit. Returns `false` when they don't.
    pub fn admit(&mut self, cost: u64) -> bool {
        if cost <= self.available() {
            self.used += cost;
            true
        } else {
            false
        }
    }
}

/// Result of packing candidates into a budget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packed {
    /// Admitted candidates in their original order.
    pub included: Vec<CandidateFile>,
    /// Rejected candidates in the order admission considered them.
    pub excluded: Vec<CandidateFile>,
}

impl Packed {
    /// Sum of the included candidates' estimates.
    pub fn included_tokens(&self) -> u64 {
        self.included.iter().map(|c| c.estimated_tokens).sum()
    }
}

/// Split `candidates` into what fits under `max_tokens` and what doesn't.
///
/// `None` means unbounded.
pub fn pack(candidates: Vec<CandidateFile>, max_tokens: Option<u64>) -> Packed {
    let Some(ceiling) = max_tokens else {
        return Packed {
            included: candidates,
            excluded: Vec::new(),
        };
    };

    let total: u64 = candidates.iter().map(|c| c.estimated_tokens).sum();
    if total <= ceiling {
        debug!(total, ceiling, "All candidates fit the budget");
        return Packed {
            included: candidates,
            excluded: Vec::new(),
        };
    }

    let mut ranked: Vec<(usize, CandidateFile)> = candidates.into_iter().enumerate().collect();
    ranked.sort_by_key(|(idx, c)| (Reverse(c.priority), *idx));

    let mut budget = TokenBudget::new(ceiling);
    let mut included: Vec<(usize, CandidateFile)> = Vec::new();
    let mut excluded = Vec::new();
    let mut full = false;

    for (idx, candidate) in ranked {
        let cost = candidate.estimated_tokens;
        if full {
            excluded.push(candidate);
        } else if !budget.could_ever_fit(cost) {
            debug!(
                path = %candidate.relative_path,
                cost,
                ceiling,
                "Candidate larger than the whole budget"
            );
            excluded.push(candidate);
        } else if budget.admit(cost) {
            included.push((idx, candidate));
        } else {
            debug!(
                path = %candidate.relative_path,
                cost,
                available = budget.available(),
                "Budget exhausted"
            );
            full = true;
            excluded.push(candidate);
        }
    }

    included.sort_by_key(|(idx, _)| *idx);
    debug!(
        used = budget.used(),
        ceiling,
        included = included.len(),
        excluded = excluded.len(),
        "Packed candidates"
    );

    Packed {
        included: included.into_iter().map(|(_, c)| c).collect(),
        excluded,
    }
}
