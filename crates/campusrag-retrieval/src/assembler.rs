//! Context assembly: dedup, size budget and passage cap.

use std::collections::HashSet;
use tracing::debug;

use campusrag_core::config::{AssemblerSettings, BudgetUnit};
use campusrag_core::error::{Error, Result};
use campusrag_core::types::{Context, Coverage, ScoredPassage};

use crate::text::{overlap_ratio, shingles};

/// Passages admitted within budget, before degradation flags are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub passages: Vec<ScoredPassage>,
    pub total_size: usize,
    pub budget_relaxed: bool,
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    settings: AssemblerSettings,
}

impl ContextAssembler {
    pub fn new(settings: AssemblerSettings) -> Self { Self { settings } }

    pub fn budget(&self) -> usize { self.settings.max_size }

    /// Size of `text` in the configured unit. Tokens are approximated as
    /// words / 0.75, rounded up.
    pub fn size_of(&self, text: &str) -> usize {
        match self.settings.unit {
            BudgetUnit::Chars => text.chars().count(),
            BudgetUnit::Tokens => (text.split_whitespace().count() * 4).div_ceil(3),
        }
    }

    /// Strict pass: walks candidates in rank order and admits those that fit.
    /// `BudgetExceeded` when candidates exist but none fits.
    pub fn fit(&self, candidates: &[ScoredPassage]) -> Result<Assembly> {
        let budget = self.settings.max_size;
        let mut kept: Vec<(ScoredPassage, HashSet<String>)> = Vec::new();
        let mut total = 0usize;
        for candidate in candidates {
            if kept.len() >= self.settings.max_passages || total >= budget { break; }
            let grams = shingles(candidate.text(), self.settings.shingle_size);
            let duplicate = kept.iter().any(|(p, g)| {
                p.doc_id() == candidate.doc_id() && overlap_ratio(g, &grams) >= self.settings.overlap_threshold
            });
            if duplicate {
                debug!(passage = %candidate.passage.id, "dropping overlapping passage");
                continue;
            }
            let size = self.size_of(candidate.text());
            if total + size > budget { continue; }
            total += size;
            kept.push((candidate.clone(), grams));
        }
        if kept.is_empty() && !candidates.is_empty() {
            return Err(Error::BudgetExceeded { budget });
        }
        Ok(Assembly { passages: kept.into_iter().map(|(p, _)| p).collect(), total_size: total, budget_relaxed: false })
    }

    /// Never returns an empty context when candidates exist: if nothing fits,
    /// the top-ranked passage is admitted alone and the budget marked relaxed.
    pub fn assemble(&self, candidates: &[ScoredPassage]) -> Context {
        let assembly = match self.fit(candidates) {
            Ok(a) => a,
            Err(e) => {
                debug!(error = %e, "admitting single oversized passage");
                let top = candidates[..1].to_vec();
                let total_size = self.size_of(top[0].text());
                Assembly { passages: top, total_size, budget_relaxed: true }
            }
        };
        Context {
            passages: assembly.passages,
            total_size: assembly.total_size,
            coverage: Coverage::Full,
            budget_relaxed: assembly.budget_relaxed,
            missing_collections: Vec::new(),
        }
    }
}
