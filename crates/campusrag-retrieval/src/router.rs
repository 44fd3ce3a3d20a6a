//! Query router: picks the collections a question is searched in.
//!
//! A valid department hint wins outright. Otherwise a lightweight classifier
//! scores each registered department against the question: lexical coverage
//! of its keyword phrases, optionally blended with embedding similarity to
//! its label. A department is selected only when its score is strictly above
//! `min_confidence`. Regulation-scoped collections are reached by hint only.
//! The general collection is always part of the decision unless
//! the caller asked for `general` only.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use campusrag_core::config::RouterSettings;
use campusrag_core::types::{
    normalize_name, CollectionId, Query, RouteOrigin, RoutedCollection, RoutingDecision, Selection, GENERAL_COLLECTION,
};
use campusrag_embed::cosine_similarity;

use crate::registry::{Collection, RegistrySnapshot};
use crate::text::{content_tokens, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentScore {
    pub id: CollectionId,
    pub score: f32,
    pub passage_count: usize,
}

#[derive(Debug, Clone)]
pub struct QueryRouter {
    settings: RouterSettings,
}

impl QueryRouter {
    pub fn new(settings: RouterSettings) -> Self { Self { settings } }

    pub fn route(&self, query: &Query, snapshot: &RegistrySnapshot, query_vector: Option<&[f32]>) -> RoutingDecision {
        let hint = query.department.as_deref().map(normalize_name).filter(|h| !h.is_empty());
        if let Some(hint) = hint {
            if hint == GENERAL_COLLECTION {
                debug!("general-only hint");
                return RoutingDecision {
                    collections: vec![general()],
                    selection: Selection::Explicit,
                    unresolved_hint: None,
                };
            }
            if let Some(collection) = resolve_hint(snapshot, &hint, query.regulation.as_deref()) {
                debug!(collection = %collection.id, "department hint resolved");
                return RoutingDecision {
                    collections: vec![general(), RoutedCollection { id: collection.id.clone(), origin: RouteOrigin::Hinted }],
                    selection: Selection::Explicit,
                    unresolved_hint: None,
                };
            }
            warn!(hint = %hint, "unknown department hint, falling back to classifier");
            let mut decision = self.classify(&query.text, snapshot, query_vector);
            decision.unresolved_hint = Some(hint);
            return decision;
        }
        self.classify(&query.text, snapshot, query_vector)
    }

    /// Departments clearing the confidence threshold, best first, capped at
    /// `max_departments`.
    pub fn score_departments(&self, text: &str, snapshot: &RegistrySnapshot, query_vector: Option<&[f32]>) -> Vec<DepartmentScore> {
        let tokens: HashSet<String> = tokenize(text).into_iter().collect();
        let mut scores: Vec<DepartmentScore> = snapshot
            .departments()
            .filter(|c| c.regulation_of.is_none())
            .map(|c| DepartmentScore {
                id: c.id.clone(),
                score: self.department_score(c, &tokens, query_vector),
                passage_count: c.passage_count,
            })
            .filter(|s| s.score > 0.0 && s.score > self.settings.min_confidence)
            .collect();
        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.passage_count.cmp(&a.passage_count))
                .then_with(|| a.id.name().cmp(b.id.name()))
        });
        scores.truncate(self.settings.max_departments);
        scores
    }

    fn classify(&self, text: &str, snapshot: &RegistrySnapshot, query_vector: Option<&[f32]>) -> RoutingDecision {
        let selected = self.score_departments(text, snapshot, query_vector);
        debug!(selected = selected.len(), "classifier routing");
        let mut collections = vec![general()];
        collections.extend(
            selected
                .into_iter()
                .map(|s| RoutedCollection { id: s.id, origin: RouteOrigin::Classified { confidence: s.score } }),
        );
        RoutingDecision { collections, selection: Selection::Inferred, unresolved_hint: None }
    }

    fn department_score(&self, collection: &Collection, tokens: &HashSet<String>, query_vector: Option<&[f32]>) -> f32 {
        let lexical = collection.keywords.iter().map(|k| phrase_coverage(k, tokens)).fold(0.0f32, f32::max);
        let weight = self.settings.embedding_weight;
        match (query_vector, collection.label_vector.as_deref()) {
            (Some(q), Some(label)) if weight > 0.0 => {
                let semantic = cosine_similarity(q, label).clamp(0.0, 1.0);
                (1.0 - weight) * lexical + weight * semantic
            }
            _ => lexical,
        }
    }
}

fn general() -> RoutedCollection { RoutedCollection { id: CollectionId::General, origin: RouteOrigin::General } }

/// Regulation-scoped collection first (`cse_vr23`), then the plain department.
fn resolve_hint(snapshot: &RegistrySnapshot, hint: &str, regulation: Option<&str>) -> Option<Arc<Collection>> {
    if let Some(reg) = regulation.map(normalize_name).filter(|r| !r.is_empty()) {
        if let Ok(c) = snapshot.resolve(&format!("{hint}_{reg}")) {
            return Some(c);
        }
    }
    snapshot.resolve(hint).ok().filter(|c| !c.id.is_general())
}

/// 1.0 when every content word of the phrase is in the question; a partial
/// match counts half its coverage so it never clears the default threshold.
fn phrase_coverage(phrase: &str, tokens: &HashSet<String>) -> f32 {
    let words = content_tokens(phrase);
    if words.is_empty() { return 0.0; }
    let hit = words.iter().filter(|w| tokens.contains(*w)).count();
    if hit == words.len() { 1.0 } else { 0.5 * hit as f32 / words.len() as f32 }
}
