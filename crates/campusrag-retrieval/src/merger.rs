//! Cross-collection result fusion.
//!
//! Raw similarity scores are only meaningful inside one index, so every
//! collection's list is normalized on its own before a source-priority
//! weight is applied and the union is sorted.

use campusrag_core::config::{MergerSettings, Normalization};
use campusrag_core::types::{CollectionId, RouteOrigin, RoutingDecision, ScoredPassage};

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPassage {
    pub scored: ScoredPassage,
    /// Score on the common 0..=1 scale.
    pub normalized: f32,
    pub weight: f32,
    pub composite: f32,
    pub registration_order: usize,
}

#[derive(Debug, Clone)]
pub struct ResultMerger {
    settings: MergerSettings,
}

impl ResultMerger {
    pub fn new(settings: MergerSettings) -> Self { Self { settings } }

    pub fn weight_for(&self, origin: Option<RouteOrigin>) -> f32 {
        match origin {
            Some(RouteOrigin::General) => self.settings.general_weight,
            Some(RouteOrigin::Hinted) => self.settings.explicit_weight,
            Some(RouteOrigin::Classified { .. }) => self.settings.inferred_weight,
            None => 1.0,
        }
    }

    /// Fuse per-collection lists into one order: composite score desc, then
    /// raw score desc, earlier registration, per-collection rank and id.
    pub fn merge<F>(
        &self,
        per_collection: Vec<(CollectionId, Vec<ScoredPassage>)>,
        routing: &RoutingDecision,
        registration_order: F,
    ) -> Vec<RankedPassage>
    where
        F: Fn(&CollectionId) -> usize,
    {
        let mut merged = Vec::new();
        for (id, mut passages) in per_collection {
            if passages.is_empty() { continue; }
            passages.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.rank.cmp(&b.rank)));
            let weight = self.weight_for(routing.origin_of(&id));
            let order = registration_order(&id);
            let normalized = self.normalize(&passages);
            for (scored, normalized) in passages.into_iter().zip(normalized) {
                merged.push(RankedPassage { composite: normalized * weight, scored, normalized, weight, registration_order: order });
            }
        }
        merged.sort_by(|a, b| {
            b.composite
                .total_cmp(&a.composite)
                .then(b.scored.score.total_cmp(&a.scored.score))
                .then(a.registration_order.cmp(&b.registration_order))
                .then(a.scored.rank.cmp(&b.scored.rank))
                .then_with(|| a.scored.passage.id.cmp(&b.scored.passage.id))
        });
        merged
    }

    /// `passages` must be ordered best first.
    fn normalize(&self, passages: &[ScoredPassage]) -> Vec<f32> {
        match self.settings.normalization {
            Normalization::MinMax => {
                let max = passages.iter().map(|p| p.score).fold(f32::NEG_INFINITY, f32::max);
                let min = passages.iter().map(|p| p.score).fold(f32::INFINITY, f32::min);
                let range = max - min;
                if range <= f32::EPSILON {
                    vec![1.0; passages.len()]
                } else {
                    passages.iter().map(|p| (p.score - min) / range).collect()
                }
            }
            Normalization::Rank => {
                let n = passages.len() as f32;
                (0..passages.len()).map(|i| (n - i as f32) / n).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campusrag_core::types::{Passage, RoutedCollection, Selection};
    use std::sync::Arc;

    fn scored(collection: &CollectionId, id: &str, score: f32, rank: usize) -> ScoredPassage {
        ScoredPassage {
            passage: Arc::new(Passage {
                id: id.to_string(),
                doc_id: id.to_string(),
                collection: collection.clone(),
                text: id.to_string(),
                section: None,
                vector: vec![],
            }),
            score,
            collection: collection.clone(),
            rank,
        }
    }

    fn routing(dept_origin: RouteOrigin) -> RoutingDecision {
        RoutingDecision {
            collections: vec![
                RoutedCollection { id: CollectionId::General, origin: RouteOrigin::General },
                RoutedCollection { id: CollectionId::department("cse"), origin: dept_origin },
            ],
            selection: if dept_origin == RouteOrigin::Hinted { Selection::Explicit } else { Selection::Inferred },
            unresolved_hint: None,
        }
    }

    fn order(id: &CollectionId) -> usize { if id.is_general() { 0 } else { 1 } }

    #[test]
    fn normalizes_each_collection_before_comparing() {
        let general = CollectionId::General;
        let cse = CollectionId::department("cse");
        // General uses a metric with much larger raw scores.
        let input = vec![
            (general.clone(), vec![scored(&general, "policy", 40.0, 0), scored(&general, "hostel", 10.0, 1)]),
            (cse.clone(), vec![scored(&cse, "fee-table", 0.82, 0), scored(&cse, "syllabus", 0.31, 1)]),
        ];
        let merged = ResultMerger::new(MergerSettings::default()).merge(input, &routing(RouteOrigin::Classified { confidence: 1.0 }), order);
        let ids: Vec<_> = merged.iter().map(|r| r.scored.passage.id.as_str()).collect();
        assert_eq!(ids, vec!["fee-table", "policy", "hostel", "syllabus"]);
        assert!((merged[0].composite - 1.1).abs() < 1e-6);
        assert!((merged[1].composite - 1.05).abs() < 1e-6);
    }

    #[test]
    fn hinted_department_outweighs_inferred() {
        let merger = ResultMerger::new(MergerSettings::default());
        assert!(merger.weight_for(Some(RouteOrigin::Hinted)) > merger.weight_for(Some(RouteOrigin::Classified { confidence: 0.9 })));
        assert!(merger.weight_for(Some(RouteOrigin::General)) > 1.0);
    }

    #[test]
    fn ties_fall_back_to_raw_score_then_registration() {
        let general = CollectionId::General;
        let cse = CollectionId::department("cse");
        let settings = MergerSettings { explicit_weight: 1.0, inferred_weight: 1.0, general_weight: 1.0, ..MergerSettings::default() };
        let input = vec![
            (cse.clone(), vec![scored(&cse, "c", 0.5, 0)]),
            (general.clone(), vec![scored(&general, "g", 0.5, 0)]),
        ];
        let merged = ResultMerger::new(settings).merge(input, &routing(RouteOrigin::Hinted), order);
        assert_eq!(merged[0].scored.passage.id, "g");
        assert_eq!(merged[1].scored.passage.id, "c");
    }

    #[test]
    fn rank_normalization_is_position_based() {
        let cse = CollectionId::department("cse");
        let settings = MergerSettings { normalization: Normalization::Rank, ..MergerSettings::default() };
        let input = vec![(cse.clone(), vec![scored(&cse, "a", 0.9, 0), scored(&cse, "b", 0.8, 1), scored(&cse, "c", 0.1, 2), scored(&cse, "d", 0.0, 3)])];
        let merged = ResultMerger::new(settings).merge(input, &routing(RouteOrigin::Hinted), order);
        let normalized: Vec<_> = merged.iter().map(|r| r.normalized).collect();
        assert_eq!(normalized, vec![1.0, 0.75, 0.5, 0.25]);
    }
}
