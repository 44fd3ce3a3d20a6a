use proptest::prelude::*;
use std::sync::Arc;

use campusrag_core::config::{AssemblerSettings, RetrieverSettings};
use campusrag_core::traits::IndexHit;
use campusrag_core::types::{CollectionId, Passage, ScoredPassage};
use campusrag_retrieval::text::{overlap_ratio, shingles};
use campusrag_retrieval::{ContextAssembler, Retriever};

fn passage(id: usize, doc: String, text: String) -> Passage {
    Passage { id: format!("p{id}"), doc_id: doc, collection: CollectionId::General, text, section: None, vector: vec![] }
}

fn hits_strategy() -> impl Strategy<Value = Vec<IndexHit>> {
    prop::collection::vec(-1.0f32..1.0, 0..40).prop_map(|scores| {
        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| IndexHit { passage: passage(i, format!("d{i}"), String::new()), ordinal: i as u64, score })
            .collect()
    })
}

const WORDS: &[&str] = &["fee", "hostel", "semester", "tuition", "cse", "lakh", "portal", "deadline", "merit", "quota"];

fn candidates_strategy() -> impl Strategy<Value = Vec<ScoredPassage>> {
    let text = prop::collection::vec(prop::sample::select(WORDS), 1..30).prop_map(|w| w.join(" "));
    prop::collection::vec((0usize..4, text), 0..20).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (doc, text))| ScoredPassage {
                passage: Arc::new(passage(i, format!("doc{doc}"), text)),
                score: 1.0 - i as f32 * 0.01,
                collection: CollectionId::General,
                rank: i,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn retriever_output_is_sorted_capped_and_thresholded(hits in hits_strategy(), k in 1usize..12, min_score in -1.0f32..1.0) {
        let retriever = Retriever::new(RetrieverSettings { k, min_score, ..RetrieverSettings::default() });
        let expected = hits.iter().filter(|h| h.score >= min_score).count().min(k);
        let ranked = retriever.rank_hits(&CollectionId::General, hits);
        prop_assert_eq!(ranked.len(), expected);
        prop_assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        prop_assert!(ranked.iter().all(|p| p.score >= min_score));
        let ordinal = |p: &ScoredPassage| p.passage.id[1..].parse::<usize>().unwrap();
        for w in ranked.windows(2) {
            if w[0].score == w[1].score {
                prop_assert!(ordinal(&w[0]) < ordinal(&w[1]), "ties keep insertion order");
            }
        }
    }

    #[test]
    fn assembler_respects_budget_and_dedup(candidates in candidates_strategy(), max_size in 10usize..400, max_passages in 1usize..10) {
        let settings = AssemblerSettings { max_size, max_passages, ..AssemblerSettings::default() };
        let threshold = settings.overlap_threshold;
        let assembler = ContextAssembler::new(settings);
        let ctx = assembler.assemble(&candidates);

        prop_assert_eq!(ctx.is_empty(), candidates.is_empty());
        prop_assert!(ctx.len() <= max_passages);
        if ctx.budget_relaxed {
            prop_assert_eq!(ctx.len(), 1);
        } else {
            prop_assert!(ctx.total_size <= max_size);
        }
        let sizes: usize = ctx.passages.iter().map(|p| assembler.size_of(p.text())).sum();
        prop_assert_eq!(sizes, ctx.total_size);

        for (i, a) in ctx.passages.iter().enumerate() {
            for b in &ctx.passages[i + 1..] {
                if a.doc_id() == b.doc_id() {
                    let ratio = overlap_ratio(&shingles(a.text(), 3), &shingles(b.text(), 3));
                    prop_assert!(ratio < threshold);
                }
            }
        }
    }
}
