use campusrag_core::config::EmbeddingSettings;
use campusrag_core::traits::Embedder;
use campusrag_embed::{cosine_similarity, get_default_embedder, HashingEmbedder};

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&EmbeddingSettings { dimension: 384 }).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim follows config");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_vocabulary_scores_higher() {
    let embedder = HashingEmbedder::new(256);
    let q = embedder.embed("What is the fee for B.Tech CSE?").unwrap();
    let fee = embedder.embed("The annual tuition fee for B.Tech CSE is 1.5 lakh").unwrap();
    let hostel = embedder.embed("Hostel rooms are allotted on a first come basis").unwrap();
    assert!(cosine_similarity(&q, &fee) > cosine_similarity(&q, &hostel));
}

#[test]
fn case_and_punctuation_do_not_change_vectors() {
    let embedder = HashingEmbedder::new(64);
    let a = embedder.embed("Admission Deadline").unwrap();
    let b = embedder.embed("admission, deadline!").unwrap();
    assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(get_default_embedder(&EmbeddingSettings { dimension: 0 }).is_err());
}

#[test]
fn cosine_of_mismatched_lengths_is_zero() {
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}
