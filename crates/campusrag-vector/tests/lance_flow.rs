use campusrag_core::traits::{CollectionSource, Embedder, VectorIndex};
use campusrag_core::types::{CollectionId, Passage};
use campusrag_embed::HashingEmbedder;
use campusrag_vector::{passage_id, LancePassageWriter, LanceStore};
use tempfile::TempDir;

const DIM: usize = 64;

fn passages(embedder: &HashingEmbedder, collection: &CollectionId, texts: &[(&str, &str)]) -> Vec<Passage> {
    texts
        .iter()
        .map(|(doc, text)| Passage {
            id: passage_id(collection, doc, text),
            doc_id: doc.to_string(),
            collection: collection.clone(),
            text: text.to_string(),
            section: Some("Admissions".to_string()),
            vector: embedder.embed(text).expect("embed"),
        })
        .collect()
}

#[tokio::test]
async fn lance_store_discovers_and_searches_collections() {
    let tmp = TempDir::new().expect("tmp");
    let uri = tmp.path().to_string_lossy().to_string();
    let embedder = HashingEmbedder::new(DIM);

    let store = LanceStore::open(&uri).await.expect("open store");
    let writer = LancePassageWriter::new(store.connection().clone(), DIM).quiet();
    let general = CollectionId::General;
    let cse = CollectionId::department("cse");
    writer
        .write(&general, &passages(&embedder, &general, &[
            ("policy", "Fees are payable at the start of every semester"),
            ("hostel", "Hostel rooms are allotted on a first come basis"),
        ]))
        .await
        .expect("write general");
    writer
        .write(&cse, &passages(&embedder, &cse, &[("fees", "The annual tuition fee for B.Tech CSE is 1.5 lakh")]))
        .await
        .expect("write cse");

    let found = store.discover().await.expect("discover");
    let names: Vec<_> = found.iter().map(|c| c.id.name().to_string()).collect();
    assert_eq!(names, vec!["cse", "general"], "tables are listed in lexical order");

    let general_index = &found.iter().find(|c| c.id.is_general()).expect("general").index;
    assert_eq!(general_index.count().await.expect("count"), 2);

    let query = embedder.embed("When are fees payable each semester?").expect("embed query");
    let hits = general_index.search(&query, 2).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].passage.doc_id, "policy");
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[0].passage.collection, CollectionId::General);
    assert_eq!(hits[0].passage.section.as_deref(), Some("Admissions"));
}

#[tokio::test]
async fn writer_rejects_wrong_dimension() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceStore::open(&tmp.path().to_string_lossy()).await.expect("open store");
    let writer = LancePassageWriter::new(store.connection().clone(), DIM).quiet();
    let bad = Passage {
        id: "x".into(),
        doc_id: "x".into(),
        collection: CollectionId::General,
        text: "x".into(),
        section: None,
        vector: vec![0.0; DIM + 1],
    };
    assert!(writer.write(&CollectionId::General, &[bad]).await.is_err());
}

#[test]
fn passage_ids_are_stable_and_provenance_sensitive() {
    let a = passage_id(&CollectionId::General, "doc", "text");
    assert_eq!(a, passage_id(&CollectionId::General, "doc", "text"));
    assert_ne!(a, passage_id(&CollectionId::department("law"), "doc", "text"));
    assert_eq!(a.len(), 16);
}
