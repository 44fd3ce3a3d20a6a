//! Routing against the department table shipped in the workspace `config.toml`.

use std::sync::Arc;

use figment::providers::{Format, Serialized, Toml};
use figment::Figment;

use campusrag_core::config::{Config, Settings};
use campusrag_core::types::{CollectionId, Passage, Query, Selection};
use campusrag_retrieval::{CollectionRegistry, QueryRouter, RegistrySnapshot};
use campusrag_vector::{InMemoryIndex, InMemorySource};

fn shipped_settings() -> Settings {
    let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(include_str!("../../../config.toml")));
    Config::from_figment(figment).settings().expect("shipped config is valid")
}

fn index(name: &str) -> InMemoryIndex {
    let id = CollectionId::from_name(name);
    InMemoryIndex::from_passages(
        id.clone(),
        [Passage {
            id: format!("{name}:0"),
            doc_id: name.to_string(),
            collection: id.clone(),
            text: format!("{name} handbook"),
            section: None,
            vector: vec![1.0],
        }],
    )
}

async fn campus(settings: &Settings) -> Arc<RegistrySnapshot> {
    let source = ["general", "cse", "cse_vr23", "ce", "me"].into_iter().fold(InMemorySource::new(), |s, n| s.with_index(index(n)));
    CollectionRegistry::init(Arc::new(source), settings, None).await.expect("registry").snapshot()
}

fn routed(router: &QueryRouter, snapshot: &RegistrySnapshot, query: &Query) -> Vec<String> {
    router.route(query, snapshot, None).ids().map(|id| id.name().to_string()).collect()
}

#[tokio::test]
async fn department_keyword_routes_to_its_collection_only() {
    let settings = shipped_settings();
    let snapshot = campus(&settings).await;
    let router = QueryRouter::new(settings.router.clone());

    assert_eq!(routed(&router, &snapshot, &Query::new("What is the fee for B.Tech CSE?")), vec!["general", "cse"]);
    assert_eq!(routed(&router, &snapshot, &Query::new("Mechanical engineering fee structure")), vec!["general", "me"]);
}

#[tokio::test]
async fn generic_words_in_labels_do_not_route() {
    let settings = shipped_settings();
    let snapshot = campus(&settings).await;
    let router = QueryRouter::new(settings.router.clone());

    let decision = router.route(&Query::new("Which engineering branches are offered?"), &snapshot, None);
    assert_eq!(decision.selection, Selection::Inferred);
    assert_eq!(decision.ids().cloned().collect::<Vec<_>>(), vec![CollectionId::General]);
}

#[tokio::test]
async fn regulation_collection_needs_a_hint() {
    let settings = shipped_settings();
    let snapshot = campus(&settings).await;
    let router = QueryRouter::new(settings.router.clone());

    let unhinted = Query::new("What is the CSE syllabus under VR23?");
    assert_eq!(routed(&router, &snapshot, &unhinted), vec!["general", "cse"]);

    let hinted = Query::new("syllabus").with_department("CSE").with_regulation("VR23");
    assert_eq!(routed(&router, &snapshot, &hinted), vec!["general", "cse_vr23"]);
}
