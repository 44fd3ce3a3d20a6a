//! Domain types used by the registry, router and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub type PassageId = String;

/// Name of the admissions-wide knowledge base.
pub const GENERAL_COLLECTION: &str = "general";

/// Canonical form of a collection or department name: trimmed, lower-cased,
/// inner whitespace and dashes folded to `_`.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Identity of a knowledge base: the general one or a department key.
///
/// Department keys may carry a regulation suffix (`cse_vr23`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CollectionId {
    General,
    Department(String),
}

impl CollectionId {
    pub fn from_name(name: &str) -> Self {
        let n = normalize_name(name);
        if n == GENERAL_COLLECTION { CollectionId::General } else { CollectionId::Department(n) }
    }

    pub fn department(name: &str) -> Self { Self::from_name(name) }

    pub fn name(&self) -> &str {
        match self {
            CollectionId::General => GENERAL_COLLECTION,
            CollectionId::Department(name) => name,
        }
    }

    pub fn is_general(&self) -> bool { matches!(self, CollectionId::General) }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl From<String> for CollectionId {
    fn from(s: String) -> Self { Self::from_name(&s) }
}

impl From<CollectionId> for String {
    fn from(id: CollectionId) -> Self { id.name().to_string() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Available,
    Empty,
    Unavailable,
}

impl HealthStatus {
    pub fn is_searchable(self) -> bool { self == HealthStatus::Available }
}

/// Immutable unit of retrievable text owned by one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub doc_id: String,
    pub collection: CollectionId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector: Vec<f32>,
}

/// A passage scored against one query by the index of its own collection.
///
/// `rank` is the 0-based position in that collection's result list; scores
/// are only comparable between entries of the same collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPassage {
    pub passage: Arc<Passage>,
    pub score: f32,
    pub collection: CollectionId,
    pub rank: usize,
}

impl ScoredPassage {
    pub fn doc_id(&self) -> &str { &self.passage.doc_id }
    pub fn text(&self) -> &str { &self.passage.text }
}

/// A user question plus optional routing hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub regulation: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self { Self { text: text.into(), ..Self::default() } }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_regulation(mut self, regulation: impl Into<String>) -> Self {
        self.regulation = Some(regulation.into());
        self
    }

    pub fn with_conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }
}

/// Whether the routing decision followed a caller hint or the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Explicit,
    Inferred,
}

/// Why a collection is part of a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "origin")]
pub enum RouteOrigin {
    General,
    Hinted,
    Classified { confidence: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedCollection {
    pub id: CollectionId,
    pub origin: RouteOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub collections: Vec<RoutedCollection>,
    pub selection: Selection,
    /// Hint the caller supplied that did not resolve to a known collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_hint: Option<String>,
}

impl RoutingDecision {
    pub fn contains(&self, id: &CollectionId) -> bool { self.collections.iter().any(|c| &c.id == id) }

    pub fn ids(&self) -> impl Iterator<Item = &CollectionId> { self.collections.iter().map(|c| &c.id) }

    pub fn origin_of(&self, id: &CollectionId) -> Option<RouteOrigin> {
        self.collections.iter().find(|c| &c.id == id).map(|c| c.origin)
    }

    pub fn is_explicit(&self) -> bool { self.selection == Selection::Explicit }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Full,
    /// Some selected collections were missing, empty or unresponsive.
    Partial,
}

/// Bounded, de-duplicated evidence handed to the answer generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub passages: Vec<ScoredPassage>,
    /// Sum of passage sizes in the configured budget unit.
    pub total_size: usize,
    pub coverage: Coverage,
    /// True when a single passage larger than the budget was admitted so the
    /// context would not be empty.
    pub budget_relaxed: bool,
    /// Selected collections that contributed nothing because they were
    /// missing, empty or unavailable.
    pub missing_collections: Vec<CollectionId>,
}

impl Context {
    pub fn len(&self) -> usize { self.passages.len() }
    pub fn is_empty(&self) -> bool { self.passages.is_empty() }
    pub fn is_partial(&self) -> bool { self.coverage == Coverage::Partial }

    /// Sorted `collection/document` pairs backing this context.
    pub fn sources(&self) -> Vec<String> {
        self.passages
            .iter()
            .map(|p| format!("{}/{}", p.collection, p.doc_id()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Provenance-tagged snippets in rank order, separated by `---`.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.passages.len());
        for (i, p) in self.passages.iter().enumerate() {
            let mut header = format!("[{}] (collection: {}, document: {}", i + 1, p.collection, p.doc_id());
            if let Some(section) = &p.passage.section { header.push_str(&format!(", section: {section}")); }
            header.push(')');
            parts.push(format!("{header}\n{}", p.text()));
        }
        parts.join("\n---\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(collection: &str, doc: &str, text: &str, section: Option<&str>) -> ScoredPassage {
        let collection = CollectionId::from_name(collection);
        ScoredPassage {
            passage: Arc::new(Passage {
                id: format!("{doc}:0"),
                doc_id: doc.to_string(),
                collection: collection.clone(),
                text: text.to_string(),
                section: section.map(str::to_string),
                vector: vec![],
            }),
            score: 0.5,
            collection,
            rank: 0,
        }
    }

    #[test]
    fn collection_names_are_normalized() {
        assert_eq!(CollectionId::from_name(" General "), CollectionId::General);
        assert_eq!(CollectionId::from_name("Computer Science"), CollectionId::Department("computer_science".into()));
        assert_eq!(CollectionId::department("CSE").name(), "cse");
        assert_eq!(normalize_name("b-tech  cse"), "b_tech_cse");
    }

    #[test]
    fn collection_id_serializes_as_plain_name() {
        let json = serde_json::to_string(&CollectionId::department("law")).unwrap();
        assert_eq!(json, "\"law\"");
        let back: CollectionId = serde_json::from_str("\"general\"").unwrap();
        assert!(back.is_general());
    }

    #[test]
    fn render_tags_each_snippet_with_provenance() {
        let ctx = Context {
            passages: vec![
                scored("cse", "fees-2024", "Tuition is 1.5 lakh per year.", Some("Fee table")),
                scored("general", "policy", "Fees are payable per semester.", None),
            ],
            total_size: 58,
            coverage: Coverage::Full,
            budget_relaxed: false,
            missing_collections: vec![],
        };
        let out = ctx.render();
        assert!(out.starts_with("[1] (collection: cse, document: fees-2024, section: Fee table)\nTuition"));
        assert!(out.contains("\n---\n[2] (collection: general, document: policy)\nFees"));
        assert_eq!(ctx.sources(), vec!["cse/fees-2024".to_string(), "general/policy".to_string()]);
    }
}
