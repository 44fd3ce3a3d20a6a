//! Concept-mapping query expansion applied to the text that gets embedded.

use campusrag_core::config::ExpansionSettings;

#[derive(Debug, Clone, Default)]
pub struct QueryExpander {
    concepts: Vec<(String, Vec<String>)>,
    max_terms: usize,
}

impl QueryExpander {
    pub fn new(settings: &ExpansionSettings) -> Self {
        let concepts = settings
            .concepts
            .iter()
            .map(|(trigger, terms)| (trigger.trim().to_lowercase(), terms.clone()))
            .filter(|(trigger, _)| !trigger.is_empty())
            .collect();
        Self { concepts, max_terms: settings.max_terms_per_concept }
    }

    /// Appends related terms for every trigger phrase found in `text`.
    /// Terms already present in the question are not repeated.
    pub fn expand(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        let mut added: Vec<&str> = Vec::new();
        for (trigger, terms) in &self.concepts {
            if !lower.contains(trigger.as_str()) { continue; }
            for term in terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).take(self.max_terms) {
                let term_lower = term.to_lowercase();
                if lower.contains(&term_lower) || added.iter().any(|a| a.to_lowercase() == term_lower) { continue; }
                added.push(term);
            }
        }
        if added.is_empty() { text.to_string() } else { format!("{} {}", text, added.join(" ")) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn expander() -> QueryExpander {
        let mut concepts = BTreeMap::new();
        concepts.insert("fee".to_string(), vec!["tuition".into(), "payment".into(), "charges".into()]);
        concepts.insert("hostel".to_string(), vec!["accommodation".into(), "tuition".into()]);
        QueryExpander::new(&ExpansionSettings { concepts, max_terms_per_concept: 2 })
    }

    #[test]
    fn appends_at_most_max_terms_per_concept() {
        assert_eq!(expander().expand("What is the CSE fee?"), "What is the CSE fee? tuition payment");
    }

    #[test]
    fn terms_are_deduplicated_across_concepts() {
        assert_eq!(expander().expand("Hostel fee"), "Hostel fee tuition payment accommodation");
    }

    #[test]
    fn terms_already_asked_are_skipped() {
        assert_eq!(expander().expand("fee payment deadline"), "fee payment deadline tuition");
    }

    #[test]
    fn unrelated_text_is_unchanged() {
        assert_eq!(expander().expand("placement record"), "placement record");
        assert_eq!(QueryExpander::default().expand("fee"), "fee");
    }
}
