use thiserror::Error;

use crate::types::CollectionId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown collection name. Routable: callers fall back to classifier
    /// selection or to the general collection.
    #[error("Collection not found: {0}")]
    NotFound(String),

    /// Collection is registered but empty, unresponsive or timed out.
    #[error("Collection unavailable: {collection} ({reason})")]
    Unavailable { collection: CollectionId, reason: String },

    /// No candidate fits the context budget. The assembler recovers by
    /// admitting the single best candidate.
    #[error("No passage fits within the context budget of {budget}")]
    BudgetExceeded { budget: usize },

    #[error("Query text is empty")]
    EmptyQuery,

    #[error("Retrieval was cancelled")]
    Cancelled,

    #[error("Index error: {0}")]
    Index(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_names_collection() {
        let e = Error::Unavailable { collection: CollectionId::department("law"), reason: "timed out".into() };
        assert_eq!(e.to_string(), "Collection unavailable: law (timed out)");
    }
}
