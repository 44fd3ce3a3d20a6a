//! Retrieval orchestration: collection registry, query routing, per-collection
//! retrieval, cross-collection merging, context assembly and degradation.

pub mod assembler;
pub mod cancel;
pub mod degradation;
pub mod expansion;
pub mod merger;
pub mod pipeline;
pub mod registry;
pub mod retriever;
pub mod router;
pub mod text;

pub use assembler::{Assembly, ContextAssembler};
pub use cancel::CancellationToken;
pub use degradation::{Assessment, CollectionReport, CollectionStatus, DegradationController, DegradationState};
pub use expansion::QueryExpander;
pub use merger::{RankedPassage, ResultMerger};
pub use pipeline::{PipelineOutcome, RetrievalPipeline, RetrievalReport};
pub use registry::{Collection, CollectionRegistry, HealthEntry, RegistrySnapshot};
pub use retriever::{CollectionRetrieval, RetrievalStatus, Retriever};
pub use router::{DepartmentScore, QueryRouter};
