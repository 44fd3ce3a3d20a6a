//! Router → fan-out retrieval → merge → assemble, wrapped by the
//! degradation policy.
//!
//! Each run works against one registry snapshot. Per-collection searches
//! run as tasks in a `JoinSet` and are joined before ranking; cancelling the
//! run aborts every in-flight search and no context is returned.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use campusrag_core::config::Settings;
use campusrag_core::error::{Error, Result};
use campusrag_core::traits::Embedder;
use campusrag_core::types::{CollectionId, Context, Query, RoutingDecision, ScoredPassage};

use crate::assembler::ContextAssembler;
use crate::cancel::CancellationToken;
use crate::degradation::{CollectionReport, CollectionStatus, DegradationController, DegradationState};
use crate::expansion::QueryExpander;
use crate::merger::ResultMerger;
use crate::registry::CollectionRegistry;
use crate::retriever::{CollectionRetrieval, RetrievalStatus, Retriever};
use crate::router::QueryRouter;

/// How the run went, per routed collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalReport {
    pub routing: RoutingDecision,
    pub state: DegradationState,
    pub collections: Vec<CollectionReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PipelineOutcome {
    Answered { context: Context, report: RetrievalReport },
    /// No routed collection produced evidence. The caller should say it has
    /// insufficient information rather than answer.
    FullyDegraded { report: RetrievalReport },
}

impl PipelineOutcome {
    pub fn context(&self) -> Option<&Context> {
        match self {
            PipelineOutcome::Answered { context, .. } => Some(context),
            PipelineOutcome::FullyDegraded { .. } => None,
        }
    }

    pub fn report(&self) -> &RetrievalReport {
        match self {
            PipelineOutcome::Answered { report, .. } | PipelineOutcome::FullyDegraded { report } => report,
        }
    }

    pub fn state(&self) -> DegradationState { self.report().state }
}

pub struct RetrievalPipeline {
    registry: Arc<CollectionRegistry>,
    embedder: Arc<dyn Embedder>,
    expander: QueryExpander,
    router: QueryRouter,
    retriever: Retriever,
    merger: ResultMerger,
    assembler: ContextAssembler,
    degradation: DegradationController,
}

impl RetrievalPipeline {
    pub fn new(registry: Arc<CollectionRegistry>, embedder: Arc<dyn Embedder>, settings: &Settings) -> Self {
        Self {
            registry,
            embedder,
            expander: QueryExpander::new(&settings.expansion),
            router: QueryRouter::new(settings.router.clone()),
            retriever: Retriever::new(settings.retriever.clone()),
            merger: ResultMerger::new(settings.merger.clone()),
            assembler: ContextAssembler::new(settings.assembler.clone()),
            degradation: DegradationController::new(),
        }
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> { &self.registry }

    pub async fn run(&self, query: &Query) -> Result<PipelineOutcome> {
        self.run_with_cancel(query, &CancellationToken::new()).await
    }

    /// Errors only for an empty question or a cancelled run; every
    /// collection-level failure is folded into the outcome.
    pub async fn run_with_cancel(&self, query: &Query, cancel: &CancellationToken) -> Result<PipelineOutcome> {
        let span = info_span!("retrieve", conversation = query.conversation_id.as_deref().unwrap_or("-"));
        self.execute(query, cancel).instrument(span).await
    }

    async fn execute(&self, query: &Query, cancel: &CancellationToken) -> Result<PipelineOutcome> {
        if query.text.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let snapshot = self.registry.snapshot();

        let expanded = self.expander.expand(&query.text);
        let vector = match self.embedder.embed(&expanded) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "query embedding failed");
                None
            }
        };
        let routing = self.router.route(query, &snapshot, vector.as_deref());
        debug!(collections = ?routing.ids().map(|id| id.name()).collect::<Vec<_>>(), selection = ?routing.selection, "routed");

        let Some(vector) = vector else {
            let collections = routing
                .ids()
                .map(|id| CollectionReport { id: id.clone(), status: CollectionStatus::Failed { reason: "query embedding failed".into() } })
                .collect();
            return Ok(self.fully_degraded(routing, collections));
        };
        let vector: Arc<[f32]> = vector.into();

        let mut statuses: Vec<Option<CollectionStatus>> = vec![None; routing.collections.len()];
        let mut per_collection: Vec<(CollectionId, Vec<ScoredPassage>)> = Vec::new();
        let mut set = JoinSet::new();
        for (slot, routed) in routing.collections.iter().enumerate() {
            let Some(collection) = snapshot.get(&routed.id) else {
                warn!(collection = %routed.id, "routed collection is not registered");
                statuses[slot] = Some(CollectionStatus::Missing);
                continue;
            };
            let health = self.registry.health_of(&collection.id);
            let retriever = self.retriever.clone();
            let vector = Arc::clone(&vector);
            set.spawn(async move { (slot, retriever.retrieve(&collection, health, &vector).await) });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    set.abort_all();
                    info!("retrieval cancelled");
                    return Err(Error::Cancelled);
                }
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok((slot, retrieval))) => {
                        let status = Self::absorb(retrieval, &mut per_collection);
                        statuses[slot] = Some(status);
                    }
                    Some(Err(e)) => warn!(error = %e, "retrieval task failed"),
                },
            }
        }

        let collections: Vec<CollectionReport> = routing
            .collections
            .iter()
            .zip(statuses)
            .map(|(routed, status)| CollectionReport {
                id: routed.id.clone(),
                status: status.unwrap_or_else(|| CollectionStatus::Failed { reason: "retrieval task failed".into() }),
            })
            .collect();

        let assessment = self.degradation.assess(&collections);
        if assessment.state == DegradationState::FullyDegraded {
            return Ok(self.fully_degraded(routing, collections));
        }

        let merged = self.merger.merge(per_collection, &routing, |id| snapshot.registration_order(id));
        let candidates: Vec<ScoredPassage> = merged.into_iter().map(|r| r.scored).collect();
        let context = self.degradation.apply(&assessment, self.assembler.assemble(&candidates));

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        info!(
            state = ?assessment.state,
            passages = context.len(),
            size = context.total_size,
            relaxed = context.budget_relaxed,
            "context assembled"
        );
        let report = RetrievalReport { routing, state: assessment.state, collections };
        Ok(PipelineOutcome::Answered { context, report })
    }

    /// Converts one retrieval into a report status, keeping its passages.
    /// Failures count against this request only; health is left to probes.
    fn absorb(retrieval: CollectionRetrieval, per_collection: &mut Vec<(CollectionId, Vec<ScoredPassage>)>) -> CollectionStatus {
        let CollectionRetrieval { id, status, passages, .. } = retrieval;
        match status {
            RetrievalStatus::Responded => {
                let hits = passages.len();
                per_collection.push((id, passages));
                CollectionStatus::Responded { hits }
            }
            RetrievalStatus::Skipped(health) => CollectionStatus::Skipped { health },
            RetrievalStatus::TimedOut => {
                let err = Error::Unavailable { collection: id, reason: "search timed out".into() };
                warn!(error = %err, "collection unavailable for this request");
                CollectionStatus::TimedOut
            }
            RetrievalStatus::Failed(reason) => {
                let err = Error::Unavailable { collection: id, reason: reason.clone() };
                warn!(error = %err, "collection unavailable for this request");
                CollectionStatus::Failed { reason }
            }
        }
    }

    fn fully_degraded(&self, routing: RoutingDecision, collections: Vec<CollectionReport>) -> PipelineOutcome {
        info!(collections = collections.len(), "no evidence in any routed collection");
        PipelineOutcome::FullyDegraded { report: RetrievalReport { routing, state: DegradationState::FullyDegraded, collections } }
    }
}
