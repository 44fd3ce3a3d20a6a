//! Per-request degradation policy over the collections a query was routed to.

use serde::Serialize;

use campusrag_core::types::{CollectionId, Context, Coverage, HealthStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationState {
    /// Every selected collection responded.
    Normal,
    /// Some selected collections were missing, empty or unresponsive, but at
    /// least one produced evidence.
    PartialDegraded,
    /// No selected collection produced evidence.
    FullyDegraded,
}

/// What happened to one routed collection during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CollectionStatus {
    Responded { hits: usize },
    /// Routed but not registered.
    Missing,
    Skipped { health: HealthStatus },
    TimedOut,
    Failed { reason: String },
}

impl CollectionStatus {
    pub fn is_responsive(&self) -> bool { matches!(self, CollectionStatus::Responded { .. }) }

    pub fn hits(&self) -> usize {
        match self {
            CollectionStatus::Responded { hits } => *hits,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub id: CollectionId,
    #[serde(flatten)]
    pub status: CollectionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub state: DegradationState,
    /// Routed collections that did not respond, in routing order.
    pub missing: Vec<CollectionId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DegradationController;

impl DegradationController {
    pub fn new() -> Self { Self }

    pub fn assess(&self, reports: &[CollectionReport]) -> Assessment {
        let missing: Vec<CollectionId> = reports.iter().filter(|r| !r.status.is_responsive()).map(|r| r.id.clone()).collect();
        let hits: usize = reports.iter().map(|r| r.status.hits()).sum();
        let state = if hits == 0 {
            DegradationState::FullyDegraded
        } else if missing.is_empty() {
            DegradationState::Normal
        } else {
            DegradationState::PartialDegraded
        };
        Assessment { state, missing }
    }

    /// Flags a context built from a partially degraded run.
    pub fn apply(&self, assessment: &Assessment, mut context: Context) -> Context {
        if assessment.state == DegradationState::PartialDegraded {
            context.coverage = Coverage::Partial;
            context.missing_collections = assessment.missing.clone();
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, status: CollectionStatus) -> CollectionReport {
        CollectionReport { id: CollectionId::from_name(name), status }
    }

    fn empty_context() -> Context {
        Context { passages: vec![], total_size: 0, coverage: Coverage::Full, budget_relaxed: false, missing_collections: vec![] }
    }

    #[test]
    fn all_responding_is_normal() {
        let a = DegradationController::new().assess(&[
            report("general", CollectionStatus::Responded { hits: 3 }),
            report("cse", CollectionStatus::Responded { hits: 0 }),
        ]);
        assert_eq!(a.state, DegradationState::Normal);
        assert!(a.missing.is_empty());
    }

    #[test]
    fn unavailable_department_is_partial() {
        let controller = DegradationController::new();
        let a = controller.assess(&[
            report("general", CollectionStatus::Responded { hits: 2 }),
            report("law", CollectionStatus::Skipped { health: HealthStatus::Unavailable }),
        ]);
        assert_eq!(a.state, DegradationState::PartialDegraded);
        let ctx = controller.apply(&a, empty_context());
        assert_eq!(ctx.coverage, Coverage::Partial);
        assert_eq!(ctx.missing_collections, vec![CollectionId::department("law")]);
    }

    #[test]
    fn no_evidence_anywhere_is_fully_degraded() {
        let a = DegradationController::new().assess(&[
            report("general", CollectionStatus::TimedOut),
            report("law", CollectionStatus::Failed { reason: "io".into() }),
            report("astro", CollectionStatus::Missing),
        ]);
        assert_eq!(a.state, DegradationState::FullyDegraded);
        assert_eq!(a.missing.len(), 3);
        assert_eq!(DegradationController::new().assess(&[]).state, DegradationState::FullyDegraded);
    }

    #[test]
    fn report_serializes_flat() {
        let json = serde_json::to_value(report("law", CollectionStatus::Skipped { health: HealthStatus::Empty })).unwrap();
        assert_eq!(json, serde_json::json!({"id": "law", "status": "skipped", "health": "empty"}));
    }
}
