use super::WorkflowState;
use super::diff::applications_changed;
use crate::types::{ConceptApplications, ConceptData};

/// What the client has already reacted to for the current query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PollCursor {
    pub concepts_timestamp: f64,
    pub applications_timestamp: f64,
    pub applications: ConceptApplications,
}

/// Notifications owed for one fetched state, in firing order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reconciliation {
    pub concepts: Option<(Vec<ConceptData>, f64)>,
    pub applications: Option<(ConceptApplications, f64)>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.concepts.is_none() && self.applications.is_none()
    }
}

impl PollCursor {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Compares `state` against what was last seen and advances the cursor.
    ///
    /// `now_ms` stamps an applications update that was detected only through
    /// roadmap content, since the backend timestamp did not move.
    pub fn reconcile(&mut self, state: &WorkflowState, now_ms: f64) -> Reconciliation {
        let mut outcome = Reconciliation::default();

        if let Some(stamp) = state.last_relevant_concepts_timestamp
            && stamp > self.concepts_timestamp
        {
            outcome.concepts = Some((state.relevant_concepts.clone(), stamp));
            self.concepts_timestamp = stamp;
        }

        let advanced = state
            .last_applications_timestamp
            .filter(|stamp| *stamp > self.applications_timestamp);
        let content_changed =
            advanced.is_some() || applications_changed(&state.concept_applications, &self.applications);

        if content_changed {
            let stamp = match advanced {
                Some(stamp) => {
                    self.applications_timestamp = stamp;
                    stamp
                }
                None => now_ms,
            };
            outcome.applications = Some((state.concept_applications.clone(), stamp));
            self.applications = state.concept_applications.clone();
        }

        outcome
    }
}
