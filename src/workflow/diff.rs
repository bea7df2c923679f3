use crate::types::{ConceptApplications, RoadmapData};

/// Whether roadmap content moved between two fetches of the same application.
///
/// Empty on both sides is unchanged; empty on exactly one side, a length
/// difference, or any order-sensitive field difference is a change.
pub fn roadmap_data_changed(current: &[RoadmapData], cached: &[RoadmapData]) -> bool {
    match (current.is_empty(), cached.is_empty()) {
        (true, true) => false,
        (false, false) => current.len() != cached.len() || current != cached,
        _ => true,
    }
}

/// Scans `current` in concept order and reports the first application that
/// is new or whose roadmap content differs from `cached` at the same index.
///
/// Applications that disappeared from `current` are not a change here; the
/// backend timestamp covers removals.
pub fn applications_changed(current: &ConceptApplications, cached: &ConceptApplications) -> bool {
    current.iter().any(|(concept, apps)| {
        let previous = cached.get(concept).unwrap_or_default();
        apps.iter().enumerate().any(|(index, app)| match previous.get(index) {
            None => {
                tracing::debug!(concept, application = %app.name, "new application");
                true
            }
            Some(last) => {
                let changed = roadmap_data_changed(app.roadmaps(), last.roadmaps());
                if changed {
                    tracing::debug!(concept, application = %app.name, "roadmap data updated");
                }
                changed
            }
        })
    })
}
