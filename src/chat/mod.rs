//! Conversation state: turns workflow results into transcript entries.

pub mod roadmap;
mod transcript;

pub use roadmap::{group_by_level, normalize_application_roadmap, normalize_bundle};
pub use transcript::{
    APPLICATIONS_READY, CONCEPTS_READY, FINDING_APPLICATIONS, GENERIC_ERROR, PendingTurn,
    Transcript,
};
