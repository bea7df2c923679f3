use crate::types::{ApplicationData, RoadmapData, RoadmapNode};
use std::collections::BTreeMap;

pub const DEFAULT_STEP_TITLE: &str = "Learning Step";
pub const DEFAULT_ESTIMATED_TIME: &str = "Varies";
pub const DEFAULT_STEP_DESCRIPTION: &str = "Description not available";

/// Flattens every roadmap bundle of `application` into leveled nodes.
///
/// Node ids are `{bundle}-{entry}` and are only unique within one call.
pub fn normalize_application_roadmap(application: &ApplicationData) -> Vec<RoadmapNode> {
    application
        .roadmaps()
        .iter()
        .enumerate()
        .flat_map(|(bundle_index, bundle)| normalize_bundle(bundle_index, bundle))
        .collect()
}

/// Concatenates tiers 1, 2 and 3 of `bundle` and levels each entry by the
/// tier it came from.
pub fn normalize_bundle(bundle_index: usize, bundle: &RoadmapData) -> Vec<RoadmapNode> {
    let first = bundle.tier(1).len();
    let second = first + bundle.tier(2).len();

    bundle
        .tier(1)
        .iter()
        .chain(bundle.tier(2))
        .chain(bundle.tier(3))
        .enumerate()
        .map(|(entry_index, entry)| {
            let level = if entry_index < first {
                1
            } else if entry_index < second {
                2
            } else {
                3
            };
            RoadmapNode {
                id: format!("{bundle_index}-{entry_index}"),
                title: entry.field(0).unwrap_or(DEFAULT_STEP_TITLE).to_string(),
                description: entry
                    .field(2)
                    .or_else(|| entry.field(1))
                    .unwrap_or(DEFAULT_STEP_DESCRIPTION)
                    .to_string(),
                level,
                prerequisites: Vec::new(),
                is_completed: None,
                estimated_time: Some(entry.field(1).unwrap_or(DEFAULT_ESTIMATED_TIME).to_string()),
            }
        })
        .collect()
}

/// Buckets `nodes` by level, lowest level first, keeping source order
/// within a bucket.
pub fn group_by_level(nodes: &[RoadmapNode]) -> Vec<(u32, Vec<&RoadmapNode>)> {
    let mut buckets: BTreeMap<u32, Vec<&RoadmapNode>> = BTreeMap::new();
    for node in nodes {
        buckets.entry(node.level).or_default().push(node);
    }
    buckets.into_iter().collect()
}
