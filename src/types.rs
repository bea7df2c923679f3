use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Text,
    TextWithImages,
    Roadmap,
    Concepts,
    Applications,
}

/// Typed payload of a transcript entry. The variant is the response type,
/// so a message can never carry a payload that disagrees with it.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    Text,
    TextWithImages,
    Roadmap(Vec<RoadmapNode>),
    Concepts(Vec<ConceptData>),
    Applications(Vec<ApplicationData>),
}

impl ResponseBody {
    pub fn response_type(&self) -> ResponseType {
        match self {
            ResponseBody::Text => ResponseType::Text,
            ResponseBody::TextWithImages => ResponseType::TextWithImages,
            ResponseBody::Roadmap(_) => ResponseType::Roadmap,
            ResponseBody::Concepts(_) => ResponseType::Concepts,
            ResponseBody::Applications(_) => ResponseType::Applications,
        }
    }
}

/// One transcript entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
    /// References to attached images or documents (paths or URLs).
    pub attachments: Vec<String>,
    pub image_captions: Vec<String>,
    pub body: ResponseBody,
    pub is_streaming: bool,
    pub is_loading: bool,
}

impl Message {
    pub fn response_type(&self) -> ResponseType {
        self.body.response_type()
    }
}

/// A flattened learning step, ready for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapNode {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level: u32,
    pub prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConceptData {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub domain: String,
    pub significance: String,
    pub confidence: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationImage {
    pub url: String,
    pub title: String,
    pub thumbnail: String,
    pub context: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_name: Option<String>,
    pub name: String,
    pub brief_description: String,
    pub description: String,
    pub images: Vec<ApplicationImage>,
    #[serde(rename = "RoadmapData", skip_serializing_if = "Option::is_none")]
    pub roadmap_data: Option<Vec<RoadmapData>>,
}

impl ApplicationData {
    /// Roadmap bundles, treating an absent list as empty.
    pub fn roadmaps(&self) -> &[RoadmapData] {
        self.roadmap_data.as_deref().unwrap_or_default()
    }
}

/// One `[title, estimatedTime, description]` entry of a roadmap tier.
///
/// Anything that is not an array of strings/nulls is kept verbatim as
/// `Malformed`; normalization falls back to defaults for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoadmapEntry {
    Step(Vec<Option<String>>),
    Malformed(serde_json::Value),
}

impl RoadmapEntry {
    /// Non-empty string at `index`, if this entry is a well-formed tuple.
    pub fn field(&self, index: usize) -> Option<&str> {
        match self {
            RoadmapEntry::Step(fields) => fields
                .get(index)
                .and_then(|field| field.as_deref())
                .filter(|value| !value.is_empty()),
            RoadmapEntry::Malformed(_) => None,
        }
    }
}

/// Backend encoding of a three-tier learning sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapData {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_1: Option<Vec<RoadmapEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_2: Option<Vec<RoadmapEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_3: Option<Vec<RoadmapEntry>>,
    pub application: String,
    /// Keys the client does not interpret; kept so comparisons stay exact.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RoadmapData {
    /// Entries of tier 1, 2 or 3. Missing tiers read as empty.
    pub fn tier(&self, tier: u32) -> &[RoadmapEntry] {
        let entries = match tier {
            1 => &self.description_1,
            2 => &self.description_2,
            3 => &self.description_3,
            _ => &None,
        };
        entries.as_deref().unwrap_or_default()
    }
}

/// Applications grouped by concept name, in the order the backend listed
/// the concepts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConceptApplications {
    entries: Vec<(String, Vec<ApplicationData>)>,
}

impl ConceptApplications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the list for `concept`, keeping its original
    /// position when it already exists.
    pub fn insert(&mut self, concept: impl Into<String>, applications: Vec<ApplicationData>) {
        let concept = concept.into();
        if let Some(slot) = self.entries.iter_mut().find(|(name, _)| *name == concept) {
            slot.1 = applications;
        } else {
            self.entries.push((concept, applications));
        }
    }

    pub fn get(&self, concept: &str) -> Option<&[ApplicationData]> {
        self.entries
            .iter()
            .find(|(name, _)| name == concept)
            .map(|(_, apps)| apps.as_slice())
    }

    pub fn get_mut(&mut self, concept: &str) -> Option<&mut Vec<ApplicationData>> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == concept)
            .map(|(_, apps)| apps)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ApplicationData])> {
        self.entries
            .iter()
            .map(|(name, apps)| (name.as_str(), apps.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All applications in concept order, then list order.
    pub fn flatten(&self) -> Vec<ApplicationData> {
        self.entries
            .iter()
            .flat_map(|(_, apps)| apps.iter().cloned())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<ApplicationData>)> for ConceptApplications {
    fn from_iter<I: IntoIterator<Item = (S, Vec<ApplicationData>)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (concept, apps) in iter {
            map.insert(concept, apps);
        }
        map
    }
}

impl Serialize for ConceptApplications {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (concept, apps) in &self.entries {
            map.serialize_entry(concept, apps)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConceptApplications {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = ConceptApplications;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of concept names to application lists")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ConceptApplications::new())
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = ConceptApplications::new();
                while let Some((concept, apps)) =
                    access.next_entry::<String, Option<Vec<ApplicationData>>>()?
                {
                    map.insert(concept, apps.unwrap_or_default());
                }
                Ok(map)
            }
        }

        deserializer.deserialize_any(OrderedVisitor)
    }
}
