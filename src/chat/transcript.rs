use super::roadmap::normalize_application_roadmap;
use crate::types::{
    ApplicationData, ConceptApplications, ConceptData, Message, ResponseBody, Role,
};
use crate::workflow::WorkflowUpdate;
use time::OffsetDateTime;

pub const FINDING_APPLICATIONS: &str = "Finding real-world applications...";
pub const APPLICATIONS_READY: &str = "Here are real-world applications:";
pub const CONCEPTS_READY: &str = "Here are the key concepts:";
pub const GENERIC_ERROR: &str =
    "Sorry, there was an error processing your request. Please try again.";

/// Ids reserved for the query currently being answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTurn {
    pub user_id: String,
    pub applications_id: String,
    pub concepts_id: Option<String>,
}

/// Append-only, insertion-ordered list of chat messages.
///
/// Messages are updated in place by id and never removed.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    pending: Option<PendingTurn>,
    sequence: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|msg| msg.id == id)
    }

    pub fn pending(&self) -> Option<&PendingTurn> {
        self.pending.as_ref()
    }

    pub fn has_assistant_messages(&self) -> bool {
        self.messages.iter().any(|msg| msg.role == Role::Assistant)
    }

    /// Records the user's input and reserves a loading applications entry
    /// right behind it.
    pub fn send(&mut self, content: &str, attachments: Vec<String>) -> PendingTurn {
        let user_id = self.next_id();
        self.messages.push(Message {
            attachments,
            ..new_message(user_id.clone(), Role::User, content, ResponseBody::Text)
        });

        let applications_id = format!("{}-applications", self.next_id());
        self.messages.push(Message {
            is_loading: true,
            ..new_message(
                applications_id.clone(),
                Role::Assistant,
                FINDING_APPLICATIONS,
                ResponseBody::Applications(Vec::new()),
            )
        });

        let turn = PendingTurn {
            user_id,
            applications_id,
            concepts_id: None,
        };
        self.pending = Some(turn.clone());
        turn
    }

    /// Routes a poll notification to the current turn. Returns the id of
    /// the entry it touched.
    pub fn apply_update(&mut self, update: &WorkflowUpdate) -> Option<String> {
        match update {
            WorkflowUpdate::Concepts { concepts, .. } => Some(self.apply_concepts(concepts)),
            WorkflowUpdate::Applications { applications, .. } => {
                let id = self.pending.as_ref()?.applications_id.clone();
                self.apply_applications(&id, applications).then_some(id)
            }
        }
    }

    /// Replaces the applications entry `id` with the flattened results.
    /// The entry keeps loading until at least one application arrived.
    pub fn apply_applications(&mut self, id: &str, applications: &ConceptApplications) -> bool {
        let flattened = applications.flatten();
        let Some(msg) = self.get_mut(id) else {
            return false;
        };
        msg.is_loading = flattened.is_empty();
        msg.content = if flattened.is_empty() {
            FINDING_APPLICATIONS
        } else {
            APPLICATIONS_READY
        }
        .to_string();
        msg.body = ResponseBody::Applications(flattened);
        true
    }

    /// Shows the latest concepts, appending the entry on first use and
    /// updating it in place afterwards.
    pub fn apply_concepts(&mut self, concepts: &[ConceptData]) -> String {
        let existing = self
            .pending
            .as_ref()
            .and_then(|turn| turn.concepts_id.clone());

        if let Some(id) = existing
            && let Some(msg) = self.get_mut(&id)
        {
            msg.body = ResponseBody::Concepts(concepts.to_vec());
            return id;
        }

        let id = format!("{}-concepts", self.next_id());
        self.messages.push(new_message(
            id.clone(),
            Role::Assistant,
            CONCEPTS_READY,
            ResponseBody::Concepts(concepts.to_vec()),
        ));
        if let Some(turn) = self.pending.as_mut() {
            turn.concepts_id = Some(id.clone());
        }
        id
    }

    /// Ends the loading state of a placeholder whose run could not be
    /// started. Does nothing once results have arrived for it.
    pub fn fail_placeholder(&mut self, id: &str) -> bool {
        let Some(msg) = self.get_mut(id) else {
            return false;
        };
        let has_results = matches!(&msg.body, ResponseBody::Applications(apps) if !apps.is_empty());
        if has_results || !msg.is_loading {
            return false;
        }
        msg.is_loading = false;
        msg.content = GENERIC_ERROR.to_string();
        true
    }

    pub fn push_error(&mut self) -> String {
        self.push_assistant_text(GENERIC_ERROR.to_string())
    }

    /// Appends the learning roadmap of `application`.
    pub fn open_application(&mut self, application: &ApplicationData) -> String {
        let id = self.next_id();
        self.messages.push(new_message(
            id.clone(),
            Role::Assistant,
            &format!("Here's the learning roadmap for {}:", application.name),
            ResponseBody::Roadmap(normalize_application_roadmap(application)),
        ));
        id
    }

    pub fn explain_concept(&mut self, concept: &ConceptData) -> String {
        self.push_assistant_text(format!(
            "Let me explain more about \"{}\" in the {} domain...",
            concept.name, concept.domain
        ))
    }

    pub fn explain_roadmap_step(&mut self, node_id: &str, title: &str) -> String {
        tracing::debug!(node_id, title, "roadmap step selected");
        self.push_assistant_text(format!(
            "Let me explain more about \"{title}\"...\n\nThis is a crucial step in your learning journey. Here are the key concepts you need to master and resources to get started."
        ))
    }

    fn push_assistant_text(&mut self, content: String) -> String {
        let id = self.next_id();
        self.messages.push(new_message(
            id.clone(),
            Role::Assistant,
            &content,
            ResponseBody::Text,
        ));
        id
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|msg| msg.id == id)
    }

    fn next_id(&mut self) -> String {
        self.sequence += 1;
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        format!("{millis}-{}", self.sequence)
    }
}

fn new_message(id: String, role: Role, content: &str, body: ResponseBody) -> Message {
    Message {
        id,
        content: content.to_string(),
        role,
        created_at: OffsetDateTime::now_utc(),
        attachments: Vec::new(),
        image_captions: Vec::new(),
        body,
        is_streaming: false,
        is_loading: false,
    }
}
