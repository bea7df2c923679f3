use crate::types::{ConceptApplications, ConceptData};
use serde::{Deserialize, Serialize};

/// What the user asked, plus the name of an attached file if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkflowQuery {
    pub content: String,
    pub file_name: Option<String>,
}

impl WorkflowQuery {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            file_name: None,
        }
    }

    pub fn with_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// Body of `POST /run_workflow/`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunWorkflowRequest {
    /// Empty when nothing is attached
    pub file_name: String,
    pub user_query: String,
}

impl From<&WorkflowQuery> for RunWorkflowRequest {
    fn from(query: &WorkflowQuery) -> Self {
        Self {
            file_name: query.file_name.clone().unwrap_or_default(),
            user_query: query.content.clone(),
        }
    }
}

/// Envelope returned by `GET /get_workflow_state/`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowStateResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<WorkflowState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WorkflowStateResponse {
    pub const SUCCESS: &'static str = "success";
    pub const NOT_FOUND: &'static str = "not_found";

    pub fn success(state: WorkflowState) -> Self {
        Self {
            status: Self::SUCCESS.to_string(),
            data: Some(state),
            message: None,
        }
    }

    /// True for `success` and for `not_found` (the run has not written any
    /// state yet). Anything else is a backend-side failure.
    pub fn is_usable(&self) -> bool {
        self.status == Self::SUCCESS || self.status == Self::NOT_FOUND
    }
}

/// Snapshot of a workflow run. Only the timestamps, concepts and
/// applications drive the client; the rest is carried for callers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    pub uuid: String,
    pub document_path: String,
    pub text_input: String,
    pub user_metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_relevant_concepts_timestamp: Option<f64>,
    pub relevant_concepts: Vec<ConceptData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applications_timestamp: Option<f64>,
    pub concept_applications: ConceptApplications,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_empty_file_name_without_attachment() {
        let request = RunWorkflowRequest::from(&WorkflowQuery::new("explain FFT"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"file_name": "", "user_query": "explain FFT"})
        );

        let request =
            RunWorkflowRequest::from(&WorkflowQuery::new("summarize").with_file("notes.pdf"));
        assert_eq!(request.file_name, "notes.pdf");
    }

    #[test]
    fn parses_full_state() {
        let response: WorkflowStateResponse = serde_json::from_value(json!({
            "status": "success",
            "data": {
                "uuid": "uuid_temporary",
                "document_path": "tmp/fft.pdf",
                "text_input": "explain FFT",
                "user_metadata": {"background": "student"},
                "last_relevant_concepts_timestamp": 1718000000.25,
                "relevant_concepts": [
                    {"name": "FFT", "type": "algorithm", "domain": "DSP",
                     "significance": "fast", "confidence": 0.9}
                ],
                "last_applications_timestamp": 5,
                "concept_applications": {"FFT": [{"name": "Audio EQ"}]},
                "error": null
            }
        }))
        .unwrap();

        assert!(response.is_usable());
        let state = response.data.unwrap();
        assert_eq!(state.last_relevant_concepts_timestamp, Some(1718000000.25));
        assert_eq!(state.last_applications_timestamp, Some(5.0));
        assert_eq!(state.relevant_concepts[0].kind, "algorithm");
        assert_eq!(state.concept_applications.get("FFT").unwrap()[0].name, "Audio EQ");
    }

    #[test]
    fn parses_not_found_envelope() {
        let response: WorkflowStateResponse = serde_json::from_value(json!({
            "status": "not_found",
            "message": "Workflow state file not found: tmp/workflow_state.json"
        }))
        .unwrap();
        assert!(response.is_usable());
        assert!(response.data.is_none());
    }

    #[test]
    fn partial_state_uses_defaults() {
        let state: WorkflowState =
            serde_json::from_value(json!({"relevant_concepts": []})).unwrap();
        assert!(state.last_applications_timestamp.is_none());
        assert!(state.concept_applications.is_empty());
    }
}
