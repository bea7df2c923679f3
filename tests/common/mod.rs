//! Shared fixtures: a scripted in-process backend and workflow states.
#![allow(dead_code)]

use async_trait::async_trait;
use motivaty::types::{ApplicationData, ConceptApplications, ConceptData, RoadmapData, RoadmapEntry};
use motivaty::workflow::{
    RunWorkflowRequest, WorkflowBackend, WorkflowError, WorkflowResult, WorkflowState,
    WorkflowStateResponse,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One scripted answer to `get_workflow_state`.
pub enum Step {
    Respond(WorkflowStateResponse),
    Fail,
}

/// Backend that replays a script of responses. Once the script runs out it
/// keeps returning the last successful response.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<WorkflowStateResponse>>,
    fetches: AtomicUsize,
    submissions: Mutex<Vec<RunWorkflowRequest>>,
    fail_submissions: AtomicBool,
    gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    /// Every fetch waits for `gate` to be notified before answering.
    pub fn gated(script: Vec<Step>, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            gate: Some(gate),
            ..Default::default()
        })
    }

    pub fn failing_submissions(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fail_submissions: AtomicBool::new(true),
            ..Default::default()
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<RunWorkflowRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowBackend for ScriptedBackend {
    async fn run_workflow(&self, request: &RunWorkflowRequest) -> WorkflowResult<()> {
        self.submissions.lock().unwrap().push(request.clone());
        if self.fail_submissions.load(Ordering::SeqCst) {
            Err(WorkflowError::Backend("Document not found".to_string()))
        } else {
            Ok(())
        }
    }

    async fn get_workflow_state(&self) -> WorkflowResult<WorkflowStateResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(response)) => {
                *self.last.lock().unwrap() = Some(response.clone());
                Ok(response)
            }
            Some(Step::Fail) => Err(WorkflowError::Backend("connection refused".to_string())),
            None => Ok(self.last.lock().unwrap().clone().unwrap_or_else(|| {
                WorkflowStateResponse {
                    status: WorkflowStateResponse::NOT_FOUND.to_string(),
                    data: None,
                    message: Some("Workflow state file not found".to_string()),
                }
            })),
        }
    }
}

pub fn concept(name: &str) -> ConceptData {
    ConceptData {
        name: name.to_string(),
        kind: "algorithm".to_string(),
        domain: "signal processing".to_string(),
        significance: "Computes the DFT in O(n log n)".to_string(),
        confidence: 0.92,
    }
}

fn step(title: &str) -> RoadmapEntry {
    RoadmapEntry::Step(vec![
        Some(title.to_string()),
        Some("2 weeks".to_string()),
        Some(format!("Learn {title}")),
    ])
}

/// `{"FFT": [Audio EQ]}` whose single roadmap has `tier_two` tier-2 steps.
pub fn fft_applications(tier_two: usize) -> ConceptApplications {
    let app = ApplicationData {
        name: "Audio EQ".to_string(),
        brief_description: "Shape frequencies in real time".to_string(),
        roadmap_data: Some(vec![RoadmapData {
            title: "Audio EQ".to_string(),
            description_1: Some(vec![step("Complex numbers"), step("Sampling")]),
            description_2: Some((0..tier_two).map(|i| step(&format!("DFT part {i}"))).collect()),
            description_3: Some(vec![step("FFT")]),
            application: "Audio EQ".to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };
    [("FFT", vec![app])].into_iter().collect()
}

pub fn applications_state(timestamp: f64, applications: ConceptApplications) -> Step {
    Step::Respond(WorkflowStateResponse::success(WorkflowState {
        last_applications_timestamp: Some(timestamp),
        concept_applications: applications,
        ..Default::default()
    }))
}

pub fn full_state(
    concepts_timestamp: f64,
    applications_timestamp: f64,
    applications: ConceptApplications,
) -> Step {
    Step::Respond(WorkflowStateResponse::success(WorkflowState {
        last_relevant_concepts_timestamp: Some(concepts_timestamp),
        relevant_concepts: vec![concept("FFT")],
        last_applications_timestamp: Some(applications_timestamp),
        concept_applications: applications,
        ..Default::default()
    }))
}
