use super::{RunWorkflowRequest, WorkflowError, WorkflowResult, WorkflowStateResponse};
use async_trait::async_trait;
use reqwest::Client;

const RUN_WORKFLOW_PATH: &str = "/run_workflow/";
const WORKFLOW_STATE_PATH: &str = "/get_workflow_state/";

/// The two operations the workflow service exposes.
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// Starts a new run. The response body is not used.
    async fn run_workflow(&self, request: &RunWorkflowRequest) -> WorkflowResult<()>;

    /// Fetches the current state of the run.
    async fn get_workflow_state(&self) -> WorkflowResult<WorkflowStateResponse>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl WorkflowBackend for HttpBackend {
    async fn run_workflow(&self, request: &RunWorkflowRequest) -> WorkflowResult<()> {
        let response = self
            .client
            .post(self.url(RUN_WORKFLOW_PATH))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(WorkflowError::Status { status, body })
        }
    }

    async fn get_workflow_state(&self) -> WorkflowResult<WorkflowStateResponse> {
        let response = self.client.get(self.url(WORKFLOW_STATE_PATH)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(WorkflowError::Status { status, body });
        }

        let parsed: WorkflowStateResponse = serde_json::from_str(&body)?;
        if parsed.is_usable() {
            Ok(parsed)
        } else {
            Err(WorkflowError::Backend(
                parsed.message.unwrap_or_else(|| parsed.status.clone()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 8192];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn joins_paths_without_double_slash() {
        let backend = HttpBackend::new("http://localhost:8000/");
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(
            backend.url(WORKFLOW_STATE_PATH),
            "http://localhost:8000/get_workflow_state/"
        );
        assert_eq!(
            backend.url(RUN_WORKFLOW_PATH),
            "http://localhost:8000/run_workflow/"
        );
    }

    #[tokio::test]
    async fn state_fetch_decodes_success() {
        let url = serve_once(
            "200 OK",
            r#"{"status":"success","data":{"last_applications_timestamp":5.0,"concept_applications":{}}}"#,
        )
        .await;
        let response = HttpBackend::new(url).get_workflow_state().await.unwrap();
        assert_eq!(response.status, WorkflowStateResponse::SUCCESS);
        let state = response.data.unwrap();
        assert_eq!(state.last_applications_timestamp, Some(5.0));
    }

    #[tokio::test]
    async fn server_error_is_a_status_failure() {
        let url = serve_once("500 Internal Server Error", r#"{"status":"success"}"#).await;
        let err = HttpBackend::new(url).get_workflow_state().await.unwrap_err();
        match err {
            WorkflowError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(body.contains("success"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_field_is_a_backend_failure() {
        let url = serve_once("200 OK", r#"{"status":"error","message":"pipeline crashed"}"#).await;
        let err = HttpBackend::new(url).get_workflow_state().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Backend(msg) if msg == "pipeline crashed"));
    }

    #[tokio::test]
    async fn garbage_body_is_a_decode_failure() {
        let url = serve_once("200 OK", "<html>not json</html>").await;
        let err = HttpBackend::new(url).get_workflow_state().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Decode(_)));
    }

    #[tokio::test]
    async fn rejected_run_is_a_status_failure() {
        let url = serve_once("404 Not Found", r#"{"detail":"Document not found"}"#).await;
        let request = RunWorkflowRequest {
            file_name: "lecture.pdf".to_string(),
            user_query: "explain FFT".to_string(),
        };
        let err = HttpBackend::new(url).run_workflow(&request).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Status { status, .. } if status == StatusCode::NOT_FOUND
        ));
    }
}
