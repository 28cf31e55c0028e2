use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use url::Url;
use wallbatch_core::{BatchRequest, JobHandle, Operation, StatusReply};

use crate::{EngineError, EngineSettings, SubmitError};

/// Immediate classification of a successful submit call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The service finished synchronously; the body is the final result.
    Immediate(Value),
    /// The service queued the job and will report through the status endpoint.
    Accepted(JobHandle),
}

/// The remote worker service.
#[async_trait::async_trait]
pub trait BatchService: Send + Sync {
    async fn submit(&self, request: &BatchRequest) -> Result<SubmitOutcome, SubmitError>;

    /// One status check. Never fails: problems come back as
    /// [`StatusReply::Unreachable`] so the poller can retry them.
    async fn status(&self, operation: Operation, job_id: &str) -> StatusReply;
}

#[derive(Debug, Clone)]
pub struct ReqwestService {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestService {
    pub fn new(settings: &EngineSettings) -> Result<Self, EngineError> {
        let base_url = parse_base_url(&settings.base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| EngineError::Client(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn status_url(&self, operation: Operation, job_id: &str) -> Result<Url, String> {
        let mut url = self
            .base_url
            .join(operation.status_prefix())
            .map_err(|err| err.to_string())?;
        url.path_segments_mut()
            .map_err(|()| "base url cannot carry a path".to_string())?
            .pop_if_empty()
            .push(job_id);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl BatchService for ReqwestService {
    async fn submit(&self, request: &BatchRequest) -> Result<SubmitOutcome, SubmitError> {
        let url = self
            .base_url
            .join(request.operation().submit_path())
            .map_err(|err| SubmitError::Transport(err.to_string()))?;
        let body = serde_json::to_vec(&request.body())
            .map_err(|err| SubmitError::Malformed(err.to_string()))?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| SubmitError::Transport(describe_reqwest_error(&err)))?;

        let status = response.status().as_u16();
        let content_type = content_type_of(&response);
        let text = response
            .text()
            .await
            .map_err(|err| SubmitError::Transport(describe_reqwest_error(&err)))?;

        classify_submit_response(status, content_type.as_deref(), &text, request)
    }

    async fn status(&self, operation: Operation, job_id: &str) -> StatusReply {
        let url = match self.status_url(operation, job_id) {
            Ok(url) => url,
            Err(reason) => return StatusReply::Unreachable { reason },
        };

        let response = match self.client.get(url).header(ACCEPT, "application/json").send().await {
            Ok(response) => response,
            Err(err) => {
                return StatusReply::Unreachable {
                    reason: describe_reqwest_error(&err),
                }
            }
        };

        let status = response.status().as_u16();
        let content_type = content_type_of(&response);
        match response.text().await {
            Ok(text) => classify_status_response(status, content_type.as_deref(), &text),
            Err(err) => StatusReply::Unreachable {
                reason: describe_reqwest_error(&err),
            },
        }
    }
}

/// Classifies the submit reply.
///
/// Error bodies are read as text first; JSON `error`/`message` fields are
/// used when present, otherwise the raw text itself is the reason.
pub fn classify_submit_response(
    status: u16,
    content_type: Option<&str>,
    body: &str,
    request: &BatchRequest,
) -> Result<SubmitOutcome, SubmitError> {
    if !(200..300).contains(&status) {
        return Err(SubmitError::Status {
            status,
            reason: error_reason(status, body),
        });
    }

    if !content_type.is_some_and(is_json_content_type) {
        return Err(SubmitError::NonJson {
            status,
            content_type: content_type.unwrap_or("<none>").to_string(),
        });
    }

    let value: Value =
        serde_json::from_str(body).map_err(|err| SubmitError::Malformed(err.to_string()))?;

    if value.get("status").and_then(Value::as_str) == Some("processing") {
        let job_id = value
            .get("requestId")
            .and_then(job_id_text)
            .ok_or_else(|| SubmitError::Malformed("processing reply without requestId".into()))?;
        return Ok(SubmitOutcome::Accepted(request.job_handle(job_id)));
    }

    Ok(SubmitOutcome::Immediate(value))
}

/// Classifies a status reply. Every problem is transient.
pub fn classify_status_response(status: u16, content_type: Option<&str>, body: &str) -> StatusReply {
    if !(200..300).contains(&status) {
        return StatusReply::Unreachable {
            reason: format!("HTTP {status}"),
        };
    }
    if !content_type.is_some_and(is_json_content_type) {
        return StatusReply::Unreachable {
            reason: format!(
                "non-JSON status reply ({})",
                content_type.unwrap_or("<none>")
            ),
        };
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => StatusReply::from_body(&value),
        Err(err) => StatusReply::Unreachable {
            reason: err.to_string(),
        },
    }
}

/// Failure reason from a non-2xx body that may or may not be JSON.
pub fn error_reason(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("HTTP {status}");
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|value| {
            let obj = value.as_object()?;
            ["error", "message"].iter().find_map(|key| {
                obj.get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(ToOwned::to_owned)
            })
        })
        .unwrap_or_else(|| trimmed.to_string())
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    mime.eq_ignore_ascii_case("application/json")
        || mime.to_ascii_lowercase().ends_with("+json")
}

fn job_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn content_type_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return format!("timed out: {err}");
    }
    if err.is_connect() {
        return format!("connection failed: {err}");
    }
    err.to_string()
}

fn parse_base_url(raw: &str) -> Result<Url, EngineError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let invalid = |message: String| EngineError::InvalidBaseUrl {
        url: raw.to_string(),
        message,
    };
    let url = Url::parse(&normalized).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("url cannot be a base".to_string()));
    }
    Ok(url)
}
