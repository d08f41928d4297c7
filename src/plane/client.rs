use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::USER_AGENT;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use super::{IssueTracker, ResolvedIssue, TrackerError};
use crate::references::IssueId;

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Clone)]
pub struct PlaneClient {
    token: SecretString,
    client: Client,
    api_url: String,
}

#[derive(Debug, serde::Deserialize)]
struct IssueResponse {
    id: Option<String>,
    project: Option<String>,
}

impl PlaneClient {
    /// `timeout` bounds every request, from connecting to reading the body.
    pub fn new(token: SecretString, api_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build the Plane HTTP client")?;
        Ok(PlaneClient {
            client,
            token,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Lists the projects of a workspace.
    ///
    /// Mostly useful to check that the token and workspace are valid.
    pub async fn projects(&self, workspace: &str) -> Result<serde_json::Value, TrackerError> {
        let url = format!("{}/api/v1/workspaces/{workspace}/projects/", self.api_url);
        let (status, body) = self.send_req(self.get(&url)).await?;
        if status != StatusCode::OK {
            return Err(status_error(status, &body));
        }
        serde_json::from_slice(&body)
            .context("failed to deserialize project list")
            .map_err(TrackerError::Request)
    }

    async fn send_req(&self, req: RequestBuilder) -> Result<(StatusCode, Bytes), TrackerError> {
        let req_dbg = format!("{req:?}");
        tracing::debug!("send_req with {req_dbg}");
        let resp = req
            .send()
            .await
            .with_context(|| format!("sending {req_dbg}"))
            .map_err(TrackerError::Request)?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read response body {req_dbg}"))
            .map_err(TrackerError::Request)?;
        tracing::debug!("{req_dbg} answered {status}");
        Ok((status, body))
    }

    fn get(&self, url: &str) -> RequestBuilder {
        tracing::trace!("get {:?}", url);
        self.client.get(url).configure(self)
    }

    fn post(&self, url: &str) -> RequestBuilder {
        tracing::trace!("post {:?}", url);
        self.client.post(url).configure(self)
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> TrackerError {
    if status == StatusCode::NOT_FOUND {
        return TrackerError::NotFound;
    }
    TrackerError::Status {
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

#[async_trait]
impl IssueTracker for PlaneClient {
    async fn resolve_issue(
        &self,
        workspace: &str,
        issue: &IssueId,
    ) -> Result<ResolvedIssue, TrackerError> {
        let url = format!("{}/api/v1/workspaces/{workspace}/issues/{issue}/", self.api_url);
        let (status, body) = self.send_req(self.get(&url)).await?;
        if status != StatusCode::OK {
            return Err(status_error(status, &body));
        }
        let issue: IssueResponse = serde_json::from_slice(&body)
            .with_context(|| format!("failed to deserialize issue {issue}"))
            .map_err(TrackerError::Request)?;
        Ok(ResolvedIssue {
            issue_uuid: issue.id.ok_or(TrackerError::IncompleteIssue("id"))?,
            project_id: issue.project.ok_or(TrackerError::IncompleteIssue("project"))?,
        })
    }

    async fn post_comment(
        &self,
        workspace: &str,
        project_id: &str,
        issue_uuid: &str,
        comment_html: &str,
    ) -> Result<(), TrackerError> {
        let url = format!(
            "{}/api/v1/workspaces/{workspace}/projects/{project_id}/issues/{issue_uuid}/comments/",
            self.api_url
        );
        let req = self
            .post(&url)
            .json(&serde_json::json!({ "comment_html": comment_html }));
        let (status, body) = self.send_req(req).await?;
        if status != StatusCode::CREATED {
            return Err(status_error(status, &body));
        }
        Ok(())
    }
}

trait RequestSend: Sized {
    fn configure(self, client: &PlaneClient) -> Self;
}

impl RequestSend for RequestBuilder {
    fn configure(self, client: &PlaneClient) -> RequestBuilder {
        let mut key = reqwest::header::HeaderValue::from_str(client.token.expose_secret())
            .unwrap_or_else(|_| reqwest::header::HeaderValue::from_static(""));
        key.set_sensitive(true);
        self.header(USER_AGENT, "gitea-plane-bridge")
            .header(API_KEY_HEADER, key)
    }
}
