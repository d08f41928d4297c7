//! Access to the Plane issue tracker.
//!
//! [`IssueTracker`] is what the rest of the service talks to; [`PlaneClient`]
//! implements it against the Plane REST API.

use std::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::references::IssueId;

pub mod client;

pub use client::PlaneClient;

/// Internal identifiers of an issue, needed to address its comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIssue {
    pub issue_uuid: String,
    pub project_id: String,
}

#[derive(Debug)]
pub enum TrackerError {
    NotFound,
    /// The tracker answered with an unexpected status code.
    Status { status: StatusCode, body: String },
    /// The issue was found but lacks a field needed to comment on it.
    IncompleteIssue(&'static str),
    Request(anyhow::Error),
}

impl std::error::Error for TrackerError {}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackerError::NotFound => write!(f, "issue not found"),
            TrackerError::Status { status, body } => {
                write!(f, "unexpected response {status}: {body}")
            }
            TrackerError::IncompleteIssue(field) => {
                write!(f, "issue response is missing `{field}`")
            }
            TrackerError::Request(e) => write!(f, "request failed: {e:#}"),
        }
    }
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Maps a short identifier like `WEB-28` to the issue's internal ids.
    async fn resolve_issue(
        &self,
        workspace: &str,
        issue: &IssueId,
    ) -> Result<ResolvedIssue, TrackerError>;

    /// Creates a comment on an issue. Succeeds only if the comment was created.
    async fn post_comment(
        &self,
        workspace: &str,
        project_id: &str,
        issue_uuid: &str,
        comment_html: &str,
    ) -> Result<(), TrackerError>;
}
