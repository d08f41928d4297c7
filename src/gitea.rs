//! Gitea pull request webhook payloads.
//!
//! Only the fields this service reads are modeled. They are all optional at
//! the serde level so that an absent field can be reported by name through
//! [`PullRequestPayload::into_event`].

use std::fmt;

pub mod webhook;

#[derive(Debug, Default, serde::Deserialize)]
pub struct PullRequestPayload {
    pub action: Option<String>,
    pub pull_request: Option<PullRequestFields>,
    pub sender: Option<SenderFields>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct PullRequestFields {
    pub url: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub merged: Option<bool>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct SenderFields {
    pub login: Option<String>,
    pub email: Option<String>,
}

/// A validated pull request event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub action: String,
    pub merged: bool,
    pub title: String,
    pub body: String,
    /// Canonical URL of the pull request, used to correlate repeated events.
    pub pr_link: String,
    pub sender_name: String,
    pub sender_email: String,
}

/// A required payload field was absent (or `null`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub &'static str);

impl std::error::Error for MissingField {}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Missing required field: {}", self.0)
    }
}

impl PullRequestPayload {
    pub fn into_event(self) -> Result<PullRequestEvent, MissingField> {
        let action = self.action.ok_or(MissingField("action"))?;
        let pr = self.pull_request.unwrap_or_default();
        let pr_link = pr.url.ok_or(MissingField("pull_request.url"))?;
        let body = pr.body.ok_or(MissingField("pull_request.body"))?;
        let title = pr.title.ok_or(MissingField("pull_request.title"))?;
        let sender = self.sender.unwrap_or_default();
        let sender_name = sender.login.ok_or(MissingField("sender.login"))?;
        let sender_email = sender.email.ok_or(MissingField("sender.email"))?;
        Ok(PullRequestEvent {
            action,
            merged: pr.merged.unwrap_or(false),
            title,
            body,
            pr_link,
            sender_name,
            sender_email,
        })
    }
}
