//! Posts one comment per targeted issue and collects the outcome of each.

use std::collections::BTreeSet;
use std::fmt;

use futures::future::join_all;

use crate::plane::{IssueTracker, TrackerError};
use crate::references::IssueId;

#[derive(Debug)]
pub enum DispatchError {
    /// The identifier could not be mapped to a tracker issue.
    Resolution(TrackerError),
    /// The issue was found but the comment was not created.
    Post(TrackerError),
}

impl std::error::Error for DispatchError {}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DispatchError::Resolution(e) => write!(f, "failed to resolve issue: {e}"),
            DispatchError::Post(e) => write!(f, "failed to post comment: {e}"),
        }
    }
}

/// Every target ends up in exactly one of the two sets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub successes: BTreeSet<IssueId>,
    pub failures: BTreeSet<IssueId>,
}

pub async fn dispatch(
    tracker: &dyn IssueTracker,
    workspace: &str,
    targets: &BTreeSet<IssueId>,
    comment_html: &str,
) -> DispatchResult {
    let attempts = targets.iter().map(|issue| async move {
        let outcome = notify_one(tracker, workspace, issue, comment_html).await;
        (issue, outcome)
    });

    let mut result = DispatchResult::default();
    for (issue, outcome) in join_all(attempts).await {
        match outcome {
            Ok(()) => {
                tracing::info!("posted comment to Plane issue {issue}");
                result.successes.insert(issue.clone());
            }
            Err(e) => {
                tracing::warn!("could not notify Plane issue {issue}: {e}");
                result.failures.insert(issue.clone());
            }
        }
    }
    result
}

async fn notify_one(
    tracker: &dyn IssueTracker,
    workspace: &str,
    issue: &IssueId,
    comment_html: &str,
) -> Result<(), DispatchError> {
    let resolved = tracker
        .resolve_issue(workspace, issue)
        .await
        .map_err(DispatchError::Resolution)?;
    tracing::debug!(
        "resolved {issue} to issue {} in project {}",
        resolved.issue_uuid,
        resolved.project_id
    );
    tracker
        .post_comment(
            workspace,
            &resolved.project_id,
            &resolved.issue_uuid,
            comment_html,
        )
        .await
        .map_err(DispatchError::Post)
}
