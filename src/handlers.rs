//! Turns a pull request webhook into Plane comments.

use std::collections::BTreeSet;
use std::sync::Arc;

use itertools::Itertools;
use secrecy::SecretString;

use crate::dispatch::{self, DispatchResult};
use crate::gitea::{PullRequestEvent, PullRequestPayload};
use crate::history::NotificationHistory;
use crate::plane::IssueTracker;
use crate::policy::{self, Decision, HistoryUpdate, SkipReason};
use crate::references::{IssueId, ReferenceExtractor};
use crate::utils::count_noun;

pub struct Context {
    pub tracker: Arc<dyn IssueTracker>,
    pub workspace: String,
    pub references: ReferenceExtractor,
    pub history: NotificationHistory,
    /// When set, deliveries must carry a valid `X-Gitea-Signature`.
    pub webhook_secret: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    PartialSuccess,
    Error,
}

/// What happened to one webhook delivery, reported back to Gitea.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HandleOutcome {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub notified: BTreeSet<IssueId>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub failed: BTreeSet<IssueId>,
}

impl HandleOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        HandleOutcome {
            status: Status::Success,
            message: message.into(),
            notified: BTreeSet::new(),
            failed: BTreeSet::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        HandleOutcome {
            status: Status::Error,
            ..HandleOutcome::success(message)
        }
    }
}

pub async fn handle(ctx: &Context, payload: PullRequestPayload) -> HandleOutcome {
    let event = match payload.into_event() {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("rejecting webhook: {e}");
            return HandleOutcome::error(e.to_string());
        }
    };

    tracing::info!(
        "processing {} of {} from {} ({})",
        event.action,
        event.pr_link,
        event.sender_name,
        event.sender_email
    );

    match handle_event(ctx, &event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("handling {} failed: {e:?}", event.pr_link);
            HandleOutcome::error(format!("Unexpected error: {e}"))
        }
    }
}

async fn handle_event(ctx: &Context, event: &PullRequestEvent) -> anyhow::Result<HandleOutcome> {
    // Held until the history is updated so that concurrent events for the
    // same pull request never decide against a stale record.
    let mut entry = ctx.history.lock(&event.pr_link).await;

    let decision = policy::decide(event, &ctx.references, entry.get());
    tracing::debug!("decision for {}: {decision:?}", entry.key());

    let (targets, template, history_update, new_only) = match decision {
        Decision::Skip(SkipReason::Synchronize) => {
            return Ok(HandleOutcome::success(format!(
                "Skipped {} event",
                event.action
            )));
        }
        Decision::Skip(SkipReason::NoNewReferences) => {
            return Ok(HandleOutcome::success("No new issue references to notify"));
        }
        Decision::Notify {
            targets,
            template,
            history,
            new_only,
        } => (targets, template, history, new_only),
    };

    let result = if targets.is_empty() {
        DispatchResult::default()
    } else {
        let comment = template.render(event)?;
        dispatch::dispatch(&*ctx.tracker, &ctx.workspace, &targets, &comment).await
    };

    match history_update {
        HistoryUpdate::Append => entry.append_notified(&result.successes, &event.action),
        HistoryUpdate::Clear => entry.clear(),
    }
    drop(entry);

    Ok(summarize(result, targets.len(), new_only))
}

fn summarize(result: DispatchResult, attempted: usize, new_only: bool) -> HandleOutcome {
    if attempted == 0 {
        return HandleOutcome::success("Webhook processed but no issue references found");
    }
    let targets = count_noun(
        attempted,
        if new_only { "new issue reference" } else { "issue" },
    );
    let (status, message) = if result.failures.is_empty() {
        (
            Status::Success,
            format!(
                "Comment posted to {targets}: {}",
                result.successes.iter().format(", ")
            ),
        )
    } else if result.successes.is_empty() {
        (
            Status::Error,
            format!(
                "Failed to post comment to {targets}: {}",
                result.failures.iter().format(", ")
            ),
        )
    } else {
        (
            Status::PartialSuccess,
            format!(
                "Comment posted to {} of {targets}: {}; failed: {}",
                result.successes.len(),
                result.successes.iter().format(", "),
                result.failures.iter().format(", ")
            ),
        )
    };
    HandleOutcome {
        status,
        message,
        notified: result.successes,
        failed: result.failures,
    }
}
