//! Decides what a pull request event means for the tracked issues.
//!
//! This is pure: it looks at the event, the references found in it and the
//! history of the pull request, and returns a [`Decision`]. Sending comments
//! and updating the history happen afterwards in the handler.

use std::collections::BTreeSet;

use crate::comment::CommentTemplate;
use crate::gitea::PullRequestEvent;
use crate::history::NotificationRecord;
use crate::references::{IssueId, ReferenceExtractor};

/// Pull request actions with a dedicated behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrAction {
    /// New commits were pushed. Gitea spells it `synchronized`.
    Synchronize,
    Edited,
    Merged,
    Closed { merged: bool },
    /// Everything else (`opened`, `reopened`, `review_requested`, ...).
    Other(String),
}

impl PrAction {
    pub fn classify(action: &str, merged: bool) -> PrAction {
        match action {
            "synchronize" | "synchronized" => PrAction::Synchronize,
            "edited" => PrAction::Edited,
            "merged" => PrAction::Merged,
            "closed" => PrAction::Closed { merged },
            other => PrAction::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryUpdate {
    /// Record the issues that were notified successfully.
    Append,
    /// The pull request reached a terminal state, forget it.
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Synchronize,
    NoNewReferences,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing is sent and the history is left untouched.
    Skip(SkipReason),
    Notify {
        targets: BTreeSet<IssueId>,
        template: CommentTemplate,
        history: HistoryUpdate,
        /// Only previously unseen references are targeted.
        new_only: bool,
    },
}

pub fn decide(
    event: &PullRequestEvent,
    references: &ReferenceExtractor,
    record: Option<&NotificationRecord>,
) -> Decision {
    let action = PrAction::classify(&event.action, event.merged);
    let mut current = references.extract(&event.title);
    current.extend(references.extract(&event.body));

    match action {
        PrAction::Synchronize => Decision::Skip(SkipReason::Synchronize),
        PrAction::Edited => {
            let new_ids: BTreeSet<IssueId> = match record {
                Some(record) => current.difference(&record.notified_ids).cloned().collect(),
                None => current,
            };
            if new_ids.is_empty() {
                return Decision::Skip(SkipReason::NoNewReferences);
            }
            Decision::Notify {
                targets: new_ids,
                template: CommentTemplate::Updated {
                    action: event.action.clone(),
                },
                history: HistoryUpdate::Append,
                new_only: true,
            }
        }
        PrAction::Merged | PrAction::Closed { merged: true } => Decision::Notify {
            targets: current,
            template: CommentTemplate::Merged,
            history: HistoryUpdate::Clear,
            new_only: false,
        },
        PrAction::Closed { merged: false } => Decision::Notify {
            targets: current,
            template: CommentTemplate::Closed,
            history: HistoryUpdate::Clear,
            new_only: false,
        },
        PrAction::Other(action) => Decision::Notify {
            targets: current,
            template: CommentTemplate::Updated { action },
            history: HistoryUpdate::Append,
            new_only: false,
        },
    }
}
