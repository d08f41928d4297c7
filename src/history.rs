//! In-memory record of which issues have already been notified for each open
//! pull request.
//!
//! Entries are keyed by the pull request URL. Access goes through
//! [`NotificationHistory::lock`], which serializes everything done for one
//! pull request (read, dispatch, update) while leaving other pull requests
//! unaffected. Nothing is persisted; a restart forgets every entry.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::references::IssueId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Every issue successfully notified since the pull request was first seen.
    pub notified_ids: BTreeSet<IssueId>,
    pub last_action: String,
}

/// One pull request's record and the number of tasks holding or waiting on
/// it. The entry is removed once `users` drops to zero with no record left.
#[derive(Default)]
struct Slot {
    users: usize,
    record: Arc<AsyncMutex<Option<NotificationRecord>>>,
}

#[derive(Default)]
pub struct NotificationHistory {
    entries: Mutex<HashMap<String, Slot>>,
}

impl NotificationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the entry of one pull request.
    pub async fn lock(&self, pr_key: &str) -> HistoryEntry<'_> {
        let record = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = entries.entry(pr_key.to_string()).or_default();
            slot.users += 1;
            slot.record.clone()
        };
        // Built before waiting so a cancelled wait still gives its user back.
        let mut entry = HistoryEntry {
            history: self,
            key: pr_key.to_string(),
            guard: None,
        };
        entry.guard = Some(record.lock_owned().await);
        entry
    }

    /// Number of pull requests currently tracked.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Called after a user's guard is gone.
    fn release(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = entries.get_mut(key) else {
            return;
        };
        slot.users = slot.users.saturating_sub(1);
        if slot.users > 0 {
            return;
        }
        // No user left, so nothing holds the async lock.
        let empty = slot
            .record
            .try_lock()
            .map(|record| record.is_none())
            .unwrap_or(false);
        if empty {
            entries.remove(key);
        }
    }
}

/// Exclusive handle on the history of one pull request.
///
/// Released when dropped.
pub struct HistoryEntry<'a> {
    history: &'a NotificationHistory,
    key: String,
    guard: Option<OwnedMutexGuard<Option<NotificationRecord>>>,
}

impl HistoryEntry<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Option<&NotificationRecord> {
        self.guard.as_ref().and_then(|guard| guard.as_ref())
    }

    /// Records `ids` as notified.
    ///
    /// A record is only created once at least one issue was notified.
    pub fn append_notified(&mut self, ids: &BTreeSet<IssueId>, action: &str) {
        let Some(guard) = self.guard.as_mut() else {
            return;
        };
        match guard.as_mut() {
            Some(record) => {
                record.notified_ids.extend(ids.iter().cloned());
                record.last_action = action.to_string();
            }
            None if ids.is_empty() => {}
            None => {
                **guard = Some(NotificationRecord {
                    notified_ids: ids.clone(),
                    last_action: action.to_string(),
                });
            }
        }
    }

    /// Forgets the pull request entirely.
    pub fn clear(&mut self) {
        if let Some(guard) = self.guard.as_mut() {
            **guard = None;
        }
    }
}

impl Drop for HistoryEntry<'_> {
    fn drop(&mut self) {
        self.guard = None;
        self.history.release(&self.key);
    }
}
