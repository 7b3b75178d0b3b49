// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory registry of pending folio deadlines.
//!
//! The registry owns two maps: folio -> deadline entry, and the reverse index
//! user -> open folios (insertion order). Both are guarded by one synchronous
//! mutex and are never touched across an await, so a presence check and its
//! dependent removal are atomic with respect to every other registry call.
//!
//! Cancelling the spawned deadline task is advisory: a task that already
//! started running cannot be stopped retroactively. The authoritative guard
//! against a double fire is [`TimerRegistry::take`] inside the expiry path,
//! which removes the entry before any storage call and returns `None` to the
//! loser of the race.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A pending deadline for one folio.
pub struct TimerEntry {
    /// Cancellable deadline task.
    task: JoinHandle<()>,
    /// User to notify once the record itself is gone.
    pub owner_user_id: i64,
    /// Wall-clock time of registration.
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
struct Maps {
    timers: HashMap<String, TimerEntry>,
    by_user: HashMap<i64, Vec<String>>,
}

/// Registry of pending folio deadlines.
///
/// Single-instance, in-memory: entries do not survive a process restart.
/// Swapping this component for a durable scheduled-job store is the seam for
/// a multi-instance deployment.
pub struct TimerRegistry {
    ttl: Duration,
    inner: Mutex<Maps>,
}

impl TimerRegistry {
    /// Create a registry whose deadlines fire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Maps::default()),
        }
    }

    /// The configured pending deadline.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // A poisoned lock only means a panicking task mid-mutation; the maps stay
    // usable.
    fn maps(&self) -> MutexGuard<'_, Maps> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a deadline for `folio` owned by `user_id`.
    ///
    /// After the configured TTL the spawned task invokes `on_deadline` with
    /// the folio; the callback must re-resolve registry state itself (via
    /// [`take`](Self::take)) before acting. Callers schedule at most once per
    /// folio; if an entry is somehow replaced, the displaced task is aborted
    /// and detached from the reverse index.
    pub fn schedule<F, Fut>(&self, folio: &str, user_id: i64, on_deadline: F)
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ttl = self.ttl;
        let deadline_folio = folio.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            on_deadline(deadline_folio).await;
        });

        let entry = TimerEntry {
            task,
            owner_user_id: user_id,
            started_at: Utc::now(),
        };

        let mut maps = self.maps();
        if let Some(previous) = maps.timers.insert(folio.to_string(), entry) {
            warn!(folio, "replacing an already-registered deadline");
            previous.task.abort();
            detach_from_user(&mut maps, previous.owner_user_id, folio);
        }
        maps.by_user
            .entry(user_id)
            .or_default()
            .push(folio.to_string());

        debug!(folio, user_id, ttl_secs = ttl.as_secs(), "deadline registered");
    }

    /// Cancel the deadline for `folio`, if one is registered.
    ///
    /// Returns whether an entry was found. Idempotent: cancelling an absent
    /// folio is a no-op returning `false`.
    pub fn cancel(&self, folio: &str) -> bool {
        match self.take(folio) {
            Some(entry) => {
                entry.task.abort();
                debug!(folio, "deadline cancelled");
                true
            }
            None => false,
        }
    }

    /// Atomically remove and return the entry for `folio`.
    ///
    /// This is the presence check the expiry path relies on: exactly one
    /// caller can obtain the entry, even if the deadline task and a
    /// cancellation race each other.
    pub fn take(&self, folio: &str) -> Option<TimerEntry> {
        let mut maps = self.maps();
        let entry = maps.timers.remove(folio)?;
        detach_from_user(&mut maps, entry.owner_user_id, folio);
        Some(entry)
    }

    /// Open folios of `user_id`, oldest first.
    pub fn active_folios_for(&self, user_id: i64) -> Vec<String> {
        self.maps().by_user.get(&user_id).cloned().unwrap_or_default()
    }

    /// Total number of pending deadlines.
    pub fn count(&self) -> usize {
        self.maps().timers.len()
    }
}

/// Remove `folio` from the reverse index, pruning the user's entry when it
/// becomes empty.
fn detach_from_user(maps: &mut Maps, user_id: i64, folio: &str) {
    if let Some(folios) = maps.by_user.get_mut(&user_id) {
        folios.retain(|f| f != folio);
        if folios.is_empty() {
            maps.by_user.remove(&user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> TimerRegistry {
        // Long TTL: these tests never let a deadline fire.
        TimerRegistry::new(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_schedule_and_count() {
        let reg = registry();
        assert_eq!(reg.count(), 0);

        reg.schedule("1292", 42, |_| async {});
        reg.schedule("1293", 42, |_| async {});
        assert_eq!(reg.count(), 2);
        assert_eq!(reg.active_folios_for(42), vec!["1292", "1293"]);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let reg = registry();
        reg.schedule("1292", 42, |_| async {});

        assert!(reg.cancel("1292"));
        assert!(!reg.cancel("1292"));
        assert_eq!(reg.count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_folio_is_noop() {
        let reg = registry();
        assert!(!reg.cancel("9999"));
    }

    #[tokio::test]
    async fn test_take_returns_owner() {
        let reg = registry();
        reg.schedule("1292", 42, |_| async {});

        let entry = reg.take("1292").expect("entry should exist");
        assert_eq!(entry.owner_user_id, 42);
        assert!(reg.take("1292").is_none());
    }

    #[tokio::test]
    async fn test_reverse_index_is_pruned() {
        let reg = registry();
        reg.schedule("1292", 42, |_| async {});
        reg.schedule("1293", 42, |_| async {});
        reg.schedule("2001", 7, |_| async {});

        reg.cancel("1292");
        assert_eq!(reg.active_folios_for(42), vec!["1293"]);

        reg.cancel("1293");
        assert!(reg.active_folios_for(42).is_empty());
        assert_eq!(reg.active_folios_for(7), vec!["2001"]);
    }

    #[tokio::test]
    async fn test_insertion_order_preserved() {
        let reg = registry();
        for folio in ["1295", "1292", "1299"] {
            reg.schedule(folio, 42, |_| async {});
        }
        assert_eq!(reg.active_folios_for(42), vec!["1295", "1292", "1299"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_with_folio() {
        let fired = Arc::new(AtomicUsize::new(0));
        let reg = TimerRegistry::new(Duration::from_secs(60));

        let fired_clone = fired.clone();
        reg.schedule("1292", 42, move |folio| async move {
            assert_eq!(folio, "1292");
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_deadline_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let reg = TimerRegistry::new(Duration::from_secs(60));

        let fired_clone = fired.clone();
        reg.schedule("1292", 42, move |_| async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(reg.cancel("1292"));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
