//! Notification fan-out (spec §4.9, component C9).
//!
//! Maintains one callback list per match and one callback slot per player.
//! A presenter registers itself as the single active callback for a player;
//! re-registration replaces the old slot outright (spec §9 "Notification
//! callbacks registered from transient frontends"). Callback failures are
//! isolated — logged, never propagated — so a broken presenter can never
//! take down a wave, a timer, or a completion handler.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_with::skip_serializing_none;
use tokio::sync::Mutex;
use tracing::warn;

use crate::hot_store::{MatchId, MatchResult, ReportCode};
use crate::race::Race;

/// The events a presenter can be fanned out (spec §4.9).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    MatchFound(MatchFoundPayload),
    Confirmed(ConfirmedPayload),
    MatchComplete(MatchCompletePayload),
    MatchConflict(MatchConflictPayload),
    MatchAbort(MatchAbortPayload),
    AdminResolution(AdminResolutionPayload),
    /// Low-priority reminder fan-out (spec §4.5 "Optional reminder"),
    /// routed through the rate limiter rather than bypassing it.
    ConfirmReminder(ConfirmReminderPayload),
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchFoundPayload {
    pub match_id: MatchId,
    pub player_1_uid: i64,
    pub player_1_race: Race,
    pub player_2_uid: i64,
    pub player_2_race: Race,
    pub map_name: String,
    pub server: String,
    pub chat_channel_tag: String,
    pub player_1_mmr: i32,
    pub player_2_mmr: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedPayload {
    pub match_id: MatchId,
    pub confirmed_uid: i64,
    pub both_confirmed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchCompletePayload {
    pub match_id: MatchId,
    pub match_result: i32,
    pub player_1_initial_mmr: i32,
    pub player_2_initial_mmr: i32,
    pub player_1_final_mmr: i32,
    pub player_2_final_mmr: i32,
    pub mmr_change: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchConflictPayload {
    pub match_id: MatchId,
    pub player_1_report: i32,
    pub player_2_report: i32,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct MatchAbortPayload {
    pub match_id: MatchId,
    pub reason: String,
    pub player_1_report: Option<ReportCode>,
    pub player_2_report: Option<ReportCode>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct AdminResolutionPayload {
    pub match_id: MatchId,
    pub admin_uid: i64,
    pub reason: String,
    pub outcome: Option<MatchResult>,
    pub player_1_mmr_before: i32,
    pub player_2_mmr_before: i32,
    pub player_1_mmr_after: i32,
    pub player_2_mmr_after: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmReminderPayload {
    pub match_id: MatchId,
    pub unconfirmed_uid: i64,
}

/// An opaque handle identifying one active presenter. Invoked with an event
/// and its structured payload; the presenter alone decides how to render.
pub trait PresenterCallback: Send + Sync {
    fn notify(&self, event: &NotificationEvent);
}

/// A callback backed by a plain closure, the common case for wiring a
/// presenter handle to an outbound channel.
pub struct FnCallback<F>(pub F)
where
    F: Fn(&NotificationEvent) + Send + Sync;

impl<F> PresenterCallback for FnCallback<F>
where
    F: Fn(&NotificationEvent) + Send + Sync,
{
    fn notify(&self, event: &NotificationEvent) {
        self.0(event)
    }
}

#[derive(Clone, Default)]
struct Registrations {
    per_player: HashMap<i64, Arc<dyn PresenterCallback>>,
    per_match: HashMap<MatchId, Vec<Arc<dyn PresenterCallback>>>,
}

/// Per-match and per-player callback registry (spec §4.9).
pub struct NotificationFanout {
    registrations: Mutex<Registrations>,
}

impl Default for NotificationFanout {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationFanout {
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(Registrations::default()),
        }
    }

    /// Registers `callback` as the single active presenter for `uid`.
    /// Re-registration replaces the previous slot outright.
    pub async fn register_player(&self, uid: i64, callback: Arc<dyn PresenterCallback>) {
        self.registrations.lock().await.per_player.insert(uid, callback);
    }

    /// Clears a player's presenter slot (on presenter disconnect).
    pub async fn unregister_player(&self, uid: i64) {
        self.registrations.lock().await.per_player.remove(&uid);
    }

    /// Registers both participants' current presenter callbacks against a
    /// match id, so a single `notify_match` fans out to both (spec §4.5
    /// "registers per-player presenter callbacks").
    pub async fn register_match(&self, match_id: MatchId, uids: [i64; 2]) {
        let mut registrations = self.registrations.lock().await;
        let callbacks: Vec<_> = uids
            .iter()
            .filter_map(|uid| registrations.per_player.get(uid).cloned())
            .collect();
        registrations.per_match.insert(match_id, callbacks);
    }

    /// Cancels a match's callback list once it goes terminal (spec §4.5
    /// "Cleanup ... unregister presenter callbacks").
    pub async fn unregister_match(&self, match_id: MatchId) {
        self.registrations.lock().await.per_match.remove(&match_id);
    }

    /// Fans `event` out to every callback registered for `match_id`, in
    /// registration order (spec §5 "Presenter callbacks execute in
    /// registration order per event"). Missing registrations and callback
    /// panics are logged and dropped, never propagated (spec §9).
    pub async fn notify_match(&self, match_id: MatchId, event: NotificationEvent) {
        let callbacks = {
            let registrations = self.registrations.lock().await;
            registrations.per_match.get(&match_id).cloned()
        };
        match callbacks {
            Some(callbacks) => {
                for callback in callbacks {
                    callback.notify(&event);
                }
            }
            None => warn!(match_id, "notify_match: no registered presenters, dropping event"),
        }
    }

    /// Fans `event` out to a single player's current presenter, used for
    /// queue-scoped events that aren't yet attached to a match (and for
    /// reminders, which target one unconfirmed player at a time).
    pub async fn notify_player(&self, uid: i64, event: NotificationEvent) {
        let callback = { self.registrations.lock().await.per_player.get(&uid).cloned() };
        match callback {
            Some(callback) => callback.notify(&event),
            None => warn!(uid, "notify_player: no registered presenter, dropping event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCallback(Arc<AtomicUsize>);
    impl PresenterCallback for CountingCallback {
        fn notify(&self, _event: &NotificationEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn re_registration_replaces_the_single_slot() {
        let fanout = NotificationFanout::new();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        fanout
            .register_player(1, Arc::new(CountingCallback(count_a.clone())))
            .await;
        fanout
            .register_player(1, Arc::new(CountingCallback(count_b.clone())))
            .await;

        fanout
            .notify_player(1, NotificationEvent::ConfirmReminder(ConfirmReminderPayload { match_id: 1, unconfirmed_uid: 1 }))
            .await;

        assert_eq!(count_a.load(Ordering::SeqCst), 0);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notify_match_fans_out_to_both_registered_participants() {
        let fanout = NotificationFanout::new();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        fanout.register_player(1, Arc::new(CountingCallback(count_a.clone()))).await;
        fanout.register_player(2, Arc::new(CountingCallback(count_b.clone()))).await;
        fanout.register_match(42, [1, 2]).await;

        fanout
            .notify_match(
                42,
                NotificationEvent::MatchAbort(MatchAbortPayload {
                    match_id: 42,
                    reason: "neither player confirmed".into(),
                    player_1_report: None,
                    player_2_report: None,
                }),
            )
            .await;

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregistered_match_drops_event_without_panicking() {
        let fanout = NotificationFanout::new();
        fanout
            .notify_match(
                999,
                NotificationEvent::MatchAbort(MatchAbortPayload {
                    match_id: 999,
                    reason: "neither player confirmed".into(),
                    player_1_report: None,
                    player_2_report: None,
                }),
            )
            .await;
    }
}
