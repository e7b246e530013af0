//! The match lifecycle service (spec §4.5, component C5).
//!
//! Owns every live match from creation through confirmation, play, and
//! terminal classification. Per-match mutations are serialized by a
//! lazily-created lock keyed on match id (spec §5, §9 "Per-entity locks for
//! completion") so exactly one completion handler ever fires for a given
//! match (Testable Property 9). Confirmation and abort timers are
//! independent cancellable tasks (spec §5 "Cancellation & timeouts");
//! admin override (C6) reuses this module's locking and completion helpers
//! rather than duplicating them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::hot_store::{GameStatDelta, HotStore, Match, MatchId, MatchResult, ReportCode, WhichPlayer};
use crate::notify::{
    ConfirmReminderPayload, ConfirmedPayload, MatchAbortPayload, MatchCompletePayload, MatchConflictPayload,
    MatchFoundPayload, NotificationEvent, NotificationFanout,
};
use crate::rate_limiter::RateLimiter;
use crate::rating::mmr_delta;

/// A raw report value as accepted from a player (spec §4.5): `0`/`1`/`2`
/// for a result, or `-3` for a self-initiated abort.
pub const REPORT_DRAW: i32 = 0;
pub const REPORT_P1_WON: i32 = 1;
pub const REPORT_P2_WON: i32 = 2;
pub const REPORT_SELF_ABORT: i32 = -3;

struct MatchTimers {
    /// Cancels the confirmation timer specifically (fired early once both
    /// players confirm) without touching the abort-timer backstop.
    confirm_cancel: CancellationToken,
    /// Cancels every remaining timer task once the match goes terminal.
    terminal_cancel: CancellationToken,
}

pub struct MatchLifecycle {
    hot_store: Arc<HotStore>,
    fanout: Arc<NotificationFanout>,
    rate_limiter: RateLimiter,
    locks: Mutex<HashMap<MatchId, Arc<Mutex<()>>>>,
    timers: Mutex<HashMap<MatchId, MatchTimers>>,
    confirm_timer: Duration,
    abort_timer: Duration,
    reminder_delay: Duration,
    k_factor: f64,
}

impl MatchLifecycle {
    pub fn new(
        hot_store: Arc<HotStore>,
        fanout: Arc<NotificationFanout>,
        rate_limiter: RateLimiter,
        confirm_timer: Duration,
        abort_timer: Duration,
        reminder_delay: Duration,
        k_factor: f64,
    ) -> Arc<Self> {
        Arc::new(Self {
            hot_store,
            fanout,
            rate_limiter,
            locks: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            confirm_timer,
            abort_timer,
            reminder_delay,
            k_factor,
        })
    }

    /// Acquires (creating lazily if absent) the per-match completion lock
    /// (spec §5, §9). Used both by `record_report`/timers here and by the
    /// admin override path when it re-resolves a terminal match.
    pub async fn acquire_lock(self: &Arc<Self>, match_id: MatchId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().await;
            locks.entry(match_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        mutex.lock_owned().await
    }

    /// Drops the lock entry, bounding the map's memory to live matches
    /// (spec §9 "created lazily and removed on terminal transition").
    async fn release_lock(&self, match_id: MatchId) {
        self.locks.lock().await.remove(&match_id);
    }

    /// Registers presenter callbacks for both participants, publishes
    /// `match_found`, and starts the confirmation/abort/reminder timers
    /// (spec §4.5).
    pub async fn start_match(self: &Arc<Self>, match_id: MatchId) -> CoreResult<()> {
        let m = self.hot_store.get_match(match_id).ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;

        self.fanout.register_match(match_id, [m.player_1_uid, m.player_2_uid]).await;
        self.fanout
            .notify_match(
                match_id,
                NotificationEvent::MatchFound(MatchFoundPayload {
                    match_id,
                    player_1_uid: m.player_1_uid,
                    player_1_race: m.player_1_race,
                    player_2_uid: m.player_2_uid,
                    player_2_race: m.player_2_race,
                    map_name: m.map_name.clone(),
                    server: m.server.clone(),
                    chat_channel_tag: m.chat_channel_tag.clone(),
                    player_1_mmr: m.player_1_mmr,
                    player_2_mmr: m.player_2_mmr,
                }),
            )
            .await;

        let confirm_cancel = CancellationToken::new();
        let terminal_cancel = CancellationToken::new();
        self.timers.lock().await.insert(
            match_id,
            MatchTimers {
                confirm_cancel: confirm_cancel.clone(),
                terminal_cancel: terminal_cancel.clone(),
            },
        );

        self.spawn_confirm_timer(match_id, confirm_cancel.clone(), terminal_cancel.clone());
        self.spawn_abort_timer(match_id, terminal_cancel.clone());
        self.spawn_reminder(match_id, confirm_cancel, terminal_cancel);

        Ok(())
    }

    fn spawn_confirm_timer(self: &Arc<Self>, match_id: MatchId, confirm_cancel: CancellationToken, terminal_cancel: CancellationToken) {
        let this = self.clone();
        let delay = self.confirm_timer;
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    this.apply_no_show(match_id).await;
                }
                () = confirm_cancel.cancelled() => {}
                () = terminal_cancel.cancelled() => {}
            }
        });
    }

    fn spawn_abort_timer(self: &Arc<Self>, match_id: MatchId, terminal_cancel: CancellationToken) {
        let this = self.clone();
        let delay = self.abort_timer;
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    this.apply_no_show(match_id).await;
                }
                () = terminal_cancel.cancelled() => {}
            }
        });
    }

    fn spawn_reminder(self: &Arc<Self>, match_id: MatchId, confirm_cancel: CancellationToken, terminal_cancel: CancellationToken) {
        let this = self.clone();
        let delay = self.reminder_delay;
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    this.send_confirm_reminders(match_id).await;
                }
                () = confirm_cancel.cancelled() => {}
                () = terminal_cancel.cancelled() => {}
            }
        });
    }

    async fn send_confirm_reminders(&self, match_id: MatchId) {
        let Some(m) = self.hot_store.get_match(match_id) else { return };
        if m.is_terminal() {
            return;
        }
        for (uid, confirmed) in [(m.player_1_uid, m.player_1_confirmed), (m.player_2_uid, m.player_2_confirmed)] {
            if !confirmed {
                let fanout = self.fanout.clone();
                self.rate_limiter.submit(move || {
                    // Submission is fire-and-forget (spec §4.8); the actual
                    // async fan-out call is spawned from inside the job so
                    // the rate limiter's worker thread isn't blocked on the
                    // async runtime outside of `tokio::spawn`.
                    tokio::spawn(async move {
                        fanout
                            .notify_player(uid, NotificationEvent::ConfirmReminder(ConfirmReminderPayload { match_id, unconfirmed_uid: uid }))
                            .await;
                    });
                });
            }
        }
    }

    /// Marks `uid` as confirmed. When both players have confirmed, cancels
    /// the confirmation timer and fans out `confirmed` (spec §4.5).
    pub async fn confirm(self: &Arc<Self>, match_id: MatchId, uid: i64) -> CoreResult<()> {
        let _guard = self.acquire_lock(match_id).await;
        let m = self.hot_store.get_match(match_id).ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        if !m.is_participant(uid) {
            return Err(CoreError::InvalidTransition(format!("player {uid} is not a participant in match {match_id}")));
        }
        if m.is_terminal() {
            return Err(CoreError::InvalidTransition(format!("match {match_id} is already terminal")));
        }

        let updated = self.hot_store.update_match(match_id, |m| {
            if uid == m.player_1_uid {
                m.player_1_confirmed = true;
            } else {
                m.player_2_confirmed = true;
            }
        })?;

        let both_confirmed = updated.player_1_confirmed && updated.player_2_confirmed;
        self.fanout
            .notify_match(match_id, NotificationEvent::Confirmed(ConfirmedPayload { match_id, confirmed_uid: uid, both_confirmed }))
            .await;

        if both_confirmed {
            if let Some(timers) = self.timers.lock().await.get(&match_id) {
                timers.confirm_cancel.cancel();
            }
        }
        Ok(())
    }

    /// Records a player's report and, once both are in, classifies the
    /// match as completed, aborted, or conflicted (spec §4.5).
    pub async fn record_report(self: &Arc<Self>, match_id: MatchId, uid: i64, value: i32) -> CoreResult<()> {
        if !matches!(value, REPORT_DRAW | REPORT_P1_WON | REPORT_P2_WON | REPORT_SELF_ABORT) {
            return Err(CoreError::InvalidInput(format!("report value {value} out of range")));
        }

        let _guard = self.acquire_lock(match_id).await;
        let m = self.hot_store.get_match(match_id).ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        if m.is_terminal() {
            return Err(CoreError::InvalidTransition(format!("match {match_id} is already terminal")));
        }
        if !m.is_participant(uid) {
            return Err(CoreError::InvalidTransition(format!("player {uid} is not a participant in match {match_id}")));
        }

        let which = if uid == m.player_1_uid { WhichPlayer::One } else { WhichPlayer::Two };
        let code = match value {
            REPORT_DRAW => ReportCode::Draw,
            REPORT_P1_WON => ReportCode::P1Won,
            REPORT_P2_WON => ReportCode::P2Won,
            REPORT_SELF_ABORT => ReportCode::SelfAbort,
            _ => unreachable!("validated above"),
        };

        let updated = self.hot_store.update_match_report(match_id, which, code)?;

        if code == ReportCode::SelfAbort {
            self.hot_store.decrement_remaining_aborts(uid)?;
            return self.finalize_self_abort(match_id, &updated, which).await;
        }

        if !updated.both_reported() {
            return Ok(());
        }

        self.classify_and_finalize(match_id).await
    }

    /// A self-abort (spec §4.5 "−3 ... self-initiated abort") finalizes the
    /// match immediately rather than waiting on the opponent's report
    /// (spec S6): the match goes terminal with only one report set, so this
    /// cannot route through `classify_and_finalize`, which requires both.
    async fn finalize_self_abort(self: &Arc<Self>, match_id: MatchId, m: &Match, which: WhichPlayer) -> CoreResult<()> {
        let updated = self.hot_store.update_match(match_id, |m| {
            m.match_result = Some(MatchResult::Aborted);
            m.mmr_change = 0;
        })?;

        let aborter_uid = match which {
            WhichPlayer::One => m.player_1_uid,
            WhichPlayer::Two => m.player_2_uid,
        };
        let reason = format!("{} aborted", self.player_label(aborter_uid));

        self.fanout
            .notify_match(
                match_id,
                NotificationEvent::MatchAbort(MatchAbortPayload {
                    match_id,
                    reason,
                    player_1_report: updated.player_1_report,
                    player_2_report: updated.player_2_report,
                }),
            )
            .await;

        self.cleanup(match_id).await;
        Ok(())
    }

    /// Called once both per-player reports are present, whether from normal
    /// play (`record_report`) or synthesized by a fresh admin override
    /// (spec §4.6 "Fresh path"). Must be called while holding this match's
    /// completion lock.
    pub async fn classify_and_finalize(self: &Arc<Self>, match_id: MatchId) -> CoreResult<()> {
        let m = self.hot_store.get_match(match_id).ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        let (p1, p2) = match (m.player_1_report, m.player_2_report) {
            (Some(p1), Some(p2)) => (p1, p2),
            _ => return Err(CoreError::IntegrityViolation(format!("match {match_id} classified without both reports set"))),
        };

        if p1 == ReportCode::SelfAbort || p1 == ReportCode::NoShow || p2 == ReportCode::SelfAbort || p2 == ReportCode::NoShow {
            self.finalize_abort(match_id, &m, p1, p2).await?;
        } else if p1 == p2 {
            self.finalize_completion(match_id, &m, p1).await?;
        } else {
            self.finalize_conflict(match_id, p1, p2).await?;
        }

        self.cleanup(match_id).await;
        Ok(())
    }

    async fn finalize_completion(&self, match_id: MatchId, m: &Match, agreed: ReportCode) -> CoreResult<()> {
        let result_code = agreed.as_result_code().expect("agreed report is a scorable result, not an abort code");
        let delta = mmr_delta(m.player_1_mmr, m.player_2_mmr, result_code, self.k_factor)
            .map_err(|e| CoreError::IntegrityViolation(e.to_string()))?;

        let (p1_stat, p2_stat) = match result_code {
            0 => (GameStatDelta::draw(), GameStatDelta::draw()),
            1 => (GameStatDelta::win(), GameStatDelta::loss()),
            2 => (GameStatDelta::loss(), GameStatDelta::win()),
            _ => unreachable!("result_code is 0, 1, or 2"),
        };

        self.hot_store
            .update_mmr(m.player_1_uid, m.player_1_race, m.player_1_mmr + delta, Some(p1_stat), true)?;
        self.hot_store
            .update_mmr(m.player_2_uid, m.player_2_race, m.player_2_mmr - delta, Some(p2_stat), true)?;

        let match_result = match result_code {
            0 => MatchResult::Draw,
            1 => MatchResult::P1Won,
            2 => MatchResult::P2Won,
            _ => unreachable!(),
        };
        self.hot_store.update_match(match_id, |m| {
            m.match_result = Some(match_result);
            m.mmr_change = delta;
        })?;

        self.fanout
            .notify_match(
                match_id,
                NotificationEvent::MatchComplete(MatchCompletePayload {
                    match_id,
                    match_result: result_code,
                    player_1_initial_mmr: m.player_1_mmr,
                    player_2_initial_mmr: m.player_2_mmr,
                    player_1_final_mmr: m.player_1_mmr + delta,
                    player_2_final_mmr: m.player_2_mmr - delta,
                    mmr_change: delta,
                }),
            )
            .await;
        info!(match_id, delta, "match completed");
        Ok(())
    }

    async fn finalize_abort(&self, match_id: MatchId, m: &Match, p1: ReportCode, p2: ReportCode) -> CoreResult<()> {
        self.hot_store.update_match(match_id, |m| {
            m.match_result = Some(MatchResult::Aborted);
            m.mmr_change = 0;
        })?;

        let reason = if p1 == ReportCode::SelfAbort {
            format!("{} aborted", self.player_label(m.player_1_uid))
        } else if p2 == ReportCode::SelfAbort {
            format!("{} aborted", self.player_label(m.player_2_uid))
        } else {
            "neither player confirmed".to_owned()
        };

        self.fanout
            .notify_match(
                match_id,
                NotificationEvent::MatchAbort(MatchAbortPayload { match_id, reason, player_1_report: Some(p1), player_2_report: Some(p2) }),
            )
            .await;
        Ok(())
    }

    async fn finalize_conflict(&self, match_id: MatchId, p1: ReportCode, p2: ReportCode) -> CoreResult<()> {
        self.hot_store.update_match(match_id, |m| {
            m.match_result = Some(MatchResult::Conflict);
            m.mmr_change = 0;
        })?;

        self.fanout
            .notify_match(
                match_id,
                NotificationEvent::MatchConflict(MatchConflictPayload {
                    match_id,
                    player_1_report: p1.to_raw(),
                    player_2_report: p2.to_raw(),
                }),
            )
            .await;
        Ok(())
    }

    fn player_label(&self, uid: i64) -> String {
        self.hot_store.get_player(uid).map(|p| p.player_name).unwrap_or_else(|| uid.to_string())
    }

    /// Shared no-show procedure for both the confirmation timer and the
    /// abort-timer backstop (spec §4.5): unconfirmed players get `-4`;
    /// confirmed players' reports stay `None`; the match is aborted
    /// unconditionally. A no-op if the match already went terminal by some
    /// other path before this timer fired.
    async fn apply_no_show(self: &Arc<Self>, match_id: MatchId) {
        let _guard = self.acquire_lock(match_id).await;
        let Some(m) = self.hot_store.get_match(match_id) else { return };
        if m.is_terminal() {
            return;
        }

        let mut unconfirmed_label = None;
        let p1_report = (!m.player_1_confirmed).then_some(ReportCode::NoShow);
        let p2_report = (!m.player_2_confirmed).then_some(ReportCode::NoShow);
        let result = self.hot_store.record_system_abort(match_id, p1_report, p2_report);

        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                warn!(match_id, error = %e, "failed to apply no-show procedure");
                return;
            }
        };

        let reason = match (updated.player_1_confirmed, updated.player_2_confirmed) {
            (false, false) => "neither player confirmed".to_owned(),
            (false, true) => {
                unconfirmed_label = Some(self.player_label(m.player_1_uid));
                format!("only {} did not confirm", unconfirmed_label.clone().unwrap())
            }
            (true, false) => {
                unconfirmed_label = Some(self.player_label(m.player_2_uid));
                format!("only {} did not confirm", unconfirmed_label.clone().unwrap())
            }
            (true, true) => "match timed out before both players reported a result".to_owned(),
        };

        self.fanout
            .notify_match(
                match_id,
                NotificationEvent::MatchAbort(MatchAbortPayload {
                    match_id,
                    reason,
                    player_1_report: updated.player_1_report,
                    player_2_report: updated.player_2_report,
                }),
            )
            .await;

        self.cleanup(match_id).await;
    }

    /// Cancels remaining timers, unregisters presenter callbacks, and
    /// releases the completion lock (spec §4.5 "Cleanup").
    async fn cleanup(&self, match_id: MatchId) {
        if let Some(timers) = self.timers.lock().await.remove(&match_id) {
            timers.confirm_cancel.cancel();
            timers.terminal_cancel.cancel();
        }
        self.fanout.unregister_match(match_id).await;
        self.release_lock(match_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::Race;
    use crate::write_queue::WriteQueue;
    use std::time::Duration as StdDuration;

    async fn new_lifecycle() -> (Arc<MatchLifecycle>, Arc<HotStore>) {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrations::run(&db).await.unwrap();
        let (queue, consumer) = WriteQueue::spawn(db.clone(), 1_000, [StdDuration::from_millis(1); 3]);
        tokio::spawn(consumer);
        let hot_store = Arc::new(HotStore::load(&db, queue, 3, chrono::Duration::days(14)).await.unwrap());
        let fanout = Arc::new(NotificationFanout::new());
        let (rate_limiter, worker) = RateLimiter::spawn(1_000, StdDuration::from_millis(1));
        tokio::spawn(worker);
        let lifecycle = MatchLifecycle::new(
            hot_store.clone(),
            fanout,
            rate_limiter,
            StdDuration::from_secs(3600),
            StdDuration::from_secs(3600),
            StdDuration::from_secs(1200),
            32.0,
        );
        (lifecycle, hot_store)
    }

    async fn make_match(hot_store: &HotStore) -> MatchId {
        hot_store.ensure_player(1);
        hot_store.ensure_player(2);
        let m = hot_store
            .create_match(1, Race::BwZerg, 2, Race::Sc2Terran, "Fighting Spirit".into(), "us-east".into(), "scevo123".into())
            .unwrap();
        m.match_id
    }

    #[tokio::test]
    async fn scenario_s6_self_abort() {
        let (lifecycle, hot_store) = new_lifecycle().await;
        let match_id = make_match(&hot_store).await;
        lifecycle.start_match(match_id).await.unwrap();

        lifecycle.record_report(match_id, 1, REPORT_SELF_ABORT).await.unwrap();

        let m = hot_store.get_match(match_id).unwrap();
        assert_eq!(m.player_1_report, Some(ReportCode::SelfAbort));
        assert_eq!(m.player_2_report, None);
        assert_eq!(m.match_result, Some(MatchResult::Aborted));
        assert_eq!(hot_store.get_player(1).unwrap().remaining_aborts, 2);
    }

    #[tokio::test]
    async fn scenario_s7_conflict() {
        let (lifecycle, hot_store) = new_lifecycle().await;
        let match_id = make_match(&hot_store).await;
        lifecycle.start_match(match_id).await.unwrap();

        lifecycle.record_report(match_id, 1, REPORT_P1_WON).await.unwrap();
        lifecycle.record_report(match_id, 2, REPORT_P2_WON).await.unwrap();

        let m = hot_store.get_match(match_id).unwrap();
        assert_eq!(m.match_result, Some(MatchResult::Conflict));
        assert_eq!(m.mmr_change, 0);
    }

    #[tokio::test]
    async fn agreed_report_completes_match_and_applies_delta() {
        let (lifecycle, hot_store) = new_lifecycle().await;
        let match_id = make_match(&hot_store).await;
        lifecycle.start_match(match_id).await.unwrap();

        lifecycle.record_report(match_id, 1, REPORT_P1_WON).await.unwrap();
        lifecycle.record_report(match_id, 2, REPORT_P1_WON).await.unwrap();

        let m = hot_store.get_match(match_id).unwrap();
        assert_eq!(m.match_result, Some(MatchResult::P1Won));
        assert!(m.mmr_change > 0);

        let p1_mmr = hot_store.get_mmr(1, Race::BwZerg).unwrap();
        assert_eq!(p1_mmr.mmr, m.player_1_mmr + m.mmr_change);
        assert_eq!(p1_mmr.games_played, 1);
        assert_eq!(p1_mmr.games_won, 1);
    }

    #[tokio::test]
    async fn reporting_on_terminal_match_is_rejected() {
        let (lifecycle, hot_store) = new_lifecycle().await;
        let match_id = make_match(&hot_store).await;
        lifecycle.start_match(match_id).await.unwrap();
        lifecycle.record_report(match_id, 1, REPORT_P1_WON).await.unwrap();
        lifecycle.record_report(match_id, 2, REPORT_P1_WON).await.unwrap();

        let result = lifecycle.record_report(match_id, 1, REPORT_DRAW).await;
        assert!(matches!(result, Err(CoreError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn non_participant_cannot_report() {
        let (lifecycle, hot_store) = new_lifecycle().await;
        let match_id = make_match(&hot_store).await;
        lifecycle.start_match(match_id).await.unwrap();

        let result = lifecycle.record_report(match_id, 999, REPORT_DRAW).await;
        assert!(matches!(result, Err(CoreError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn scenario_s5_no_show_abort_via_timer() {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrations::run(&db).await.unwrap();
        let (queue, consumer) = WriteQueue::spawn(db.clone(), 1_000, [StdDuration::from_millis(1); 3]);
        tokio::spawn(consumer);
        let hot_store = Arc::new(HotStore::load(&db, queue, 3, chrono::Duration::days(14)).await.unwrap());
        let fanout = Arc::new(NotificationFanout::new());
        let (rate_limiter, worker) = RateLimiter::spawn(1_000, StdDuration::from_millis(1));
        tokio::spawn(worker);
        let lifecycle = MatchLifecycle::new(
            hot_store.clone(),
            fanout,
            rate_limiter,
            StdDuration::from_millis(20),
            StdDuration::from_secs(3600),
            StdDuration::from_secs(3600),
            32.0,
        );

        let match_id = make_match(&hot_store).await;
        lifecycle.start_match(match_id).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(100)).await;

        let m = hot_store.get_match(match_id).unwrap();
        assert_eq!(m.player_1_report, Some(ReportCode::NoShow));
        assert_eq!(m.player_2_report, Some(ReportCode::NoShow));
        assert_eq!(m.match_result, Some(MatchResult::Aborted));
        assert_eq!(m.mmr_change, 0);
        assert_eq!(hot_store.get_player(1).unwrap().remaining_aborts, 3);
        assert_eq!(hot_store.get_player(2).unwrap().remaining_aborts, 3);
    }
}
