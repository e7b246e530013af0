//! Administrative override and the remaining direct admin commands.
//!
//! `resolve` is the one operation allowed to touch an already-terminal
//! match. Which of its two branches applies is decided purely from the
//! match's stored reports and result, never from a separate state flag:
//! a match with no reports and no result yet takes the fresh path and rides
//! the normal completion machinery in [`crate::lifecycle`]; anything else
//! takes the terminal path, which recomputes MMR straight from the match's
//! frozen initial values so re-resolving the same match any number of times
//! converges on the same final state.

use std::sync::Arc;

use strum::{AsRefStr, EnumString};
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::hot_store::{HotStore, MatchId, MatchResult, ReportCode};
use crate::lifecycle::MatchLifecycle;
use crate::matchmaker::Matchmaker;
use crate::notify::{AdminResolutionPayload, NotificationEvent, NotificationFanout};
use crate::rating::mmr_delta;
use crate::write_queue::ChangedBy;

/// The four outcomes an admin can resolve a match to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AdminOutcome {
    P1Win,
    P2Win,
    Draw,
    Invalidate,
}

impl AdminOutcome {
    fn report_code(self) -> Option<ReportCode> {
        match self {
            Self::P1Win => Some(ReportCode::P1Won),
            Self::P2Win => Some(ReportCode::P2Won),
            Self::Draw => Some(ReportCode::Draw),
            Self::Invalidate => None,
        }
    }

    fn result_code(self) -> Option<i32> {
        match self {
            Self::P1Win => Some(1),
            Self::P2Win => Some(2),
            Self::Draw => Some(0),
            Self::Invalidate => None,
        }
    }
}

/// How an MMR adjustment combines with the player's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AdjustOp {
    Add,
    Subtract,
    Set,
}

impl AdjustOp {
    fn apply(self, current: i32, value: i32) -> i32 {
        match self {
            Self::Add => current + value,
            Self::Subtract => current - value,
            Self::Set => value,
        }
    }
}

pub struct AdminOverride {
    hot_store: Arc<HotStore>,
    lifecycle: Arc<MatchLifecycle>,
    matchmaker: Arc<Matchmaker>,
    fanout: Arc<NotificationFanout>,
    max_aborts: i32,
    k_factor: f64,
    admin_uids: std::collections::HashSet<i64>,
}

impl AdminOverride {
    pub fn new(
        hot_store: Arc<HotStore>,
        lifecycle: Arc<MatchLifecycle>,
        matchmaker: Arc<Matchmaker>,
        fanout: Arc<NotificationFanout>,
        max_aborts: i32,
        k_factor: f64,
        admin_uids: std::collections::HashSet<i64>,
    ) -> Self {
        Self {
            hot_store,
            lifecycle,
            matchmaker,
            fanout,
            max_aborts,
            k_factor,
            admin_uids,
        }
    }

    fn check_admin(&self, admin_uid: i64) -> CoreResult<()> {
        if !self.admin_uids.contains(&admin_uid) {
            return Err(CoreError::AuthorizationFailure(format!("{admin_uid} is not a recognized admin")));
        }
        Ok(())
    }

    /// Re-resolves `match_id` to `outcome`. Idempotent: resolving the same
    /// outcome on the same match twice in a row is a no-op beyond the audit
    /// trail, and resolving `B` after `A` yields the same state as
    /// resolving only `B` against a freshly created match.
    pub async fn resolve(&self, match_id: MatchId, outcome: AdminOutcome, admin_uid: i64, reason: String) -> CoreResult<()> {
        self.check_admin(admin_uid)?;

        let _guard = self.lifecycle.acquire_lock(match_id).await;
        let m = self.hot_store.get_match(match_id).ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;

        let is_fresh = m.player_1_report.is_none() && m.player_2_report.is_none() && m.match_result.is_none();
        let mmr_before = (m.player_1_mmr_current(&self.hot_store), m.player_2_mmr_current(&self.hot_store));

        if is_fresh {
            match outcome.report_code() {
                Some(code) => {
                    self.hot_store.update_match(match_id, |m| {
                        m.player_1_report = Some(code);
                        m.player_2_report = Some(code);
                    })?;
                    self.lifecycle.classify_and_finalize(match_id).await?;
                }
                None => {
                    self.hot_store.update_match(match_id, |m| {
                        m.match_result = Some(MatchResult::Aborted);
                        m.mmr_change = 0;
                    })?;
                }
            }
        } else {
            match outcome.result_code() {
                Some(result_code) => {
                    let delta = mmr_delta(m.player_1_mmr, m.player_2_mmr, result_code, self.k_factor)
                        .map_err(|e| CoreError::IntegrityViolation(e.to_string()))?;
                    self.hot_store.adjust_mmr(m.player_1_uid, m.player_1_race, m.player_1_mmr + delta)?;
                    self.hot_store.adjust_mmr(m.player_2_uid, m.player_2_race, m.player_2_mmr - delta)?;
                    let match_result = match result_code {
                        0 => MatchResult::Draw,
                        1 => MatchResult::P1Won,
                        2 => MatchResult::P2Won,
                        _ => unreachable!("result_code is 0, 1, or 2"),
                    };
                    self.hot_store.update_match(match_id, |m| {
                        m.player_1_report = outcome.report_code();
                        m.player_2_report = outcome.report_code();
                        m.match_result = Some(match_result);
                        m.mmr_change = delta;
                    })?;
                }
                None => {
                    self.hot_store.adjust_mmr(m.player_1_uid, m.player_1_race, m.player_1_mmr)?;
                    self.hot_store.adjust_mmr(m.player_2_uid, m.player_2_race, m.player_2_mmr)?;
                    self.hot_store.update_match(match_id, |m| {
                        m.player_1_report = None;
                        m.player_2_report = None;
                        m.match_result = Some(MatchResult::Aborted);
                        m.mmr_change = 0;
                    })?;
                }
            }
        }

        let updated = self.hot_store.get_match(match_id).ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        let mmr_after = (updated.player_1_mmr_current(&self.hot_store), updated.player_2_mmr_current(&self.hot_store));

        self.fanout.register_match(match_id, [m.player_1_uid, m.player_2_uid]).await;
        self.fanout
            .notify_match(
                match_id,
                NotificationEvent::AdminResolution(AdminResolutionPayload {
                    match_id,
                    admin_uid,
                    reason: reason.clone(),
                    outcome: updated.match_result,
                    player_1_mmr_before: mmr_before.0,
                    player_2_mmr_before: mmr_before.1,
                    player_1_mmr_after: mmr_after.0,
                    player_2_mmr_after: mmr_after.1,
                }),
            )
            .await;
        self.fanout.unregister_match(match_id).await;

        self.hot_store.log_admin_action(
            admin_uid,
            "resolve",
            None,
            Some(match_id),
            reason,
            format!("{{\"outcome\":\"{}\"}}", outcome.as_ref()),
        );
        info!(match_id, outcome = outcome.as_ref(), "admin resolved match");
        Ok(())
    }

    pub fn adjust_mmr(&self, admin_uid: i64, uid: i64, race: crate::race::Race, op: AdjustOp, value: i32, reason: String) -> CoreResult<()> {
        self.check_admin(admin_uid)?;
        let current = self
            .hot_store
            .get_mmr(uid, race)
            .ok_or_else(|| CoreError::NotFound(format!("mmr entry for ({uid}, {race})")))?;
        let new_mmr = op.apply(current.mmr, value);
        self.hot_store.adjust_mmr(uid, race, new_mmr)?;
        self.hot_store.log_admin_action(
            admin_uid,
            "adjust_mmr",
            Some(uid),
            None,
            reason,
            format!("{{\"race\":\"{race}\",\"op\":\"{}\",\"value\":{value}}}", op.as_ref()),
        );
        Ok(())
    }

    pub async fn remove_from_queue(&self, admin_uid: i64, uid: i64, reason: String) -> CoreResult<()> {
        self.check_admin(admin_uid)?;
        self.matchmaker.leave(uid).await;
        self.hot_store.log_admin_action(admin_uid, "remove_from_queue", Some(uid), None, reason, "{}".into());
        Ok(())
    }

    pub fn reset_aborts(&self, admin_uid: i64, uid: i64, new_count: i32, reason: String) -> CoreResult<()> {
        self.check_admin(admin_uid)?;
        self.hot_store.reset_aborts(uid, new_count, self.max_aborts)?;
        self.hot_store.log_admin_action(
            admin_uid,
            "reset_aborts",
            Some(uid),
            None,
            reason,
            format!("{{\"new_count\":{new_count}}}"),
        );
        Ok(())
    }

    pub async fn clear_queue(&self, admin_uid: i64, reason: String) -> CoreResult<usize> {
        self.check_admin(admin_uid)?;
        let removed = self.matchmaker.clear().await;
        for uid in &removed {
            self.hot_store.log_admin_action(admin_uid, "clear_queue", Some(*uid), None, reason.clone(), "{}".into());
        }
        Ok(removed.len())
    }

    pub async fn ban(&self, admin_uid: i64, uid: i64, reason: String) -> CoreResult<()> {
        self.check_admin(admin_uid)?;
        self.hot_store.set_is_banned(uid, true, ChangedBy::Admin)?;
        self.matchmaker.leave(uid).await;
        self.hot_store.log_admin_action(admin_uid, "ban", Some(uid), None, reason, "{}".into());
        Ok(())
    }
}

trait CurrentMmr {
    fn player_1_mmr_current(&self, hot_store: &HotStore) -> i32;
    fn player_2_mmr_current(&self, hot_store: &HotStore) -> i32;
}

impl CurrentMmr for crate::hot_store::Match {
    fn player_1_mmr_current(&self, hot_store: &HotStore) -> i32 {
        hot_store.get_mmr(self.player_1_uid, self.player_1_race).map(|m| m.mmr).unwrap_or(self.player_1_mmr)
    }

    fn player_2_mmr_current(&self, hot_store: &HotStore) -> i32 {
        hot_store.get_mmr(self.player_2_uid, self.player_2_race).map(|m| m.mmr).unwrap_or(self.player_2_mmr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationFanout;
    use crate::race::Race;
    use crate::rate_limiter::RateLimiter;
    use crate::write_queue::WriteQueue;
    use std::time::Duration;

    async fn new_harness() -> (AdminOverride, Arc<HotStore>, MatchId) {
        let db = sqlx::sqlite::SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        crate::migrations::run(&db).await.unwrap();
        let (queue, consumer) = WriteQueue::spawn(db.clone(), 1_000, [Duration::from_millis(1); 3]);
        tokio::spawn(consumer);
        let hot_store = Arc::new(HotStore::load(&db, queue, 3, chrono::Duration::days(14)).await.unwrap());
        hot_store.ensure_player(1);
        hot_store.ensure_player(2);

        let fanout = Arc::new(NotificationFanout::new());
        let (rate_limiter, worker) = RateLimiter::spawn(1_000, Duration::from_millis(1));
        tokio::spawn(worker);
        let lifecycle = MatchLifecycle::new(
            hot_store.clone(),
            fanout.clone(),
            rate_limiter,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            Duration::from_secs(1200),
            32.0,
        );
        let matchmaker = Arc::new(Matchmaker::new(hot_store.clone()));

        let m = hot_store
            .create_match(1, Race::BwZerg, 2, Race::Sc2Terran, "Fighting Spirit".into(), "us-east".into(), "scevo123".into())
            .unwrap();

        let mut admins = std::collections::HashSet::new();
        admins.insert(999);
        let admin = AdminOverride::new(hot_store.clone(), lifecycle, matchmaker, fanout, 3, 32.0, admins);
        (admin, hot_store, m.match_id)
    }

    #[tokio::test]
    async fn non_admin_is_rejected() {
        let (admin, _hot_store, match_id) = new_harness().await;
        let result = admin.resolve(match_id, AdminOutcome::P1Win, 1, "test".into()).await;
        assert!(matches!(result, Err(CoreError::AuthorizationFailure(_))));
    }

    #[tokio::test]
    async fn scenario_s3_fresh_override_applies_stats_and_delta() {
        let (admin, hot_store, match_id) = new_harness().await;
        admin.resolve(match_id, AdminOutcome::P2Win, 999, "S3".into()).await.unwrap();

        let m = hot_store.get_match(match_id).unwrap();
        assert_eq!(m.match_result, Some(MatchResult::P2Won));
        assert!(m.mmr_change < 0);

        let p1_mmr = hot_store.get_mmr(1, Race::BwZerg).unwrap();
        assert_eq!(p1_mmr.games_played, 1);
        assert_eq!(p1_mmr.games_lost, 1);
    }

    #[tokio::test]
    async fn scenario_s4_re_resolving_is_idempotent_on_games_played() {
        let (admin, hot_store, match_id) = new_harness().await;
        admin.resolve(match_id, AdminOutcome::P2Win, 999, "S3".into()).await.unwrap();

        admin.resolve(match_id, AdminOutcome::P1Win, 999, "S4".into()).await.unwrap();
        let m = hot_store.get_match(match_id).unwrap();
        assert_eq!(m.match_result, Some(MatchResult::P1Won));
        assert!(m.mmr_change > 0);

        let p1_mmr = hot_store.get_mmr(1, Race::BwZerg).unwrap();
        // Stats were only ever touched once, by the fresh path in S3.
        assert_eq!(p1_mmr.games_played, 1);
        assert_eq!(p1_mmr.mmr, m.player_1_mmr + m.mmr_change);

        admin.resolve(match_id, AdminOutcome::Draw, 999, "S4b".into()).await.unwrap();
        let m = hot_store.get_match(match_id).unwrap();
        assert!(m.mmr_change.abs() <= 1);

        admin.resolve(match_id, AdminOutcome::Invalidate, 999, "S4c".into()).await.unwrap();
        let m = hot_store.get_match(match_id).unwrap();
        assert_eq!(m.match_result, Some(MatchResult::Aborted));
        assert_eq!(m.mmr_change, 0);
        let p1_mmr = hot_store.get_mmr(1, Race::BwZerg).unwrap();
        let p2_mmr = hot_store.get_mmr(2, Race::Sc2Terran).unwrap();
        assert_eq!(p1_mmr.mmr, m.player_1_mmr);
        assert_eq!(p2_mmr.mmr, m.player_2_mmr);
    }

    #[tokio::test]
    async fn adjust_mmr_leaves_game_stats_untouched() {
        let (admin, hot_store, _match_id) = new_harness().await;
        hot_store.ensure_mmr(1, Race::BwZerg);
        hot_store.update_mmr(1, Race::BwZerg, 1500, Some(crate::hot_store::GameStatDelta::win()), true).unwrap();

        admin.adjust_mmr(999, 1, Race::BwZerg, AdjustOp::Add, 50, "correction".into()).unwrap();
        let after = hot_store.get_mmr(1, Race::BwZerg).unwrap();
        assert_eq!(after.mmr, 1550);
        assert_eq!(after.games_played, 1);
    }
}
