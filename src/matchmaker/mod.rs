//! The matchmaker (spec §4.4, component C4).
//!
//! Owns the set of queue entries and runs the wave algorithm on a fixed
//! interval. Queue membership is serialized by a single `Mutex` around the
//! in-memory queue (spec §5 "Queue enter/leave (C4) serializes on a
//! queue-level lock. Wave execution acquires the same lock.").

pub mod maps;
mod wave;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use rand::seq::IndexedRandom;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::hot_store::HotStore;
use crate::race::{Race, Title};

pub use wave::{run_wave, MatchedPair, PairedUp};

/// An opaque token identifying the one active presenter for a queued or
/// in-match player (spec §3 "Queue Entry", §4.9).
pub type PresenterHandle = String;

/// Ephemeral per-player queue membership (spec §3 "Queue Entry"). At most
/// one exists per `discord_uid` system-wide (Testable Property 1).
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub discord_uid: i64,
    pub selected_races: Vec<Race>,
    pub vetoed_maps: Vec<String>,
    pub mmr_by_race: HashMap<Race, i32>,
    pub enqueue_instant: DateTime<Utc>,
    pub waves_waited: u32,
    pub presenter_handle: PresenterHandle,
}

impl QueueEntry {
    /// Highest MMR across this entry's selected races — the sort key for
    /// the X/Y/Z partition (spec §4.4 step 1).
    pub fn max_selected_mmr(&self) -> i32 {
        self.selected_races
            .iter()
            .filter_map(|r| self.mmr_by_race.get(r))
            .copied()
            .max()
            .unwrap_or(0)
    }

    pub fn titles(&self) -> Vec<Title> {
        self.selected_races.iter().map(|r| r.title()).unique().collect()
    }

    pub fn is_dual_title(&self) -> bool {
        self.titles().len() == 2
    }

    pub fn mmr_for(&self, title: Title) -> i32 {
        self.selected_races
            .iter()
            .find(|r| r.title() == title)
            .and_then(|r| self.mmr_by_race.get(r))
            .copied()
            .unwrap_or(0)
    }

    pub fn race_for(&self, title: Title) -> Race {
        *self
            .selected_races
            .iter()
            .find(|r| r.title() == title)
            .expect("entry must have a race for its own title")
    }
}

pub struct Matchmaker {
    queue: Mutex<HashMap<i64, QueueEntry>>,
    hot_store: Arc<HotStore>,
    map_pool: Vec<String>,
    server_table: Vec<((String, String), String)>,
}

impl Matchmaker {
    pub fn new(hot_store: Arc<HotStore>) -> Self {
        Self {
            queue: Mutex::new(HashMap::new()),
            hot_store,
            map_pool: maps::default_map_pool(),
            server_table: maps::default_server_table(),
        }
    }

    pub async fn is_queued(&self, uid: i64) -> bool {
        self.queue.lock().await.contains_key(&uid)
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Validates and admits a player to the queue (spec §4.4 `enter`).
    pub async fn enter(
        &self,
        uid: i64,
        selected_races: Vec<Race>,
        vetoed_maps: Vec<String>,
        presenter_handle: PresenterHandle,
        is_in_live_match: bool,
    ) -> CoreResult<()> {
        if selected_races.is_empty() || selected_races.len() > 2 {
            return Err(CoreError::InvalidInput(
                "must select 1 or 2 races".into(),
            ));
        }
        let bw_count = selected_races.iter().filter(|r| r.is_bw()).count();
        let sc2_count = selected_races.iter().filter(|r| r.is_sc2()).count();
        if bw_count > 1 || sc2_count > 1 {
            return Err(CoreError::InvalidInput(
                "at most one race per title".into(),
            ));
        }
        if vetoed_maps.len() > 4 {
            return Err(CoreError::InvalidInput("at most 4 map vetoes".into()));
        }

        let player = self
            .hot_store
            .get_player(uid)
            .ok_or_else(|| CoreError::NotFound(format!("player {uid}")))?;
        if player.is_banned {
            return Err(CoreError::AuthorizationFailure("player is banned".into()));
        }
        if is_in_live_match {
            return Err(CoreError::InvalidTransition(
                "player is already in a live match".into(),
            ));
        }

        let mut queue = self.queue.lock().await;
        if queue.contains_key(&uid) {
            return Err(CoreError::InvalidTransition("player is already queued".into()));
        }

        let mut mmr_by_race = HashMap::new();
        for race in &selected_races {
            let mmr_entry = self.hot_store.ensure_mmr(uid, *race);
            mmr_by_race.insert(*race, mmr_entry.mmr);
        }

        // Sticky defaults for next time the player opens the queue prompt
        // (spec §3 "Preferences", data-flow note "preferences written via C2").
        self.hot_store.update_preferences(uid, selected_races.clone(), vetoed_maps.clone());

        queue.insert(
            uid,
            QueueEntry {
                discord_uid: uid,
                selected_races,
                vetoed_maps,
                mmr_by_race,
                enqueue_instant: Utc::now(),
                waves_waited: 0,
                presenter_handle,
            },
        );
        Ok(())
    }

    /// Idempotent: removes the entry if present.
    pub async fn leave(&self, uid: i64) {
        self.queue.lock().await.remove(&uid);
    }

    /// Removes every queue entry system-wide, returning the uids removed.
    pub async fn clear(&self) -> Vec<i64> {
        let mut queue = self.queue.lock().await;
        let uids: Vec<i64> = queue.keys().copied().collect();
        queue.clear();
        uids
    }

    /// Runs one wave: pairs as many entries as the elastic-window algorithm
    /// allows, creates matches for each pair (freezing initial MMRs via the
    /// hot store), removes paired entries from the queue, and increments
    /// `waves_waited` on everything left behind (spec §4.4 steps 1-7).
    pub async fn run_wave(&self) -> Vec<CreatedMatch> {
        let mut queue = self.queue.lock().await;
        let entries: Vec<QueueEntry> = queue.values().cloned().collect();
        let PairedUp { pairs, mut unpaired } = run_wave(entries);

        let mut created = Vec::new();
        for pair in pairs {
            let bw_uid = pair.bw_player.discord_uid;
            let sc2_uid = pair.sc2_player.discord_uid;
            match self.materialize_match(&pair) {
                Ok(m) => {
                    queue.remove(&bw_uid);
                    queue.remove(&sc2_uid);
                    created.push(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to materialize match for wave pair");
                    unpaired.push(pair.bw_player);
                    unpaired.push(pair.sc2_player);
                }
            }
        }

        for entry in &unpaired {
            if let Some(stored) = queue.get_mut(&entry.discord_uid) {
                stored.waves_waited += 1;
            }
        }

        info!(paired = created.len(), remaining = queue.len(), "wave complete");
        created
    }

    fn materialize_match(&self, pair: &MatchedPair) -> anyhow::Result<CreatedMatch> {
        // Deterministic P1=BW, P2=SC2 mapping (spec §4.4 "Match creation").
        // The race each player uses was already resolved by the wave
        // algorithm, since a dual-title player's race depends on which side
        // of the wave they ended up filling.
        let bw_entry = &pair.bw_player;
        let sc2_entry = &pair.sc2_player;
        let p1_race = pair.bw_race;
        let p2_race = pair.sc2_race;

        let mut rng = rand::rng();
        let vetoes: std::collections::HashSet<&str> = bw_entry
            .vetoed_maps
            .iter()
            .chain(sc2_entry.vetoed_maps.iter())
            .map(String::as_str)
            .collect();
        let eligible: Vec<&String> = self
            .map_pool
            .iter()
            .filter(|m| !vetoes.contains(m.as_str()))
            .collect();
        let map_name = if eligible.is_empty() {
            self.map_pool.choose(&mut rng).cloned().unwrap_or_default()
        } else {
            (*eligible.choose(&mut rng).expect("eligible is non-empty")).clone()
        };

        let country_a = self.hot_store.get_player(bw_entry.discord_uid).and_then(|p| p.country);
        let country_b = self.hot_store.get_player(sc2_entry.discord_uid).and_then(|p| p.country);
        let server = maps::server_for(
            &self.server_table,
            country_a.as_deref().unwrap_or("default"),
            country_b.as_deref().unwrap_or("default"),
        );
        let chat_channel_tag = format!("scevo{:03}", rng.random_range(0..1000));

        let record = self.hot_store.create_match(
            bw_entry.discord_uid,
            p1_race,
            sc2_entry.discord_uid,
            p2_race,
            map_name,
            server,
            chat_channel_tag,
        )?;

        Ok(CreatedMatch {
            match_id: record.match_id,
            player_1_presenter: bw_entry.presenter_handle.clone(),
            player_2_presenter: sc2_entry.presenter_handle.clone(),
        })
    }
}

pub struct CreatedMatch {
    pub match_id: crate::hot_store::MatchId,
    pub player_1_presenter: PresenterHandle,
    pub player_2_presenter: PresenterHandle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn new_store() -> Arc<HotStore> {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrations::run(&db).await.unwrap();
        let (queue, consumer) = crate::write_queue::WriteQueue::spawn(db.clone(), 1_000, [Duration::from_millis(1); 3]);
        tokio::spawn(consumer);
        Arc::new(HotStore::load(&db, queue, 3, chrono::Duration::days(14)).await.unwrap())
    }

    #[tokio::test]
    async fn enter_rejects_two_races_same_title() {
        let store = new_store().await;
        store.ensure_player(1);
        let mm = Matchmaker::new(store);
        let result = mm
            .enter(1, vec![Race::BwZerg, Race::BwTerran], vec![], "p1".into(), false)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn enter_rejects_double_enqueue() {
        let store = new_store().await;
        store.ensure_player(1);
        let mm = Matchmaker::new(store);
        mm.enter(1, vec![Race::BwZerg], vec![], "p1".into(), false).await.unwrap();
        let result = mm.enter(1, vec![Race::Sc2Terran], vec![], "p1".into(), false).await;
        assert!(matches!(result, Err(CoreError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let store = new_store().await;
        store.ensure_player(1);
        let mm = Matchmaker::new(store);
        mm.enter(1, vec![Race::BwZerg], vec![], "p1".into(), false).await.unwrap();
        mm.leave(1).await;
        mm.leave(1).await;
        assert!(!mm.is_queued(1).await);
    }

    #[tokio::test]
    async fn wave_produces_cross_title_self_distinct_matches() {
        let store = new_store().await;
        for uid in [1, 2] {
            store.ensure_player(uid);
        }
        let mm = Matchmaker::new(store);
        mm.enter(1, vec![Race::BwZerg], vec![], "p1".into(), false).await.unwrap();
        mm.enter(2, vec![Race::Sc2Terran], vec![], "p2".into(), false).await.unwrap();

        let created = mm.run_wave().await;
        assert_eq!(created.len(), 1);
        assert!(!mm.is_queued(1).await);
        assert!(!mm.is_queued(2).await);
    }
}
