//! The write queue (spec §4.2, component C2).
//!
//! A bounded FIFO of typed write jobs, drained by a single consumer task
//! against the durable SQL store. Producers never block: `WriteQueue::push`
//! is a non-blocking `try_send`; a full queue drops the newest job and logs
//! a warning rather than stalling a hot-store mutator on I/O (spec §5,
//! "no hot-store mutator blocks on I/O"). Because the whole queue is a
//! single FIFO channel, writes for any given match id are trivially applied
//! in issue order (Testable Property 10) — no per-key reordering is
//! possible without a second queue, which this design doesn't need.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::hot_store::{Match, MmrEntry, Player, Preferences, ReplayArtifact, ReportCode};

const DEAD_LETTER_LOG_PATH: &str = "dead_letter.log";

#[derive(Debug, Clone)]
pub enum WriteJob {
    UpsertPlayer(Player),
    UpsertMmr(MmrEntry),
    UpsertPreferences(Preferences),
    UpsertMatch(Box<Match>),
    InsertReplay(Box<ReplayArtifact>),
    PlayerActionLog {
        discord_uid: i64,
        player_name: String,
        setting_name: String,
        old_value: String,
        new_value: String,
        changed_by: ChangedBy,
        changed_at: DateTime<Utc>,
    },
    AdminAction {
        admin_uid: i64,
        action_type: String,
        target_uid: Option<i64>,
        match_id: Option<i64>,
        reason: String,
        details_json: String,
        at: DateTime<Utc>,
    },
    CommandCall {
        discord_uid: i64,
        command: String,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedBy {
    User,
    Admin,
    System,
}

impl ChangedBy {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

/// Handle producers hold to enqueue jobs. Cheap to clone.
#[derive(Clone)]
pub struct WriteQueue {
    sender: mpsc::Sender<WriteJob>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl WriteQueue {
    /// Spawns the consumer task and returns `(handle, join_future)`. The
    /// caller is expected to keep the join future in its `TaskTracker`, the
    /// same way the teacher tracks its tick and log loops in `main`.
    pub fn spawn(
        db: SqlitePool,
        capacity: usize,
        backoffs: [Duration; 3],
    ) -> (Self, impl std::future::Future<Output = ()>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let depth = Arc::new(AtomicUsize::new(0));
        let handle = Self {
            sender,
            depth: depth.clone(),
            capacity,
        };
        let consumer = run_consumer(db, receiver, depth, backoffs);
        (handle, consumer)
    }

    /// Never blocks. Drops the job and logs a warning if the queue is full.
    /// Emits an advisory warning at 80% capacity (spec §4.2).
    pub fn push(&self, job: WriteJob) {
        match self.sender.try_send(job) {
            Ok(()) => {
                let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
                if depth * 10 >= self.capacity * 8 {
                    warn!(depth, capacity = self.capacity, "write queue at >=80% capacity");
                }
            }
            Err(_) => {
                error!("write queue full, dropping job");
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

async fn run_consumer(
    db: SqlitePool,
    mut receiver: mpsc::Receiver<WriteJob>,
    depth: Arc<AtomicUsize>,
    backoffs: [Duration; 3],
) {
    while let Some(job) = receiver.recv().await {
        depth.fetch_sub(1, Ordering::SeqCst);

        let mut attempt = 0;
        loop {
            match apply_job(&db, &job).await {
                Ok(()) => break,
                Err(e) if attempt < backoffs.len() => {
                    warn!(attempt, error = %e, "write job failed, retrying");
                    tokio::time::sleep(backoffs[attempt]).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, "write job failed after all retries, routing to dead-letter log");
                    dead_letter(&job, &e).await;
                    break;
                }
            }
        }
    }
}

async fn dead_letter(job: &WriteJob, error: &anyhow::Error) {
    let line = format!(
        "{} job={:?} error={error}\n",
        Utc::now().to_rfc3339(),
        job
    );
    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(DEAD_LETTER_LOG_PATH)
        .await
    {
        Ok(mut file) => {
            if let Err(e) = file.write_all(line.as_bytes()).await {
                error!(error = %e, "failed to append to dead-letter log");
            }
        }
        Err(e) => error!(error = %e, "failed to open dead-letter log"),
    }
}

async fn apply_job(db: &SqlitePool, job: &WriteJob) -> anyhow::Result<()> {
    match job {
        WriteJob::UpsertPlayer(player) => {
            sqlx::query(
                "INSERT INTO players (discord_uid, player_name, battletag, alt1, alt2, country, region, \
                 accepted_tos, accepted_tos_date, completed_setup, completed_setup_date, activation_code, \
                 remaining_aborts, shield_battery_bug, is_banned, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(discord_uid) DO UPDATE SET \
                 player_name=excluded.player_name, battletag=excluded.battletag, alt1=excluded.alt1, alt2=excluded.alt2, \
                 country=excluded.country, region=excluded.region, accepted_tos=excluded.accepted_tos, \
                 accepted_tos_date=excluded.accepted_tos_date, completed_setup=excluded.completed_setup, \
                 completed_setup_date=excluded.completed_setup_date, activation_code=excluded.activation_code, \
                 remaining_aborts=excluded.remaining_aborts, \
                 shield_battery_bug=excluded.shield_battery_bug, is_banned=excluded.is_banned, updated_at=excluded.updated_at",
            )
            .bind(player.discord_uid)
            .bind(&player.player_name)
            .bind(&player.battletag)
            .bind(&player.alt1)
            .bind(&player.alt2)
            .bind(&player.country)
            .bind(&player.region)
            .bind(player.accepted_tos)
            .bind(player.accepted_tos_date)
            .bind(player.completed_setup)
            .bind(player.completed_setup_date)
            .bind(&player.activation_code)
            .bind(player.remaining_aborts)
            .bind(player.shield_battery_bug)
            .bind(player.is_banned)
            .bind(player.created_at)
            .bind(player.updated_at)
            .execute(db)
            .await?;
        }
        WriteJob::UpsertMmr(mmr) => {
            sqlx::query(
                "INSERT INTO mmrs_1v1 (discord_uid, race, mmr, games_played, games_won, games_lost, games_drawn, last_played) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(discord_uid, race) DO UPDATE SET \
                 mmr=excluded.mmr, games_played=excluded.games_played, games_won=excluded.games_won, \
                 games_lost=excluded.games_lost, games_drawn=excluded.games_drawn, last_played=excluded.last_played",
            )
            .bind(mmr.discord_uid)
            .bind(mmr.race.as_ref())
            .bind(mmr.mmr)
            .bind(mmr.games_played)
            .bind(mmr.games_won)
            .bind(mmr.games_lost)
            .bind(mmr.games_drawn)
            .bind(mmr.last_played)
            .execute(db)
            .await?;
        }
        WriteJob::UpsertPreferences(prefs) => {
            let (races, vetoes) = prefs.to_columns();
            sqlx::query(
                "INSERT INTO preferences_1v1 (discord_uid, last_chosen_races, last_chosen_vetoes) \
                 VALUES (?, ?, ?) \
                 ON CONFLICT(discord_uid) DO UPDATE SET \
                 last_chosen_races=excluded.last_chosen_races, last_chosen_vetoes=excluded.last_chosen_vetoes",
            )
            .bind(prefs.discord_uid)
            .bind(races)
            .bind(vetoes)
            .execute(db)
            .await?;
        }
        WriteJob::UpsertMatch(m) => {
            sqlx::query(
                "INSERT INTO matches_1v1 (id, player_1_uid, player_1_race, player_2_uid, player_2_race, \
                 player_1_mmr, player_2_mmr, map_name, server, chat_channel_tag, player_1_report, player_2_report, \
                 match_result, mmr_change, player_1_replay_path, player_2_replay_path, player_1_replay_time, \
                 player_2_replay_time, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET \
                 player_1_report=excluded.player_1_report, player_2_report=excluded.player_2_report, \
                 match_result=excluded.match_result, mmr_change=excluded.mmr_change, \
                 player_1_replay_path=excluded.player_1_replay_path, player_2_replay_path=excluded.player_2_replay_path, \
                 player_1_replay_time=excluded.player_1_replay_time, player_2_replay_time=excluded.player_2_replay_time",
            )
            .bind(m.match_id)
            .bind(m.player_1_uid)
            .bind(m.player_1_race.as_ref())
            .bind(m.player_2_uid)
            .bind(m.player_2_race.as_ref())
            .bind(m.player_1_mmr)
            .bind(m.player_2_mmr)
            .bind(&m.map_name)
            .bind(&m.server)
            .bind(&m.chat_channel_tag)
            .bind(m.player_1_report.map(|r| r.to_raw()))
            .bind(m.player_2_report.map(|r| r.to_raw()))
            .bind(m.match_result.map(|r| r.to_raw()))
            .bind(m.mmr_change)
            .bind(&m.player_1_replay_path)
            .bind(&m.player_2_replay_path)
            .bind(m.player_1_replay_time)
            .bind(m.player_2_replay_time)
            .bind(m.created_at)
            .execute(db)
            .await?;
        }
        WriteJob::InsertReplay(replay) => {
            sqlx::query(
                "INSERT INTO replays (replay_path, replay_hash, replay_date, player_1_name, player_2_name, \
                 player_1_race, player_2_race, result, player_1_handle, player_2_handle, observers, map_name, \
                 duration, game_privacy, game_speed, game_duration_setting, locked_alliances, uploaded_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(replay_path) DO NOTHING",
            )
            .bind(&replay.replay_path)
            .bind(&replay.replay_hash)
            .bind(replay.replay_date)
            .bind(&replay.player_1_name)
            .bind(&replay.player_2_name)
            .bind(replay.player_1_race.as_ref())
            .bind(replay.player_2_race.as_ref())
            .bind(replay.result.map(ReportCode::to_raw))
            .bind(&replay.player_1_handle)
            .bind(&replay.player_2_handle)
            .bind(replay.observers.join(","))
            .bind(&replay.map_name)
            .bind(replay.duration_secs)
            .bind(&replay.game_privacy)
            .bind(&replay.game_speed)
            .bind(&replay.game_duration_setting)
            .bind(&replay.locked_alliances)
            .bind(replay.uploaded_at)
            .execute(db)
            .await?;
        }
        WriteJob::PlayerActionLog {
            discord_uid,
            player_name,
            setting_name,
            old_value,
            new_value,
            changed_by,
            changed_at,
        } => {
            sqlx::query(
                "INSERT INTO player_action_logs (discord_uid, player_name, setting_name, old_value, new_value, changed_at, changed_by) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(discord_uid)
            .bind(player_name)
            .bind(setting_name)
            .bind(old_value)
            .bind(new_value)
            .bind(changed_at)
            .bind(changed_by.as_str())
            .execute(db)
            .await?;
        }
        WriteJob::AdminAction {
            admin_uid,
            action_type,
            target_uid,
            match_id,
            reason,
            details_json,
            at,
        } => {
            sqlx::query(
                "INSERT INTO admin_actions (admin_uid, action_type, target_uid, match_id, reason, details, at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(admin_uid)
            .bind(action_type)
            .bind(target_uid)
            .bind(match_id)
            .bind(reason)
            .bind(details_json)
            .bind(at)
            .execute(db)
            .await?;
        }
        WriteJob::CommandCall {
            discord_uid,
            command,
            at,
        } => {
            sqlx::query("INSERT INTO command_calls (discord_uid, command, at) VALUES (?, ?, ?)")
                .bind(discord_uid)
                .bind(command)
                .bind(at)
                .execute(db)
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_increments_and_drain_decrements_depth() {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrations::run(&db).await.unwrap();

        let (queue, consumer) = WriteQueue::spawn(db, 10, [Duration::from_millis(1); 3]);
        let handle = tokio::spawn(consumer);

        queue.push(WriteJob::CommandCall {
            discord_uid: 1,
            command: "enter".into(),
            at: Utc::now(),
        });

        // Give the consumer a moment to drain.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.depth(), 0);

        drop(queue);
        let _ = handle.await;
    }
}
