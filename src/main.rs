mod admin;
mod command;
mod config;
mod error;
mod hot_store;
mod lifecycle;
mod matchmaker;
mod migrations;
mod notify;
mod race;
mod rate_limiter;
mod rating;
mod replay_verifier;
mod write_queue;

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use qubit::{handler, Router};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::admin::{AdminOutcome, AdminOverride};
use crate::config::Config;
use crate::error::CoreError;
use crate::hot_store::{HotStore, MatchId, Player, ReplayArtifact};
use crate::lifecycle::MatchLifecycle;
use crate::matchmaker::Matchmaker;
use crate::notify::{FnCallback, NotificationEvent, NotificationFanout};
use crate::race::Race;
use crate::rate_limiter::RateLimiter;
use crate::replay_verifier::VerificationReport;
use crate::write_queue::WriteQueue;

/// One fanned-out event tagged with the player it's destined for, carried
/// over a broadcast channel the same way the teacher carries tick events —
/// every RPC subscriber gets a `BroadcastStream`, filtered down to its own uid.
#[derive(Debug, Clone)]
struct PlayerEvent {
    uid: i64,
    event: NotificationEvent,
}

/// The context type handed to every qubit handler, and to the stdin command
/// loop.
#[derive(Clone)]
pub struct AppContext {
    hot_store: Arc<HotStore>,
    matchmaker: Arc<Matchmaker>,
    lifecycle: Arc<MatchLifecycle>,
    admin: Arc<AdminOverride>,
    fanout: Arc<NotificationFanout>,
    events_tx: broadcast::Sender<PlayerEvent>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct EnterQueueInput {
    uid: i64,
    selected_races: Vec<Race>,
    vetoed_maps: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct ReportMatchInput {
    match_id: MatchId,
    uid: i64,
    value: i32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct ConfirmMatchInput {
    match_id: MatchId,
    uid: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct ResolveMatchInput {
    match_id: MatchId,
    outcome: String,
    admin_uid: i64,
    reason: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct VerifyReplayInput {
    match_id: MatchId,
    replay_path: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RecordReplayUploadInput {
    match_id: MatchId,
    uid: i64,
    replay_path: String,
}

/// A self-service subset of `PlayerPatch` (spec §3 "Player") — the fields a
/// presenter lets a player edit directly. `activation_code` and the ban flag
/// stay admin-only (`ban`/`unban` in the stdin command loop, spec §4.8).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct UpdatePlayerInput {
    uid: i64,
    player_name: Option<String>,
    battletag: Option<Option<String>>,
    alt1: Option<Option<String>>,
    alt2: Option<Option<String>>,
    country: Option<String>,
    region: Option<String>,
    accepted_tos: Option<bool>,
    completed_setup: Option<bool>,
}

#[handler(query)]
async fn get_player(ctx: AppContext, uid: i64) -> Option<Player> {
    ctx.hot_store.get_player(uid)
}

#[handler(query)]
async fn get_match(ctx: AppContext, match_id: MatchId) -> Option<crate::hot_store::Match> {
    ctx.hot_store.get_match(match_id)
}

#[handler(query)]
async fn get_preferences(ctx: AppContext, uid: i64) -> Option<crate::hot_store::Preferences> {
    ctx.hot_store.get_preferences(uid)
}

#[handler(query)]
async fn queue_len(ctx: AppContext) -> usize {
    ctx.matchmaker.queue_len().await
}

#[handler(query)]
async fn is_queued(ctx: AppContext, uid: i64) -> bool {
    ctx.matchmaker.is_queued(uid).await
}

#[handler(mutation)]
async fn register_presenter(ctx: AppContext, uid: i64) -> Result<(), String> {
    let events_tx = ctx.events_tx.clone();
    ctx.hot_store.ensure_player(uid);
    ctx.fanout
        .register_player(
            uid,
            Arc::new(FnCallback(move |event: &NotificationEvent| {
                let _ = events_tx.send(PlayerEvent { uid, event: event.clone() });
            })),
        )
        .await;
    Ok(())
}

/// Clears a player's presenter slot (spec §4.3 "on disconnect the slot is
/// cleared") — called when a presenter frontend tears down its connection,
/// distinct from `leave_queue` which only affects queue membership.
#[handler(mutation)]
async fn disconnect_presenter(ctx: AppContext, uid: i64) -> Result<(), String> {
    ctx.fanout.unregister_player(uid).await;
    Ok(())
}

#[handler(mutation)]
async fn enter_queue(ctx: AppContext, input: EnterQueueInput) -> Result<(), String> {
    ctx.hot_store.log_command_call(input.uid, "enter");
    let is_in_live_match = ctx.hot_store.is_in_live_match(input.uid);
    ctx.matchmaker
        .enter(input.uid, input.selected_races, input.vetoed_maps, input.uid.to_string(), is_in_live_match)
        .await
        .map_err(|e: CoreError| e.to_string())
}

#[handler(mutation)]
async fn leave_queue(ctx: AppContext, uid: i64) -> Result<(), String> {
    ctx.hot_store.log_command_call(uid, "leave");
    ctx.matchmaker.leave(uid).await;
    Ok(())
}

#[handler(mutation)]
async fn confirm_match(ctx: AppContext, input: ConfirmMatchInput) -> Result<(), String> {
    ctx.hot_store.log_command_call(input.uid, format!("confirm {}", input.match_id));
    ctx.lifecycle.confirm(input.match_id, input.uid).await.map_err(|e| e.to_string())
}

#[handler(mutation)]
async fn report_match(ctx: AppContext, input: ReportMatchInput) -> Result<(), String> {
    ctx.hot_store
        .log_command_call(input.uid, format!("record_report {} {}", input.match_id, input.value));
    ctx.lifecycle
        .record_report(input.match_id, input.uid, input.value)
        .await
        .map_err(|e| e.to_string())
}

#[handler(mutation)]
async fn resolve_match(ctx: AppContext, input: ResolveMatchInput) -> Result<(), String> {
    let outcome = AdminOutcome::from_str(&input.outcome).map_err(|_| "invalid outcome".to_owned())?;
    ctx.admin
        .resolve(input.match_id, outcome, input.admin_uid, input.reason)
        .await
        .map_err(|e| e.to_string())
}

#[handler(query)]
async fn verify_replay(ctx: AppContext, input: VerifyReplayInput) -> Option<VerificationReport> {
    let m = ctx.hot_store.get_match(input.match_id)?;
    let replay = ctx.hot_store.get_replay(&input.replay_path)?;
    Some(replay_verifier::verify(&replay, &m))
}

/// Registers a replay's parsed metadata (spec §3 "Replay Artifact") after an
/// external presenter has already parsed the uploaded file and `put_blob`-ed
/// it to the object store (spec §6) — replay file parsing itself stays out
/// of this core's scope.
#[handler(mutation)]
async fn register_replay(ctx: AppContext, replay: ReplayArtifact) -> Result<(), String> {
    ctx.hot_store.insert_replay(replay);
    Ok(())
}

#[handler(mutation)]
async fn record_replay_upload(ctx: AppContext, input: RecordReplayUploadInput) -> Result<(), String> {
    let m = ctx
        .hot_store
        .get_match(input.match_id)
        .ok_or_else(|| "no such match".to_owned())?;
    let which = if input.uid == m.player_1_uid {
        crate::hot_store::WhichPlayer::One
    } else if input.uid == m.player_2_uid {
        crate::hot_store::WhichPlayer::Two
    } else {
        return Err("player is not a participant in this match".to_owned());
    };
    ctx.hot_store
        .record_replay_upload(input.match_id, which, input.replay_path)
        .map_err(|e| e.to_string())?;
    Ok(())
}

#[handler(query)]
async fn rank_letter(ctx: AppContext, uid: i64, race: Race) -> Option<String> {
    ctx.hot_store.rank_letter(uid, race).map(|r| r.to_string())
}

#[handler(mutation)]
async fn update_player(ctx: AppContext, input: UpdatePlayerInput) -> Result<Player, String> {
    let patch = crate::hot_store::PlayerPatch {
        player_name: input.player_name,
        battletag: input.battletag,
        alt1: input.alt1,
        alt2: input.alt2,
        country: input.country,
        region: input.region,
        accepted_tos: input.accepted_tos,
        completed_setup: input.completed_setup,
        ..Default::default()
    };
    ctx.hot_store
        .update_player(input.uid, patch, crate::write_queue::ChangedBy::User)
        .map_err(|e| e.to_string())
}

#[handler(mutation)]
async fn set_shield_battery_bug_ack(ctx: AppContext, uid: i64, ack: bool) -> Result<(), String> {
    ctx.hot_store.set_shield_battery_bug_ack(uid, ack).map_err(|e| e.to_string())?;
    Ok(())
}

#[handler(subscription)]
async fn player_events(ctx: AppContext, uid: i64) -> impl Stream<Item = NotificationEvent> {
    let stream = tokio_stream::wrappers::BroadcastStream::new(ctx.events_tx.subscribe());
    stream.filter_map(move |e| async move {
        match e {
            Ok(ev) if ev.uid == uid => Some(ev.event),
            _ => None,
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy())
        .init();

    let config = Config::from_env()?;

    let db = SqlitePool::connect_with(SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true)).await?;

    info!("running db migrations");
    migrations::run(&db).await?;

    let (write_queue, write_queue_consumer) = WriteQueue::spawn(db.clone(), config.write_queue_depth, config.write_retry_backoffs);
    let hot_store = Arc::new(HotStore::load(&db, write_queue, config.max_aborts, config.ranked_window).await?);

    let (rate_limiter, rate_limiter_worker) = RateLimiter::spawn(config.rate_limit_queue, config.rate_limit_min_delay);

    let fanout = Arc::new(NotificationFanout::new());
    let lifecycle = MatchLifecycle::new(
        hot_store.clone(),
        fanout.clone(),
        rate_limiter,
        config.confirm_timer,
        config.abort_timer,
        config.reminder_delay(),
        config.k_factor,
    );
    let matchmaker = Arc::new(Matchmaker::new(hot_store.clone()));
    let admin = Arc::new(AdminOverride::new(
        hot_store.clone(),
        lifecycle.clone(),
        matchmaker.clone(),
        fanout.clone(),
        config.max_aborts,
        config.k_factor,
        config.admin_uids.clone(),
    ));

    let (events_tx, mut debug_events_rx) = broadcast::channel(1024);
    let ctx = AppContext {
        hot_store: hot_store.clone(),
        matchmaker: matchmaker.clone(),
        lifecycle: lifecycle.clone(),
        admin,
        fanout,
        events_tx,
    };

    let router = Router::new()
        .handler(get_player)
        .handler(get_match)
        .handler(get_preferences)
        .handler(queue_len)
        .handler(is_queued)
        .handler(register_presenter)
        .handler(disconnect_presenter)
        .handler(enter_queue)
        .handler(leave_queue)
        .handler(confirm_match)
        .handler(report_match)
        .handler(resolve_match)
        .handler(verify_replay)
        .handler(register_replay)
        .handler(record_replay_upload)
        .handler(rank_letter)
        .handler(update_player)
        .handler(set_shield_battery_bug_ack)
        .handler(player_events);

    if let Ok(bindings_path) = env::var("TS_BINDINGS_PATH") {
        info!("writing ts bindings to {bindings_path}");
        router.generate_type(&bindings_path).expect("failed to write bindings");
    } else {
        warn!("TS_BINDINGS_PATH not set, skipping ts binding generation");
    }

    let (qubit_service, qubit_handle) = router.into_service(ctx.clone());
    let axum_router = axum::Router::<()>::new().nest_service("/rpc", qubit_service);

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    tracker.spawn(write_queue_consumer);
    tracker.spawn(rate_limiter_worker);

    tracker.spawn({
        let token = token.clone();
        let debug_loop = async move {
            while let Ok(ev) = debug_events_rx.recv().await {
                tracing::debug!(uid = ev.uid, event = ?ev.event, "notification fanned out");
            }
        };

        async move {
            tokio::select! {
                () = debug_loop => {},
                () = token.cancelled() => {},
            }
        }
    });

    tracker.spawn({
        let token = token.clone();
        let matchmaker = matchmaker.clone();
        let lifecycle = lifecycle.clone();
        let wave_period = config.wave_period;
        let wave_loop = async move {
            loop {
                tokio::time::sleep(wave_period).await;
                let created = matchmaker.run_wave().await;
                for m in created {
                    if let Err(e) = lifecycle.start_match(m.match_id).await {
                        tracing::error!(match_id = m.match_id, error = %e, "failed to start match lifecycle");
                    }
                }
            }
        };

        async move {
            tokio::select! {
                () = wave_loop => {},
                () = token.cancelled() => {},
            }
        }
    });

    tracker.spawn({
        let token = token.clone();
        let addr = SocketAddr::from(([0, 0, 0, 0], 9944));
        info!("RPC server listening at {addr}");
        let start_hyper = async move {
            let listener = TcpListener::bind(&addr).await.expect("failed to bind RPC listener");
            axum::serve(listener, axum_router).await
        };

        async move {
            tokio::select! {
                err = start_hyper => {
                    qubit_handle.stop().expect("could not stop qubit");
                    err.expect("RPC server exited with an error");
                },
                () = token.cancelled() => {},
            }
        }
    });

    tracker.spawn({
        let ctx = ctx.clone();
        let token = token.clone();
        let command_loop = async move {
            if let Err(e) = command::process_stdin_commands(ctx).await {
                tracing::error!(error = %e, "admin command loop exited");
            }
        };

        async move {
            tokio::select! {
                () = command_loop => {},
                () = token.cancelled() => {},
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    token.cancel();
    tracker.close();
    tracker.wait().await;
    Ok(())
}
