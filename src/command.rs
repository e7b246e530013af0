//! Admin commands, taken from stdin, same shape as the teacher's
//! line-oriented command loop. Each line's first token selects a verb
//! (`strum`-parsed like `Command` below); the remaining tokens are the
//! verb's own arguments, parsed by hand since their arity varies.

use std::str::FromStr;

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::admin::{AdjustOp, AdminOutcome};
use crate::AppContext;

#[derive(Debug, Clone, Copy, strum::AsRefStr, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
enum Verb {
    Resolve,
    AdjustMmr,
    RemoveFromQueue,
    ResetAborts,
    ClearQueue,
    Ban,
}

pub async fn process_stdin_commands(ctx: AppContext) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Err(e) = handle_line(&ctx, line).await {
            eprintln!("command failed: {e}");
        }
    }

    Ok(())
}

async fn handle_line(ctx: &AppContext, line: &str) -> anyhow::Result<()> {
    let mut tokens = line.split_whitespace();
    let verb_token = tokens.next().ok_or_else(|| anyhow::anyhow!("empty command"))?;
    let verb = Verb::from_str(verb_token).map_err(|_| anyhow::anyhow!("no such command: {verb_token}"))?;
    let rest: Vec<&str> = tokens.collect();

    // admin uid is always the second token of the line, conventionally
    // supplied by whatever authenticates the operator before piping input in.
    let admin_uid: i64 = rest
        .first()
        .ok_or_else(|| anyhow::anyhow!("missing admin uid"))?
        .parse()?;
    let args = &rest[1..];

    match verb {
        Verb::Resolve => {
            let match_id: i64 = args.first().ok_or_else(|| anyhow::anyhow!("missing match_id"))?.parse()?;
            let outcome = AdminOutcome::from_str(args.get(1).ok_or_else(|| anyhow::anyhow!("missing outcome"))?)
                .map_err(|_| anyhow::anyhow!("invalid outcome"))?;
            let reason = args[2..].join(" ");
            ctx.admin.resolve(match_id, outcome, admin_uid, reason).await?;
            info!(match_id, "match resolved via admin command");
        }
        Verb::AdjustMmr => {
            let uid: i64 = args.first().ok_or_else(|| anyhow::anyhow!("missing uid"))?.parse()?;
            let race: crate::race::Race =
                args.get(1).ok_or_else(|| anyhow::anyhow!("missing race"))?.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
            let op = AdjustOp::from_str(args.get(2).ok_or_else(|| anyhow::anyhow!("missing op"))?)
                .map_err(|_| anyhow::anyhow!("invalid op"))?;
            let value: i32 = args.get(3).ok_or_else(|| anyhow::anyhow!("missing value"))?.parse()?;
            let reason = args[4..].join(" ");
            ctx.admin.adjust_mmr(admin_uid, uid, race, op, value, reason)?;
        }
        Verb::RemoveFromQueue => {
            let uid: i64 = args.first().ok_or_else(|| anyhow::anyhow!("missing uid"))?.parse()?;
            let reason = args[1..].join(" ");
            ctx.admin.remove_from_queue(admin_uid, uid, reason).await?;
        }
        Verb::ResetAborts => {
            let uid: i64 = args.first().ok_or_else(|| anyhow::anyhow!("missing uid"))?.parse()?;
            let new_count: i32 = args.get(1).ok_or_else(|| anyhow::anyhow!("missing new_count"))?.parse()?;
            let reason = args[2..].join(" ");
            ctx.admin.reset_aborts(admin_uid, uid, new_count, reason)?;
        }
        Verb::ClearQueue => {
            let reason = args.join(" ");
            let removed = ctx.admin.clear_queue(admin_uid, reason).await?;
            info!(removed, "queue cleared via admin command");
        }
        Verb::Ban => {
            let uid: i64 = args.first().ok_or_else(|| anyhow::anyhow!("missing uid"))?.parse()?;
            let reason = args[1..].join(" ");
            ctx.admin.ban(admin_uid, uid, reason).await?;
        }
    }

    Ok(())
}
