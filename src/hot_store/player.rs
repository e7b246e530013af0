use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A player record (spec §3 "Player"). Created on first interaction, never
/// destroyed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Player {
    pub discord_uid: i64,
    pub player_name: String,
    pub battletag: Option<String>,
    pub alt1: Option<String>,
    pub alt2: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub accepted_tos: bool,
    pub accepted_tos_date: Option<DateTime<Utc>>,
    pub completed_setup: bool,
    pub completed_setup_date: Option<DateTime<Utc>>,
    pub activation_code: Option<String>,
    pub remaining_aborts: i32,
    pub shield_battery_bug: bool,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Player {
    /// A minimal get-or-create record, as produced by `HotStore::ensure_player`.
    pub fn new_minimal(discord_uid: i64, max_aborts: i32, now: DateTime<Utc>) -> Self {
        Self {
            discord_uid,
            player_name: discord_uid.to_string(),
            battletag: None,
            alt1: None,
            alt2: None,
            country: None,
            region: None,
            accepted_tos: false,
            accepted_tos_date: None,
            completed_setup: false,
            completed_setup_date: None,
            activation_code: None,
            remaining_aborts: max_aborts,
            shield_battery_bug: false,
            is_banned: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for `HotStore::update_player`. Every field left `None` is
/// left unchanged. `created_at` is deliberately absent: it is write-once
/// (spec §6) and is never exposed as a patchable field.
#[derive(Debug, Clone, Default)]
pub struct PlayerPatch {
    pub player_name: Option<String>,
    pub battletag: Option<Option<String>>,
    pub alt1: Option<Option<String>>,
    pub alt2: Option<Option<String>>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub accepted_tos: Option<bool>,
    pub completed_setup: Option<bool>,
    pub activation_code: Option<Option<String>>,
}

impl PlayerPatch {
    /// Applies this patch to `player`, returning `(field_name, old, new)`
    /// pairs for every field actually changed — the shape `player_action_logs`
    /// (spec §3.1) needs.
    pub fn apply(self, player: &mut Player) -> Vec<(&'static str, String, String)> {
        let mut changes = Vec::new();

        macro_rules! apply_field {
            ($field:ident, $name:literal) => {
                if let Some(new_value) = self.$field {
                    let old = format!("{:?}", player.$field);
                    if player.$field != new_value {
                        player.$field = new_value;
                        changes.push(($name, old, format!("{:?}", player.$field)));
                    }
                }
            };
        }

        apply_field!(player_name, "player_name");
        apply_field!(battletag, "battletag");
        apply_field!(alt1, "alt1");
        apply_field!(alt2, "alt2");
        apply_field!(country, "country");
        apply_field!(region, "region");
        apply_field!(activation_code, "activation_code");

        // `*_date` columns stamp the moment the flag first flips to true and
        // are otherwise left alone (spec §6: one-way TOS/setup acknowledgements).
        if let Some(true) = self.accepted_tos {
            if !player.accepted_tos {
                player.accepted_tos = true;
                player.accepted_tos_date.get_or_insert(Utc::now());
                changes.push(("accepted_tos", "false".into(), "true".into()));
            }
        }
        if let Some(true) = self.completed_setup {
            if !player.completed_setup {
                player.completed_setup = true;
                player.completed_setup_date.get_or_insert(Utc::now());
                changes.push(("completed_setup", "false".into(), "true".into()));
            }
        }

        changes
    }
}
