use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hot_store::match_record::ReportCode;
use crate::race::Race;

/// Metadata for an uploaded replay artifact (spec §3 "Replay Artifact").
/// The blob itself lives in the object store, addressed by `replay_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayArtifact {
    pub replay_path: String,
    pub replay_hash: String,
    pub replay_date: DateTime<Utc>,
    pub player_1_name: String,
    pub player_2_name: String,
    pub player_1_race: Race,
    pub player_2_race: Race,
    /// In-game result embedded in the replay file itself, as parsed by the
    /// presenter. Informational only — never fed back into C3/C7, since the
    /// verifier and rating engine both work from the match's own reports.
    pub result: Option<ReportCode>,
    pub player_1_handle: Option<String>,
    pub player_2_handle: Option<String>,
    pub observers: Vec<String>,
    pub map_name: String,
    pub duration_secs: i32,
    pub game_privacy: String,
    pub game_speed: String,
    pub game_duration_setting: String,
    pub locked_alliances: String,
    pub uploaded_at: DateTime<Utc>,
}
