use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::race::Race;

pub type MatchId = i64;

/// Per-player report code (spec §6, "bit-exact wire values"). `None` means
/// unset. `#[repr(i32)]` + `serde_repr` carries the exact integer over the
/// wire instead of a string tag, the same way the teacher pins
/// `CharacteristicStrength`'s discriminants (`entity/brain/characteristic.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ReportCode {
    Draw = 0,
    P1Won = 1,
    P2Won = 2,
    /// Self-initiated abort; decrements the submitter's `remaining_aborts`.
    SelfAbort = -3,
    /// No-show; never decrements `remaining_aborts`.
    NoShow = -4,
}

impl ReportCode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Draw),
            1 => Some(Self::P1Won),
            2 => Some(Self::P2Won),
            -3 => Some(Self::SelfAbort),
            -4 => Some(Self::NoShow),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        self as i32
    }

    /// A report that is a terminal gameplay result the rating engine can
    /// score directly (as opposed to an abort code).
    pub fn as_result_code(self) -> Option<i32> {
        match self {
            Self::Draw => Some(0),
            Self::P1Won => Some(1),
            Self::P2Won => Some(2),
            Self::SelfAbort | Self::NoShow => None,
        }
    }
}

/// Overall match outcome (spec §6, "bit-exact wire values"). `None` means
/// in-progress. Same `repr(i32)` + `serde_repr` treatment as [`ReportCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum MatchResult {
    Draw = 0,
    P1Won = 1,
    P2Won = 2,
    Aborted = -1,
    Conflict = -2,
}

impl MatchResult {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Draw),
            1 => Some(Self::P1Won),
            2 => Some(Self::P2Won),
            -1 => Some(Self::Aborted),
            -2 => Some(Self::Conflict),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        self as i32
    }

    /// The rating-engine result code for completed (non-abort, non-conflict)
    /// outcomes.
    pub fn as_result_code(self) -> Option<i32> {
        match self {
            Self::Draw => Some(0),
            Self::P1Won => Some(1),
            Self::P2Won => Some(2),
            Self::Aborted | Self::Conflict => None,
        }
    }
}

/// Tagged variant of a match's state, *derived* from stored columns, never
/// persisted (spec §9 "Polymorphism over match state" — replacing the
/// source's synthetic status column with this).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    InProgress,
    Conflict,
    Aborted,
    Completed(i32),
}

/// A live or completed 1v1 match (spec §3 "Match").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub match_id: MatchId,
    pub player_1_uid: i64,
    pub player_1_race: Race,
    pub player_2_uid: i64,
    pub player_2_race: Race,
    pub map_name: String,
    pub server: String,
    pub chat_channel_tag: String,
    pub created_at: DateTime<Utc>,

    /// Frozen at creation; the sole baseline for all rating arithmetic on
    /// this match (spec §3).
    pub player_1_mmr: i32,
    pub player_2_mmr: i32,

    pub player_1_report: Option<ReportCode>,
    pub player_2_report: Option<ReportCode>,
    pub match_result: Option<MatchResult>,
    /// Positive = P1 gained. 0 if aborted/not yet resolved.
    pub mmr_change: i32,

    pub player_1_replay_path: Option<String>,
    pub player_2_replay_path: Option<String>,
    pub player_1_replay_time: Option<DateTime<Utc>>,
    pub player_2_replay_time: Option<DateTime<Utc>>,

    pub player_1_confirmed: bool,
    pub player_2_confirmed: bool,
}

impl Match {
    /// `match_result != None` (spec §3, §4.1 "no synthetic status column").
    pub fn is_terminal(&self) -> bool {
        self.match_result.is_some()
    }

    /// Both per-player report fields are set.
    pub fn both_reported(&self) -> bool {
        self.player_1_report.is_some() && self.player_2_report.is_some()
    }

    /// Tagged-variant view of this match's state, computed on demand from
    /// stored columns (spec §9).
    pub fn state(&self) -> MatchState {
        match self.match_result {
            None => MatchState::InProgress,
            Some(MatchResult::Conflict) => MatchState::Conflict,
            Some(MatchResult::Aborted) => MatchState::Aborted,
            Some(result) => match result.as_result_code() {
                Some(code) => MatchState::Completed(code),
                None => MatchState::Aborted,
            },
        }
    }

    pub fn race_for(&self, discord_uid: i64) -> Option<Race> {
        if discord_uid == self.player_1_uid {
            Some(self.player_1_race)
        } else if discord_uid == self.player_2_uid {
            Some(self.player_2_race)
        } else {
            None
        }
    }

    pub fn is_participant(&self, discord_uid: i64) -> bool {
        discord_uid == self.player_1_uid || discord_uid == self.player_2_uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> Match {
        Match {
            match_id: 1,
            player_1_uid: 1,
            player_1_race: Race::BwZerg,
            player_2_uid: 2,
            player_2_race: Race::Sc2Terran,
            map_name: "Fighting Spirit".into(),
            server: "us-east".into(),
            chat_channel_tag: "scevo123".into(),
            created_at: Utc::now(),
            player_1_mmr: 1492,
            player_2_mmr: 1505,
            player_1_report: None,
            player_2_report: None,
            match_result: None,
            mmr_change: 0,
            player_1_replay_path: None,
            player_2_replay_path: None,
            player_1_replay_time: None,
            player_2_replay_time: None,
            player_1_confirmed: false,
            player_2_confirmed: false,
        }
    }

    #[test]
    fn report_code_round_trips() {
        for raw in [0, 1, 2, -3, -4] {
            let code = ReportCode::from_raw(raw).unwrap();
            assert_eq!(code.to_raw(), raw);
        }
        assert!(ReportCode::from_raw(5).is_none());
    }

    #[test]
    fn match_result_round_trips() {
        for raw in [0, 1, 2, -1, -2] {
            let result = MatchResult::from_raw(raw).unwrap();
            assert_eq!(result.to_raw(), raw);
        }
    }

    #[test]
    fn fresh_match_is_not_terminal() {
        let m = sample_match();
        assert!(!m.is_terminal());
        assert_eq!(m.state(), MatchState::InProgress);
    }

    #[test]
    fn self_pairing_rejected_conceptually_distinct_uids() {
        let m = sample_match();
        assert_ne!(m.player_1_uid, m.player_2_uid);
    }
}
