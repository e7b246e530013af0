//! The replay verifier (spec §4.7, component C7).
//!
//! Pure metadata checks against a match record; never mutates anything and
//! never touches the hot store directly (it is handed a `Match` and a
//! `ReplayArtifact` by the presenter that called it). The eight checks are
//! fixed by spec §4.7 and the scenario in §8 (S8).

use chrono::Duration;
use serde::Serialize;

use crate::hot_store::{Match, ReplayArtifact};

const TIMESTAMP_TOLERANCE_MINUTES: i64 = 20;
const EXPECTED_GAME_PRIVACY: &str = "Normal";
const EXPECTED_GAME_SPEED: &str = "Faster";
const EXPECTED_GAME_DURATION_SETTING: &str = "Unlimited";
const EXPECTED_LOCKED_ALLIANCES: &str = "Yes";

/// One named check: whether it passed, and what was expected vs found
/// (spec §4.7 "each a triple `(passed, expected, found)`").
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub expected: String,
    pub found: String,
}

/// The full 8-check verification report for one replay against one match.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub checks: Vec<CheckResult>,
    pub all_passed: bool,
}

/// Runs all 8 checks of spec §4.7 against `replay` and `m`.
pub fn verify(replay: &ReplayArtifact, m: &Match) -> VerificationReport {
    let mut checks = Vec::with_capacity(8);

    // 1. Races: order-insensitive.
    let match_races = [m.player_1_race, m.player_2_race];
    let replay_races = [replay.player_1_race, replay.player_2_race];
    let races_match = (replay_races[0] == match_races[0] && replay_races[1] == match_races[1])
        || (replay_races[0] == match_races[1] && replay_races[1] == match_races[0]);
    checks.push(CheckResult {
        name: "races",
        passed: races_match,
        expected: format!("{{{}, {}}}", match_races[0], match_races[1]),
        found: format!("{{{}, {}}}", replay_races[0], replay_races[1]),
    });

    // 2. Map.
    checks.push(CheckResult {
        name: "map",
        passed: replay.map_name == m.map_name,
        expected: m.map_name.clone(),
        found: replay.map_name.clone(),
    });

    // 3. Timestamp: within 20 minutes.
    let diff = (replay.replay_date - m.created_at).abs();
    let timestamp_ok = diff <= Duration::minutes(TIMESTAMP_TOLERANCE_MINUTES);
    checks.push(CheckResult {
        name: "timestamp",
        passed: timestamp_ok,
        expected: format!("within {TIMESTAMP_TOLERANCE_MINUTES}min of {}", m.created_at),
        found: replay.replay_date.to_string(),
    });

    // 4. Observers empty.
    checks.push(CheckResult {
        name: "observers",
        passed: replay.observers.is_empty(),
        expected: "[]".into(),
        found: format!("{:?}", replay.observers),
    });

    // 5. Game privacy.
    checks.push(string_check("game_privacy", EXPECTED_GAME_PRIVACY, &replay.game_privacy));

    // 6. Game speed.
    checks.push(string_check("game_speed", EXPECTED_GAME_SPEED, &replay.game_speed));

    // 7. Game duration setting.
    checks.push(string_check(
        "game_duration_setting",
        EXPECTED_GAME_DURATION_SETTING,
        &replay.game_duration_setting,
    ));

    // 8. Locked alliances.
    checks.push(string_check("locked_alliances", EXPECTED_LOCKED_ALLIANCES, &replay.locked_alliances));

    let all_passed = checks.iter().all(|c| c.passed);
    VerificationReport { checks, all_passed }
}

fn string_check(name: &'static str, expected: &str, found: &str) -> CheckResult {
    CheckResult {
        name,
        passed: found == expected,
        expected: expected.to_owned(),
        found: found.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::Race;
    use chrono::Utc;

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

    fn matching_replay(m: &Match) -> ReplayArtifact {
        ReplayArtifact {
            replay_path: "r/1".into(),
            replay_hash: "deadbeef".into(),
            replay_date: m.created_at,
            player_1_name: "alice".into(),
            player_2_name: "bob".into(),
            player_1_race: m.player_1_race,
            player_2_race: m.player_2_race,
            result: None,
            player_1_handle: None,
            player_2_handle: None,
            observers: vec![],
            map_name: m.map_name.clone(),
            duration_secs: 900,
            game_privacy: "Normal".into(),
            game_speed: "Faster".into(),
            game_duration_setting: "Unlimited".into(),
            locked_alliances: "Yes".into(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn fully_matching_replay_passes_all_checks() {
        let m = sample_match();
        let replay = matching_replay(&m);
        let report = verify(&replay, &m);
        assert!(report.all_passed);
        assert_eq!(report.checks.len(), 8);
    }

    #[test]
    fn races_check_is_order_insensitive() {
        let m = sample_match();
        let mut replay = matching_replay(&m);
        replay.player_1_race = m.player_2_race;
        replay.player_2_race = m.player_1_race;
        let report = verify(&replay, &m);
        assert!(report.checks.iter().find(|c| c.name == "races").unwrap().passed);
    }

    #[test]
    fn scenario_s8_public_privacy_fails_only_that_check_but_flips_overall() {
        let m = sample_match();
        let mut replay = matching_replay(&m);
        replay.game_privacy = "Public".into();
        let report = verify(&replay, &m);

        assert!(!report.all_passed);
        let privacy_check = report.checks.iter().find(|c| c.name == "game_privacy").unwrap();
        assert!(!privacy_check.passed);
        assert_eq!(privacy_check.expected, "Normal");
        assert_eq!(privacy_check.found, "Public");

        for check in &report.checks {
            if check.name != "game_privacy" {
                assert!(check.passed, "{} unexpectedly failed", check.name);
            }
        }
    }

    #[test]
    fn timestamp_outside_tolerance_fails() {
        let m = sample_match();
        let mut replay = matching_replay(&m);
        replay.replay_date = m.created_at + Duration::minutes(21);
        let report = verify(&replay, &m);
        assert!(!report.checks.iter().find(|c| c.name == "timestamp").unwrap().passed);
    }
}
