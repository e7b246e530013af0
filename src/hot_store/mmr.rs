use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::race::Race;

/// `(discord_uid, race)` keyed MMR entry (spec §3 "MMR Entry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmrEntry {
    pub discord_uid: i64,
    pub race: Race,
    pub mmr: i32,
    pub games_played: i32,
    pub games_won: i32,
    pub games_lost: i32,
    pub games_drawn: i32,
    pub last_played: Option<DateTime<Utc>>,
}

impl MmrEntry {
    pub const STARTING_MMR: i32 = 1000;

    pub fn new(discord_uid: i64, race: Race) -> Self {
        Self {
            discord_uid,
            race,
            mmr: Self::STARTING_MMR,
            games_played: 0,
            games_won: 0,
            games_lost: 0,
            games_drawn: 0,
            last_played: None,
        }
    }

    /// Ranked ⇔ at least one game in the last `window` (spec §3, derived).
    pub fn is_ranked(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        match self.last_played {
            Some(last) => self.games_played > 0 && now - last <= window,
            None => false,
        }
    }

    /// `games_played = won + lost + drawn` (spec §3 invariant).
    pub fn invariant_holds(&self) -> bool {
        self.games_played == self.games_won + self.games_lost + self.games_drawn
    }
}

/// Rank letter, from best to worst (spec §3 "rank letter ⇔ quantile bucket
/// over currently-ranked entries").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankLetter {
    S,
    A,
    B,
    C,
    D,
}

impl std::fmt::Display for RankLetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Self::S => 'S',
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
        };
        write!(f, "{c}")
    }
}

/// Top 5% is S, next 15% A, next 30% B, next 30% C, bottom 20% D.
const RANK_BUCKETS: [(f64, RankLetter); 4] = [
    (0.05, RankLetter::S),
    (0.20, RankLetter::A),
    (0.50, RankLetter::B),
    (0.80, RankLetter::C),
];

/// Computes `entry`'s rank letter against the population of currently
/// ranked MMR values for its race, by percentile position. `ranked_mmrs`
/// need not be pre-sorted. Returns `None` if `entry` itself isn't ranked, or
/// the population is empty.
pub fn rank_letter(entry: &MmrEntry, now: DateTime<Utc>, window: chrono::Duration, ranked_mmrs: &[i32]) -> Option<RankLetter> {
    if !entry.is_ranked(now, window) || ranked_mmrs.is_empty() {
        return None;
    }

    let better_or_equal = ranked_mmrs.iter().filter(|&&m| m >= entry.mmr).count();
    let percentile = better_or_equal as f64 / ranked_mmrs.len() as f64;

    for (threshold, letter) in RANK_BUCKETS {
        if percentile <= threshold {
            return Some(letter);
        }
    }
    Some(RankLetter::D)
}

#[cfg(test)]
mod rank_letter_tests {
    use super::*;

    fn ranked_entry(mmr: i32) -> MmrEntry {
        let mut e = MmrEntry::new(1, Race::BwTerran);
        e.mmr = mmr;
        e.games_played = 1;
        e.games_won = 1;
        e.last_played = Some(Utc::now());
        e
    }

    #[test]
    fn top_of_population_is_s_rank() {
        let population: Vec<i32> = (0..100).map(|i| 1000 + i * 10).collect();
        let top = ranked_entry(*population.last().unwrap());
        let letter = rank_letter(&top, Utc::now(), chrono::Duration::days(14), &population).unwrap();
        assert_eq!(letter, RankLetter::S);
    }

    #[test]
    fn bottom_of_population_is_d_rank() {
        let population: Vec<i32> = (0..100).map(|i| 1000 + i * 10).collect();
        let bottom = ranked_entry(*population.first().unwrap());
        let letter = rank_letter(&bottom, Utc::now(), chrono::Duration::days(14), &population).unwrap();
        assert_eq!(letter, RankLetter::D);
    }

    #[test]
    fn unranked_entry_has_no_rank_letter() {
        let mut entry = MmrEntry::new(1, Race::BwTerran);
        entry.mmr = 5000;
        let population = vec![1000, 2000, 5000];
        assert!(rank_letter(&entry, Utc::now(), chrono::Duration::days(14), &population).is_none());
    }
}

/// Deltas applied to a single MMR entry's game-stat counters, as an
/// alternative to rewriting the whole row from `HotStore::update_mmr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameStatDelta {
    pub won: i32,
    pub lost: i32,
    pub drawn: i32,
}

impl GameStatDelta {
    pub fn win() -> Self {
        Self { won: 1, lost: 0, drawn: 0 }
    }

    pub fn loss() -> Self {
        Self { won: 0, lost: 1, drawn: 0 }
    }

    pub fn draw() -> Self {
        Self { won: 0, lost: 0, drawn: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_satisfies_games_played_invariant() {
        let entry = MmrEntry::new(1, Race::BwTerran);
        assert!(entry.invariant_holds());
    }

    #[test]
    fn unranked_without_any_games() {
        let entry = MmrEntry::new(1, Race::BwTerran);
        assert!(!entry.is_ranked(Utc::now(), chrono::Duration::days(14)));
    }

    #[test]
    fn ranked_within_window_unranked_outside_it() {
        let mut entry = MmrEntry::new(1, Race::BwTerran);
        entry.games_played = 1;
        entry.games_won = 1;
        let now = Utc::now();
        entry.last_played = Some(now - chrono::Duration::days(1));
        assert!(entry.is_ranked(now, chrono::Duration::days(14)));

        entry.last_played = Some(now - chrono::Duration::days(15));
        assert!(!entry.is_ranked(now, chrono::Duration::days(14)));
    }
}
