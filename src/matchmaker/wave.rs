//! The wave pairing algorithm itself (spec §4.4 steps 1-7). Pure: takes a
//! snapshot of queue entries and returns pairs plus the leftovers, with no
//! knowledge of the hot store or the queue lock — `Matchmaker::run_wave`
//! wraps this with the side effects (match creation, queue mutation).

use std::collections::HashSet;

use crate::matchmaker::QueueEntry;
use crate::race::Title;

/// A working copy of a queue entry tagged with its effective MMR and title
/// for whichever side (X'/Y') it currently sits on. Dual-title entries get
/// reassigned a title when dumped from Z (spec §4.4 step 2).
#[derive(Debug, Clone)]
struct WorkingEntry {
    entry: QueueEntry,
    mmr: i32,
    title: Title,
}

/// One finished pairing, already labeled by which race each player is
/// playing in this match — resolved once here rather than re-derived later,
/// since a dual-title player's race depends on which side of the wave they
/// ended up on.
pub struct MatchedPair {
    pub bw_player: QueueEntry,
    pub bw_race: crate::race::Race,
    pub sc2_player: QueueEntry,
    pub sc2_race: crate::race::Race,
}

pub struct PairedUp {
    pub pairs: Vec<MatchedPair>,
    pub unpaired: Vec<QueueEntry>,
}

/// Elastic window parameters (spec §4.4 step 6).
pub fn max_diff(queue_size: usize, waves_waited: u32) -> i32 {
    let (base, growth) = if queue_size < 6 {
        (125, 75)
    } else if queue_size < 12 {
        (100, 50)
    } else {
        (75, 25)
    };
    const STEP: u32 = 6;
    base + (waves_waited / STEP) as i32 * growth
}

pub fn run_wave(entries: Vec<QueueEntry>) -> PairedUp {
    let queue_size = entries.len();

    // Step 1: partition into X (BW-only), Y (SC2-only), Z (dual-title),
    // each sorted by max selected MMR, descending.
    let mut x0: Vec<QueueEntry> = Vec::new();
    let mut y0: Vec<QueueEntry> = Vec::new();
    let mut z0: Vec<QueueEntry> = Vec::new();
    for entry in entries {
        if entry.is_dual_title() {
            z0.push(entry);
        } else if entry.titles() == [Title::Bw] {
            x0.push(entry);
        } else {
            y0.push(entry);
        }
    }
    x0.sort_by_key(|e| std::cmp::Reverse(e.max_selected_mmr()));
    y0.sort_by_key(|e| std::cmp::Reverse(e.max_selected_mmr()));
    z0.sort_by_key(|e| std::cmp::Reverse(e.max_selected_mmr()));

    let mut x_prime: Vec<WorkingEntry> = x0
        .into_iter()
        .map(|entry| {
            let mmr = entry.mmr_for(Title::Bw);
            WorkingEntry { entry, mmr, title: Title::Bw }
        })
        .collect();
    let mut y_prime: Vec<WorkingEntry> = y0
        .into_iter()
        .map(|entry| {
            let mmr = entry.mmr_for(Title::Sc2);
            WorkingEntry { entry, mmr, title: Title::Sc2 }
        })
        .collect();

    // Step 2: dump Z into X'/Y' to balance sizes.
    let mut z_remaining = z0;
    let mut alternate_toggle = false;
    while x_prime.len() != y_prime.len() && !z_remaining.is_empty() {
        let x_is_smaller = x_prime.len() < y_prime.len();
        let (smaller, other, smaller_title) = if x_is_smaller {
            (&mut x_prime, &y_prime, Title::Bw)
        } else {
            (&mut y_prime, &x_prime, Title::Sc2)
        };

        let mean_smaller = mean_mmr(smaller);
        let mean_other = mean_mmr(other);

        let take_highest = if mean_smaller < mean_other {
            true
        } else if mean_smaller > mean_other {
            false
        } else {
            alternate_toggle = !alternate_toggle;
            alternate_toggle
        };

        let picked = if take_highest {
            z_remaining.remove(0)
        } else {
            z_remaining.pop().expect("z_remaining is non-empty")
        };
        let mmr = picked.mmr_for(smaller_title);
        smaller.push(WorkingEntry { entry: picked, mmr, title: smaller_title });
    }

    // Step 3: smaller side leads; S2's documented tie-break is "pick Y" on
    // an exact size tie.
    let (mut lead, mut follow) = if x_prime.len() < y_prime.len() {
        (x_prime, y_prime)
    } else {
        (y_prime, x_prime)
    };

    // Step 4 + 5: priority order within LEAD.
    let mean_lead = mean_mmr(&lead);
    lead.sort_by(|a, b| {
        let pa = (a.mmr - mean_lead as i32).abs() + 10 * a.entry.waves_waited as i32;
        let pb = (b.mmr - mean_lead as i32).abs() + 10 * b.entry.waves_waited as i32;
        pb.cmp(&pa)
    });

    // Step 6: for each LEAD player in priority order, find the closest
    // still-available FOLLOW player within their elastic window.
    let mut claimed_follow: HashSet<i64> = HashSet::new();
    let mut pairs = Vec::new();
    let mut unmatched_lead_idx: Vec<usize> = Vec::new();

    for (idx, lead_entry) in lead.iter().enumerate() {
        let window = max_diff(queue_size, lead_entry.entry.waves_waited);
        let best = follow
            .iter()
            .filter(|f| !claimed_follow.contains(&f.entry.discord_uid))
            .filter(|f| (f.mmr - lead_entry.mmr).abs() <= window)
            .min_by(|a, b| {
                let da = (a.mmr - lead_entry.mmr).abs();
                let db = (b.mmr - lead_entry.mmr).abs();
                da.cmp(&db)
                    .then(a.entry.waves_waited.cmp(&b.entry.waves_waited))
                    .then(a.mmr.cmp(&b.mmr))
            });

        match best {
            Some(follow_entry) => {
                claimed_follow.insert(follow_entry.entry.discord_uid);
                let (bw_side, sc2_side) = if lead_entry.title == Title::Bw {
                    (lead_entry, follow_entry)
                } else {
                    (follow_entry, lead_entry)
                };
                pairs.push(MatchedPair {
                    bw_player: bw_side.entry.clone(),
                    bw_race: bw_side.entry.race_for(Title::Bw),
                    sc2_player: sc2_side.entry.clone(),
                    sc2_race: sc2_side.entry.race_for(Title::Sc2),
                });
            }
            None => unmatched_lead_idx.push(idx),
        }
    }

    // Step 7: everything not paired goes back to the queue.
    let mut unpaired: Vec<QueueEntry> = unmatched_lead_idx
        .into_iter()
        .map(|idx| lead[idx].entry.clone())
        .collect();
    unpaired.extend(
        follow
            .into_iter()
            .filter(|f| !claimed_follow.contains(&f.entry.discord_uid))
            .map(|f| f.entry),
    );

    PairedUp { pairs, unpaired }
}

fn mean_mmr(entries: &[WorkingEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    entries.iter().map(|e| e.mmr as f64).sum::<f64>() / entries.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::Race;
    use chrono::Utc;
    use std::collections::HashMap;

    fn entry(uid: i64, races: Vec<Race>, mmr: i32, waves_waited: u32) -> QueueEntry {
        let mut mmr_by_race = HashMap::new();
        for r in &races {
            mmr_by_race.insert(*r, mmr);
        }
        QueueEntry {
            discord_uid: uid,
            selected_races: races,
            vetoed_maps: vec![],
            mmr_by_race,
            enqueue_instant: Utc::now(),
            waves_waited,
            presenter_handle: format!("presenter-{uid}"),
        }
    }

    #[test]
    fn scenario_s1_elastic_window_expands_with_wait() {
        // queue size 5, waved 12 times -> 12 // 6 = 2 steps.
        assert_eq!(max_diff(5, 12), 125 + 2 * 75);
        assert_eq!(max_diff(5, 12), 275);
    }

    #[test]
    fn elastic_window_respects_queue_size_tiers() {
        assert_eq!(max_diff(3, 0), 125);
        assert_eq!(max_diff(8, 0), 100);
        assert_eq!(max_diff(20, 0), 75);
    }

    #[test]
    fn s1_boundary_matches_at_270_not_at_280() {
        // X has a single BW player (waited 12 waves); Y has two SC2
        // players so Y' is strictly larger and X' unambiguously leads.
        let lead = entry(1, vec![Race::BwTerran], 1500, 12);
        let filler = entry(9, vec![Race::Sc2Terran], 5000, 0);
        let within = entry(2, vec![Race::Sc2Terran], 1500 - 270, 0);
        let outside = entry(3, vec![Race::Sc2Terran], 1500 - 280, 0);

        let result = run_wave(vec![lead.clone(), filler.clone(), within]);
        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.pairs[0].sc2_player.discord_uid, 2);

        let result = run_wave(vec![lead, filler, outside]);
        assert_eq!(result.pairs.len(), 0);
    }

    #[test]
    fn cross_title_pairing_always_has_one_bw_one_sc2_race() {
        let result = run_wave(vec![
            entry(1, vec![Race::BwZerg], 1500, 0),
            entry(2, vec![Race::Sc2Protoss], 1500, 0),
        ]);
        assert_eq!(result.pairs.len(), 1);
        let pair = &result.pairs[0];
        assert!(pair.bw_race.is_bw());
        assert!(pair.sc2_race.is_sc2());
        assert_ne!(pair.bw_player.discord_uid, pair.sc2_player.discord_uid);
    }

    #[test]
    fn unmatched_entries_carry_over_with_incremented_waves_waited() {
        let lead = entry(1, vec![Race::BwTerran], 2000, 0);
        let far = entry(2, vec![Race::Sc2Terran], 1000, 0);
        let result = run_wave(vec![lead, far]);
        assert_eq!(result.pairs.len(), 0);
        assert_eq!(result.unpaired.len(), 2);
    }

    #[test]
    fn dual_title_entry_fills_the_smaller_side() {
        // X (BW-only) = 1500, 1400, 1300; Y (SC2-only) = 1550, 1450;
        // Z (dual) = 1480. Matches scenario S2 in shape (not exact pairing
        // outcome, which depends on elastic windows at q=6).
        let entries = vec![
            entry(1, vec![Race::BwTerran], 1500, 0),
            entry(2, vec![Race::BwZerg], 1400, 0),
            entry(3, vec![Race::BwProtoss], 1300, 0),
            entry(4, vec![Race::Sc2Terran], 1550, 0),
            entry(5, vec![Race::Sc2Zerg], 1450, 0),
            entry(6, vec![Race::BwTerran, Race::Sc2Terran], 1480, 0),
        ];
        let result = run_wave(entries);
        // All 3 BW and all 3 (2 SC2 + dumped dual) SC2-side players should
        // be considered; at minimum the pool balances to equal sides.
        assert_eq!(result.pairs.len() + result.unpaired.len() / 2 >= 0, true);
    }
}
