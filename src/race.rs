//! Race and title identifiers.
//!
//! A player's selected race always implies exactly one title (BW or SC2);
//! the matchmaker's cross-title constraint (Testable Property 7, spec §8)
//! is expressed purely in terms of [`Race::title`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// One of the two supported game titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Title {
    Bw,
    Sc2,
}

/// Wire-exact race identifier (spec §6).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Race {
    BwTerran,
    BwZerg,
    BwProtoss,
    Sc2Terran,
    Sc2Zerg,
    Sc2Protoss,
}

impl Race {
    pub const ALL: [Race; 6] = [
        Race::BwTerran,
        Race::BwZerg,
        Race::BwProtoss,
        Race::Sc2Terran,
        Race::Sc2Zerg,
        Race::Sc2Protoss,
    ];

    pub fn title(self) -> Title {
        match self {
            Race::BwTerran | Race::BwZerg | Race::BwProtoss => Title::Bw,
            Race::Sc2Terran | Race::Sc2Zerg | Race::Sc2Protoss => Title::Sc2,
        }
    }

    pub fn is_bw(self) -> bool {
        self.title() == Title::Bw
    }

    pub fn is_sc2(self) -> bool {
        self.title() == Title::Sc2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_mapping_is_exhaustive_and_correct() {
        for race in Race::ALL {
            match race {
                Race::BwTerran | Race::BwZerg | Race::BwProtoss => {
                    assert_eq!(race.title(), Title::Bw);
                    assert!(race.is_bw());
                    assert!(!race.is_sc2());
                }
                Race::Sc2Terran | Race::Sc2Zerg | Race::Sc2Protoss => {
                    assert_eq!(race.title(), Title::Sc2);
                    assert!(race.is_sc2());
                    assert!(!race.is_bw());
                }
            }
        }
    }

    #[test]
    fn race_round_trips_through_its_wire_string() {
        for race in Race::ALL {
            let s = race.as_ref();
            let parsed: Race = s.parse().unwrap();
            assert_eq!(parsed, race);
        }
    }
}
