use serde::{Deserialize, Serialize};

use crate::race::Race;

/// Per-player sticky queue defaults (spec §3 "Preferences").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub discord_uid: i64,
    /// At most 2, at most one per title.
    pub last_chosen_races: Vec<Race>,
    /// At most 4 map ids.
    pub last_chosen_vetoes: Vec<String>,
}

impl Preferences {
    pub fn new(discord_uid: i64) -> Self {
        Self {
            discord_uid,
            last_chosen_races: Vec::new(),
            last_chosen_vetoes: Vec::new(),
        }
    }

    pub fn to_columns(&self) -> (String, String) {
        (
            self.last_chosen_races
                .iter()
                .map(|r| r.as_ref().to_owned())
                .collect::<Vec<_>>()
                .join(","),
            self.last_chosen_vetoes.join(","),
        )
    }

    pub fn from_columns(discord_uid: i64, races: &str, vetoes: &str) -> anyhow::Result<Self> {
        let last_chosen_races = races
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Race>().map_err(|e| anyhow::anyhow!(e)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let last_chosen_vetoes = vetoes
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        Ok(Self {
            discord_uid,
            last_chosen_races,
            last_chosen_vetoes,
        })
    }
}
