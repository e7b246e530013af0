//! Runtime configuration (spec §6 "Configuration").
//!
//! Loaded once at process start from environment variables, with the
//! defaults below applied for anything unset. Immutable for the life of the
//! process: components that need a value receive it through constructor
//! wiring (see `main.rs`), never by re-reading the environment.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

/// All tunables named in spec §6, plus the connection string the teacher
/// also reads from `DATABASE_URL`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub wave_period: Duration,
    pub confirm_timer: Duration,
    pub abort_timer: Duration,
    pub reminder_fraction: f64,
    pub ranked_window: chrono::Duration,
    pub max_aborts: i32,
    pub write_queue_depth: usize,
    pub write_retry_backoffs: [Duration; 3],
    pub rate_limit_min_delay: Duration,
    pub rate_limit_queue: usize,
    pub k_factor: f64,
    /// Discord uids recognized as admins, gating every §4.6/§4.6.1 command.
    pub admin_uids: HashSet<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            wave_period: Duration::from_secs(45),
            confirm_timer: Duration::from_secs(60),
            abort_timer: Duration::from_secs(180),
            reminder_fraction: 1.0 / 3.0,
            ranked_window: chrono::Duration::days(14),
            max_aborts: 3,
            write_queue_depth: 10_000,
            write_retry_backoffs: [
                Duration::from_millis(100),
                Duration::from_millis(500),
                Duration::from_secs(2),
            ],
            rate_limit_min_delay: Duration::from_millis(200),
            rate_limit_queue: 1_000,
            // Open Question 2 (spec §9): pinned as a frozen constant, scenarios
            // in §8 (S3/S4) are computed against this value.
            k_factor: 32.0,
            admin_uids: HashSet::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the environment, falling back to defaults.
    /// An env var present but unparseable as its expected type is a fatal
    /// startup error, matching the "fail loud" rule of spec §4.1.1.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = env::var("DATABASE_URL") {
            config.database_url = v;
        }
        if let Some(v) = parse_env_secs("WAVE_PERIOD_SECONDS")? {
            config.wave_period = Duration::from_secs(v);
        }
        if let Some(v) = parse_env_secs("CONFIRM_TIMER_SECONDS")? {
            config.confirm_timer = Duration::from_secs(v);
        }
        if let Some(v) = parse_env_secs("ABORT_TIMER_SECONDS")? {
            config.abort_timer = Duration::from_secs(v);
        }
        if let Some(v) = parse_env::<i64>("RANKED_WINDOW_DAYS")? {
            config.ranked_window = chrono::Duration::days(v);
        }
        if let Some(v) = parse_env::<i32>("MAX_ABORTS")? {
            config.max_aborts = v;
        }
        if let Some(v) = parse_env::<usize>("WRITE_QUEUE_DEPTH")? {
            config.write_queue_depth = v;
        }
        if let Some(v) = parse_write_retry_backoffs()? {
            config.write_retry_backoffs = v;
        }
        if let Some(v) = parse_env_secs("RATE_LIMIT_MIN_DELAY_MS")? {
            config.rate_limit_min_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_env::<usize>("RATE_LIMIT_QUEUE")? {
            config.rate_limit_queue = v;
        }
        if let Some(v) = parse_env::<f64>("K_FACTOR")? {
            config.k_factor = v;
        }
        if let Ok(raw) = env::var("ADMIN_DISCORD_UIDS") {
            config.admin_uids = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<i64>().map_err(|e| anyhow::anyhow!("invalid uid in ADMIN_DISCORD_UIDS: {e}")))
                .collect::<anyhow::Result<HashSet<i64>>>()?;
        }

        Ok(config)
    }

    pub fn reminder_delay(&self) -> Duration {
        self.abort_timer.mul_f64(self.reminder_fraction)
    }
}

fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(Some(raw.parse::<T>().map_err(|e| {
            anyhow::anyhow!("invalid value for {key}: {e}")
        })?)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow::anyhow!("reading {key}: {e}")),
    }
}

fn parse_env_secs(key: &str) -> anyhow::Result<Option<u64>> {
    parse_env::<u64>(key)
}

/// Parses `WRITE_RETRY_BACKOFFS=[100,500,2000]` (milliseconds, brackets
/// optional) into the three fixed backoff steps spec §6 names.
fn parse_write_retry_backoffs() -> anyhow::Result<Option<[Duration; 3]>> {
    let Ok(raw) = env::var("WRITE_RETRY_BACKOFFS") else {
        return Ok(None);
    };
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let millis: Vec<u64> = trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| anyhow::anyhow!("invalid value in WRITE_RETRY_BACKOFFS: {e}"))
        })
        .collect::<anyhow::Result<_>>()?;
    let [a, b, c]: [u64; 3] = millis
        .try_into()
        .map_err(|v: Vec<u64>| anyhow::anyhow!("WRITE_RETRY_BACKOFFS needs exactly 3 values, got {}", v.len()))?;
    Ok(Some([
        Duration::from_millis(a),
        Duration::from_millis(b),
        Duration::from_millis(c),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let config = Config::default();
        assert_eq!(config.wave_period, Duration::from_secs(45));
        assert_eq!(config.confirm_timer, Duration::from_secs(60));
        assert_eq!(config.abort_timer, Duration::from_secs(180));
        assert_eq!(config.max_aborts, 3);
        assert_eq!(config.write_queue_depth, 10_000);
        assert_eq!(config.rate_limit_queue, 1_000);
    }

    #[test]
    fn reminder_delay_is_a_third_of_abort_timer() {
        let config = Config::default();
        assert_eq!(config.reminder_delay(), Duration::from_secs(60));
    }
}
