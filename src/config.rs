//! Application-level configuration loading, including the runtime character roster.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration, time::SystemTime};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::FighterVitals;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CHAIN_CLASH_BACK_CONFIG_PATH";

/// Default client-side countdown before a round accepts moves.
const DEFAULT_COUNTDOWN_MS: u64 = 3_000;
/// Default window during which moves are accepted.
const DEFAULT_MOVE_WINDOW_MS: u64 = 20_000;
/// Default window for both stake deposits to confirm.
const DEFAULT_STAKE_WINDOW_MS: u64 = 120_000;
/// Default match format when the room collaborator does not choose one.
const DEFAULT_BEST_OF: u32 = 3;

/// One playable character and its base combat stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    /// Stable roster identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Starting vitals at the top of every round.
    pub vitals: FighterVitals,
    /// Attack rating consumed by the external resolution engine.
    pub attack: i32,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    countdown: Duration,
    move_window: Duration,
    stake_window: Duration,
    default_best_of: u32,
    rating_hook_url: Option<String>,
    characters: Vec<Character>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        roster = config.characters.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Look up a roster character by id.
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters
            .iter()
            .find(|character| character.id == id)
    }

    /// The full playable roster.
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// Countdown clients display before a round accepts moves.
    pub fn countdown(&self) -> Duration {
        self.countdown
    }

    /// Absolute move deadline for a round created at `now`:
    /// countdown plus move window.
    pub fn move_deadline(&self, now: SystemTime) -> SystemTime {
        now + self.countdown + self.move_window
    }

    /// Future instant at which gameplay starts for a match activated at `now`.
    pub fn start_at(&self, now: SystemTime) -> SystemTime {
        now + self.countdown
    }

    /// Deposit deadline for a stake opened at `now`.
    pub fn stake_deadline(&self, now: SystemTime) -> SystemTime {
        now + self.stake_window
    }

    /// Match format used when the creating collaborator does not pick one.
    pub fn default_best_of(&self) -> u32 {
        self.default_best_of
    }

    /// Rating collaborator endpoint notified on match completion, if set.
    pub fn rating_hook_url(&self) -> Option<&str> {
        self.rating_hook_url.as_deref()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_millis(DEFAULT_COUNTDOWN_MS),
            move_window: Duration::from_millis(DEFAULT_MOVE_WINDOW_MS),
            stake_window: Duration::from_millis(DEFAULT_STAKE_WINDOW_MS),
            default_best_of: DEFAULT_BEST_OF,
            rating_hook_url: None,
            characters: default_roster(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default = "default_countdown_ms")]
    countdown_ms: u64,
    #[serde(default = "default_move_window_ms")]
    move_window_ms: u64,
    #[serde(default = "default_stake_window_ms")]
    stake_window_ms: u64,
    #[serde(default = "default_best_of")]
    best_of: u32,
    #[serde(default)]
    rating_hook_url: Option<String>,
    #[serde(default)]
    characters: Vec<RawCharacter>,
}

fn default_countdown_ms() -> u64 {
    DEFAULT_COUNTDOWN_MS
}

fn default_move_window_ms() -> u64 {
    DEFAULT_MOVE_WINDOW_MS
}

fn default_stake_window_ms() -> u64 {
    DEFAULT_STAKE_WINDOW_MS
}

fn default_best_of() -> u32 {
    DEFAULT_BEST_OF
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let characters = if value.characters.is_empty() {
            default_roster()
        } else {
            value.characters.into_iter().map(Into::into).collect()
        };

        Self {
            countdown: Duration::from_millis(value.countdown_ms),
            move_window: Duration::from_millis(value.move_window_ms),
            stake_window: Duration::from_millis(value.stake_window_ms),
            default_best_of: value.best_of,
            rating_hook_url: value.rating_hook_url,
            characters,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single roster entry inside the configuration file.
struct RawCharacter {
    id: String,
    name: String,
    health: i32,
    energy: i32,
    guard: i32,
    attack: i32,
}

impl From<RawCharacter> for Character {
    fn from(value: RawCharacter) -> Self {
        Self {
            id: value.id,
            name: value.name,
            vitals: FighterVitals {
                health: value.health,
                energy: value.energy,
                guard: value.guard,
            },
            attack: value.attack,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in roster shipped with the binary.
fn default_roster() -> Vec<Character> {
    let character = |id: &str, name: &str, health, energy, guard, attack| Character {
        id: id.to_owned(),
        name: name.to_owned(),
        vitals: FighterVitals {
            health,
            energy,
            guard,
        },
        attack,
    };

    vec![
        character("razor", "Razor", 100, 50, 30, 12),
        character("bulwark", "Bulwark", 130, 40, 50, 8),
        character("wisp", "Wisp", 85, 70, 25, 14),
        character("grave", "Grave", 110, 45, 40, 10),
        character("ember", "Ember", 95, 60, 30, 13),
        character("jolt", "Jolt", 90, 65, 20, 15),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_roster() {
        let config = AppConfig::default();
        assert!(config.character("razor").is_some());
        assert!(config.character("unknown").is_none());
        assert_eq!(config.default_best_of(), 3);
    }

    #[test]
    fn deadline_is_countdown_plus_window() {
        let config = AppConfig::default();
        let now = SystemTime::UNIX_EPOCH;
        assert_eq!(
            config.move_deadline(now),
            now + Duration::from_millis(23_000)
        );
        assert_eq!(config.start_at(now), now + Duration::from_millis(3_000));
    }

    #[test]
    fn raw_config_missing_fields_fall_back() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.countdown(), Duration::from_millis(3_000));
        assert_eq!(config.characters().len(), 6);
    }
}
