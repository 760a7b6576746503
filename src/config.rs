use notify::{RecursiveMode::NonRecursive, Watcher};
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use crate::error::{Error, Result};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub sim: Sim,
    pub render: Render,
    pub arena: Arena,
    pub combatant: Combatant,
    pub reward: Reward,
    pub dqn: Dqn,
    pub storage: Storage,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct Sim {
    pub ticks_per_second: u32,
    // Run ticks back to back instead of pacing them to wall-clock time.
    pub speed_up: bool,
    pub seed: Option<u64>,
    pub max_rounds: Option<u64>,
}

impl Sim {
    /// Simulated seconds per tick.
    pub fn dt(&self) -> f32 {
        1.0 / self.ticks_per_second as f32
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            speed_up: true,
            seed: None,
            max_rounds: None,
        }
    }
}

/// The window paces ticks by frame rate and `sims_per_frame`, so
/// `sim.speed_up` only affects headless runs.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct Render {
    pub enabled: bool,
    pub target_fps: u32,
    pub sims_per_frame: u32,
    pub screen_width: i32,
    pub screen_height: i32,
}

impl Default for Render {
    fn default() -> Self {
        Self {
            enabled: true,
            target_fps: 60,
            sims_per_frame: 1,
            screen_width: 1280,
            screen_height: 720,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
    pub spawns: [[f32; 2]; 2],
    pub platforms: Vec<PlatformSpec>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PlatformSpec {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            spawns: [[300.0, 400.0], [880.0, 400.0]],
            platforms: vec![PlatformSpec {
                x: 140.0,
                y: 540.0,
                w: 1000.0,
                h: 60.0,
            }],
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Combatant {
    pub width: f32,
    pub height: f32,
    pub gravity: f32,
    pub jump_power: f32,
    pub move_speed: f32,
    pub health: f32,
    pub attack_range: f32,
    pub damage: f32,
    pub knockback: f32,
    pub attack_cooldown: f32,
}

impl Default for Combatant {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            gravity: 500.0,
            jump_power: 600.0,
            move_speed: 300.0,
            health: 100.0,
            attack_range: 100.0,
            damage: 40.0,
            knockback: 5.0,
            attack_cooldown: 1.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Reward {
    pub move_away: f32,
    pub move_toward: f32,
    pub proximity_squared: f32,
    pub idle_in_range: f32,
    pub boundary_bonus: f32,
    pub attack_in_range: f32,
}

impl Default for Reward {
    fn default() -> Self {
        Self {
            move_away: 1.0,
            move_toward: -1.0,
            proximity_squared: 10_000.0,
            idle_in_range: -100.0,
            boundary_bonus: 50.0,
            attack_in_range: 1.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct Dqn {
    pub hidden_size: u32,
    pub replay_buffer_size: u32,
    pub batch_size: u32,
    pub tau: f32,
    pub gamma: f32,
    pub learning_rate: f32,
    pub eps_start: f32,
    pub eps_end: f32,
    pub eps_decay: f32,
}

impl Default for Dqn {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            replay_buffer_size: 10_000,
            batch_size: 32,
            tau: 0.005,
            gamma: 0.99,
            learning_rate: 1e-3,
            // Fully greedy unless the config file asks for exploration.
            eps_start: 0.0,
            eps_end: 0.0,
            eps_decay: 1000.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Storage {
    pub dir: PathBuf,
    pub prefix: String,
    // When false, models and the round counter live only for this run.
    pub persist: bool,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            prefix: "duel".to_owned(),
            persist: true,
        }
    }
}

pub fn load_config_from_file(path: &Path) -> Result<Config> {
    let config = std::fs::read_to_string(path).map_err(|source| Error::Io {
        operation: "read config",
        path: path.to_owned(),
        source,
    })?;
    let out: Config = toml::from_str(&config).map_err(|source| Error::Config {
        path: path.to_owned(),
        source,
    })?;
    out.validate().map_err(|message| Error::InvalidConfig {
        path: path.to_owned(),
        message,
    })?;
    log::debug!("Loaded config: {:#?}", out);
    Ok(out)
}

impl Config {
    /// Rejects settings that parse but cannot run. Training starts once the
    /// replay buffer holds more than one batch, so the buffer must be larger.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.sim.ticks_per_second == 0 {
            return Err("sim.ticks_per_second must be positive".to_owned());
        }
        let dqn = &self.dqn;
        if dqn.replay_buffer_size == 0 {
            return Err("dqn.replay_buffer_size must be positive".to_owned());
        }
        if dqn.batch_size == 0 {
            return Err("dqn.batch_size must be positive".to_owned());
        }
        if dqn.batch_size >= dqn.replay_buffer_size {
            return Err(format!(
                "dqn.batch_size ({}) must be smaller than dqn.replay_buffer_size ({})",
                dqn.batch_size, dqn.replay_buffer_size
            ));
        }
        Ok(())
    }
}

/// Keeps the latest successfully parsed config and reloads it whenever the
/// file changes on disk.
pub struct ConfigWatcher {
    current: Arc<Mutex<Config>>,
    updated: Arc<AtomicBool>,
    _watcher: notify::RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = Arc::new(Mutex::new(load_config_from_file(&path)?));
        let updated = Arc::new(AtomicBool::new(false));

        let reload_path = path.clone();
        let reload_target = Arc::clone(&current);
        let reload_flag = Arc::clone(&updated);
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config_from_file(&reload_path) {
                        Ok(config) => {
                            log::info!("Loaded new config");
                            *reload_target.lock().unwrap_or_else(PoisonError::into_inner) =
                                config;
                            reload_flag.store(true, Ordering::Release);
                        }
                        Err(e) => log::warn!("Keeping previous config: {}", e),
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("Config watcher error: {:?}", e),
            })?;
        watcher.watch(&path, NonRecursive)?;

        Ok(Self {
            current,
            updated,
            _watcher: watcher,
        })
    }

    pub fn current(&self) -> Config {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the new config if the file was reloaded since the last poll.
    pub fn poll(&self) -> Option<Config> {
        if self.updated.swap(false, Ordering::AcqRel) {
            Some(self.current())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.sim.ticks_per_second, 60);
        assert_eq!(config.combatant, Combatant::default());
        assert_eq!(config.reward.proximity_squared, 10_000.0);
        assert_eq!(config.arena.platforms.len(), 1);
        assert_eq!(config.storage.prefix, "duel");
        assert!(config.storage.persist);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [combatant]
            damage = 10.0

            [[arena.platforms]]
            x = 0.0
            y = 600.0
            w = 1280.0
            h = 20.0

            [storage]
            prefix = "run7"
            persist = false
            "#,
        )
        .unwrap();
        assert_eq!(config.combatant.damage, 10.0);
        assert_eq!(config.combatant.attack_range, 100.0);
        assert_eq!(
            config.arena.platforms,
            vec![PlatformSpec {
                x: 0.0,
                y: 600.0,
                w: 1280.0,
                h: 20.0
            }]
        );
        assert_eq!(config.arena.width, 1280.0);
        assert_eq!(config.storage.prefix, "run7");
        assert_eq!(config.storage.dir, PathBuf::from("models"));
        assert!(!config.storage.persist);
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sim]\nseed = 7\nspeed_up = false\n").unwrap();
        let config = load_config_from_file(&path).unwrap();
        assert_eq!(config.sim.seed, Some(7));
        assert!(!config.sim.speed_up);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sim\n").unwrap();
        assert!(matches!(
            load_config_from_file(&path),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml");
        let config = load_config_from_file(&path).unwrap();
        assert!(config.dqn.batch_size < config.dqn.replay_buffer_size);
        assert_eq!(config.sim.dt(), 1.0 / 60.0);
    }

    #[test]
    fn empty_replay_buffer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dqn]\nreplay_buffer_size = 0\n").unwrap();
        let err = load_config_from_file(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }), "{}", err);
    }

    #[test]
    fn batch_must_be_smaller_than_replay_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        for body in [
            "[dqn]\nreplay_buffer_size = 32\nbatch_size = 32\n",
            "[dqn]\nreplay_buffer_size = 16\nbatch_size = 32\n",
            "[dqn]\nbatch_size = 0\n",
            "[sim]\nticks_per_second = 0\n",
        ] {
            std::fs::write(&path, body).unwrap();
            assert!(
                matches!(
                    load_config_from_file(&path),
                    Err(Error::InvalidConfig { .. })
                ),
                "{}",
                body
            );
        }
        std::fs::write(&path, "[dqn]\nreplay_buffer_size = 33\nbatch_size = 32\n").unwrap();
        assert!(load_config_from_file(&path).is_ok());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
