use rand::prelude::*;
use rand_pcg::Pcg64;
use std::path::PathBuf;

mod agent;
mod arena;
mod combatant;
mod config;
mod dqn;
mod env;
mod error;
mod geometry;
mod policy;
mod render;
mod replay;
mod store;
mod timing;
mod trainer;

use agent::Agent;
use config::{Config, ConfigWatcher};
use error::Result;
use render::{RaylibSink, RenderSink};
use store::{BlobStore, FileStore, MemoryStore};
use timing::Ticker;
use trainer::{TickOutcome, Trainer};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

type Backend = burn::backend::Autodiff<burn::backend::Wgpu<f32, i32>>;
type DuelAgent = Agent<dqn::DqnPolicy<Backend>>;
type DuelTrainer<S> = Trainer<dqn::DqnPolicy<Backend>, S>;

fn main() {
    pretty_env_logger::init();
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let watcher = ConfigWatcher::new(config_path)?;
    let config = watcher.current();

    let device = Default::default();
    let dqn_config = dqn::DqnConfig::from_settings(&config.dqn);
    let agents = [(); 2].map(|_| {
        Agent::from_settings(dqn_config.init::<Backend>(&device), &config.dqn)
    });
    log::debug!("Model: {:#?}", agents[0].policy.network);

    if config.storage.persist {
        let store = FileStore::new(&config.storage.dir)?;
        log::info!("Storing models in {}", store.dir().display());
        train(&watcher, config, agents, store)
    } else {
        log::info!("Persistence disabled, models are kept in memory");
        train(&watcher, config, agents, MemoryStore::default())
    }
}

fn train<S: BlobStore>(
    watcher: &ConfigWatcher,
    config: Config,
    agents: [DuelAgent; 2],
    store: S,
) -> Result<()> {
    let mut rng = match config.sim.seed {
        Some(seed) => Pcg64::seed_from_u64(seed),
        None => Pcg64::from_entropy(),
    };
    let mut trainer = Trainer::new(config.clone(), agents, store);

    if config.render.enabled {
        run_windowed(&mut trainer, watcher, config, &mut rng)
    } else {
        run_headless(&mut trainer, watcher, config, &mut rng)
    }
}

fn finished(config: &Config, outcome: TickOutcome) -> bool {
    match (outcome, config.sim.max_rounds) {
        (TickOutcome::Restarted { round }, Some(max)) => round >= max,
        _ => false,
    }
}

fn run_headless<S: BlobStore>(
    trainer: &mut DuelTrainer<S>,
    watcher: &ConfigWatcher,
    mut config: Config,
    rng: &mut Pcg64,
) -> Result<()> {
    let mut ticker = Ticker::new(config.sim.ticks_per_second, config.sim.speed_up);
    loop {
        if let Some(new_config) = watcher.poll() {
            trainer.reconfigure(&new_config);
            ticker.set_speed_up(new_config.sim.speed_up);
            config = new_config;
        }
        ticker.wait();
        let outcome = trainer.tick(ticker.dt(), rng)?;
        if finished(&config, outcome) {
            log::info!("Reached {} rounds, stopping.", trainer.round());
            return Ok(());
        }
    }
}

fn run_windowed<S: BlobStore>(
    trainer: &mut DuelTrainer<S>,
    watcher: &ConfigWatcher,
    mut config: Config,
    rng: &mut Pcg64,
) -> Result<()> {
    let (mut rl, thread) = raylib::init()
        .log_level(raylib::consts::TraceLogLevel::LOG_WARNING)
        .size(config.render.screen_width, config.render.screen_height)
        .resizable()
        .title("Platform Duel")
        .vsync()
        .build();

    // Frame rate sets the draw cadence and sims_per_frame multiplies sim
    // speed; sim.speed_up is not consulted here.
    rl.set_target_fps(config.render.target_fps);
    let dt = config.sim.dt();

    while !rl.window_should_close() {
        if let Some(new_config) = watcher.poll() {
            trainer.reconfigure(&new_config);
            rl.set_target_fps(new_config.render.target_fps);
            config = new_config;
        }
        for _ in 0..config.render.sims_per_frame {
            let outcome = trainer.tick(dt, rng)?;
            if finished(&config, outcome) {
                log::info!("Reached {} rounds, stopping.", trainer.round());
                return Ok(());
            }
        }

        let scene = trainer.scene();
        let width = rl.get_screen_width();
        let height = rl.get_screen_height();
        let mut d = rl.begin_drawing(&thread);
        RaylibSink::new(&mut d, width, height, &scene).draw(&scene);
    }
    Ok(())
}
