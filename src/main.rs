use std::rc::Rc;
use std::thread;
use std::time::Duration;
use synthchain::assets::DirectoryAssetLoader;
use synthchain::midi::MidiListener;
use synthchain::project::{FileStore, KeyValueStore, MemoryStore};
use synthchain::{Config, Session};

fn main() {
    // Config is read before the logger exists; report failures afterwards
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    if let Some(e) = config_error {
        log::warn!("Using default config: {}", e);
    }

    let store: Rc<dyn KeyValueStore> = match FileStore::open(&config.store_path) {
        Ok(store) => Rc::new(store),
        Err(e) => {
            log::warn!(
                "Cannot open store {}: {}. Settings will not persist",
                config.store_path.display(),
                e
            );
            Rc::new(MemoryStore::new())
        }
    };

    let assets = Rc::new(DirectoryAssetLoader::new(config.impulse_dir.clone()));
    log::info!("{} impulse responses available", assets.available().len());

    let midi = if config.midi_enabled {
        MidiListener::open(config.midi_buffer_capacity)
    } else {
        MidiListener::disabled()
    };

    let mut session = match Session::new(store, assets, midi) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Failed to start session: {}", e);
            return;
        }
    };

    log::info!("synthchain running, interrupt to quit");
    let interval = Duration::from_millis(config.tick_interval_ms.max(1));
    loop {
        session.tick();
        thread::sleep(interval);
    }
}
