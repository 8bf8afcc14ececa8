mod config;
mod host;
mod input;

use std::{
    io::{self, BufRead},
    process,
    sync::Arc,
};

use env_logger::{Builder, Env};
use parking_lot::Mutex;
use tunebridge_core::{
    coordinator::{Coordinator, Event},
    error::Error,
    service::CoordinatorService,
    settings::{LocalSettings, Settings},
    storage::FileStorage,
};

use crate::{
    config::Config,
    host::{CliHost, Output},
};

const ENV_LOG: &str = "TUNEBRIDGE_LOG";
const ENV_LOG_STYLE: &str = "TUNEBRIDGE_LOG_STYLE";

fn main() {
    Builder::from_env(
        Env::new()
            .filter_or(ENV_LOG, "info")
            .write_style(ENV_LOG_STYLE),
    )
    .init();

    if let Err(err) = start() {
        log::error!("{}", err);
        process::exit(1);
    }
}

fn start() -> Result<(), Error> {
    let config = Config::load()?;
    if !config.has_api_credentials() {
        log::warn!("no Last.fm API credentials configured, scrobbling will fail");
    }
    let storage_path = Config::storage_path()
        .ok_or_else(|| Error::ConfigError("failed to get storage path".into()))?;
    let storage = FileStorage::open(storage_path)?;
    let config = Arc::new(Mutex::new(config));
    let output = Output::stdout();

    let service = CoordinatorService::spawn({
        let config = config.clone();
        move |sender| {
            let coordinator = {
                let config = config.lock();
                Coordinator::new(
                    config.coordinator.clone(),
                    Settings::new(config.settings.clone()),
                    LocalSettings::new(config.local_settings.clone()),
                    Box::new(storage),
                )
            };
            (coordinator, CliHost::new(sender, config, output))
        }
    });
    service.send(Event::Startup)?;

    for line in io::stdin().lock().lines() {
        match input::parse_line(&line?) {
            Ok(Some(input)) => {
                input.remember(&config);
                service.send(input.into_event(output))?;
            }
            Ok(None) => {}
            Err(err) => log::warn!("{}", err),
        }
    }

    service.shutdown();
    Ok(())
}
