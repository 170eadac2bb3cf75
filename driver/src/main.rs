//! Treadmill judge worker entry point (component C12): wires together the
//! front-office API client, the Docker driver, the Redis queue client and
//! the queue-worker actors.
//!
//! Grounded on the teacher's `main.rs`/`init.rs` startup sequence
//! (log init → config init → component init → run workers and block).

extern crate error_chain;
extern crate log;
extern crate log4rs;

mod config;
mod queue;
mod workers;

use std::sync::Arc;

use clap::{App, Arg};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use config::AppConfig;
use queue::RedisQueueClient;

/// Exit code for a configuration error (spec.md §6).
const EXIT_CONFIG_ERROR: i32 = 2;

/// Exit code for any other startup or runtime failure.
const EXIT_RUNTIME_ERROR: i32 = 1;

fn init_log(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {l} [{t}] {m}{n}")))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .expect("failed to build log4rs configuration");

    log4rs::init_config(config).expect("failed to initialize logging");
}

#[tokio::main]
async fn main() {
    let matches = App::new("treadmill")
        .about("Competitive-programming judge worker")
        .arg(
            Arg::with_name("profile")
                .help("Config profile name, recorded in log output only")
                .index(1),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    init_log(matches.is_present("verbose"));

    if let Some(profile) = matches.value_of("profile") {
        log::info!("starting with config profile: {}", profile);
    }

    if let Err(e) = config::init_config() {
        log::error!("configuration error: {}", e);
        std::process::exit(EXIT_CONFIG_ERROR);
    }
    let app_config = Arc::new(config::app_config().clone());

    if let Err(e) = run(app_config).await {
        log::error!("fatal error: {}", e);
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

error_chain::error_chain! {
    links {
        Workers(workers::Error, workers::ErrorKind);
        Queue(queue::Error, queue::ErrorKind);
        Api(tm_api::Error, tm_api::ErrorKind);
        Container(tm_container::Error, tm_container::ErrorKind);
    }
}

async fn run(config: Arc<AppConfig>) -> Result<()> {
    let api_client = tm_api::ApiClient::new(config.api_endpoint.clone(), &config.api_secret_key)?;
    let container_driver = tm_container::ContainerDriver::connect()?;
    let redis_client = Arc::new(RedisQueueClient::connect(&config.redis_url()).await?);

    workers::run(config, redis_client, api_client, container_driver).await?;
    Ok(())
}
