use log::{error, warn};
use mechanics_roster::config::RosterConfig;
use mechanics_roster::server;

#[tokio::main]
async fn main() {
    let (config, warnings) = RosterConfig::from_env();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();
    for warning in &warnings {
        warn!("{warning}");
    }

    if let Err(e) = server::run_server(config).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
