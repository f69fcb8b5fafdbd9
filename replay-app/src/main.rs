use std::env;
use std::process;
use tracing::error;

mod app;
mod config;
mod flow;

#[tokio::main]
async fn main() {
    // Install global log collector.
    tracing_subscriber::fmt::init();

    // Setup environment variables
    let config_path = env::var("CONFIG_PATH").expect("env variable CONFIG_PATH should be set");

    // Run the replay worker with the provided config.
    app::App::from_config_path(&config_path)
        .unwrap_or_else(|err| {
            error!("{:?}", err);
            process::exit(1);
        })
        .start()
        .await
        .unwrap_or_else(|err| {
            error!("{:?}", err);
            process::exit(1);
        });
}
