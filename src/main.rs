use log::{info, warn};

use daychat::config::{ProviderConfig, ServerConfig};
use daychat::server::{serve, AppState, ConfigSource};
use daychat::Gateway;

#[tokio::main]
async fn main() -> Result<(), daychat::Error>
{   env_logger::Builder::from_env(
      env_logger::Env::default().default_filter_or("info")
    ).init();

    // Report the startup view; requests re-read the environment anyway
    match ProviderConfig::from_env().and_then(|c| c.select_provider())
    {   Ok(provider) => info!("Chat provider at startup: {}", provider.name())
      , Err(e) => warn!("No usable chat provider yet: {}", e)
    }

    let server = ServerConfig::from_env();
    let state = AppState::new(Gateway::default(), ConfigSource::Environment);
    serve(&server, state).await
}
