//! License console: role-scoped license issuance and administration over HTTP.

mod entity;
mod error;
mod model;
mod plugins;
mod prelude;
mod repo;
mod state;
mod sv;
mod utils;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  plugins::{App, cron, server},
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "license_console=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  info!("Starting license console v{}", env!("CARGO_PKG_VERSION"));

  let config = Config::from_env()?;
  let app = Arc::new(AppState::new(config).await?);

  let plugins = App::new().register(server::Plugin).register(cron::Plugin);

  tokio::select! {
    _ = plugins.run(app) => warn!("All plugins stopped"),
    _ = tokio::signal::ctrl_c() => info!("Shutting down"),
  }
  Ok(())
}
