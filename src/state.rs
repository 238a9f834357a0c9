use std::env;

use crate::{
  model::{Permission, User},
  prelude::*,
  repo::{Repositories, Session, rest::RestClient},
  sv,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
  Memory,
  Remote,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub backend: Backend,
  pub rest_url: String,
  pub rest_api_key: String,
  pub database_url: String,
  pub port: u16,
  pub issuance_log: String,
  pub default_balance: f64,
  pub demo_password: String,
  pub session_lifetime: i64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      backend: Backend::Memory,
      rest_url: String::new(),
      rest_api_key: String::new(),
      database_url: String::from("sqlite:console.db?mode=rwc"),
      port: 3000,
      issuance_log: String::from("BearUsers.txt"),
      default_balance: 1000.0,
      demo_password: String::from("admin"),
      session_lifetime: 3600,
    }
  }
}

impl Config {
  /// Reads the environment, falling back to defaults for anything unset.
  pub fn from_env() -> anyhow::Result<Self> {
    let default = Self::default();
    let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

    let backend = match var("BACKEND").as_deref() {
      None | Some("memory") => Backend::Memory,
      Some("remote") => Backend::Remote,
      Some(other) => anyhow::bail!("Unknown BACKEND `{other}`"),
    };

    let config = Self {
      backend,
      rest_url: var("REST_URL").unwrap_or(default.rest_url),
      rest_api_key: var("REST_API_KEY").unwrap_or(default.rest_api_key),
      database_url: var("DATABASE_URL").unwrap_or(default.database_url),
      port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(default.port),
      issuance_log: var("ISSUANCE_LOG").unwrap_or(default.issuance_log),
      default_balance: var("DEFAULT_BALANCE")
        .and_then(|b| b.parse().ok())
        .unwrap_or(default.default_balance),
      demo_password: var("DEMO_PASSWORD").unwrap_or(default.demo_password),
      session_lifetime: var("SESSION_LIFETIME_SECS")
        .and_then(|s| s.parse().ok())
        .unwrap_or(default.session_lifetime),
    };

    if config.backend == Backend::Remote
      && (config.rest_url.is_empty() || config.rest_api_key.is_empty())
    {
      anyhow::bail!("BACKEND=remote needs REST_URL and REST_API_KEY");
    }
    Ok(config)
  }
}

pub struct Services<'a> {
  pub ledger: sv::Ledger<'a>,
  pub issuer: sv::Issuer<'a>,
  pub console: sv::Console<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub repos: Repositories,
  pub log: sv::IssuanceLog,
  pub config: Config,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    Self::with_db(db, config).await
  }

  pub async fn with_db(
    db: DatabaseConnection,
    config: Config,
  ) -> anyhow::Result<Self> {
    info!("Running migrations...");
    migration::Migrator::up(&db, None)
      .await
      .context("Failed to run migrations")?;

    let repos = match config.backend {
      Backend::Memory => {
        info!("Using in-memory repositories");
        Repositories::memory(&config.demo_password)
      }
      Backend::Remote => {
        info!("Using REST store at {}", config.rest_url);
        let client = RestClient::new(&config.rest_url, &config.rest_api_key)
          .context("Failed to build REST client")?;
        Repositories::remote(client, db.clone(), &config.demo_password)
      }
    };

    Ok(Self {
      log: sv::IssuanceLog::new(&config.issuance_log),
      db,
      repos,
      config,
    })
  }

  pub fn sv<'a>(&'a self, user: &'a User) -> Services<'a> {
    let ledger =
      sv::Ledger::new(&self.db, user.id.as_str(), self.config.default_balance);
    Services {
      issuer: sv::Issuer::new(
        self.repos.licenses.as_ref(),
        ledger.clone(),
        &self.log,
      ),
      console: sv::Console::new(user, &self.repos),
      ledger,
    }
  }

  /// Logs in, refusing users whose login was switched off.
  pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
    let session = self.repos.auth.login(username, password).await?;

    let console = sv::Console::new(&session.user, &self.repos);
    if let Err(err) = console.require(Permission::Login).await {
      self.repos.auth.logout(&session.token).await?;
      warn!("Login refused for {}", session.user.username);
      return Err(err);
    }

    info!("{} logged in", session.user.username);
    Ok(session)
  }

  pub fn gc_sessions(&self) -> usize {
    let max_idle = TimeDelta::seconds(self.config.session_lifetime);
    self.repos.auth.gc_sessions(max_idle)
  }
}
