//! Repository contracts. Every contract has an in-memory implementation and a
//! store-backed one; both satisfy the same tests.

pub mod db;
pub mod memory;
pub mod rest;

use serde::Serialize;

use crate::{
  model::{FeatureFlag, License, Seller, User, UserControl},
  prelude::*,
};

#[derive(Debug, Clone, Serialize)]
pub struct Session {
  pub token: String,
  pub user: User,
  pub last_seen: DateTime,
}

#[async_trait]
pub trait AuthRepository: Send + Sync {
  async fn login(&self, username: &str, password: &str) -> Result<Session>;

  async fn logout(&self, token: &str) -> Result<()>;

  /// Resolves a session token, refreshing its idle timer.
  async fn me(&self, token: &str) -> Result<User>;

  /// Drops sessions idle for longer than `max_idle`, returning how many.
  fn gc_sessions(&self, _max_idle: TimeDelta) -> usize {
    0
  }
}

#[async_trait]
pub trait LicenseRepository: Send + Sync {
  /// Every license visible to the caller. The user id is not used as a
  /// filter: administrators see the global list.
  async fn list_by_user(&self, user_id: &str) -> Result<Vec<License>>;

  /// Stores `license`, assigning an id when it is blank.
  async fn create(&self, license: License) -> Result<License>;

  /// Marks the license revoked. Unknown ids are a no-op.
  async fn revoke(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait ControlsRepository: Send + Sync {
  async fn list_flags(&self) -> Result<Vec<FeatureFlag>>;

  /// Replaces the flag with the same key and audience, or appends it.
  async fn upsert_flag(&self, flag: FeatureFlag) -> Result<()>;

  async fn list_user_controls(&self) -> Result<Vec<UserControl>>;

  /// Replaces the control for the same user, or appends it.
  async fn upsert_user_control(&self, control: UserControl) -> Result<()>;
}

#[async_trait]
pub trait SellersRepository: Send + Sync {
  async fn list(&self) -> Result<Vec<Seller>>;

  async fn get(&self, id: &str) -> Result<Seller>;

  /// Adds the signed `amount` and returns the new balance. A transfer that
  /// would leave the balance below zero is refused.
  async fn transfer_balance(&self, id: &str, amount: f64) -> Result<f64>;

  async fn set_verified(&self, id: &str, verified: bool) -> Result<()>;

  async fn set_banned(&self, id: &str, banned: bool) -> Result<()>;

  async fn remove(&self, id: &str) -> Result<()>;
}

/// The set of repositories a running console works against.
#[derive(Clone)]
pub struct Repositories {
  pub auth: Arc<dyn AuthRepository>,
  pub licenses: Arc<dyn LicenseRepository>,
  pub controls: Arc<dyn ControlsRepository>,
  pub sellers: Arc<dyn SellersRepository>,
}

impl Repositories {
  /// Seeded in-memory stores for development.
  pub fn memory(password: &str) -> Self {
    Self {
      auth: Arc::new(memory::MemoryAuth::demo(password)),
      licenses: Arc::new(memory::MemoryLicenses::default()),
      controls: Arc::new(memory::MemoryControls::demo()),
      sellers: Arc::new(memory::MemorySellers::demo()),
    }
  }

  /// Licenses and controls from the REST store, sellers from the local
  /// database.
  pub fn remote(
    client: rest::RestClient,
    db: DatabaseConnection,
    password: &str,
  ) -> Self {
    Self {
      auth: Arc::new(memory::MemoryAuth::demo(password)),
      licenses: Arc::new(rest::RestLicenses::new(client.clone())),
      controls: Arc::new(rest::RestControls::new(client)),
      sellers: Arc::new(db::DbSellers::new(db)),
    }
  }
}
