//! In-memory repositories used for development and as the reference
//! behaviour for the store-backed adapters.

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{
  AuthRepository, ControlsRepository, LicenseRepository, SellersRepository,
  Session,
};
use crate::{
  model::{Audience, FeatureFlag, License, Role, Seller, User, UserControl},
  prelude::*,
};

pub struct MemoryAuth {
  /// username -> (user, password)
  directory: HashMap<String, (User, String)>,
  sessions: DashMap<String, Session>,
}

impl MemoryAuth {
  pub fn new(users: impl IntoIterator<Item = (User, String)>) -> Self {
    let directory = users
      .into_iter()
      .map(|(user, password)| (user.username.clone(), (user, password)))
      .collect();
    Self { directory, sessions: DashMap::new() }
  }

  /// One account per role, sharing `password`.
  pub fn demo(password: &str) -> Self {
    Self::new([
      (User::new("owner-1", "owner", Role::Owner), password.to_string()),
      (User::new("admin-1", "admin", Role::Administrator), password.to_string()),
      (User::new("seller-1", "reseller", Role::Reseller), password.to_string()),
    ])
  }
}

#[async_trait]
impl AuthRepository for MemoryAuth {
  async fn login(&self, username: &str, password: &str) -> Result<Session> {
    let (user, expected) =
      self.directory.get(username.trim()).ok_or(Error::Unauthorized)?;
    if expected != password {
      return Err(Error::Unauthorized);
    }

    let session = Session {
      token: Uuid::new_v4().to_string(),
      user: user.clone(),
      last_seen: utils::now(),
    };
    self.sessions.insert(session.token.clone(), session.clone());
    Ok(session)
  }

  async fn logout(&self, token: &str) -> Result<()> {
    self.sessions.remove(token);
    Ok(())
  }

  async fn me(&self, token: &str) -> Result<User> {
    let mut session =
      self.sessions.get_mut(token).ok_or(Error::Unauthorized)?;
    session.last_seen = utils::now();
    Ok(session.user.clone())
  }

  fn gc_sessions(&self, max_idle: TimeDelta) -> usize {
    let now = utils::now();
    let before = self.sessions.len();
    self.sessions.retain(|_, s| now - s.last_seen < max_idle);
    before - self.sessions.len()
  }
}

#[derive(Default)]
pub struct MemoryLicenses {
  data: RwLock<Vec<License>>,
}

#[async_trait]
impl LicenseRepository for MemoryLicenses {
  async fn list_by_user(&self, _user_id: &str) -> Result<Vec<License>> {
    Ok(self.data.read().await.clone())
  }

  async fn create(&self, mut license: License) -> Result<License> {
    if license.id.trim().is_empty() {
      license.id = Uuid::new_v4().to_string();
    }
    // newest first, like the remote listing
    self.data.write().await.insert(0, license.clone());
    Ok(license)
  }

  async fn revoke(&self, id: &str) -> Result<()> {
    let now = utils::now();
    for license in self.data.write().await.iter_mut().filter(|l| l.id == id) {
      license.status = License::REVOKED.into();
      license.updated_at = Some(now);
    }
    Ok(())
  }
}

#[derive(Default)]
pub struct MemoryControls {
  flags: RwLock<Vec<FeatureFlag>>,
  controls: RwLock<Vec<UserControl>>,
}

impl MemoryControls {
  pub fn new(flags: Vec<FeatureFlag>, controls: Vec<UserControl>) -> Self {
    Self { flags: RwLock::new(flags), controls: RwLock::new(controls) }
  }

  pub fn demo() -> Self {
    Self::new(
      vec![
        FeatureFlag::new("add_users", Audience::Administrator, true),
        FeatureFlag::new("delete_key", Audience::Administrator, true),
        FeatureFlag::new("reset_key", Audience::Administrator, true),
        FeatureFlag::new("add_balance", Audience::Reseller, true),
      ],
      vec![
        UserControl { can_add_balance: false, ..UserControl::allow_all("admin-1") },
        UserControl {
          can_create_keys: false,
          can_reset_keys: false,
          ..UserControl::allow_all("seller-1")
        },
      ],
    )
  }
}

#[async_trait]
impl ControlsRepository for MemoryControls {
  async fn list_flags(&self) -> Result<Vec<FeatureFlag>> {
    Ok(self.flags.read().await.clone())
  }

  async fn upsert_flag(&self, flag: FeatureFlag) -> Result<()> {
    let mut flags = self.flags.write().await;
    match flags.iter_mut().find(|f| f.same_slot(&flag)) {
      Some(slot) => *slot = flag,
      None => flags.push(flag),
    }
    Ok(())
  }

  async fn list_user_controls(&self) -> Result<Vec<UserControl>> {
    Ok(self.controls.read().await.clone())
  }

  async fn upsert_user_control(&self, control: UserControl) -> Result<()> {
    let mut controls = self.controls.write().await;
    match controls.iter_mut().find(|c| c.user_id == control.user_id) {
      Some(slot) => *slot = control,
      None => controls.push(control),
    }
    Ok(())
  }
}

/// Sellers behind a single mutex so transfers are read-modify-write safe.
pub struct MemorySellers {
  data: Mutex<Vec<Seller>>,
}

impl MemorySellers {
  pub fn new(sellers: Vec<Seller>) -> Self {
    Self { data: Mutex::new(sellers) }
  }

  pub fn demo() -> Self {
    let seller = |id: &str, name: &str, email: &str, invite: &str| Seller {
      id: id.into(),
      username: name.into(),
      email: email.into(),
      invite_key: invite.into(),
      verified: false,
      banned: false,
      balance: 0.0,
    };
    Self::new(vec![
      Seller {
        verified: true,
        balance: 150.0,
        ..seller("s1", "VenomX", "venom@example.com", "abcd1234")
      },
      Seller { balance: 40.0, ..seller("s2", "ThorX", "thor@example.com", "efgh5678") },
      Seller { banned: true, ..seller("s3", "LokiX", "loki@example.com", "ijkl9012") },
    ])
  }

  async fn with_seller<T>(
    &self,
    id: &str,
    f: impl FnOnce(&mut Seller) -> Result<T>,
  ) -> Result<T> {
    let mut data = self.data.lock().await;
    let seller = data
      .iter_mut()
      .find(|s| s.id == id)
      .ok_or_else(|| Error::SellerNotFound(id.into()))?;
    f(seller)
  }
}

#[async_trait]
impl SellersRepository for MemorySellers {
  async fn list(&self) -> Result<Vec<Seller>> {
    Ok(self.data.lock().await.clone())
  }

  async fn get(&self, id: &str) -> Result<Seller> {
    self.with_seller(id, |s| Ok(s.clone())).await
  }

  async fn transfer_balance(&self, id: &str, amount: f64) -> Result<f64> {
    self
      .with_seller(id, |s| {
        let balance = s.balance + amount;
        if amount < 0.0 && balance < 0.0 {
          return Err(Error::InsufficientBalance { need: -amount });
        }
        s.balance = balance;
        Ok(balance)
      })
      .await
  }

  async fn set_verified(&self, id: &str, verified: bool) -> Result<()> {
    self
      .with_seller(id, |s| {
        s.verified = verified;
        Ok(())
      })
      .await
  }

  async fn set_banned(&self, id: &str, banned: bool) -> Result<()> {
    self
      .with_seller(id, |s| {
        s.banned = banned;
        Ok(())
      })
      .await
  }

  async fn remove(&self, id: &str) -> Result<()> {
    let mut data = self.data.lock().await;
    let before = data.len();
    data.retain(|s| s.id != id);
    if data.len() == before {
      return Err(Error::SellerNotFound(id.into()));
    }
    Ok(())
  }
}
