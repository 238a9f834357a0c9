//! Role-scoped view over licenses, flags and sellers.

use serde::Serialize;

use crate::{
  model::{Audience, FeatureFlag, License, Permission, Role, User, UserControl},
  prelude::*,
  repo::Repositories,
};

/// Licenses created within this window are shown as new.
pub const NEW_WINDOW_MS: i64 = 3_600_000;
/// Licenses expired for longer than this are revoked when listed.
pub const SWEEP_AFTER_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
  Active,
  New,
  Expired,
  Blocked,
}

pub fn classify(license: &License, now: DateTime) -> LicenseStatus {
  let now_ms = utils::to_millis(now);

  if license.is_blocked() {
    LicenseStatus::Blocked
  } else if license
    .expired_date
    .is_some_and(|expired| utils::to_millis(expired) < now_ms)
  {
    LicenseStatus::Expired
  } else if license
    .created_at
    .is_some_and(|created| now_ms - utils::to_millis(created) < NEW_WINDOW_MS)
  {
    LicenseStatus::New
  } else {
    LicenseStatus::Active
  }
}

pub fn due_for_sweep(license: &License, now: DateTime) -> bool {
  !license.is_revoked()
    && license.expired_date.is_some_and(|expired| {
      utils::to_millis(now) - utils::to_millis(expired) > SWEEP_AFTER_MS
    })
}

/// Case-insensitive match on key or game. A blank query matches all.
pub fn matches_query(license: &License, query: &str) -> bool {
  let query = query.trim().to_lowercase();
  query.is_empty()
    || license.user_key.to_lowercase().contains(&query)
    || license.game.to_lowercase().contains(&query)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
  pub total: usize,
  pub active: usize,
  pub new: usize,
  pub expired: usize,
  pub blocked: usize,
}

impl StatusCounts {
  pub fn of(statuses: impl IntoIterator<Item = LicenseStatus>) -> Self {
    statuses.into_iter().fold(Self::default(), |mut counts, status| {
      counts.total += 1;
      match status {
        LicenseStatus::Active => counts.active += 1,
        LicenseStatus::New => counts.new += 1,
        LicenseStatus::Expired => counts.expired += 1,
        LicenseStatus::Blocked => counts.blocked += 1,
      }
      counts
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
  Users,
  Sellers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  AddUsers,
  AddReseller,
  AddBalance,
  EditName,
  DeleteKey,
  ResetPassword,
  ResetKey,
}

impl Action {
  pub fn flag(self) -> Option<&'static str> {
    match self {
      Action::AddUsers => Some("add_users"),
      Action::DeleteKey => Some("delete_key"),
      Action::ResetKey => Some("reset_key"),
      Action::AddBalance => Some("add_balance"),
      Action::AddReseller | Action::EditName | Action::ResetPassword => None,
    }
  }

  pub fn permission(self) -> Option<Permission> {
    match self {
      Action::AddUsers => Some(Permission::CreateKeys),
      Action::ResetKey => Some(Permission::ResetKeys),
      Action::AddBalance => Some(Permission::AddBalance),
      _ => None,
    }
  }
}

impl Tab {
  pub fn actions(self) -> &'static [Action] {
    use Action::*;

    match self {
      Tab::Users => &[AddUsers, DeleteKey, ResetPassword, ResetKey],
      Tab::Sellers => {
        &[AddReseller, AddBalance, EditName, DeleteKey, ResetPassword, ResetKey]
      }
    }
  }

  pub fn for_role(role: Role) -> &'static [Tab] {
    match role {
      Role::Owner | Role::Administrator => &[Tab::Users, Tab::Sellers],
      Role::Reseller => &[Tab::Users],
    }
  }
}

/// Flags as seen by one role.
#[derive(Debug, Clone)]
pub struct FlagSet {
  audience: Option<Audience>,
  flags: Vec<FeatureFlag>,
}

pub fn resolve_flags(role: Role, flags: Vec<FeatureFlag>) -> FlagSet {
  FlagSet { audience: role.audience(), flags }
}

impl FlagSet {
  /// An audience-specific flag overrides the `All` one. Keys without any
  /// flag are disabled. The owner is never gated.
  pub fn enabled(&self, key: &str) -> bool {
    let Some(audience) = self.audience else {
      return true;
    };
    let find = |audience: Audience| {
      self.flags.iter().find(|f| f.key == key && f.audience == audience)
    };

    find(audience).or_else(|| find(Audience::All)).is_some_and(|f| f.enabled)
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionView {
  pub action: Action,
  pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabView {
  pub tab: Tab,
  pub actions: Vec<ActionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
  pub user: User,
  pub tabs: Vec<TabView>,
  /// Some action is switched off by a flag
  pub restricted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseRow {
  #[serde(flatten)]
  pub license: License,
  pub state: LicenseStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseView {
  pub rows: Vec<LicenseRow>,
  pub counts: StatusCounts,
  /// Licenses revoked by the expiry sweep during this listing
  pub swept: usize,
}

pub struct Console<'a> {
  user: &'a User,
  repos: &'a Repositories,
}

impl<'a> Console<'a> {
  pub fn new(user: &'a User, repos: &'a Repositories) -> Self {
    Self { user, repos }
  }

  pub async fn control(&self) -> Result<UserControl> {
    let control = self
      .repos
      .controls
      .list_user_controls()
      .await?
      .into_iter()
      .find(|c| c.user_id == self.user.id)
      .unwrap_or_else(|| UserControl::allow_all(&self.user.id));
    Ok(control)
  }

  pub async fn flags(&self) -> FlagSet {
    let flags = match self.repos.controls.list_flags().await {
      Ok(flags) => flags,
      Err(err) => {
        warn!("Failed to load feature flags: {err}");
        Vec::new()
      }
    };
    resolve_flags(self.user.role, flags)
  }

  pub async fn require(&self, permission: Permission) -> Result<()> {
    if self.control().await?.allows(permission) {
      Ok(())
    } else {
      Err(Error::forbidden(format!("Permission `{permission:?}` revoked by Owner")))
    }
  }

  async fn require_flag(&self, key: &str, reason: &str) -> Result<()> {
    if self.flags().await.enabled(key) {
      Ok(())
    } else {
      Err(Error::forbidden(reason))
    }
  }

  pub fn require_role(&self, roles: &[Role]) -> Result<()> {
    if roles.contains(&self.user.role) {
      Ok(())
    } else {
      Err(Error::forbidden("Not allowed for this role"))
    }
  }

  pub async fn dashboard(&self) -> Result<Dashboard> {
    let flags = self.flags().await;
    let control = self.control().await?;
    let mut restricted = false;

    let tabs = Tab::for_role(self.user.role)
      .iter()
      .map(|&tab| {
        let actions = tab
          .actions()
          .iter()
          .map(|&action| {
            let flagged = action.flag().is_none_or(|key| flags.enabled(key));
            restricted |= !flagged;
            let permitted =
              action.permission().is_none_or(|p| control.allows(p));
            ActionView { action, enabled: flagged && permitted }
          })
          .collect();
        TabView { tab, actions }
      })
      .collect();

    Ok(Dashboard { user: self.user.clone(), tabs, restricted })
  }

  /// Gate for batch issuance.
  pub async fn can_issue(&self) -> Result<()> {
    self.require_flag("add_users", "Add users disabled by Owner").await?;
    self.require(Permission::CreateKeys).await
  }

  pub async fn licenses(&self, query: &str) -> Result<LicenseView> {
    self.licenses_at(query, utils::now()).await
  }

  /// Lists licenses, revoking the ones long past expiry first.
  pub async fn licenses_at(
    &self,
    query: &str,
    now: DateTime,
  ) -> Result<LicenseView> {
    let repo = &self.repos.licenses;
    let mut licenses = repo.list_by_user(&self.user.id).await?;

    let swept = self.sweep(&licenses, now).await;
    if swept > 0 {
      licenses = repo.list_by_user(&self.user.id).await?;
    }

    let rows: Vec<_> = licenses
      .into_iter()
      .filter(|l| matches_query(l, query))
      .map(|license| LicenseRow { state: classify(&license, now), license })
      .collect();
    let counts = StatusCounts::of(rows.iter().map(|r| r.state));

    Ok(LicenseView { rows, counts, swept })
  }

  async fn sweep(&self, licenses: &[License], now: DateTime) -> usize {
    let mut swept = 0;
    for license in licenses.iter().filter(|l| due_for_sweep(l, now)) {
      match self.repos.licenses.revoke(&license.id).await {
        Ok(()) => {
          info!("Expired license {} revoked", license.id);
          swept += 1;
        }
        Err(err) => warn!("Failed to revoke expired {}: {err}", license.id),
      }
    }
    swept
  }

  pub async fn revoke(&self, id: &str) -> Result<()> {
    self.require_flag("delete_key", "Delete disabled by Owner").await?;
    self.repos.licenses.revoke(id).await?;
    info!("{} revoked license {id}", self.user.username);
    Ok(())
  }

  pub async fn transfer(&self, seller: &str, amount: f64) -> Result<f64> {
    self.require_role(&[Role::Owner, Role::Administrator])?;
    self.require_flag("add_balance", "Add balance disabled by Owner").await?;
    self.require(Permission::AddBalance).await?;

    let balance = self.repos.sellers.transfer_balance(seller, amount).await?;
    info!(
      "{} moved {amount:.2} to seller {seller}, now {balance:.2}",
      self.user.username
    );
    Ok(balance)
  }
}
