//! Domain records shared by every repository implementation

use serde::{Deserialize, Serialize};

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
  Owner,
  Administrator,
  Reseller,
}

impl Role {
  /// Flag audience governing this role's dashboard. The owner is not gated.
  pub fn audience(self) -> Option<Audience> {
    match self {
      Role::Owner => None,
      Role::Administrator => Some(Audience::Administrator),
      Role::Reseller => Some(Audience::Reseller),
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
  #[default]
  All,
  Administrator,
  Reseller,
}

impl Audience {
  /// Unknown audiences widen to `All`.
  pub fn from_wire(raw: &str) -> Self {
    match raw {
      "ADMINISTRATOR" => Audience::Administrator,
      "RESELLER" => Audience::Reseller,
      _ => Audience::All,
    }
  }

  pub fn as_wire(self) -> &'static str {
    match self {
      Audience::All => "ALL",
      Audience::Administrator => "ADMINISTRATOR",
      Audience::Reseller => "RESELLER",
    }
  }
}

/// A license key row (`keys_code`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
  /// Store-assigned id, empty until created
  pub id: String,
  pub game: String,
  /// The credential handed to the customer
  pub user_key: String,
  pub duration_days: i32,
  pub expired_date: Option<DateTime>,
  pub max_devices: i32,
  pub devices: i32,
  /// Free-form, usually `active`, `revoked` or `blocked`
  pub status: String,
  /// Issuer name shown next to the key
  pub registrator: String,
  pub created_at: Option<DateTime>,
  pub updated_at: Option<DateTime>,
}

impl License {
  pub const ACTIVE: &'static str = "active";
  pub const REVOKED: &'static str = "revoked";
  pub const BLOCKED: &'static str = "blocked";

  pub fn is_blocked(&self) -> bool {
    self.status.eq_ignore_ascii_case(Self::BLOCKED)
      || self.status.eq_ignore_ascii_case(Self::REVOKED)
  }

  pub fn is_revoked(&self) -> bool {
    self.status.eq_ignore_ascii_case(Self::REVOKED)
  }

  /// `registrator:user_key`, the label handed out after issuance.
  pub fn label(&self) -> String {
    format!("{}:{}", self.registrator, self.user_key)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub username: String,
  pub role: Role,
  pub email: Option<String>,
  pub created_at: Option<DateTime>,
  pub updated_at: Option<DateTime>,
}

impl User {
  pub fn new(id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
    Self {
      id: id.into(),
      username: username.into(),
      role,
      email: None,
      created_at: None,
      updated_at: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
  pub id: String,
  pub username: String,
  pub email: String,
  pub invite_key: String,
  pub verified: bool,
  pub banned: bool,
  pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
  pub key: String,
  #[serde(default)]
  pub audience: Audience,
  #[serde(default = "enabled_by_default")]
  pub enabled: bool,
}

fn enabled_by_default() -> bool {
  true
}

impl FeatureFlag {
  pub fn new(key: impl Into<String>, audience: Audience, enabled: bool) -> Self {
    Self { key: key.into(), audience, enabled }
  }

  pub fn same_slot(&self, other: &FeatureFlag) -> bool {
    self.key == other.key && self.audience == other.audience
  }
}

/// Per-user permission overrides. Missing records mean everything is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserControl {
  pub user_id: String,
  #[serde(default = "enabled_by_default")]
  pub can_login: bool,
  #[serde(default = "enabled_by_default")]
  pub can_create_keys: bool,
  #[serde(default = "enabled_by_default")]
  pub can_reset_keys: bool,
  #[serde(default = "enabled_by_default")]
  pub can_add_balance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
  Login,
  CreateKeys,
  ResetKeys,
  AddBalance,
}

impl UserControl {
  pub fn allow_all(user_id: impl Into<String>) -> Self {
    Self {
      user_id: user_id.into(),
      can_login: true,
      can_create_keys: true,
      can_reset_keys: true,
      can_add_balance: true,
    }
  }

  pub fn allows(&self, permission: Permission) -> bool {
    match permission {
      Permission::Login => self.can_login,
      Permission::CreateKeys => self.can_create_keys,
      Permission::ResetKeys => self.can_reset_keys,
      Permission::AddBalance => self.can_add_balance,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
  pub id: String,
  pub value: f64,
  pub duration_days: i32,
  pub amount: i32,
  pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lib {
  pub id: String,
  pub file: String,
  pub file_type: Option<String>,
  pub file_size: Option<i64>,
  pub pass: Option<String>,
  pub time: Option<DateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralCode {
  pub id: String,
  pub code: String,
  pub referral: Option<String>,
  pub level: Option<i32>,
  pub set_saldo: Option<f64>,
  pub used_by: Option<String>,
  pub created_by: Option<String>,
  pub created_at: Option<DateTime>,
  pub updated_at: Option<DateTime>,
  pub acc_expiration: Option<DateTime>,
}
