use sea_orm::{Set, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::model;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sellers")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub username: String,
  pub email: String,
  pub invite_key: String,
  pub verified: bool,
  pub banned: bool,
  pub balance: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for model::Seller {
  fn from(m: Model) -> Self {
    Self {
      id: m.id,
      username: m.username,
      email: m.email,
      invite_key: m.invite_key,
      verified: m.verified,
      banned: m.banned,
      balance: m.balance,
    }
  }
}

impl From<model::Seller> for ActiveModel {
  fn from(s: model::Seller) -> Self {
    Self {
      id: Set(s.id),
      username: Set(s.username),
      email: Set(s.email),
      invite_key: Set(s.invite_key),
      verified: Set(s.verified),
      banned: Set(s.banned),
      balance: Set(s.balance),
    }
  }
}
