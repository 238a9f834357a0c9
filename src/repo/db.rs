//! Sellers kept in the local SQL store.

use sea_orm::sea_query::Expr;

use super::SellersRepository;
use crate::{entity::seller, model::Seller, prelude::*};

pub struct DbSellers {
  db: DatabaseConnection,
}

impl DbSellers {
  pub fn new(db: DatabaseConnection) -> Self {
    Self { db }
  }

  #[cfg(test)]
  pub async fn insert(&self, seller: Seller) -> Result<Seller> {
    let model = seller::ActiveModel::from(seller).insert(&self.db).await?;
    Ok(model.into())
  }

  async fn find(&self, id: &str) -> Result<seller::Model> {
    seller::Entity::find_by_id(id)
      .one(&self.db)
      .await?
      .ok_or_else(|| Error::SellerNotFound(id.into()))
  }
}

#[async_trait]
impl SellersRepository for DbSellers {
  async fn list(&self) -> Result<Vec<Seller>> {
    let sellers = seller::Entity::find()
      .order_by_asc(seller::Column::Username)
      .all(&self.db)
      .await?;
    Ok(sellers.into_iter().map(Seller::from).collect())
  }

  async fn get(&self, id: &str) -> Result<Seller> {
    Ok(self.find(id).await?.into())
  }

  async fn transfer_balance(&self, id: &str, amount: f64) -> Result<f64> {
    let txn = self.db.begin().await?;

    let mut update = seller::Entity::update_many()
      .col_expr(
        seller::Column::Balance,
        Expr::col(seller::Column::Balance).add(amount),
      )
      .filter(seller::Column::Id.eq(id));
    if amount < 0.0 {
      update = update.filter(seller::Column::Balance.gte(-amount));
    }

    if update.exec(&txn).await?.rows_affected == 0 {
      let exists = seller::Entity::find_by_id(id).one(&txn).await?.is_some();
      return Err(if exists {
        Error::InsufficientBalance { need: -amount }
      } else {
        Error::SellerNotFound(id.into())
      });
    }

    let balance = seller::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .map(|s| s.balance)
      .ok_or_else(|| Error::SellerNotFound(id.into()))?;

    txn.commit().await?;
    Ok(balance)
  }

  async fn set_verified(&self, id: &str, verified: bool) -> Result<()> {
    let seller = self.find(id).await?;
    seller::ActiveModel { verified: Set(verified), ..seller.into() }
      .update(&self.db)
      .await?;
    Ok(())
  }

  async fn set_banned(&self, id: &str, banned: bool) -> Result<()> {
    let seller = self.find(id).await?;
    seller::ActiveModel { banned: Set(banned), ..seller.into() }
      .update(&self.db)
      .await?;
    Ok(())
  }

  async fn remove(&self, id: &str) -> Result<()> {
    let result = seller::Entity::delete_by_id(id).exec(&self.db).await?;
    if result.rows_affected == 0 {
      return Err(Error::SellerNotFound(id.into()));
    }
    Ok(())
  }
}
