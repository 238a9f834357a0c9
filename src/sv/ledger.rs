use sea_orm::sea_query::{Expr, OnConflict};

use crate::{entity::account, prelude::*};

/// Balance of one account. Built per request from the shared connection.
#[derive(Clone)]
pub struct Ledger<'a> {
  db: &'a DatabaseConnection,
  account: String,
  default_balance: f64,
}

impl<'a> Ledger<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    account: impl Into<String>,
    default_balance: f64,
  ) -> Self {
    Self { db, account: account.into(), default_balance }
  }

  pub fn account(&self) -> &str {
    &self.account
  }

  /// Creates the account with the default balance unless it exists.
  async fn open(&self) -> Result<()> {
    let model = account::ActiveModel {
      id: Set(self.account.clone()),
      balance: Set(self.default_balance),
      updated_at: Set(utils::now()),
    };

    account::Entity::insert(model)
      .on_conflict(
        OnConflict::column(account::Column::Id).do_nothing().to_owned(),
      )
      .exec_without_returning(self.db)
      .await?;
    Ok(())
  }

  pub async fn balance(&self) -> Result<f64> {
    self.open().await?;
    let account = account::Entity::find_by_id(self.account.as_str())
      .one(self.db)
      .await?
      .ok_or_else(|| Error::Internal(format!("account {} vanished", self.account)))?;
    Ok(account.balance)
  }

  /// Deducts `amount` iff the balance covers it, in one conditional update.
  /// Non-positive amounts succeed without touching the balance.
  pub async fn try_deduct(&self, amount: f64) -> Result<bool> {
    if amount <= 0.0 {
      return Ok(true);
    }
    self.open().await?;

    let result = account::Entity::update_many()
      .col_expr(
        account::Column::Balance,
        Expr::col(account::Column::Balance).sub(amount),
      )
      .col_expr(account::Column::UpdatedAt, Expr::value(utils::now()))
      .filter(account::Column::Id.eq(self.account.as_str()))
      .filter(account::Column::Balance.gte(amount))
      .exec(self.db)
      .await?;

    let deducted = result.rows_affected == 1;
    if deducted {
      debug!("Deducted {amount:.2} from {}", self.account);
    }
    Ok(deducted)
  }

  pub async fn set_balance(&self, value: f64) -> Result<()> {
    let model = account::ActiveModel {
      id: Set(self.account.clone()),
      balance: Set(value),
      updated_at: Set(utils::now()),
    };

    account::Entity::insert(model)
      .on_conflict(
        OnConflict::column(account::Column::Id)
          .update_columns([account::Column::Balance, account::Column::UpdatedAt])
          .to_owned(),
      )
      .exec_without_returning(self.db)
      .await?;

    info!("Balance of {} set to {value:.2}", self.account);
    Ok(())
  }
}
